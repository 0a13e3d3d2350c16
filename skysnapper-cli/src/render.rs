use chrono::Local;
use skysnapper_core::{CityMatch, WeatherSnapshot};

/// Symbol for an OpenWeather condition group ("Clear", "Rain", ...).
pub fn condition_symbol(condition_main: &str) -> &'static str {
    match condition_main.to_lowercase().as_str() {
        "clear" => "☀",
        "clouds" => "☁",
        "rain" => "🌧",
        "snow" => "❄",
        "thunderstorm" => "⛈",
        "drizzle" => "🌦",
        _ => "☁",
    }
}

pub fn render_snapshot(snapshot: &WeatherSnapshot) -> String {
    let updated = snapshot.fetched_at.with_timezone(&Local).format("%H:%M");

    format!(
        "{symbol}  {name}\n   \
         {main} · {description}\n   \
         {temp}°C  (min {min}°C / max {max}°C)\n   \
         Feels like {feels}°C · Humidity {humidity}% · Wind {wind} m/s\n   \
         Updated {updated}",
        symbol = condition_symbol(&snapshot.condition_main),
        name = snapshot.location_name,
        main = snapshot.condition_main,
        description = capitalize_words(&snapshot.condition_description),
        temp = whole(snapshot.temperature_c),
        min = whole(snapshot.temp_min_c),
        max = whole(snapshot.temp_max_c),
        feels = whole(snapshot.feels_like_c),
        humidity = snapshot.humidity_pct,
        wind = whole(snapshot.wind_speed_mps),
    )
}

pub fn render_matches(matches: &[CityMatch]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{:>2}. {}  ({})", i + 1, m.display_name(), m.coordinate))
        .collect::<Vec<_>>()
        .join("\n")
}

fn whole(value: f64) -> i64 {
    value.trunc() as i64
}

fn capitalize_words(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
