use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, de::DeserializeOwned};
use std::time::Duration;

use crate::{
    config::ClientConfig,
    error::WeatherError,
    model::{CityMatch, Coordinate, WeatherSnapshot},
};

use super::{SEARCH_RESULT_LIMIT, WeatherApi};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("SkySnapper/", env!("CARGO_PKG_VERSION"));

/// OpenWeather-backed implementation of [`WeatherApi`].
#[derive(Debug, Clone)]
pub struct WeatherClient {
    config: ClientConfig,
    http: Client,
}

impl WeatherClient {
    pub fn new(config: ClientConfig) -> Result<Self, WeatherError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).user_agent(USER_AGENT).build()?;

        Ok(Self { config, http })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        tracing::debug!(url, "Sending OpenWeather request");

        let res = self
            .http
            .get(url)
            .query(query)
            .query(&[("appid", self.config.api_key.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        tracing::debug!(url, %status, "Received OpenWeather response");

        if status != StatusCode::OK {
            return Err(match serde_json::from_str::<OwErrorBody>(&body) {
                Ok(err) => {
                    tracing::warn!(%status, message = %err.message, "OpenWeather reported an error");
                    WeatherError::ApiError(err.message)
                }
                Err(_) => {
                    tracing::warn!(%status, body = %truncate_body(&body), "Unexpected OpenWeather response");
                    WeatherError::InvalidResponse
                }
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(error = %e, body = %truncate_body(&body), "Failed to decode OpenWeather JSON");
            WeatherError::InvalidResponse
        })
    }

    async fn fetch_current(&self, query: &[(&str, &str)]) -> Result<WeatherSnapshot, WeatherError> {
        let url = endpoint(&self.config.weather_base_url, "weather");
        let parsed: OwWeatherResponse = self.get_json(&url, query).await?;

        tracing::info!(location = %parsed.name, "Fetched current weather");
        Ok(parsed.into_snapshot())
    }
}

#[async_trait]
impl WeatherApi for WeatherClient {
    async fn fetch_weather_by_coordinate(
        &self,
        coordinate: Coordinate,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let lat = coordinate.latitude.to_string();
        let lon = coordinate.longitude.to_string();

        self.fetch_current(&[("lat", lat.as_str()), ("lon", lon.as_str()), ("units", "metric")])
            .await
    }

    async fn fetch_weather_by_city_name(
        &self,
        name: &str,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(WeatherError::InvalidQuery);
        }

        self.fetch_current(&[("q", name), ("units", "metric")]).await
    }

    async fn search_cities(&self, query: &str) -> Result<Vec<CityMatch>, WeatherError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let url = endpoint(&self.config.geo_base_url, "direct");
        let limit = SEARCH_RESULT_LIMIT.to_string();
        let parsed: Vec<OwGeoResult> =
            self.get_json(&url, &[("q", query), ("limit", limit.as_str())]).await?;

        tracing::debug!(query, matches = parsed.len(), "Geocoding search finished");
        Ok(parsed.into_iter().map(CityMatch::from).collect())
    }
}

#[derive(Debug, Deserialize)]
struct OwErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OwCondition {
    main: String,
    description: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
    #[serde(default)]
    deg: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwCoord {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeatherResponse {
    weather: Vec<OwCondition>,
    main: OwMain,
    wind: OwWind,
    name: String,
    coord: OwCoord,
}

impl OwWeatherResponse {
    fn into_snapshot(self) -> WeatherSnapshot {
        let (condition_main, condition_description, condition_icon) = self
            .weather
            .into_iter()
            .next()
            .map(|w| (w.main, w.description, w.icon))
            .unwrap_or_else(|| ("Unknown".to_string(), "Unknown".to_string(), String::new()));

        WeatherSnapshot {
            location_name: self.name,
            condition_main,
            condition_description,
            condition_icon,
            temperature_c: self.main.temp,
            feels_like_c: self.main.feels_like,
            temp_min_c: self.main.temp_min,
            temp_max_c: self.main.temp_max,
            pressure_hpa: self.main.pressure,
            humidity_pct: self.main.humidity,
            wind_speed_mps: self.wind.speed,
            wind_deg: self.wind.deg,
            coordinate: Coordinate::new(self.coord.lat, self.coord.lon),
            fetched_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwGeoResult {
    name: String,
    lat: f64,
    lon: f64,
    country: String,
    #[serde(default)]
    state: Option<String>,
}

impl From<OwGeoResult> for CityMatch {
    fn from(r: OwGeoResult) -> Self {
        CityMatch {
            name: r.name,
            country: r.country,
            state: r.state,
            coordinate: Coordinate::new(r.lat, r.lon),
        }
    }
}

fn endpoint(base: &Url, path: &str) -> String {
    format!("{}/{}", base.as_str().trim_end_matches('/'), path)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
