use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point on the globe, in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Current conditions for one place, decoded from a single provider response.
///
/// Snapshots are never patched: a later successful fetch replaces the whole value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub location_name: String,
    pub condition_main: String,
    pub condition_description: String,
    pub condition_icon: String,
    pub temperature_c: f64,
    pub feels_like_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub pressure_hpa: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub wind_deg: Option<f64>,
    pub coordinate: Coordinate,
    pub fetched_at: DateTime<Utc>,
}

/// One geocoding candidate for a free-text city query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityMatch {
    pub name: String,
    pub country: String,
    pub state: Option<String>,
    pub coordinate: Coordinate,
}

impl CityMatch {
    /// "Name, State, Country", skipping the state when the provider has none.
    pub fn display_name(&self) -> String {
        match self.state.as_deref().filter(|s| !s.is_empty()) {
            Some(state) => format!("{}, {}, {}", self.name, state, self.country),
            None => format!("{}, {}", self.name, self.country),
        }
    }
}
