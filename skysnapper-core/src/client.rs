use async_trait::async_trait;
use std::fmt::Debug;

use crate::{
    error::WeatherError,
    model::{CityMatch, Coordinate, WeatherSnapshot},
};

pub mod openweather;

pub use openweather::WeatherClient;

/// Maximum number of geocoding candidates requested per search.
pub const SEARCH_RESULT_LIMIT: u32 = 10;

/// Remote weather and geocoding lookups.
///
/// Calls carry no shared mutable state and may be issued concurrently.
#[async_trait]
pub trait WeatherApi: Send + Sync + Debug {
    async fn fetch_weather_by_coordinate(
        &self,
        coordinate: Coordinate,
    ) -> Result<WeatherSnapshot, WeatherError>;

    async fn fetch_weather_by_city_name(&self, name: &str)
    -> Result<WeatherSnapshot, WeatherError>;

    /// An empty query yields an empty list without touching the network.
    async fn search_cities(&self, query: &str) -> Result<Vec<CityMatch>, WeatherError>;
}
