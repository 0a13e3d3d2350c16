//! Core library for SkySnapper.
//!
//! This crate defines:
//! - The OpenWeather client (current weather and city geocoding)
//! - A single-slot async wrapper over platform location permission and updates
//! - Observable sessions that coordinate both for a presentation layer
//! - Configuration & credentials handling
//!
//! It is used by `skysnapper-cli`, but can also back other front ends.

pub mod client;
pub mod config;
pub mod error;
pub mod location;
pub mod model;
pub mod search;
pub mod session;
pub mod state;

#[cfg(test)]
mod testing;

pub use client::{WeatherApi, WeatherClient};
pub use config::{ClientConfig, Config};
pub use error::WeatherError;
pub use location::{
    LocationAuthorization, LocationEvent, LocationEventSink, LocationPlatform, LocationProvider,
};
pub use model::{CityMatch, Coordinate, WeatherSnapshot};
pub use search::CitySearchSession;
pub use session::WeatherSession;
pub use state::{SessionState, SupersedePolicy};
