//! Fakes shared by the session tests.

use async_trait::async_trait;
use chrono::Utc;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tokio::sync::oneshot;

use crate::{
    client::WeatherApi,
    error::WeatherError,
    location::{LocationAuthorization, LocationEvent, LocationEventSink, LocationPlatform},
    model::{CityMatch, Coordinate, WeatherSnapshot},
};

pub(crate) fn snapshot(name: &str) -> WeatherSnapshot {
    WeatherSnapshot {
        location_name: name.to_string(),
        condition_main: "Clouds".to_string(),
        condition_description: "broken clouds".to_string(),
        condition_icon: "04d".to_string(),
        temperature_c: 12.5,
        feels_like_c: 11.0,
        temp_min_c: 10.0,
        temp_max_c: 14.0,
        pressure_hpa: 1012.0,
        humidity_pct: 80,
        wind_speed_mps: 3.6,
        wind_deg: Some(200.0),
        coordinate: Coordinate::new(0.0, 0.0),
        fetched_at: Utc::now(),
    }
}

pub(crate) fn city(name: &str, country: &str) -> CityMatch {
    CityMatch {
        name: name.to_string(),
        country: country.to_string(),
        state: None,
        coordinate: Coordinate::new(0.0, 0.0),
    }
}

type Reply<T> = oneshot::Receiver<Result<T, WeatherError>>;

/// [`WeatherApi`] whose responses are released by the test, keyed by query.
///
/// Coordinate lookups use the key `"lat,lon"`.
#[derive(Debug, Default)]
pub(crate) struct FakeApi {
    weather: Mutex<HashMap<String, Reply<WeatherSnapshot>>>,
    cities: Mutex<HashMap<String, Reply<Vec<CityMatch>>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub(crate) fn weather_later(
        &self,
        key: &str,
    ) -> oneshot::Sender<Result<WeatherSnapshot, WeatherError>> {
        let (tx, rx) = oneshot::channel();
        self.weather.lock().unwrap().insert(key.to_string(), rx);
        tx
    }

    pub(crate) fn cities_later(
        &self,
        key: &str,
    ) -> oneshot::Sender<Result<Vec<CityMatch>, WeatherError>> {
        let (tx, rx) = oneshot::channel();
        self.cities.lock().unwrap().insert(key.to_string(), rx);
        tx
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    async fn reply<T>(
        &self,
        table: &Mutex<HashMap<String, Reply<T>>>,
        key: String,
    ) -> Result<T, WeatherError> {
        self.calls.lock().unwrap().push(key.clone());
        let pending = table.lock().unwrap().remove(&key);
        match pending {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(WeatherError::TransportError("reply dropped".into()))),
            None => Err(WeatherError::ApiError(format!("no response scripted for {key}"))),
        }
    }
}

#[async_trait]
impl WeatherApi for FakeApi {
    async fn fetch_weather_by_coordinate(
        &self,
        coordinate: Coordinate,
    ) -> Result<WeatherSnapshot, WeatherError> {
        let key = format!("{},{}", coordinate.latitude, coordinate.longitude);
        self.reply(&self.weather, key).await
    }

    async fn fetch_weather_by_city_name(
        &self,
        name: &str,
    ) -> Result<WeatherSnapshot, WeatherError> {
        self.reply(&self.weather, name.to_string()).await
    }

    async fn search_cities(&self, query: &str) -> Result<Vec<CityMatch>, WeatherError> {
        self.reply(&self.cities, query.to_string()).await
    }
}

/// Platform that answers every call immediately.
#[derive(Debug)]
pub(crate) struct InstantPlatform {
    pub(crate) status: LocationAuthorization,
    pub(crate) grant: LocationAuthorization,
    pub(crate) fix: Result<Coordinate, String>,
}

impl InstantPlatform {
    pub(crate) fn authorized(fix: Coordinate) -> Arc<Self> {
        Arc::new(Self {
            status: LocationAuthorization::Authorized,
            grant: LocationAuthorization::Authorized,
            fix: Ok(fix),
        })
    }

    pub(crate) fn with_status(status: LocationAuthorization) -> Arc<Self> {
        Arc::new(Self {
            status,
            grant: LocationAuthorization::Denied,
            fix: Err("no fix".to_string()),
        })
    }
}

impl LocationPlatform for InstantPlatform {
    fn authorization_status(&self) -> LocationAuthorization {
        self.status
    }

    fn request_authorization(&self, events: LocationEventSink) {
        events.send(LocationEvent::AuthorizationChanged(self.grant));
    }

    fn start_updating_location(&self, events: LocationEventSink) {
        match &self.fix {
            Ok(coordinate) => events.send(LocationEvent::LocationUpdated(*coordinate)),
            Err(cause) => events.send(LocationEvent::LocationFailed(cause.clone())),
        }
    }

    fn stop_updating_location(&self) {}
}

/// Authorized platform that holds on to the sink so the test decides when,
/// and with what, location updates arrive.
#[derive(Debug, Default)]
pub(crate) struct DeferredPlatform {
    sink: Mutex<Option<LocationEventSink>>,
    starts: Mutex<usize>,
}

impl DeferredPlatform {
    pub(crate) fn sink(&self) -> Option<LocationEventSink> {
        self.sink.lock().unwrap().clone()
    }

    pub(crate) fn starts(&self) -> usize {
        *self.starts.lock().unwrap()
    }
}

impl LocationPlatform for DeferredPlatform {
    fn authorization_status(&self) -> LocationAuthorization {
        LocationAuthorization::Authorized
    }

    fn request_authorization(&self, _events: LocationEventSink) {}

    fn start_updating_location(&self, events: LocationEventSink) {
        *self.starts.lock().unwrap() += 1;
        *self.sink.lock().unwrap() = Some(events);
    }

    fn stop_updating_location(&self) {}
}
