use std::{
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};
use tokio::sync::watch;

use crate::{
    client::WeatherApi,
    error::WeatherError,
    location::LocationProvider,
    model::{Coordinate, WeatherSnapshot},
    state::{SessionState, StateCell, SupersedePolicy},
};

#[derive(Debug)]
struct Inner {
    api: Arc<dyn WeatherApi>,
    location: LocationProvider,
    cell: StateCell<WeatherSnapshot>,
    /// Location lookup currently shared by every current-location load.
    fix: Mutex<Option<watch::Receiver<Fix>>>,
}

type Fix = Option<Result<Coordinate, WeatherError>>;

impl Inner {
    fn fix_slot(&self) -> MutexGuard<'_, Option<watch::Receiver<Fix>>> {
        self.fix.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve the device location, joining a lookup another load already started
    /// instead of competing for the provider's single slot.
    async fn locate(&self) -> Result<Coordinate, WeatherError> {
        loop {
            let (leader, mut rx) = {
                let mut slot = self.fix_slot();
                match slot.as_ref() {
                    Some(rx) => (None, rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        *slot = Some(rx.clone());
                        (Some(tx), rx)
                    }
                }
            };

            let Some(tx) = leader else {
                let outcome = rx.wait_for(Option::is_some).await.map(|fix| fix.clone());
                match outcome {
                    Ok(Some(result)) => return result,
                    // The load that started the lookup was dropped; start another.
                    _ => continue,
                }
            };

            let _guard = FixGuard { inner: self, rx: &rx };
            let result = self.location.request_current_location().await;
            tx.send_replace(Some(result.clone()));
            return result;
        }
    }
}

/// Clears the shared lookup once its leader finishes or is dropped.
struct FixGuard<'a> {
    inner: &'a Inner,
    rx: &'a watch::Receiver<Fix>,
}

impl Drop for FixGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.inner.fix_slot();
        if slot.as_ref().is_some_and(|rx| rx.same_channel(self.rx)) {
            *slot = None;
        }
    }
}

/// Loads current weather for the device location or a named city and
/// exposes the outcome as observable [`SessionState`].
///
/// Both entry points switch the state to `Loading` as soon as they are
/// called; the returned future does the network work and publishes the
/// result. Futures are `'static`, so callers may spawn them.
#[derive(Debug, Clone)]
pub struct WeatherSession {
    inner: Arc<Inner>,
}

impl WeatherSession {
    pub fn new(api: Arc<dyn WeatherApi>, location: LocationProvider) -> Self {
        Self::with_policy(api, location, SupersedePolicy::default())
    }

    pub fn with_policy(
        api: Arc<dyn WeatherApi>,
        location: LocationProvider,
        policy: SupersedePolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                location,
                cell: StateCell::new(policy),
                fix: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SessionState<WeatherSnapshot> {
        self.inner.cell.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState<WeatherSnapshot>> {
        self.inner.cell.subscribe()
    }

    pub fn location(&self) -> &LocationProvider {
        &self.inner.location
    }

    /// Resolve the device location, then fetch weather for that coordinate.
    ///
    /// Overlapping calls share one location lookup.
    pub fn load_for_current_location(&self) -> impl Future<Output = ()> + Send + use<> {
        let seq = self.inner.cell.begin();
        let inner = Arc::clone(&self.inner);

        async move {
            tracing::debug!(request = seq, "Loading weather for current location");
            let result = match inner.locate().await {
                Ok(_) if !inner.cell.is_current(seq) => {
                    tracing::debug!(request = seq, "Superseded before fetching weather");
                    return;
                }
                Ok(coordinate) => inner.api.fetch_weather_by_coordinate(coordinate).await,
                Err(err) => Err(err),
            };
            inner.cell.finish(seq, result);
        }
    }

    /// Fetch weather for a known coordinate, e.g. a picked search result.
    pub fn load_for_coordinate(
        &self,
        coordinate: Coordinate,
    ) -> impl Future<Output = ()> + Send + use<> {
        let seq = self.inner.cell.begin();
        let inner = Arc::clone(&self.inner);

        async move {
            tracing::debug!(request = seq, %coordinate, "Loading weather for coordinate");
            let result = inner.api.fetch_weather_by_coordinate(coordinate).await;
            inner.cell.finish(seq, result);
        }
    }

    pub fn load_for_city(&self, name: &str) -> impl Future<Output = ()> + Send + use<> {
        let name = name.to_string();
        let seq = self.inner.cell.begin();
        let inner = Arc::clone(&self.inner);

        async move {
            tracing::debug!(request = seq, city = %name, "Loading weather for city");
            let result = inner.api.fetch_weather_by_city_name(&name).await;
            inner.cell.finish(seq, result);
        }
    }
}
