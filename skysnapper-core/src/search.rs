use std::{future::Future, sync::Arc};
use tokio::sync::watch;

use crate::{
    client::WeatherApi,
    model::CityMatch,
    state::{SessionState, StateCell, SupersedePolicy},
};

#[derive(Debug)]
struct Inner {
    api: Arc<dyn WeatherApi>,
    cell: StateCell<Vec<CityMatch>>,
}

/// Search-as-you-type over the geocoding endpoint.
///
/// No debouncing happens here; callers decide how often to call
/// [`CitySearchSession::on_query_changed`].
#[derive(Debug, Clone)]
pub struct CitySearchSession {
    inner: Arc<Inner>,
}

impl CitySearchSession {
    pub fn new(api: Arc<dyn WeatherApi>) -> Self {
        Self::with_policy(api, SupersedePolicy::default())
    }

    pub fn with_policy(api: Arc<dyn WeatherApi>, policy: SupersedePolicy) -> Self {
        Self { inner: Arc::new(Inner { api, cell: StateCell::new(policy) }) }
    }

    pub fn state(&self) -> SessionState<Vec<CityMatch>> {
        self.inner.cell.get()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState<Vec<CityMatch>>> {
        self.inner.cell.subscribe()
    }

    /// Current matches; empty unless the last search succeeded.
    pub fn results(&self) -> Vec<CityMatch> {
        self.inner.cell.get().loaded().cloned().unwrap_or_default()
    }

    /// An empty query clears the results and goes back to `Idle` without a
    /// network call. Anything else starts a search and moves to `Loading`.
    pub fn on_query_changed(&self, text: &str) -> impl Future<Output = ()> + Send + use<> {
        let query = text.trim().to_string();
        let inner = Arc::clone(&self.inner);

        let seq = if query.is_empty() {
            inner.cell.reset();
            None
        } else {
            Some(inner.cell.begin())
        };

        async move {
            let Some(seq) = seq else { return };

            tracing::debug!(request = seq, query = %query, "Searching cities");
            let result = inner.api.search_cities(&query).await;
            inner.cell.finish(seq, result);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::WeatherError,
        testing::{FakeApi, city},
    };

    fn names(state: &SessionState<Vec<CityMatch>>) -> Vec<String> {
        state.loaded().map(|m| m.iter().map(|c| c.name.clone()).collect()).unwrap_or_default()
    }

    #[tokio::test]
    async fn empty_query_is_idle_without_request() {
        let api = Arc::new(FakeApi::default());
        let search = CitySearchSession::new(api.clone());

        search.on_query_changed("").await;
        search.on_query_changed("   ").await;

        assert_eq!(search.state(), SessionState::Idle);
        assert!(search.results().is_empty());
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn query_populates_results_in_provider_order() {
        let api = Arc::new(FakeApi::default());
        let reply = api.cities_later("Athens");
        let search = CitySearchSession::new(api.clone());

        let pending = search.on_query_changed("Athens");
        assert!(search.state().is_loading());

        reply.send(Ok(vec![city("Athens", "GR"), city("Athens", "US")])).unwrap();
        pending.await;

        let results = search.results();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].country, "GR");
        assert_eq!(results[1].country, "US");
    }

    #[tokio::test]
    async fn clearing_query_drops_previous_results() {
        let api = Arc::new(FakeApi::default());
        let reply = api.cities_later("Rome");
        let search = CitySearchSession::new(api.clone());

        let pending = search.on_query_changed("Rome");
        reply.send(Ok(vec![city("Rome", "IT")])).unwrap();
        pending.await;
        assert_eq!(names(&search.state()), vec!["Rome"]);

        search.on_query_changed("").await;
        assert_eq!(search.state(), SessionState::Idle);
        assert_eq!(api.calls(), vec!["Rome".to_string()]);
    }

    #[tokio::test]
    async fn search_failure_is_failed_state() {
        let api = Arc::new(FakeApi::default());
        let reply = api.cities_later("Nowhere");
        let search = CitySearchSession::new(api.clone());

        let pending = search.on_query_changed("Nowhere");
        reply.send(Err(WeatherError::InvalidResponse)).unwrap();
        pending.await;

        assert_eq!(search.state(), SessionState::Failed(WeatherError::InvalidResponse));
        assert!(search.results().is_empty());
    }

    #[tokio::test]
    async fn latest_keystroke_wins_over_slow_earlier_search() {
        let api = Arc::new(FakeApi::default());
        let pa = api.cities_later("Pa");
        let par = api.cities_later("Par");
        let search = CitySearchSession::new(api.clone());

        let first = tokio::spawn(search.on_query_changed("Pa"));
        let second = tokio::spawn(search.on_query_changed("Par"));

        par.send(Ok(vec![city("Paris", "FR")])).unwrap();
        second.await.unwrap();
        pa.send(Ok(vec![city("Pamplona", "ES"), city("Palermo", "IT")])).unwrap();
        first.await.unwrap();

        assert_eq!(names(&search.state()), vec!["Paris"]);
    }

    #[tokio::test]
    async fn late_result_after_clear_is_discarded() {
        let api = Arc::new(FakeApi::default());
        let reply = api.cities_later("Lis");
        let search = CitySearchSession::new(api.clone());

        let pending = tokio::spawn(search.on_query_changed("Lis"));
        search.on_query_changed("").await;

        reply.send(Ok(vec![city("Lisbon", "PT")])).unwrap();
        pending.await.unwrap();

        assert_eq!(search.state(), SessionState::Idle);
    }

    #[tokio::test]
    async fn completion_order_policy_keeps_last_arrival() {
        let api = Arc::new(FakeApi::default());
        let pa = api.cities_later("Pa");
        let par = api.cities_later("Par");
        let search = CitySearchSession::with_policy(api.clone(), SupersedePolicy::LatestCompleted);

        let first = tokio::spawn(search.on_query_changed("Pa"));
        let second = tokio::spawn(search.on_query_changed("Par"));

        par.send(Ok(vec![city("Paris", "FR")])).unwrap();
        second.await.unwrap();
        pa.send(Ok(vec![city("Pamplona", "ES")])).unwrap();
        first.await.unwrap();

        assert_eq!(names(&search.state()), vec!["Pamplona"]);
    }
}
