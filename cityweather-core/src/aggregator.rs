//! Combined current + forecast loading and the session result channel.

use std::{
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::watch;
use tracing::instrument;

use crate::{
    error::FetchError,
    model::{CityQuery, WeatherReport},
    provider::WeatherProvider,
};

#[derive(Debug, Clone)]
pub struct WeatherAggregator {
    provider: Arc<dyn WeatherProvider>,
}

impl WeatherAggregator {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }

    /// Fetch current conditions and forecast for one query.
    ///
    /// Both calls must succeed; there is no caching between calls.
    #[instrument(skip(self), level = "info")]
    pub async fn load_weather(&self, query: &str) -> Result<WeatherReport, FetchError> {
        let query = CityQuery::parse(query)?;

        let (current, forecast) = tokio::try_join!(
            self.provider.fetch_current(&query),
            self.provider.fetch_forecast(&query)
        )?;

        tracing::info!(
            city = %current.city_name,
            points = forecast.len(),
            "loaded weather"
        );
        Ok(WeatherReport::new(current, forecast))
    }
}

/// Snapshot published on the session's result channel.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub report: Option<Arc<WeatherReport>>,
    pub error: Option<String>,
    pub loading: bool,
    /// Generation of the request that produced this state.
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub enum SessionUpdate {
    Committed(Arc<WeatherReport>),
    /// A newer request was started before this one finished.
    Superseded,
}

/// Serializes results per session: only the latest request may publish.
#[derive(Debug)]
pub struct WeatherSession {
    aggregator: WeatherAggregator,
    generation: AtomicU64,
    state: watch::Sender<SessionState>,
}

impl WeatherSession {
    pub fn new(aggregator: WeatherAggregator) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self { aggregator, generation: AtomicU64::new(0), state }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn is_latest(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Start loading `query`. The request's generation is taken when this
    /// is called, not when the returned future is first polled. Any result
    /// that is no longer the latest, success or failure, is `Superseded`.
    pub fn load(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<SessionUpdate, FetchError>> + Send + '_ {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.to_string();

        async move {
            if self.is_latest(generation) {
                self.state.send_modify(|s| {
                    s.loading = true;
                    s.generation = generation;
                });
            }
            let _guard = LoadingGuard { session: self, generation };

            let result = self.aggregator.load_weather(&query).await;

            if !self.is_latest(generation) {
                tracing::debug!(
                    generation,
                    query = %query,
                    ok = result.is_ok(),
                    "discarding stale result"
                );
                return Ok(SessionUpdate::Superseded);
            }

            match result {
                Ok(report) => {
                    let report = Arc::new(report);
                    self.state.send_modify(|s| {
                        s.report = Some(report.clone());
                        s.error = None;
                        s.loading = false;
                        s.generation = generation;
                    });
                    Ok(SessionUpdate::Committed(report))
                }
                Err(err) => {
                    tracing::warn!(error = %err, query = %query, "weather load failed");
                    let message = err.user_message();
                    self.state.send_modify(|s| {
                        s.error = Some(message);
                        s.loading = false;
                        s.generation = generation;
                    });
                    Err(err)
                }
            }
        }
    }
}

/// Clears `loading` when a load ends or is dropped while the published
/// state still belongs to its generation.
struct LoadingGuard<'a> {
    session: &'a WeatherSession,
    generation: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let generation = self.generation;
        self.session.state.send_if_modified(|s| {
            if s.generation == generation && s.loading {
                s.loading = false;
                true
            } else {
                false
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Condition, CurrentConditions, ForecastPoint, ForecastSet};
    use crate::provider::openweather::OpenWeatherClient;
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::atomic::AtomicUsize,
        time::Duration,
    };
    use tokio::sync::Notify;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Default)]
    struct FakeProvider {
        fail_forecast_for: Option<String>,
        gates: HashMap<String, Arc<Notify>>,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        async fn wait_gate(&self, query: &CityQuery) {
            if let Some(gate) = self.gates.get(query.as_str()) {
                gate.notified().await;
            }
        }
    }

    #[async_trait]
    impl WeatherProvider for FakeProvider {
        async fn fetch_current(&self, query: &CityQuery) -> Result<CurrentConditions, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.wait_gate(query).await;
            Ok(CurrentConditions {
                city_name: query.to_string(),
                temperature_c: 10.5,
                feels_like_c: 9.0,
                condition: Condition::unknown(),
            })
        }

        async fn fetch_forecast(&self, query: &CityQuery) -> Result<ForecastSet, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_forecast_for.as_deref() == Some(query.as_str()) {
                return Err(FetchError::Timeout);
            }
            let points = (0..3)
                .map(|i| ForecastPoint {
                    timestamp: 1_700_000_000 + i * 10_800,
                    temperature_c: 1.0,
                    feels_like_c: 1.0,
                    condition: Condition::unknown(),
                })
                .collect();
            Ok(ForecastSet::new(query.to_string(), points))
        }
    }

    fn session(provider: FakeProvider) -> WeatherSession {
        WeatherSession::new(WeatherAggregator::new(Arc::new(provider)))
    }

    #[tokio::test]
    async fn kyiv_scenario_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Kyiv",
                "main": {"temp": 5.2},
                "weather": [{"description": "clear sky"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": [
                    {"dt": 1, "main": {"temp": 1.0}, "weather": [{"description": "a"}]},
                    {"dt": 2, "main": {"temp": 2.0}, "weather": [{"description": "b"}]},
                    {"dt": 3, "main": {"temp": 3.0}, "weather": [{"description": "c"}]}
                ]
            })))
            .mount(&server)
            .await;

        let client =
            OpenWeatherClient::new("key", &server.uri(), Duration::from_secs(5)).unwrap();
        let aggregator = WeatherAggregator::new(Arc::new(client));

        let report = aggregator.load_weather("Kyiv").await.unwrap();

        assert_eq!(report.current.city_name, "Kyiv");
        assert_eq!(report.current.temperature_whole(), 5);
        assert_eq!(report.current.condition.description, "clear sky");
        assert_eq!(report.forecast.len(), 3);
        assert_eq!(report.forecast.city, "Kyiv");
    }

    #[tokio::test]
    async fn not_found_leaves_previous_state_untouched() {
        let server = MockServer::start().await;
        let client =
            OpenWeatherClient::new("key", &server.uri(), Duration::from_secs(5)).unwrap();
        let session = WeatherSession::new(WeatherAggregator::new(Arc::new(client)));

        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "name": "Kyiv", "main": {"temp": 5.2}, "weather": []
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/forecast"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "list": []
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .with_priority(10)
            .mount(&server)
            .await;

        let first = session.load("Kyiv").await.unwrap();
        let SessionUpdate::Committed(before) = first else {
            panic!("first load should commit");
        };

        let err = session.load("Nowhere").await.unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));

        let state = session.snapshot();
        let after = state.report.expect("report kept");
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(after.city(), "Kyiv");
        assert!(state.error.unwrap().contains("City not found"));
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn empty_query_is_rejected_without_calls() {
        let provider = Arc::new(FakeProvider::default());
        let aggregator = WeatherAggregator::new(provider.clone());

        let err = aggregator.load_weather("  ").await.unwrap_err();

        assert!(matches!(err, FetchError::EmptyQuery));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn forecast_failure_fails_whole_load() {
        let provider = FakeProvider { fail_forecast_for: Some("Lviv".into()), ..Default::default() };
        let session = session(provider);

        session.load("Kyiv").await.unwrap();
        let err = session.load("Lviv").await.unwrap_err();
        assert!(matches!(err, FetchError::Timeout));

        let state = session.snapshot();
        let report = state.report.unwrap();
        assert_eq!(report.current.city_name, "Kyiv");
        assert_eq!(report.forecast.city, "Kyiv");
    }

    #[tokio::test]
    async fn repeated_queries_fetch_again() {
        let provider = Arc::new(FakeProvider::default());
        let aggregator = WeatherAggregator::new(provider.clone());

        aggregator.load_weather("Kyiv").await.unwrap();
        aggregator.load_weather("Kyiv").await.unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn stale_result_does_not_overwrite_newer_one() {
        let gate = Arc::new(Notify::new());
        let mut provider = FakeProvider::default();
        provider.gates.insert("Lviv".into(), gate.clone());
        let session = session(provider);
        let mut rx = session.subscribe();

        let slow = session.load("Lviv");
        let fast = async {
            let update = session.load("Kyiv").await;
            gate.notify_one();
            update
        };
        let (slow, fast) = tokio::join!(slow, fast);

        assert!(matches!(slow.unwrap(), SessionUpdate::Superseded));
        assert!(matches!(fast.unwrap(), SessionUpdate::Committed(_)));

        let state = rx.borrow_and_update().clone();
        assert_eq!(state.report.unwrap().city(), "Kyiv");
        assert_eq!(state.generation, 2);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn stale_failure_is_superseded() {
        let provider = FakeProvider { fail_forecast_for: Some("Lviv".into()), ..Default::default() };
        let session = session(provider);

        let stale = session.load("Lviv");
        let latest = session.load("Kyiv");

        assert!(matches!(stale.await.unwrap(), SessionUpdate::Superseded));
        assert!(matches!(latest.await.unwrap(), SessionUpdate::Committed(_)));

        let state = session.snapshot();
        assert!(state.error.is_none());
        assert_eq!(state.report.unwrap().city(), "Kyiv");
    }

    #[tokio::test]
    async fn dropped_load_clears_loading() {
        let gate = Arc::new(Notify::new());
        let mut provider = FakeProvider::default();
        provider.gates.insert("Lviv".into(), gate);
        let session = session(provider);

        let mut pending = Box::pin(session.load("Lviv"));
        tokio::select! {
            biased;
            _ = &mut pending => panic!("gated load finished early"),
            _ = std::future::ready(()) => {}
        }
        assert!(session.snapshot().loading);

        drop(pending);
        let state = session.snapshot();
        assert!(!state.loading);
        assert!(state.report.is_none());
    }

    #[tokio::test]
    async fn stale_load_clears_loading_when_newer_never_ran() {
        let gate = Arc::new(Notify::new());
        let mut provider = FakeProvider::default();
        provider.gates.insert("Kyiv".into(), gate.clone());
        let session = session(provider);

        let mut older = Box::pin(session.load("Kyiv"));
        tokio::select! {
            biased;
            _ = &mut older => panic!("gated load finished early"),
            _ = std::future::ready(()) => {}
        }
        assert!(session.snapshot().loading);

        drop(session.load("Lviv"));
        gate.notify_one();

        assert!(matches!(older.await.unwrap(), SessionUpdate::Superseded));
        assert!(!session.snapshot().loading);
    }

    #[tokio::test]
    async fn subscribers_see_committed_report() {
        let session = session(FakeProvider::default());
        let mut rx = session.subscribe();

        session.load("Odesa").await.unwrap();

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.report.unwrap().current.temperature_whole(), 10);
        assert!(state.error.is_none());
    }
}
