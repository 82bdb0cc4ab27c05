//! Fetch-and-cache orchestration: prefer a fresh forecast, fall back to the
//! last stored one.
//!
//! A successful fetch is handed back immediately while its persistence runs
//! as a separate task. Every persistence outcome is sent on an unbounded
//! channel so failures are observed by `PersistReports` rather than lost.

use meteodash_core::{AppError, WeatherError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::provider::ForecastSource;
use crate::store::SharedStore;
use crate::types::{RecordId, WeatherData};

/// Terminal state of one `load` invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The remote source answered; persistence was started in the background.
    Fetched(WeatherData),
    /// The remote source failed and the latest stored snapshot was used.
    Cached(WeatherData),
    /// The remote source failed and nothing was stored yet.
    Empty,
}

impl LoadOutcome {
    pub fn data(&self) -> Option<&WeatherData> {
        match self {
            Self::Fetched(data) | Self::Cached(data) => Some(data),
            Self::Empty => None,
        }
    }

    pub fn into_data(self) -> Option<WeatherData> {
        match self {
            Self::Fetched(data) | Self::Cached(data) => Some(data),
            Self::Empty => None,
        }
    }

    /// Message to show next to the dashboard, if the data is not fresh.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            Self::Fetched(_) => None,
            Self::Cached(_) => Some(WeatherError::CacheError(String::new()).user_message()),
            Self::Empty => Some(WeatherError::NoData.user_message()),
        }
    }

    /// Short label for logs and status lines.
    pub fn source(&self) -> &'static str {
        match self {
            Self::Fetched(_) => "network",
            Self::Cached(_) => "cache",
            Self::Empty => "none",
        }
    }
}

/// Result of one background persistence task.
#[derive(Debug)]
pub enum PersistReport {
    Stored(RecordId),
    Failed(StoreError),
}

/// Receiving side of the persistence report channel.
#[derive(Debug)]
pub struct PersistReports {
    rx: mpsc::UnboundedReceiver<PersistReport>,
}

impl PersistReports {
    /// Wait for the next report. Returns `None` once the loader and all
    /// in-flight persistence tasks are gone.
    pub async fn recv(&mut self) -> Option<PersistReport> {
        self.rx.recv().await
    }

    /// Drain reports in a background task, logging failures at error level.
    ///
    /// The task ends when the loader is dropped and pending writes finish.
    pub fn spawn_logger(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(report) = self.rx.recv().await {
                match report {
                    PersistReport::Stored(id) => {
                        tracing::debug!("Weather snapshot persisted as {}", id);
                    }
                    PersistReport::Failed(e) => {
                        let err = AppError::from(e);
                        tracing::error!(
                            hint = err.user_message(),
                            "Failed to persist weather snapshot: {}",
                            err
                        );
                    }
                }
            }
        })
    }
}

/// Produces the current forecast for the dashboard.
pub struct WeatherLoader<S> {
    source: S,
    store: SharedStore,
    reports: mpsc::UnboundedSender<PersistReport>,
}

impl<S: ForecastSource> WeatherLoader<S> {
    /// Create a loader and the channel on which persistence results arrive.
    pub fn new(source: S, store: SharedStore) -> (Self, PersistReports) {
        let (tx, rx) = mpsc::unbounded_channel();
        let loader = Self {
            source,
            store,
            reports: tx,
        };
        (loader, PersistReports { rx })
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Fetch fresh data or fall back to the cache; `None` if neither is available.
    ///
    /// Never fails: fetch and cache errors are logged and degrade to the next option.
    pub async fn load(&self) -> Option<WeatherData> {
        self.load_outcome().await.into_data()
    }

    /// Same as `load`, but reports where the data came from.
    pub async fn load_outcome(&self) -> LoadOutcome {
        match self.source.fetch().await {
            Ok(data) => {
                self.persist_in_background(data.clone());
                LoadOutcome::Fetched(data)
            }
            Err(e) => {
                let err = AppError::from(e);
                tracing::warn!(
                    hint = err.user_message(),
                    "Error fetching forecast, falling back to cache: {}",
                    err
                );
                self.read_cache().await
            }
        }
    }

    fn persist_in_background(&self, data: WeatherData) {
        let store = self.store.clone();
        let reports = self.reports.clone();

        tokio::spawn(async move {
            let report = match store.append(data).await {
                Ok(id) => PersistReport::Stored(id),
                Err(e) => {
                    tracing::warn!("Error inserting forecast into store: {}", e);
                    PersistReport::Failed(e)
                }
            };
            if reports.send(report).is_err() {
                tracing::debug!("Persist report dropped; no receiver");
            }
        });
    }

    async fn read_cache(&self) -> LoadOutcome {
        match self.store.latest().await {
            Ok(Some(data)) => {
                tracing::info!("Using cached forecast");
                LoadOutcome::Cached(data)
            }
            Ok(None) => {
                tracing::info!("No cached forecast available");
                LoadOutcome::Empty
            }
            Err(e) => {
                let err = AppError::from(e);
                tracing::error!(
                    hint = err.user_message(),
                    "Error reading cached forecast: {}",
                    err
                );
                LoadOutcome::Empty
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FetchError, StoreResult};
    use crate::store::{MemorySnapshotStore, SnapshotStore, StoredSnapshot};
    use crate::types::{DailySeries, HourlySeries};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Returns the queued responses in order, then keeps failing.
    struct ScriptedSource {
        responses: parking_lot::Mutex<Vec<Result<WeatherData, FetchError>>>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(mut responses: Vec<Result<WeatherData, FetchError>>) -> Self {
            responses.reverse();
            Self {
                responses: parking_lot::Mutex::new(responses),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ForecastSource for ScriptedSource {
        async fn fetch(&self) -> Result<WeatherData, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Err(FetchError::Parse("script exhausted".into())))
        }
    }

    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn append(&self, _snapshot: &WeatherData) -> StoreResult<RecordId> {
            Err(StoreError::Task("disk full".into()))
        }

        fn latest_record(&self) -> StoreResult<Option<StoredSnapshot>> {
            Err(StoreError::Task("disk unreadable".into()))
        }

        fn count(&self) -> StoreResult<usize> {
            Ok(0)
        }
    }

    fn scenario_snapshot() -> WeatherData {
        WeatherData {
            latitude: 1.29,
            longitude: 103.85,
            hourly: HourlySeries {
                time: vec!["00:00".into(), "01:00".into()],
                relativehumidity_2m: vec![Some(80.0), Some(82.0)],
                direct_radiation: vec![Some(0.0), Some(5.0)],
            },
            daily: DailySeries {
                time: vec!["2023-10-01".into()],
                temperature_2m_max: vec![Some(31.0)],
                temperature_2m_min: vec![Some(25.0)],
            },
        }
    }

    fn offline() -> Result<WeatherData, FetchError> {
        Err(FetchError::Status {
            status: 503,
            body: "unavailable".into(),
        })
    }

    #[tokio::test]
    async fn test_fetch_success_returns_data_and_persists() {
        let store = SharedStore::new(MemorySnapshotStore::new());
        let source = ScriptedSource::new(vec![Ok(scenario_snapshot())]);
        let (loader, mut reports) = WeatherLoader::new(source, store.clone());

        let outcome = loader.load_outcome().await;
        assert_eq!(outcome, LoadOutcome::Fetched(scenario_snapshot()));
        assert_eq!(outcome.source(), "network");

        assert!(matches!(reports.recv().await, Some(PersistReport::Stored(_))));
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.latest().await.unwrap(), Some(scenario_snapshot()));
    }

    #[test]
    fn test_notice_only_for_stale_or_missing_data() {
        assert_eq!(LoadOutcome::Fetched(scenario_snapshot()).notice(), None);
        assert_eq!(
            LoadOutcome::Cached(scenario_snapshot()).notice(),
            Some("Weather data may be outdated.")
        );
        assert_eq!(
            LoadOutcome::Empty.notice(),
            Some(WeatherError::NoData.user_message())
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_cache() {
        let store = SharedStore::new(MemorySnapshotStore::new());
        let source = ScriptedSource::new(vec![Ok(scenario_snapshot()), offline()]);
        let (loader, mut reports) = WeatherLoader::new(source, store);

        assert_eq!(loader.load().await, Some(scenario_snapshot()));
        reports.recv().await;

        let outcome = loader.load_outcome().await;
        assert_eq!(outcome, LoadOutcome::Cached(scenario_snapshot()));
    }

    #[tokio::test]
    async fn test_fetch_failure_with_empty_store_yields_nothing() {
        let store = SharedStore::new(MemorySnapshotStore::new());
        let (loader, _reports) = WeatherLoader::new(ScriptedSource::new(vec![offline()]), store);

        let outcome = loader.load_outcome().await;
        assert_eq!(outcome, LoadOutcome::Empty);
        assert!(outcome.data().is_none());
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_affect_result() {
        let store = SharedStore::new(BrokenStore);
        let source = ScriptedSource::new(vec![Ok(scenario_snapshot())]);
        let (loader, mut reports) = WeatherLoader::new(source, store);

        assert_eq!(loader.load().await, Some(scenario_snapshot()));
        assert!(matches!(
            reports.recv().await,
            Some(PersistReport::Failed(StoreError::Task(_)))
        ));
    }

    #[tokio::test]
    async fn test_cache_read_failure_yields_nothing() {
        let store = SharedStore::new(BrokenStore);
        let (loader, _reports) = WeatherLoader::new(ScriptedSource::new(vec![offline()]), store);

        assert_eq!(loader.load().await, None);
    }

    #[tokio::test]
    async fn test_each_load_issues_one_request() {
        let store = SharedStore::new(MemorySnapshotStore::new());
        let source = ScriptedSource::new(vec![offline(), offline()]);
        let calls = source.calls.clone();
        let (loader, _reports) = WeatherLoader::new(source, store);

        loader.load().await;
        loader.load().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reports_close_after_loader_dropped() {
        let store = SharedStore::new(MemorySnapshotStore::new());
        let source = ScriptedSource::new(vec![Ok(scenario_snapshot())]);
        let (loader, mut reports) = WeatherLoader::new(source, store);

        loader.load().await;
        drop(loader);

        assert!(matches!(reports.recv().await, Some(PersistReport::Stored(_))));
        assert!(reports.recv().await.is_none());
    }
}
