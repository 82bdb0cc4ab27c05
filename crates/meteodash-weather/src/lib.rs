//! Weather data for Meteodash
//!
//! Fetches forecasts from the Open-Meteo API, keeps an append-only local log
//! of successful responses, and falls back to the newest logged snapshot when
//! the network is unavailable.

pub mod charts;
pub mod error;
pub mod loader;
pub mod provider;
pub mod store;
pub mod types;

pub use charts::{dashboard_charts, ChartKind, ChartSpec, Dataset};
pub use error::{FetchError, StoreError, StoreResult};
pub use loader::{LoadOutcome, PersistReport, PersistReports, WeatherLoader};
pub use provider::{ForecastQuery, ForecastSource, WeatherProvider};
pub use store::{
    MemorySnapshotStore, SharedStore, SnapshotStore, SqliteSnapshotStore, StoredSnapshot,
};
pub use types::*;
