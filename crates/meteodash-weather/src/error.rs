//! Weather-specific error types.

use meteodash_core::{
    AppError, DatabaseError, NetworkError, ReqwestErrorExt, RusqliteErrorExt, WeatherError,
};
use thiserror::Error;

/// The remote forecast request failed or returned unusable data.
///
/// Recovered by the loader through the cache fallback; never surfaced to
/// the presentation layer.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Forecast API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed forecast payload: {0}")]
    Parse(String),

    #[error("Inconsistent forecast payload: {0}")]
    Inconsistent(String),
}

/// Reading or writing the local snapshot log failed.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Snapshot encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Invalid stored timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Store schema version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: i64, supported: i64 },

    #[error("Store task failed: {0}")]
    Task(String),

    #[error("Store is closed")]
    Closed,
}

/// Result type for snapshot store operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<tokio::task::JoinError> for StoreError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

impl From<FetchError> for AppError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Network(err) => AppError::Network(err.into_network_error()),
            FetchError::Status { status, body } => AppError::Network(NetworkError::ServerError {
                status,
                message: body,
            }),
            FetchError::Parse(msg) | FetchError::Inconsistent(msg) => {
                AppError::Network(NetworkError::InvalidResponse(msg))
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Database(err) => AppError::Database(err.into_database_error()),
            StoreError::Encoding(err) => {
                AppError::Database(DatabaseError::Corruption(err.to_string()))
            }
            StoreError::Timestamp(err) => {
                AppError::Database(DatabaseError::Corruption(err.to_string()))
            }
            StoreError::UnsupportedVersion { found, .. } => {
                AppError::Database(DatabaseError::UnsupportedVersion(found.to_string()))
            }
            StoreError::Task(msg) => AppError::Weather(WeatherError::CacheError(msg)),
            StoreError::Closed => {
                AppError::Weather(WeatherError::CacheError("store is closed".to_string()))
            }
        }
    }
}
