//! Local snapshot log used as the offline fallback.
//!
//! Every successful fetch is appended as a new record; only the record with
//! the highest id is ever read back. Records are never updated or deleted.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{StoreError, StoreResult};
use crate::types::{DailySeries, HourlySeries, RecordId, WeatherData};

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// A snapshot together with its log metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub id: RecordId,
    pub stored_at: DateTime<Utc>,
    pub data: WeatherData,
}

/// Append-only snapshot storage.
///
/// Implementations don't need to be Sync; `SharedStore` serializes access.
pub trait SnapshotStore: Send {
    /// Append `snapshot` as a new record with a fresh, increasing id.
    ///
    /// # Errors
    /// Returns the underlying storage error; nothing is swallowed.
    fn append(&self, snapshot: &WeatherData) -> StoreResult<RecordId>;

    /// The record with the highest id, or `None` if nothing was ever appended.
    ///
    /// # Errors
    /// Returns an error only if the store could not be read.
    fn latest_record(&self) -> StoreResult<Option<StoredSnapshot>>;

    /// Number of records in the log.
    ///
    /// # Errors
    /// Returns an error if the store could not be read.
    fn count(&self) -> StoreResult<usize>;

    /// Release underlying resources. Durable stores reject later calls with
    /// `StoreError::Closed`.
    ///
    /// # Errors
    /// Returns the error reported while releasing resources.
    fn close(&mut self) -> StoreResult<()> {
        Ok(())
    }

    /// The most recently appended snapshot.
    ///
    /// # Errors
    /// Returns an error only if the store could not be read.
    fn latest(&self) -> StoreResult<Option<WeatherData>> {
        Ok(self.latest_record()?.map(|record| record.data))
    }
}

/// SQLite-backed snapshot log.
pub struct SqliteSnapshotStore {
    conn: Option<Connection>,
}

impl SqliteSnapshotStore {
    /// Open (or create) the store at the given path.
    ///
    /// # Errors
    /// Fails if the database cannot be opened or was written by a newer schema.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Some(conn) };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store. Contents are lost when it is dropped.
    ///
    /// # Errors
    /// Fails if SQLite cannot allocate the database.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Some(conn) };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> StoreResult<&Connection> {
        self.conn.as_ref().ok_or(StoreError::Closed)
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;
        let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if found > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedVersion {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS weather (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                hourly_time TEXT NOT NULL,
                hourly_relativehumidity_2m TEXT NOT NULL,
                hourly_direct_radiation TEXT NOT NULL,
                daily_time TEXT NOT NULL,
                daily_temperature_2m_max TEXT NOT NULL,
                daily_temperature_2m_min TEXT NOT NULL,
                stored_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_weather_location ON weather(latitude, longitude);
            "#,
        )?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }
}

/// Raw column values of one `weather` row, before JSON decoding.
struct WeatherRow {
    id: i64,
    latitude: f64,
    longitude: f64,
    hourly_time: String,
    hourly_relativehumidity_2m: String,
    hourly_direct_radiation: String,
    daily_time: String,
    daily_temperature_2m_max: String,
    daily_temperature_2m_min: String,
    stored_at: String,
}

impl WeatherRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            latitude: row.get(1)?,
            longitude: row.get(2)?,
            hourly_time: row.get(3)?,
            hourly_relativehumidity_2m: row.get(4)?,
            hourly_direct_radiation: row.get(5)?,
            daily_time: row.get(6)?,
            daily_temperature_2m_max: row.get(7)?,
            daily_temperature_2m_min: row.get(8)?,
            stored_at: row.get(9)?,
        })
    }

    fn decode(self) -> StoreResult<StoredSnapshot> {
        let stored_at = DateTime::parse_from_rfc3339(&self.stored_at)?.with_timezone(&Utc);

        Ok(StoredSnapshot {
            id: RecordId(self.id),
            stored_at,
            data: WeatherData {
                latitude: self.latitude,
                longitude: self.longitude,
                hourly: HourlySeries {
                    time: serde_json::from_str(&self.hourly_time)?,
                    relativehumidity_2m: serde_json::from_str(&self.hourly_relativehumidity_2m)?,
                    direct_radiation: serde_json::from_str(&self.hourly_direct_radiation)?,
                },
                daily: DailySeries {
                    time: serde_json::from_str(&self.daily_time)?,
                    temperature_2m_max: serde_json::from_str(&self.daily_temperature_2m_max)?,
                    temperature_2m_min: serde_json::from_str(&self.daily_temperature_2m_min)?,
                },
            },
        })
    }
}

impl SnapshotStore for SqliteSnapshotStore {
    fn append(&self, snapshot: &WeatherData) -> StoreResult<RecordId> {
        let hourly = &snapshot.hourly;
        let daily = &snapshot.daily;
        let conn = self.conn()?;

        conn.execute(
            r#"
            INSERT INTO weather
            (latitude, longitude, hourly_time, hourly_relativehumidity_2m, hourly_direct_radiation,
             daily_time, daily_temperature_2m_max, daily_temperature_2m_min, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                snapshot.latitude,
                snapshot.longitude,
                serde_json::to_string(&hourly.time)?,
                serde_json::to_string(&hourly.relativehumidity_2m)?,
                serde_json::to_string(&hourly.direct_radiation)?,
                serde_json::to_string(&daily.time)?,
                serde_json::to_string(&daily.temperature_2m_max)?,
                serde_json::to_string(&daily.temperature_2m_min)?,
                Utc::now().to_rfc3339(),
            ],
        )?;

        let id = RecordId(conn.last_insert_rowid());
        tracing::debug!("Appended weather snapshot {}", id);
        Ok(id)
    }

    fn latest_record(&self) -> StoreResult<Option<StoredSnapshot>> {
        let row = self
            .conn()?
            .query_row(
                "SELECT id, latitude, longitude, hourly_time, hourly_relativehumidity_2m,
                        hourly_direct_radiation, daily_time, daily_temperature_2m_max,
                        daily_temperature_2m_min, stored_at
                 FROM weather
                 ORDER BY id DESC
                 LIMIT 1",
                [],
                WeatherRow::from_row,
            )
            .optional()?;

        row.map(WeatherRow::decode).transpose()
    }

    fn count(&self) -> StoreResult<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM weather", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn close(&mut self) -> StoreResult<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, e)| StoreError::Database(e)),
            None => Ok(()),
        }
    }
}

/// Non-durable snapshot log kept in process memory.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    records: Mutex<Vec<StoredSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn append(&self, snapshot: &WeatherData) -> StoreResult<RecordId> {
        let mut records = self.records.lock();
        let id = RecordId(records.last().map_or(1, |r| r.id.0 + 1));
        records.push(StoredSnapshot {
            id,
            stored_at: Utc::now(),
            data: snapshot.clone(),
        });
        Ok(id)
    }

    fn latest_record(&self) -> StoreResult<Option<StoredSnapshot>> {
        Ok(self.records.lock().last().cloned())
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.records.lock().len())
    }
}

/// Cloneable async handle over any `SnapshotStore`.
///
/// Store calls run on the blocking pool so SQLite I/O never stalls the runtime.
#[derive(Clone)]
pub struct SharedStore {
    inner: Arc<Mutex<dyn SnapshotStore>>,
}

impl SharedStore {
    pub fn new<S: SnapshotStore + 'static>(store: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// # Errors
    /// Propagates the store error, or `StoreError::Task` if the blocking task panicked.
    pub async fn append(&self, snapshot: WeatherData) -> StoreResult<RecordId> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.lock().append(&snapshot)).await?
    }

    /// # Errors
    /// Propagates the store error, or `StoreError::Task` if the blocking task panicked.
    pub async fn latest(&self) -> StoreResult<Option<WeatherData>> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.lock().latest()).await?
    }

    /// # Errors
    /// Propagates the store error, or `StoreError::Task` if the blocking task panicked.
    pub async fn latest_record(&self) -> StoreResult<Option<StoredSnapshot>> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.lock().latest_record()).await?
    }

    /// # Errors
    /// Propagates the store error, or `StoreError::Task` if the blocking task panicked.
    pub async fn count(&self) -> StoreResult<usize> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.lock().count()).await?
    }

    /// Close the underlying store for every handle sharing it.
    ///
    /// # Errors
    /// Propagates the store error, or `StoreError::Task` if the blocking task panicked.
    pub async fn close(&self) -> StoreResult<()> {
        let inner = self.inner.clone();
        tokio::task::spawn_blocking(move || inner.lock().close()).await?
    }
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore").finish_non_exhaustive()
    }
}
