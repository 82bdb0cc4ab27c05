use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// One value of a series. `None` where the API reported no reading (`null`).
pub type Reading = Option<f64>;

/// Hourly series, index-aligned to `time`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HourlySeries {
    /// ISO-8601 local timestamps as returned by the API (e.g. `2023-10-01T00:00`)
    pub time: Vec<String>,
    /// Relative humidity at 2 m, percent
    pub relativehumidity_2m: Vec<Reading>,
    /// Direct solar radiation, W/m²
    pub direct_radiation: Vec<Reading>,
}

impl HourlySeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// Daily series, index-aligned to `time`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DailySeries {
    /// ISO-8601 dates (e.g. `2023-10-01`)
    pub time: Vec<String>,
    /// Maximum temperature at 2 m, °C
    pub temperature_2m_max: Vec<Reading>,
    /// Minimum temperature at 2 m, °C
    pub temperature_2m_min: Vec<Reading>,
}

impl DailySeries {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }
}

/// One forecast snapshot, shaped like the Open-Meteo response.
///
/// Fields the API sends beyond these (elevation, units, ...) are ignored on
/// deserialization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeatherData {
    pub latitude: f64,
    pub longitude: f64,
    pub hourly: HourlySeries,
    pub daily: DailySeries,
}

impl WeatherData {
    /// Check that the parallel series inside `hourly` and `daily` have equal lengths.
    ///
    /// # Errors
    /// Returns `FetchError::Inconsistent` naming the first mismatched series.
    pub fn validate(&self) -> Result<(), FetchError> {
        let hourly = &self.hourly;
        check_aligned(
            "hourly",
            hourly.time.len(),
            &[
                ("relativehumidity_2m", hourly.relativehumidity_2m.len()),
                ("direct_radiation", hourly.direct_radiation.len()),
            ],
        )?;

        let daily = &self.daily;
        check_aligned(
            "daily",
            daily.time.len(),
            &[
                ("temperature_2m_max", daily.temperature_2m_max.len()),
                ("temperature_2m_min", daily.temperature_2m_min.len()),
            ],
        )
    }
}

fn check_aligned(group: &str, expected: usize, series: &[(&str, usize)]) -> Result<(), FetchError> {
    for (name, len) in series {
        if *len != expected {
            return Err(FetchError::Inconsistent(format!(
                "{group}.{name} has {len} values but {group}.time has {expected}"
            )));
        }
    }
    Ok(())
}

/// Opaque identifier of a stored snapshot. Strictly increasing in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}
