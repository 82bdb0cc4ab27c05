use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Environment variable prefix for overrides, e.g. `METEODASH__WEATHER__LATITUDE`.
pub const ENV_PREFIX: &str = "METEODASH";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Forecast query settings
    pub weather: WeatherConfig,

    /// Local snapshot store settings
    pub storage: StorageConfig,
}

/// The forecast query issued on every dashboard load.
///
/// These values are fixed for the lifetime of the process; the loader never
/// varies them at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Base URL of the Open-Meteo API (without the `/v1/forecast` path)
    pub api_base_url: String,

    pub latitude: f64,
    pub longitude: f64,

    /// IANA timezone name the API should use for timestamps
    pub timezone: String,

    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.open-meteo.com".to_string(),
            latitude: 1.29,
            longitude: 103.85,
            timezone: "Asia/Singapore".to_string(),
            start_date: NaiveDate::from_ymd_opt(2023, 10, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2023, 10, 10).unwrap_or_default(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file holding the snapshot log
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let database_path = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("meteodash")
            .join("weather.db");
        Self { database_path }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("meteodash");

        Self {
            config_dir,
            weather: WeatherConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, layered with `METEODASH__*` environment overrides.
    ///
    /// A missing file is not an error; defaults fill every unset field.
    pub fn load_from(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        settings
            .try_deserialize()
            .context("Failed to parse config file")
    }

    /// Load configuration and validate it
    ///
    /// Warnings are logged.
    ///
    /// # Errors
    /// `ConfigError::ParseError` if the file or environment overrides cannot be
    /// read, `ConfigError::Invalid` if validation fails.
    pub fn load_validated() -> Result<(Self, ValidationResult), ConfigError> {
        let config = Self::load().map_err(|e| ConfigError::ParseError(format!("{e:#}")))?;
        config.into_validated()
    }

    fn into_validated(self) -> Result<(Self, ValidationResult), ConfigError> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();
        let weather = &self.weather;

        self.validate_url(&weather.api_base_url, "weather.api_base_url", &mut result);

        if !(-90.0..=90.0).contains(&weather.latitude) {
            result.add_error(
                "weather.latitude",
                format!("Latitude must be within -90..=90, got {}", weather.latitude),
            );
        }

        if !(-180.0..=180.0).contains(&weather.longitude) {
            result.add_error(
                "weather.longitude",
                format!("Longitude must be within -180..=180, got {}", weather.longitude),
            );
        }

        if weather.timezone.trim().is_empty() {
            result.add_warning("weather.timezone", "Timezone is empty; the API will use GMT");
        }

        if weather.start_date > weather.end_date {
            result.add_error(
                "weather.start_date",
                format!(
                    "Start date {} is after end date {}",
                    weather.start_date, weather.end_date
                ),
            );
        }

        if weather.request_timeout_secs == 0 {
            result.add_error(
                "weather.request_timeout_secs",
                "Request timeout must be greater than 0",
            );
        } else if weather.request_timeout_secs > 300 {
            result.add_warning(
                "weather.request_timeout_secs",
                "Request timeout is unusually long (>300s)",
            );
        }

        if self.storage.database_path.as_os_str().is_empty() {
            result.add_error("storage.database_path", "Database path must not be empty");
        } else if self.storage.database_path.is_dir() {
            result.add_error(
                "storage.database_path",
                format!(
                    "Database path is a directory: {}",
                    self.storage.database_path.display()
                ),
            );
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to `path`, creating parent directories as needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("meteodash");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_default_query_matches_dashboard_location() {
        let weather = WeatherConfig::default();
        assert_eq!(weather.latitude, 1.29);
        assert_eq!(weather.longitude, 103.85);
        assert_eq!(weather.timezone, "Asia/Singapore");
        assert_eq!(weather.start_date.to_string(), "2023-10-01");
        assert_eq!(weather.end_date.to_string(), "2023-10-10");
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.weather.api_base_url = "ftp://api.open-meteo.com".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.weather.api_base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.api_base_url"));
    }

    #[test]
    fn test_out_of_range_coordinates() {
        let mut config = Config::default();
        config.weather.latitude = 91.0;
        config.weather.longitude = -181.0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "weather.latitude"));
        assert!(result.errors.iter().any(|e| e.field == "weather.longitude"));
    }

    #[test]
    fn test_reversed_date_range() {
        let mut config = Config::default();
        config.weather.start_date = NaiveDate::from_ymd_opt(2023, 10, 11).unwrap();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.start_date"));
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = Config::default();
        config.weather.request_timeout_secs = 0;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_empty_timezone_is_warning() {
        let mut config = Config::default();
        config.weather.timezone = String::new();
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.timezone"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.weather.latitude = 48.85;
        config.weather.longitude = 2.35;
        config.weather.timezone = "Europe/Paris".to_string();
        config.storage.database_path = dir.path().join("weather.db");
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.latitude, 48.85);
        assert_eq!(loaded.weather.longitude, 2.35);
        assert_eq!(loaded.weather.timezone, "Europe/Paris");
        assert_eq!(loaded.storage.database_path, dir.path().join("weather.db"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather]\ntimezone = \"UTC\"\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.weather.timezone, "UTC");
        assert_eq!(loaded.weather.request_timeout_secs, 10);
        assert_eq!(loaded.weather.api_base_url, "https://api.open-meteo.com");
    }

    #[test]
    fn test_invalid_config_is_rejected_with_config_error() {
        let mut config = Config::default();
        config.weather.latitude = 91.0;
        config.weather.request_timeout_secs = 0;

        let err = config.into_validated().unwrap_err();
        match &err {
            ConfigError::Invalid(summary) => {
                assert!(summary.contains("weather.latitude"));
                assert!(summary.contains("weather.request_timeout_secs"));
            }
            other => panic!("expected invalid config, got {other:?}"),
        }
        assert_eq!(
            crate::AppError::from(err).user_message(),
            "Invalid configuration. Check your settings."
        );
    }

    #[test]
    fn test_warnings_do_not_block_loading() {
        let mut config = Config::default();
        config.weather.timezone = String::new();

        let (_, validation) = config.into_validated().unwrap();
        assert!(validation.is_valid());
        assert_eq!(validation.warnings.len(), 1);
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
