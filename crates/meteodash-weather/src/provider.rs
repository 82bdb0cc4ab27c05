//! Open-Meteo forecast client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use meteodash_core::WeatherConfig;
use reqwest::Client;
use tracing::instrument;

use crate::error::FetchError;
use crate::types::WeatherData;

const FORECAST_PATH: &str = "/v1/forecast";
const HOURLY_VARIABLES: &str = "relativehumidity_2m,direct_radiation";
const DAILY_VARIABLES: &str = "temperature_2m_max,temperature_2m_min";
const USER_AGENT: &str = "Meteodash/0.1.0";

/// Remote source of forecast snapshots.
///
/// One call issues one request for a fixed query; implementations do not retry.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn fetch(&self) -> Result<WeatherData, FetchError>;
}

/// Location, timezone and date range of the forecast request.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl ForecastQuery {
    /// Query-string parameters in the order the API documents them.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("hourly", HOURLY_VARIABLES.to_string()),
            ("daily", DAILY_VARIABLES.to_string()),
            ("timezone", self.timezone.clone()),
            ("start_date", self.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", self.end_date.format("%Y-%m-%d").to_string()),
        ]
    }
}

impl From<&WeatherConfig> for ForecastQuery {
    fn from(config: &WeatherConfig) -> Self {
        Self {
            latitude: config.latitude,
            longitude: config.longitude,
            timezone: config.timezone.clone(),
            start_date: config.start_date,
            end_date: config.end_date,
        }
    }
}

/// HTTP forecast source backed by the Open-Meteo API.
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Arc<Client>,
    base_url: String,
    query: ForecastQuery,
}

impl WeatherProvider {
    /// # Errors
    /// Returns `FetchError::Network` if the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        query: ForecastQuery,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.trim_end_matches('/').to_string(),
            query,
        })
    }

    /// Build a provider for the query described by `config`.
    ///
    /// # Errors
    /// Returns `FetchError::Network` if the HTTP client cannot be built.
    pub fn from_config(config: &WeatherConfig) -> Result<Self, FetchError> {
        Self::new(
            &config.api_base_url,
            ForecastQuery::from(config),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn query(&self) -> &ForecastQuery {
        &self.query
    }

    fn forecast_url(&self) -> String {
        format!("{}{}", self.base_url, FORECAST_PATH)
    }
}

#[async_trait]
impl ForecastSource for WeatherProvider {
    #[instrument(skip(self), level = "info")]
    async fn fetch(&self) -> Result<WeatherData, FetchError> {
        let response = self
            .client
            .get(self.forecast_url())
            .query(&self.query.query_pairs())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Forecast request returned status {}", status);
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let data: WeatherData =
            serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))?;
        data.validate()?;

        tracing::info!(
            hourly = data.hourly.len(),
            daily = data.daily.len(),
            "Fetched forecast"
        );
        Ok(data)
    }
}
