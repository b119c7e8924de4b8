//! OpenWeatherMap current-conditions client.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{CurrentConditions, Units};

pub const OPENWEATHER_API_BASE: &str = "https://api.openweathermap.org/data/2.5";
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Weather provider errors.
#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("city not found: {0}")]
    CityNotFound(String),

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("weather API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("malformed weather response: {0}")]
    Parse(String),
}

/// Source of per-city current conditions.
///
/// Implementations don't retry; callers decide what a failed fetch means.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch current conditions for a city, keyed by its name.
    async fn current(&self, city: &str) -> Result<CurrentConditions, WeatherError>;
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: reqwest::Client,
    api_key: String,
    units: Units,
    base_url: String,
}

impl OpenWeatherClient {
    /// Create a client against the public OpenWeatherMap API.
    pub fn new(api_key: impl Into<String>, units: Units) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            units,
            base_url: OPENWEATHER_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API base (tests, proxies).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
        city: &str,
    ) -> Result<CurrentConditions, WeatherError> {
        let status = response.status();

        if status.is_success() {
            let conditions: CurrentConditions = response
                .json()
                .await
                .map_err(|e| WeatherError::Parse(e.to_string()))?;

            // The store relies on weather[0]; an empty list breaks the contract
            if conditions.weather.is_empty() {
                return Err(WeatherError::Parse(format!(
                    "no condition records for {}",
                    city
                )));
            }

            Ok(conditions)
        } else if status.as_u16() == 404 {
            Err(WeatherError::CityNotFound(city.to_string()))
        } else if status.as_u16() == 401 {
            Err(WeatherError::InvalidApiKey)
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(WeatherError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn current(&self, city: &str) -> Result<CurrentConditions, WeatherError> {
        let url = format!(
            "{}/weather?q={}&units={}&appid={}",
            self.base_url,
            urlencoding::encode(city),
            self.units.as_query(),
            self.api_key,
        );

        tracing::debug!(city, "fetching current conditions");
        let response = self.client.get(&url).send().await?;
        self.handle_response(response, city).await
    }
}
