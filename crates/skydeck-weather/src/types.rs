//! Wire types for the current-conditions API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Measurement unit requested from the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Celsius, metres/sec
    #[default]
    Metric,
    /// Fahrenheit, miles/hour
    Imperial,
    /// Kelvin, metres/sec
    Standard,
}

impl Units {
    /// Value of the `units` query parameter
    pub fn as_query(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
            Units::Standard => "standard",
        }
    }
}

/// Numeric readings from the `main` block of a current-conditions response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainReadings {
    pub temp: f64,
    pub feels_like: f64,
    pub temp_min: f64,
    pub temp_max: f64,
    pub pressure: u32,
    pub humidity: u8,
}

/// One descriptive weather condition. The API returns an ordered list of
/// these; consumers usually keep only the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub id: u16,
    pub main: String,
    pub description: String,
    pub icon: String,
}

impl Condition {
    /// URL of the provider-hosted icon image for this condition.
    pub fn icon_url(&self) -> String {
        format!("https://openweathermap.org/img/wn/{}@2x.png", self.icon)
    }
}

/// Current conditions for one city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// City name as resolved by the provider
    pub name: String,
    /// Numeric readings (temperature, pressure, humidity)
    pub main: MainReadings,
    /// Condition records, most significant first
    pub weather: Vec<Condition>,
    /// Provider-side observation time
    #[serde(with = "chrono::serde::ts_seconds")]
    pub dt: DateTime<Utc>,
}
