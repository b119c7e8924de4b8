//! The tracked-city model.

use serde::{Deserialize, Serialize};
use skydeck_weather::{Condition, CurrentConditions, MainReadings};

/// One tracked location plus its last-known weather snapshot.
///
/// `name` is the identity: comparisons are exact and case-sensitive.
/// `main` and `weather` stay `None` until the first successful refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main: Option<MainReadings>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Condition>,
}

impl City {
    /// A city tracked by name only, before any weather has been fetched.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            main: None,
            weather: None,
        }
    }
}

impl From<CurrentConditions> for City {
    /// Keeps the numeric readings and the first condition record only.
    fn from(conditions: CurrentConditions) -> Self {
        Self {
            name: conditions.name,
            main: Some(conditions.main),
            weather: conditions.weather.into_iter().next(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_bare_city_serializes_name_only() {
        let city = City::named("Boston");
        let value = serde_json::to_value(&city).unwrap();
        assert_eq!(value, serde_json::json!({"name": "Boston"}));
    }

    #[test]
    fn test_bare_city_roundtrip() {
        let city: City = serde_json::from_value(serde_json::json!({"name": "Oslo"})).unwrap();
        assert_eq!(city, City::named("Oslo"));
    }

    #[test]
    fn test_from_conditions_keeps_first_condition() {
        let conditions: CurrentConditions = serde_json::from_value(serde_json::json!({
            "name": "Boston",
            "main": {
                "temp": 7.2, "feels_like": 5.0, "temp_min": 4.0, "temp_max": 9.0,
                "pressure": 1012, "humidity": 60
            },
            "weather": [
                {"id": 500, "main": "Rain", "description": "light rain", "icon": "10d"},
                {"id": 701, "main": "Mist", "description": "mist", "icon": "50d"}
            ],
            "dt": 1_700_000_000
        }))
        .unwrap();

        let city = City::from(conditions);
        assert_eq!(city.name, "Boston");
        assert_eq!(city.main.unwrap().temp, 7.2);
        assert_eq!(city.weather.unwrap().icon, "10d");
    }
}
