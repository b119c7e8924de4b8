//! Weather retrieval for SkyDeck
//!
//! Current-conditions data via the OpenWeatherMap API, behind the
//! `WeatherSource` trait so stores and tests can swap the transport.

pub mod client;
pub mod types;

pub use client::{OpenWeatherClient, WeatherError, WeatherSource, OPENWEATHER_API_BASE};
pub use types::{Condition, CurrentConditions, MainReadings, Units};
