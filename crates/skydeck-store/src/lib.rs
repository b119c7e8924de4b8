//! City tracking for SkyDeck
//!
//! Owns the tracked city list: persistence to local key-value storage,
//! live weather enrichment, and broadcast of every change to subscribers.

pub mod city;
pub mod refresh;
pub mod storage;
pub mod store;

pub use city::City;
pub use storage::{JsonFileStore, KeyValueStore, StorageError};
pub use store::{CityStore, StoreError, CITIES_KEY};
