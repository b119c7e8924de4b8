//! The city store: tracked list, storage mirroring, broadcast streams.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use skydeck_weather::WeatherSource;

use crate::city::City;
use crate::storage::{KeyValueStore, StorageError};

/// Storage key for the serialized city list.
pub const CITIES_KEY: &str = "cities";

/// Cities tracked when no persisted list exists yet.
const DEFAULT_CITIES: [&str; 3] = ["Boston", "New York", "Portland"];

/// Store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("weather fetch failed: {0}")]
    Weather(#[from] skydeck_weather::WeatherError),

    #[error("refresh task failed: {0}")]
    Join(String),

    #[error("city list serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Owns the tracked city list, mirrors it to persistent storage, enriches it
/// with live weather data, and broadcasts every change.
///
/// The list is guarded by a mutex so mutations from different tasks stay
/// serialized. Both broadcast channels hold the latest value: new subscribers
/// see it immediately, then receive every subsequent update.
pub struct CityStore {
    storage: Arc<dyn KeyValueStore>,
    source: Arc<dyn WeatherSource>,
    cities: Mutex<Vec<City>>,
    cities_tx: watch::Sender<Vec<City>>,
    selection_tx: watch::Sender<Option<City>>,
}

impl CityStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, source: Arc<dyn WeatherSource>) -> Self {
        let (cities_tx, _) = watch::channel(Vec::new());
        let (selection_tx, _) = watch::channel(None);

        Self {
            storage,
            source,
            cities: Mutex::new(Vec::new()),
            cities_tx,
            selection_tx,
        }
    }

    /// Load the persisted list (or adopt the defaults), publish it, then run
    /// one immediate refresh cycle.
    ///
    /// A failed first cycle leaves the freshly loaded list in place and is
    /// only logged; weather data stays empty until the next cycle succeeds.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        let cities: Vec<City> = match self.storage.get(CITIES_KEY)? {
            Some(value) => serde_json::from_value(value)?,
            None => {
                let defaults: Vec<City> =
                    DEFAULT_CITIES.iter().copied().map(City::named).collect();
                self.persist(&defaults)?;
                defaults
            }
        };

        tracing::info!(count = cities.len(), "city list loaded");
        *self.cities.lock() = cities.clone();
        self.cities_tx.send_replace(cities);

        if let Err(e) = self.refresh_weather().await {
            tracing::warn!("initial weather refresh failed: {e}");
        }
        Ok(())
    }

    /// Current snapshot of the tracked list.
    pub fn snapshot(&self) -> Vec<City> {
        self.cities.lock().clone()
    }

    /// Subscribe to the city list. The receiver starts at the latest value.
    pub fn subscribe(&self) -> watch::Receiver<Vec<City>> {
        self.cities_tx.subscribe()
    }

    /// Subscribe to the most recently selected city (`None` until one is
    /// selected or added).
    pub fn selection(&self) -> watch::Receiver<Option<City>> {
        self.selection_tx.subscribe()
    }

    /// Track a new city at the head of the list and select it.
    ///
    /// Returns `false` without any change when a city with the same name is
    /// already tracked.
    pub fn add(&self, city: City) -> Result<bool, StoreError> {
        let updated = {
            let mut cities = self.cities.lock();
            if cities.iter().any(|c| c.name == city.name) {
                return Ok(false);
            }
            cities.insert(0, city.clone());
            cities.clone()
        };

        self.selection_tx.send_replace(Some(city));
        self.cities_tx.send_replace(updated.clone());
        self.persist(&updated)?;
        Ok(true)
    }

    /// Stop tracking every city with the given name.
    ///
    /// Silent no-op when the name is not tracked; subscribers and storage
    /// still see the (unchanged) list.
    pub fn remove(&self, name: &str) -> Result<(), StoreError> {
        let updated = {
            let mut cities = self.cities.lock();
            cities.retain(|c| c.name != name);
            cities.clone()
        };

        self.cities_tx.send_replace(updated.clone());
        self.persist(&updated)?;
        Ok(())
    }

    /// Publish a selection without touching the tracked list.
    pub fn set_selection(&self, city: City) {
        self.selection_tx.send_replace(Some(city));
    }

    /// Re-fetch weather for every tracked city and replace the list on full
    /// success.
    ///
    /// One fetch per city runs concurrently; results are joined in the
    /// original list order. Any single failure discards the whole cycle:
    /// the list, storage, and subscribers keep the previous state.
    pub async fn refresh_weather(&self) -> Result<(), StoreError> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Ok(());
        }

        let mut requests = Vec::with_capacity(snapshot.len());
        for city in &snapshot {
            let source = Arc::clone(&self.source);
            let name = city.name.clone();
            requests.push(tokio::spawn(async move { source.current(&name).await }));
        }

        // Join in issue order; in-flight fetches are not cancelled on failure
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(request.await.map_err(|e| StoreError::Join(e.to_string()))?);
        }

        let mut refreshed = Vec::with_capacity(results.len());
        for conditions in results {
            refreshed.push(City::from(conditions?));
        }

        tracing::debug!(count = refreshed.len(), "weather refresh complete");
        *self.cities.lock() = refreshed.clone();
        self.persist(&refreshed)?;
        self.cities_tx.send_replace(refreshed);
        Ok(())
    }

    fn persist(&self, cities: &[City]) -> Result<(), StoreError> {
        self.storage.set(CITIES_KEY, serde_json::to_value(cities)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use skydeck_weather::{CurrentConditions, WeatherError};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<HashMap<String, Value>>,
    }

    impl KeyValueStore for MemoryStore {
        fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
            Ok(self.values.lock().get(key).cloned())
        }

        fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
            self.values.lock().insert(key.to_string(), value);
            Ok(())
        }
    }

    /// Canned weather: succeeds with a per-name temperature unless the name
    /// is listed in `fail_for`.
    #[derive(Default)]
    struct CannedWeather {
        fail_for: Vec<String>,
    }

    impl CannedWeather {
        fn failing_for(names: &[&str]) -> Self {
            Self {
                fail_for: names.iter().map(|n| n.to_string()).collect(),
            }
        }
    }

    fn canned_conditions(name: &str, temp: f64) -> CurrentConditions {
        serde_json::from_value(json!({
            "name": name,
            "main": {
                "temp": temp, "feels_like": temp - 1.0, "temp_min": temp - 2.0,
                "temp_max": temp + 2.0, "pressure": 1010, "humidity": 55
            },
            "weather": [
                {"id": 800, "main": "Clear", "description": "clear sky", "icon": "01d"}
            ],
            "dt": 1_700_000_000
        }))
        .unwrap()
    }

    fn temp_for(name: &str) -> f64 {
        10.0 + name.len() as f64
    }

    #[async_trait]
    impl WeatherSource for CannedWeather {
        async fn current(&self, city: &str) -> Result<CurrentConditions, WeatherError> {
            if self.fail_for.iter().any(|n| n == city) {
                return Err(WeatherError::CityNotFound(city.to_string()));
            }
            Ok(canned_conditions(city, temp_for(city)))
        }
    }

    fn test_store(source: CannedWeather) -> (Arc<MemoryStore>, CityStore) {
        let storage = Arc::new(MemoryStore::default());
        let store = CityStore::new(storage.clone(), Arc::new(source));
        (storage, store)
    }

    fn persisted(storage: &MemoryStore) -> Vec<City> {
        serde_json::from_value(storage.get(CITIES_KEY).unwrap().unwrap()).unwrap()
    }

    fn names(cities: &[City]) -> Vec<&str> {
        cities.iter().map(|c| c.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_add_prepends() {
        let (storage, store) = test_store(CannedWeather::default());

        assert!(store.add(City::named("Austin")).unwrap());
        assert!(store.add(City::named("Berlin")).unwrap());
        assert!(store.add(City::named("Cairo")).unwrap());

        let cities = store.snapshot();
        assert_eq!(names(&cities), ["Cairo", "Berlin", "Austin"]);
        assert_eq!(persisted(&storage), cities);
    }

    #[tokio::test]
    async fn test_add_rejects_duplicate_name() {
        let (storage, store) = test_store(CannedWeather::default());

        assert!(store.add(City::named("Oslo")).unwrap());
        let before = persisted(&storage);

        // A duplicate with different weather data is still a duplicate
        let mut dup = City::named("Oslo");
        dup.main = canned_conditions("Oslo", 3.0).main.into();
        assert!(!store.add(dup).unwrap());

        assert_eq!(names(&store.snapshot()), ["Oslo"]);
        assert_eq!(persisted(&storage), before);
    }

    #[tokio::test]
    async fn test_duplicate_check_is_case_sensitive() {
        let (_, store) = test_store(CannedWeather::default());

        assert!(store.add(City::named("Oslo")).unwrap());
        assert!(store.add(City::named("oslo")).unwrap());
        assert_eq!(names(&store.snapshot()), ["oslo", "Oslo"]);
    }

    #[tokio::test]
    async fn test_remove_present() {
        let (storage, store) = test_store(CannedWeather::default());

        store.add(City::named("Austin")).unwrap();
        store.add(City::named("Berlin")).unwrap();
        store.remove("Austin").unwrap();

        let cities = store.snapshot();
        assert_eq!(names(&cities), ["Berlin"]);
        assert_eq!(persisted(&storage), cities);
    }

    #[tokio::test]
    async fn test_remove_absent_is_noop() {
        let (storage, store) = test_store(CannedWeather::default());

        store.add(City::named("Austin")).unwrap();
        store.remove("Nowhere").unwrap();

        assert_eq!(names(&store.snapshot()), ["Austin"]);
        assert_eq!(persisted(&storage), store.snapshot());
    }

    #[tokio::test]
    async fn test_initialize_defaults_when_storage_empty() {
        // A failing source keeps the defaults weather-free, so this observes
        // the persisted value from before any refresh completed
        let (storage, store) = test_store(CannedWeather::failing_for(&[
            "Boston", "New York", "Portland",
        ]));

        store.initialize().await.unwrap();

        let cities = store.snapshot();
        assert_eq!(names(&cities), ["Boston", "New York", "Portland"]);
        assert!(cities.iter().all(|c| c.main.is_none() && c.weather.is_none()));
        assert_eq!(persisted(&storage), cities);
    }

    #[tokio::test]
    async fn test_initialize_adopts_persisted_list() {
        let (storage, store) = test_store(CannedWeather::failing_for(&["Lagos", "Quito"]));
        storage
            .set(CITIES_KEY, json!([{"name": "Lagos"}, {"name": "Quito"}]))
            .unwrap();

        store.initialize().await.unwrap();
        assert_eq!(names(&store.snapshot()), ["Lagos", "Quito"]);
    }

    #[tokio::test]
    async fn test_initialize_adopts_persisted_empty_list() {
        let (storage, store) = test_store(CannedWeather::default());
        storage.set(CITIES_KEY, json!([])).unwrap();

        store.initialize().await.unwrap();
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_runs_first_refresh() {
        let (storage, store) = test_store(CannedWeather::default());

        store.initialize().await.unwrap();

        let cities = store.snapshot();
        assert_eq!(names(&cities), ["Boston", "New York", "Portland"]);
        assert!(cities.iter().all(|c| c.main.is_some() && c.weather.is_some()));
        assert_eq!(persisted(&storage), cities);
    }

    #[tokio::test]
    async fn test_refresh_replaces_in_order() {
        let (storage, store) = test_store(CannedWeather::default());

        store.add(City::named("Austin")).unwrap();
        store.add(City::named("Berlin")).unwrap();
        store.add(City::named("Cairo")).unwrap();

        store.refresh_weather().await.unwrap();

        let cities = store.snapshot();
        assert_eq!(names(&cities), ["Cairo", "Berlin", "Austin"]);
        for city in &cities {
            assert_eq!(city.main.as_ref().unwrap().temp, temp_for(&city.name));
            assert_eq!(city.weather.as_ref().unwrap().icon, "01d");
        }
        assert_eq!(persisted(&storage), cities);
    }

    #[tokio::test]
    async fn test_refresh_failure_discards_whole_cycle() {
        let (storage, store) = test_store(CannedWeather::failing_for(&["Berlin"]));

        store.add(City::named("Austin")).unwrap();
        store.add(City::named("Berlin")).unwrap();
        let before = store.snapshot();
        let persisted_before = persisted(&storage);

        let result = store.refresh_weather().await;

        assert!(matches!(result, Err(StoreError::Weather(_))));
        assert_eq!(store.snapshot(), before);
        assert_eq!(persisted(&storage), persisted_before);
        assert!(store.snapshot().iter().all(|c| c.main.is_none()));
    }

    #[tokio::test]
    async fn test_refresh_with_no_cities_publishes_nothing() {
        let (storage, store) = test_store(CannedWeather::default());
        let updates = store.subscribe();

        store.refresh_weather().await.unwrap();

        assert!(!updates.has_changed().unwrap());
        assert!(storage.get(CITIES_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_subscribe_replays_latest_list() {
        let (_, store) = test_store(CannedWeather::default());

        store.add(City::named("Austin")).unwrap();
        store.add(City::named("Berlin")).unwrap();

        // Attached after the fact, yet sees the current value immediately
        let updates = store.subscribe();
        assert_eq!(names(&updates.borrow()), ["Berlin", "Austin"]);
    }

    #[tokio::test]
    async fn test_subscriber_sees_updates() {
        let (_, store) = test_store(CannedWeather::default());
        let mut updates = store.subscribe();

        store.add(City::named("Austin")).unwrap();

        assert!(updates.has_changed().unwrap());
        assert_eq!(names(&updates.borrow_and_update()), ["Austin"]);
    }

    #[tokio::test]
    async fn test_selection_starts_empty_and_replays() {
        let (_, store) = test_store(CannedWeather::default());
        assert!(store.selection().borrow().is_none());

        store.set_selection(City::named("Austin"));

        let selection = store.selection();
        assert_eq!(selection.borrow().as_ref().unwrap().name, "Austin");
    }

    #[tokio::test]
    async fn test_add_selects_the_new_city() {
        let (_, store) = test_store(CannedWeather::default());
        let mut selection = store.selection();

        store.add(City::named("Berlin")).unwrap();

        assert!(selection.has_changed().unwrap());
        assert_eq!(
            selection.borrow_and_update().as_ref().unwrap().name,
            "Berlin"
        );
    }

    #[tokio::test]
    async fn test_duplicate_add_does_not_change_selection() {
        let (_, store) = test_store(CannedWeather::default());

        store.add(City::named("Berlin")).unwrap();
        let mut selection = store.selection();
        selection.borrow_and_update();

        store.add(City::named("Berlin")).unwrap();
        assert!(!selection.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_corrupt_persisted_list_fails_initialize() {
        let (storage, store) = test_store(CannedWeather::default());
        storage.set(CITIES_KEY, json!("not a list")).unwrap();

        let result = store.initialize().await;
        assert!(matches!(result, Err(StoreError::Serialize(_))));
    }
}
