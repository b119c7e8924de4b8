use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use skydeck_core::{Config, TemperatureUnit};
use skydeck_store::{refresh, City, CityStore, JsonFileStore};
use skydeck_weather::{OpenWeatherClient, Units};

fn render(cities: &[City], units: TemperatureUnit) {
    println!("\nSkyDeck - tracked cities");
    if cities.is_empty() {
        println!("  (no cities tracked)");
        return;
    }
    for city in cities {
        let temp = city
            .main
            .as_ref()
            .map_or_else(|| "--".to_string(), |m| units.format(m.temp));
        let description = city
            .weather
            .as_ref()
            .map_or("unknown", |w| w.description.as_str());
        println!("  {:<16} {:>6}  {}", city.name, temp, description);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    skydeck_core::init()?;

    let (config, _) = Config::load_validated()?;

    let api_key = config
        .weather
        .api_key
        .clone()
        .context("no OpenWeatherMap API key configured; set weather.api_key or OPENWEATHER_API_KEY")?;
    let units = match config.weather.units {
        TemperatureUnit::Celsius => Units::Metric,
        TemperatureUnit::Fahrenheit => Units::Imperial,
    };

    let client = OpenWeatherClient::new(api_key, units)?.with_base_url(&config.weather.api_base);
    let storage = Arc::new(JsonFileStore::new(&config.storage.data_file));
    let store = Arc::new(CityStore::new(storage, Arc::new(client)));

    store.initialize().await?;
    let refresher = refresh::spawn(
        Arc::clone(&store),
        Duration::from_secs(config.weather.refresh_seconds),
    );

    tracing::info!(
        period = config.weather.refresh_seconds,
        data_file = %config.storage.data_file.display(),
        "SkyDeck started"
    );

    let mut updates = store.subscribe();
    render(&updates.borrow_and_update(), config.weather.units);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&updates.borrow_and_update(), config.weather.units);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    refresher.abort();
    Ok(())
}
