//! Periodic weather refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::store::CityStore;

/// Spawn a background task that refreshes the store's weather once per
/// `period` until the handle is aborted.
///
/// Cycles never overlap: each tick waits for the previous refresh to finish.
/// A failed cycle is logged and the schedule carries on.
pub fn spawn(store: Arc<CityStore>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick fires immediately; the store already ran its
        // initial cycle, so the first scheduled one lands a full period out
        interval.tick().await;

        loop {
            interval.tick().await;
            if let Err(e) = store.refresh_weather().await {
                tracing::warn!("scheduled weather refresh failed: {e}");
            }
        }
    })
}
