//! Background TTL sweeper, C7's ticking half.
//!
//! Grounded on `original_source/utils/cleanup.py`'s `CleanupManager` (a
//! 60s-interval loop sweeping every registered store), reimplemented as a
//! struct holding closures over each store's `sweep` per spec.md §4.7.
//! Eviction publishes no event: "clients re-derive truth from the next
//! scan" (spec.md §4.7).

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::time::MissedTickBehavior;

/// WiFi and Bluetooth entries go stale after 5 minutes of silence.
pub const WIFI_BT_TTL: Duration = Duration::from_secs(300);
/// Aircraft without an update in 60s are presumed out of range.
pub const AIRCRAFT_TTL: Duration = Duration::from_secs(60);

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// One sweep closure per live-state store, each already bound to its TTL.
pub struct CleanupManager {
    sweepers: Vec<Box<dyn Fn() -> usize + Send + Sync>>,
}

impl Default for CleanupManager {
    fn default() -> Self {
        Self { sweepers: Vec::new() }
    }
}

impl CleanupManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `store` to be swept on every tick with `ttl`, returning
    /// the number of keys evicted (used only for log output).
    pub fn register<K, V>(&mut self, store: Arc<std::sync::Mutex<intercept_core::store::TtlStore<K, V>>>, ttl: Duration)
    where
        K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
    {
        self.sweepers.push(Box::new(move || store.lock().unwrap().sweep(ttl).len()));
    }

    /// Runs until the subsystem is asked to shut down; intended to be
    /// spawned as a `tokio_graceful_shutdown` subsystem.
    pub async fn run(self, subsystem: tokio_graceful_shutdown::SubsystemHandle) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let total: usize = self.sweepers.iter().map(|sweep| sweep()).sum();
                    if total > 0 {
                        debug!("cleanup sweep evicted {total} stale entries");
                    }
                }
                _ = subsystem.on_shutdown_requested() => break,
            }
        }
        Ok(())
    }
}
