//! Maintenance worker for one store: probes backend connectivity, surfaces
//! connect/disconnect edges, and pumps notification delivery while the
//! backend is reachable. The engine itself never retries connections; this
//! worker owns that concern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::info;

use strata_signals::Signal;

use crate::store::EntityStore;
use crate::worker::Worker;

const PROBE_INTERVAL: Duration = Duration::from_secs(5);

pub struct StoreWorkerSignals {
    pub connected: Signal<()>,
    pub disconnected: Signal<()>,
}

pub struct StoreWorker {
    pub signals: StoreWorkerSignals,

    store: Arc<EntityStore>,
    connected: Arc<AtomicBool>,
    probe_interval: Duration,
    last_probe: Option<Instant>,
}

impl StoreWorker {
    pub fn new(store: Arc<EntityStore>) -> Self {
        Self {
            signals: StoreWorkerSignals { connected: Signal::new(), disconnected: Signal::new() },
            store,
            connected: Arc::new(AtomicBool::new(false)),
            probe_interval: PROBE_INTERVAL,
            last_probe: None,
        }
    }

    pub fn with_probe_interval(mut self, probe_interval: Duration) -> Self {
        self.probe_interval = probe_interval;
        self
    }

    /// Shared connectivity flag; the leader election's built-in
    /// availability criterion reads this.
    pub fn connectivity(&self) -> Arc<AtomicBool> { self.connected.clone() }

    pub fn is_connected(&self) -> bool { self.connected.load(Ordering::Relaxed) }

    async fn probe_if_due(&mut self) {
        let due = self.last_probe.map_or(true, |probed| probed.elapsed() >= self.probe_interval);
        if !due {
            return;
        }
        self.last_probe = Some(Instant::now());

        let reachable = self.store.backend().ping().await.is_ok();
        let was = self.connected.swap(reachable, Ordering::Relaxed);
        if was != reachable {
            info!(connected = reachable, "backend connectivity changed");
            if reachable {
                self.signals.connected.emit(&());
            } else {
                self.signals.disconnected.emit(&());
            }
        }
    }
}

#[async_trait]
impl Worker for StoreWorker {
    async fn do_work(&mut self) {
        self.probe_if_due().await;

        if self.is_connected() {
            self.store.notifier().process_notifications().await;
        }
    }

    async fn deinit(&mut self) {
        let was = self.connected.swap(false, Ordering::Relaxed);
        if was {
            self.signals.disconnected.emit(&());
        }
    }
}
