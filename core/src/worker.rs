//! The cooperative worker harness boundary. Workers get a `do_work` call per
//! supervisor tick, all on one task; everything a worker does is therefore
//! serialized with every other worker.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

#[async_trait]
pub trait Worker: Send {
    async fn init(&mut self) {}

    async fn do_work(&mut self);

    async fn deinit(&mut self) {}
}

pub struct Supervisor {
    workers: Vec<Box<dyn Worker>>,
    tick_interval: Duration,
}

impl Supervisor {
    pub fn new() -> Self { Self { workers: Vec::new(), tick_interval: Duration::from_millis(100) } }

    pub fn with_tick_interval(tick_interval: Duration) -> Self { Self { workers: Vec::new(), tick_interval } }

    pub fn register(&mut self, worker: Box<dyn Worker>) { self.workers.push(worker); }

    /// Tick every worker until SIGINT/SIGTERM, then deinit in reverse
    /// registration order.
    pub async fn run(self) {
        self.run_until(shutdown_signal()).await;
    }

    /// Same loop with an injectable shutdown future.
    pub async fn run_until(mut self, shutdown: impl std::future::Future<Output = ()>) {
        for worker in &mut self.workers {
            worker.init().await;
        }

        let mut ticker = tokio::time::interval(self.tick_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    for worker in &mut self.workers {
                        worker.do_work().await;
                    }
                }
            }
        }

        info!("supervisor: shutting down");
        for worker in self.workers.iter_mut().rev() {
            worker.deinit().await;
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self { Self::new() }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(err) => {
                tracing::error!(%err, "supervisor: SIGTERM handler unavailable");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
