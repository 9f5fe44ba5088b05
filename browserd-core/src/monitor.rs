use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::debug;

use crate::config::MonitorSection;
use crate::pool::SessionPool;

/// Periodically probes idle sessions, independent of request traffic.
/// Sessions that fail the probe are drained; replacements are created
/// lazily on the next demand.
pub struct HealthMonitor {
    pool: SessionPool,
    probe_interval: Duration,
    idle_after: chrono::Duration,
    probe_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(pool: SessionPool, config: &MonitorSection) -> Self {
        Self {
            pool,
            probe_interval: config.probe_interval(),
            idle_after: config.idle_after(),
            probe_timeout: config.probe_timeout(),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.probe_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep().await;
            }
        })
    }

    /// One probing pass. Stale idle sessions are removed from the pool
    /// first so they cannot be acquired mid-probe.
    pub async fn sweep(&self) {
        let stale = self.pool.begin_probe(self.idle_after);
        if stale.is_empty() {
            return;
        }
        debug!(count = stale.len(), "probing stale idle sessions");
        for session in stale {
            let healthy = timeout(self.probe_timeout, session.driver().is_alive())
                .await
                .unwrap_or(false);
            self.pool.finish_probe(session, healthy);
        }
    }
}
