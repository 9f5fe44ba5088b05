use std::path::Path;

use serde::Serialize;

use browserd_core::BrowserdConfig;

use crate::TextSummary;

#[derive(Debug, Serialize)]
pub struct ConfigReport {
    pub source: String,
    pub pool_capacity: usize,
    pub max_wait_queue: usize,
    pub acquire_timeout_ms: u64,
    pub recycle_after_uses: u32,
    pub task_deadline_ms: u64,
    pub max_concurrent_requests: usize,
    pub retry_budget: u32,
    pub probe_interval_seconds: u64,
    pub idle_after_seconds: u64,
    pub bind_addr: String,
    pub headless: bool,
}

/// Flattens the effective settings, defaults included, so operators can see
/// what a partial file actually resolves to.
pub fn run(source: &Path, config: &BrowserdConfig) -> ConfigReport {
    ConfigReport {
        source: source.display().to_string(),
        pool_capacity: config.pool.capacity,
        max_wait_queue: config.pool.max_wait_queue,
        acquire_timeout_ms: config.pool.acquire_timeout_ms,
        recycle_after_uses: config.pool.recycle_after_uses,
        task_deadline_ms: config.executor.task_deadline_ms,
        max_concurrent_requests: config.dispatcher.max_concurrent_requests,
        retry_budget: config.dispatcher.retry_budget,
        probe_interval_seconds: config.monitor.probe_interval_seconds,
        idle_after_seconds: config.monitor.idle_after_seconds,
        bind_addr: config.http.bind_addr.clone(),
        headless: config.chromium.headless,
    }
}

impl TextSummary for ConfigReport {
    fn summary(&self) -> String {
        [
            format!("Config: {}", self.source),
            format!(
                "Pool: capacity={} wait_queue={} acquire_timeout={}ms recycle_after={}",
                self.pool_capacity, self.max_wait_queue, self.acquire_timeout_ms,
                self.recycle_after_uses
            ),
            format!("Executor: task_deadline={}ms", self.task_deadline_ms),
            format!(
                "Dispatcher: max_concurrent={} retry_budget={}",
                self.max_concurrent_requests, self.retry_budget
            ),
            format!(
                "Monitor: probe_interval={}s idle_after={}s",
                self.probe_interval_seconds, self.idle_after_seconds
            ),
            format!("Http: bind={}", self.bind_addr),
            format!("Chromium: headless={}", self.headless),
        ]
        .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn report_reflects_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browserd.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[pool]\ncapacity = 8\n\n[http]\nbind_addr = \"0.0.0.0:9000\"").unwrap();

        let config = browserd_core::load_browserd_config(&path).unwrap();
        let report = run(&path, &config);
        assert_eq!(report.pool_capacity, 8);
        assert_eq!(report.bind_addr, "0.0.0.0:9000");
        // Untouched sections keep their defaults.
        assert_eq!(report.retry_budget, 1);
        assert!(report.summary().contains("capacity=8"));
    }
}
