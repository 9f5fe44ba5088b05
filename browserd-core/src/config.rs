use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct BrowserdConfig {
    pub pool: PoolSection,
    pub executor: ExecutorSection,
    pub dispatcher: DispatcherSection,
    pub monitor: MonitorSection,
    pub http: HttpSection,
    pub chromium: ChromiumSection,
}

impl BrowserdConfig {
    /// Rejects values the daemon cannot run with, instead of failing later
    /// at pool construction or socket bind.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.pool.capacity == 0 {
            return Err("pool.capacity must be at least 1".into());
        }
        if self.dispatcher.max_concurrent_requests == 0 {
            return Err("dispatcher.max_concurrent_requests must be at least 1".into());
        }
        if self.executor.task_deadline_ms == 0 {
            return Err("executor.task_deadline_ms must be positive".into());
        }
        if self.http.bind_addr.parse::<SocketAddr>().is_err() {
            return Err(format!(
                "http.bind_addr {:?} is not a socket address",
                self.http.bind_addr
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSection {
    /// Maximum number of live browser sessions.
    pub capacity: usize,
    /// Maximum number of callers allowed to queue for a session.
    pub max_wait_queue: usize,
    /// How long a caller may wait for a session before receiving an
    /// exhaustion error.
    pub acquire_timeout_ms: u64,
    /// A session that has served this many tasks is destroyed on release
    /// instead of returning to the idle stack.
    pub recycle_after_uses: u32,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            capacity: 4,
            max_wait_queue: 32,
            acquire_timeout_ms: 10_000,
            recycle_after_uses: 32,
        }
    }
}

impl PoolSection {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorSection {
    /// Per-attempt deadline applied to every task unless the request
    /// carries its own.
    pub task_deadline_ms: u64,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            task_deadline_ms: 30_000,
        }
    }
}

impl ExecutorSection {
    pub fn task_deadline(&self) -> Duration {
        Duration::from_millis(self.task_deadline_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DispatcherSection {
    /// Request concurrency limit, independent of pool capacity.
    pub max_concurrent_requests: usize,
    /// Extra attempts allowed after a timeout or tainted failure.
    pub retry_budget: u32,
}

impl Default for DispatcherSection {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 64,
            retry_budget: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub probe_interval_seconds: u64,
    /// An idle session older than this is liveness-probed on the next sweep.
    pub idle_after_seconds: u64,
    pub probe_timeout_ms: u64,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            probe_interval_seconds: 30,
            idle_after_seconds: 120,
            probe_timeout_ms: 3_000,
        }
    }
}

impl MonitorSection {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_seconds)
    }

    pub fn idle_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.idle_after_seconds as i64)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub bind_addr: String,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8793".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    /// Explicit browser binary; when unset chromiumoxide autodetects one.
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub window: [u32; 2],
    /// Timeout applied to individual CDP requests by the driver.
    pub request_timeout_ms: u64,
    pub extra_args: Vec<String>,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: false,
            disable_gpu: true,
            window: [1366, 768],
            request_timeout_ms: 30_000,
            extra_args: Vec::new(),
        }
    }
}

pub fn load_browserd_config<P: AsRef<Path>>(path: P) -> Result<BrowserdConfig> {
    let path = path.as_ref();
    let config: BrowserdConfig = load_toml(path)?;
    config.validate().map_err(|reason| ConfigError::Invalid {
        reason,
        path: path.to_path_buf(),
    })?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_yields_documented_defaults() {
        let config: BrowserdConfig = toml::from_str("").expect("defaults");
        assert_eq!(config.pool.capacity, 4);
        assert_eq!(config.pool.max_wait_queue, 32);
        assert_eq!(config.pool.recycle_after_uses, 32);
        assert_eq!(config.executor.task_deadline_ms, 30_000);
        assert_eq!(config.dispatcher.max_concurrent_requests, 64);
        assert_eq!(config.dispatcher.retry_budget, 1);
        assert_eq!(config.monitor.probe_interval_seconds, 30);
        assert_eq!(config.http.bind_addr, "127.0.0.1:8793");
        assert!(config.chromium.headless);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let raw = r#"
            [pool]
            capacity = 2
            acquire_timeout_ms = 500

            [chromium]
            executable_path = "/usr/bin/chromium"
            extra_args = ["--lang=en-US"]
        "#;
        let config: BrowserdConfig = toml::from_str(raw).expect("parse");
        assert_eq!(config.pool.capacity, 2);
        assert_eq!(config.pool.acquire_timeout(), Duration::from_millis(500));
        assert_eq!(config.pool.max_wait_queue, 32);
        assert_eq!(
            config.chromium.executable_path.as_deref(),
            Some("/usr/bin/chromium")
        );
        assert_eq!(config.chromium.extra_args, vec!["--lang=en-US"]);
    }

    #[test]
    fn load_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browserd.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[pool]\ncapacity = \"many\"").unwrap();

        let err = load_browserd_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("browserd.toml"));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browserd.toml");
        std::fs::write(&path, "[pool]\ncapacity = 0\n").unwrap();

        let err = load_browserd_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("pool.capacity"));
    }

    #[test]
    fn malformed_bind_addr_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("browserd.toml");
        std::fs::write(&path, "[http]\nbind_addr = \"not-an-address\"\n").unwrap();

        let err = load_browserd_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert!(err.to_string().contains("bind_addr"));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load_browserd_config("/nonexistent/browserd.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
