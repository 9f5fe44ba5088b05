pub mod config;
pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod executor;
pub mod http;
pub mod monitor;
pub mod pool;
pub mod session;
pub mod task;

pub use config::{
    load_browserd_config, BrowserdConfig, ChromiumSection, DispatcherSection, ExecutorSection,
    HttpSection, MonitorSection, PoolSection,
};
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use driver::{
    ChromiumFactory, DriverError, DriverResult, SessionDriver, SessionFactory,
};
pub use error::{ConfigError, Result};
pub use executor::{ExecutionReport, TaskExecutor};
pub use http::{router, serve, AppState, HttpError};
pub use monitor::HealthMonitor;
pub use pool::{PoolError, PoolResult, PoolStats, SessionPool};
pub use session::{Session, SessionState};
pub use task::{FailureKind, Outcome, Task};
