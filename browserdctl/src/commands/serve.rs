use std::sync::Arc;

use tracing::info;

use browserd_core::{
    AppState, BrowserdConfig, ChromiumFactory, Dispatcher, HealthMonitor, SessionPool,
};

use crate::Result;

/// Wires the pool, dispatcher, health monitor and HTTP listener together
/// and blocks until the process receives a shutdown signal.
pub async fn run(config: BrowserdConfig) -> Result<()> {
    let factory = Arc::new(ChromiumFactory::new(config.chromium.clone()));
    let pool = SessionPool::new(factory, config.pool.clone());
    let monitor = HealthMonitor::new(pool.clone(), &config.monitor).spawn();
    let dispatcher = Arc::new(Dispatcher::new(
        pool.clone(),
        config.dispatcher.clone(),
        config.pool.acquire_timeout(),
    ));
    let state = AppState::new(dispatcher, config.executor.task_deadline());

    info!(
        capacity = config.pool.capacity,
        max_concurrent = config.dispatcher.max_concurrent_requests,
        "starting browserd"
    );
    browserd_core::http::serve(&config.http, state).await?;

    monitor.abort();
    pool.close();
    info!("browserd stopped");
    Ok(())
}
