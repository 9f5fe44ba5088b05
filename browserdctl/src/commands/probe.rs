use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use browserd_core::{BrowserdConfig, ChromiumFactory, SessionFactory};

use crate::{ProbeArgs, Result, TextSummary};

#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub command: Value,
    pub round_trip_ms: u128,
    pub result: Value,
}

/// Preflight check: launches one real browser outside the pool, runs a
/// single command against it, and tears it down again.
pub async fn run(config: &BrowserdConfig, args: &ProbeArgs) -> Result<ProbeReport> {
    let factory = ChromiumFactory::new(config.chromium.clone());
    let command = match &args.url {
        Some(url) => json!({ "op": "navigate", "url": url }),
        None => json!({ "op": "evaluate", "script": "navigator.userAgent" }),
    };

    let mut driver = factory.create().await?;
    info!("probe session launched");
    let started = Instant::now();
    let result = driver.execute(&command).await;
    let round_trip_ms = started.elapsed().as_millis();
    driver.terminate().await?;

    Ok(ProbeReport {
        command,
        round_trip_ms,
        result: result?,
    })
}

impl TextSummary for ProbeReport {
    fn summary(&self) -> String {
        format!(
            "Probe ok in {}ms\ncommand: {}\nresult: {}",
            self.round_trip_ms, self.command, self.result
        )
    }
}
