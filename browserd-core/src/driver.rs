use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ChromiumSection;

pub type DriverResult<T> = Result<T, DriverError>;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("browser transport failed: {0}")]
    Transport(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("driver configuration error: {0}")]
    Configuration(String),
}

impl DriverError {
    /// A transport failure means the underlying browser connection can no
    /// longer be trusted and the session must be drained.
    pub fn is_transport(&self) -> bool {
        matches!(self, DriverError::Transport(_))
    }
}

/// Boundary to one isolated browser execution context. The orchestration
/// layer routes opaque command payloads through `execute` and never
/// inspects their contents.
#[async_trait]
pub trait SessionDriver: Send + Sync {
    async fn execute(&self, command: &Value) -> DriverResult<Value>;
    async fn terminate(&mut self) -> DriverResult<()>;
    async fn is_alive(&self) -> bool;
}

/// Creates drivers on demand; the pool owns one factory for its lifetime.
/// Tests substitute a fake implementation.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> DriverResult<Box<dyn SessionDriver>>;
}

#[derive(Debug, Clone)]
pub struct ChromiumFactory {
    config: ChromiumSection,
}

impl ChromiumFactory {
    pub fn new(config: ChromiumSection) -> Self {
        Self { config }
    }

    fn build_chromium_config(&self) -> DriverResult<ChromiumConfig> {
        let mut builder = ChromiumConfig::builder();
        if let Some(path) = &self.config.executable_path {
            builder = builder.chrome_executable(path);
        }
        if !self.config.headless {
            builder = builder.with_head();
        }
        if !self.config.sandbox {
            builder = builder.no_sandbox();
        }
        builder = builder.request_timeout(Duration::from_millis(self.config.request_timeout_ms));

        let [width, height] = self.config.window;
        let mut args = vec![
            format!("--window-size={width},{height}"),
            "--mute-audio".to_string(),
            "--no-first-run".to_string(),
        ];
        if self.config.disable_gpu {
            args.push("--disable-gpu".to_string());
        }
        args.extend(self.config.extra_args.iter().cloned());
        builder = builder.args(args);

        builder.build().map_err(DriverError::Configuration)
    }
}

#[async_trait]
impl SessionFactory for ChromiumFactory {
    async fn create(&self) -> DriverResult<Box<dyn SessionDriver>> {
        let chromium_config = self.build_chromium_config()?;
        info!(
            headless = self.config.headless,
            width = self.config.window[0],
            height = self.config.window[1],
            "launching chromium instance"
        );

        let (browser, mut handler) = Browser::launch(chromium_config)
            .await
            .map_err(|err| DriverError::Launch(err.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "chromium handler reported error");
                }
            }
        });

        let params = CreateTargetParams::new("about:blank");
        let page = browser
            .new_page(params)
            .await
            .map_err(|err| DriverError::Launch(err.to_string()))?;

        Ok(Box::new(ChromiumDriver {
            browser,
            page,
            handler_task: Some(handler_task),
        }))
    }
}

pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler_task: Option<JoinHandle<()>>,
}

#[async_trait]
impl SessionDriver for ChromiumDriver {
    async fn execute(&self, command: &Value) -> DriverResult<Value> {
        let op = command
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| DriverError::Command("payload is missing an \"op\" field".into()))?;

        match op {
            "navigate" => {
                let url = require_str(command, "url")?;
                let params = NavigateParams::builder()
                    .url(url)
                    .build()
                    .map_err(DriverError::Configuration)?;
                self.page.goto(params).await.map_err(map_cdp)?;
                self.page.wait_for_navigation().await.map_err(map_cdp)?;
                Ok(json!({ "navigated": url }))
            }
            "evaluate" => {
                let script = require_str(command, "script")?;
                let result = self.page.evaluate(script).await.map_err(map_cdp)?;
                Ok(result.into_value::<Value>().unwrap_or(Value::Null))
            }
            "content" => {
                let html = self.page.content().await.map_err(map_cdp)?;
                Ok(json!({ "content": html }))
            }
            other => Err(DriverError::Command(format!("unsupported op: {other}"))),
        }
    }

    async fn terminate(&mut self) -> DriverResult<()> {
        if let Err(err) = self.browser.close().await {
            warn!(error = %err, "failed to close browser gracefully");
        }
        // The handler loop ends once the browser process is gone; abort
        // covers the case where close itself failed.
        if let Some(handle) = self.handler_task.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        self.page.evaluate("1 + 1").await.is_ok()
    }
}

fn require_str<'a>(command: &'a Value, field: &str) -> DriverResult<&'a str> {
    command
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| DriverError::Command(format!("payload is missing a \"{field}\" field")))
}

fn map_cdp(err: CdpError) -> DriverError {
    let message = err.to_string();
    if is_transport_message(&message) {
        DriverError::Transport(message)
    } else {
        DriverError::Command(message)
    }
}

// Chromium reports a dead process or dropped websocket through message text
// rather than a dedicated error variant.
fn is_transport_message(message: &str) -> bool {
    let lowered = message.to_ascii_lowercase();
    lowered.contains("connection is closed")
        || lowered.contains("websocket")
        || lowered.contains("channel")
        || lowered.contains("no response")
}
