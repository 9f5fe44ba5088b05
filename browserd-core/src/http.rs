use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::config::HttpSection;
use crate::dispatcher::{Dispatcher, DispatcherStats};
use crate::pool::PoolStats;
use crate::task::{FailureKind, Outcome, Task};

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http server error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct AppState {
    dispatcher: Arc<Dispatcher>,
    default_deadline: Duration,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, default_deadline: Duration) -> Self {
        Self {
            dispatcher,
            default_deadline,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    /// Opaque command payload forwarded to the session driver.
    pub command: Value,
    /// Per-attempt deadline override in milliseconds.
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ExecuteResponse {
    task_id: Uuid,
    #[serde(flatten)]
    outcome: Outcome,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    pool: PoolStats,
    dispatcher: DispatcherStats,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/execute", post(execute))
        .route("/v1/status", get(status))
        .route("/healthz", get(healthz))
        .with_state(state)
}

pub async fn serve(config: &HttpSection, state: AppState) -> Result<(), HttpError> {
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, "browserd http listener ready");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

async fn execute(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> (StatusCode, Json<ExecuteResponse>) {
    let deadline = request
        .deadline_ms
        .map(Duration::from_millis)
        .unwrap_or(state.default_deadline);
    let task = Task::new(request.command, deadline);
    let task_id = task.id;
    let outcome = state.dispatcher.dispatch(task).await;
    (
        status_for(&outcome),
        Json(ExecuteResponse { task_id, outcome }),
    )
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        pool: state.dispatcher.pool().stats(),
        dispatcher: state.dispatcher.stats(),
    })
}

async fn healthz() -> &'static str {
    "ok"
}

/// Distinct status codes let callers pick a client-side retry strategy:
/// saturation and timeouts are retryable, an operation failure is theirs.
fn status_for(outcome: &Outcome) -> StatusCode {
    match outcome {
        Outcome::Success { .. } => StatusCode::OK,
        Outcome::Timeout => StatusCode::GATEWAY_TIMEOUT,
        Outcome::Failure { kind, .. } => match kind {
            FailureKind::PoolExhausted => StatusCode::SERVICE_UNAVAILABLE,
            FailureKind::SessionCreationFailed | FailureKind::SessionCrashed => {
                StatusCode::BAD_GATEWAY
            }
            FailureKind::OperationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        },
    }
}
