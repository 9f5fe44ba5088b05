use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// One automation request bound to a deadline. The command payload is opaque
/// to the orchestration layer; only the driver interprets it.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub command: Value,
    pub deadline: Duration,
}

impl Task {
    pub fn new(command: Value, deadline: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            command,
            deadline,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The pool is saturated; the caller should retry later.
    PoolExhausted,
    /// The browser process did not start.
    SessionCreationFailed,
    /// Browser-level error; the session stayed usable.
    OperationFailed,
    /// Transport or protocol failure; the session was drained.
    SessionCrashed,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::PoolExhausted => "pool_exhausted",
            FailureKind::SessionCreationFailed => "session_creation_failed",
            FailureKind::OperationFailed => "operation_failed",
            FailureKind::SessionCrashed => "session_crashed",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Final result of a task, immutable once produced.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success { result: Value },
    Failure { kind: FailureKind, detail: String },
    Timeout,
}

impl Outcome {
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        Outcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// Timeouts and crashed sessions may be retried against a fresh
    /// session; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Outcome::Timeout
                | Outcome::Failure {
                    kind: FailureKind::SessionCrashed,
                    ..
                }
        )
    }
}
