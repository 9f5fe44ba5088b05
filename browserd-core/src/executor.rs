use tokio::time::timeout;
use tracing::{debug, warn};

use crate::session::Session;
use crate::task::{FailureKind, Outcome, Task};

/// What the executor observed, and whether the session can be trusted
/// afterwards. A tainted session must be drained by the pool on release.
#[derive(Debug)]
pub struct ExecutionReport {
    pub outcome: Outcome,
    pub tainted: bool,
}

/// Runs one task against one acquired session, always completing by the
/// task's deadline. Performs zero retries; that decision belongs to the
/// dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskExecutor;

impl TaskExecutor {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self, session: &mut Session, task: &Task) -> ExecutionReport {
        debug!(
            task = %task.id,
            session = %session.id(),
            deadline_ms = task.deadline.as_millis() as u64,
            "executing task"
        );

        match timeout(task.deadline, session.driver().execute(&task.command)).await {
            Ok(Ok(result)) => {
                session.record_activity();
                ExecutionReport {
                    outcome: Outcome::Success { result },
                    tainted: false,
                }
            }
            Ok(Err(err)) if err.is_transport() => {
                warn!(task = %task.id, session = %session.id(), error = %err, "session transport failed");
                ExecutionReport {
                    outcome: Outcome::failure(FailureKind::SessionCrashed, err.to_string()),
                    tainted: true,
                }
            }
            Ok(Err(err)) => {
                // Clean command failure; the browser context is still good.
                session.record_activity();
                ExecutionReport {
                    outcome: Outcome::failure(FailureKind::OperationFailed, err.to_string()),
                    tainted: false,
                }
            }
            Err(_) => {
                // The in-flight command is abandoned here; the driver cannot
                // abort a single CDP call, so the whole session is torn down
                // when the pool drains it.
                warn!(
                    task = %task.id,
                    session = %session.id(),
                    deadline_ms = task.deadline.as_millis() as u64,
                    "task deadline elapsed, tainting session"
                );
                ExecutionReport {
                    outcome: Outcome::Timeout,
                    tainted: true,
                }
            }
        }
    }
}
