mod common;

use std::time::Duration;

use serde_json::json;

use browserd_core::executor::TaskExecutor;
use browserd_core::session::Session;
use browserd_core::task::{FailureKind, Outcome, Task};

use common::{FakeBehavior, FakeDriver};

fn session_with(behavior: FakeBehavior) -> Session {
    let (driver, _) = FakeDriver::new(behavior, Vec::new());
    Session::new(Box::new(driver))
}

#[tokio::test]
async fn success_records_activity_and_is_not_tainted() {
    let mut session = session_with(FakeBehavior::Succeed(json!({ "title": "example" })));
    let task = Task::new(json!({ "op": "content" }), Duration::from_millis(500));

    let report = TaskExecutor::new().run(&mut session, &task).await;

    assert!(report.outcome.is_success());
    assert!(!report.tainted);
    assert_eq!(session.use_count(), 1);
}

#[tokio::test]
async fn clean_failure_keeps_the_session_usable() {
    let mut session = session_with(FakeBehavior::Fail("navigation error"));
    let task = Task::new(json!({ "op": "navigate" }), Duration::from_millis(500));

    let report = TaskExecutor::new().run(&mut session, &task).await;

    assert!(!report.tainted);
    match report.outcome {
        Outcome::Failure { kind, detail } => {
            assert_eq!(kind, FailureKind::OperationFailed);
            assert!(detail.contains("navigation error"));
        }
        other => panic!("expected failure, got {other:?}"),
    }
}

#[tokio::test]
async fn transport_failure_taints_the_session() {
    let mut session = session_with(FakeBehavior::Crash("connection is closed"));
    let task = Task::new(json!({ "op": "evaluate" }), Duration::from_millis(500));

    let report = TaskExecutor::new().run(&mut session, &task).await;

    assert!(report.tainted);
    assert!(matches!(
        report.outcome,
        Outcome::Failure {
            kind: FailureKind::SessionCrashed,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn deadline_expiry_yields_timeout_and_taints() {
    let mut session = session_with(FakeBehavior::Hang);
    let task = Task::new(json!({ "op": "evaluate" }), Duration::from_millis(200));

    let report = TaskExecutor::new().run(&mut session, &task).await;

    assert!(report.tainted);
    assert!(matches!(report.outcome, Outcome::Timeout));
}
