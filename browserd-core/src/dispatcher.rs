use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::DispatcherSection;
use crate::executor::TaskExecutor;
use crate::pool::{PoolError, SessionPool};
use crate::task::{FailureKind, Outcome, Task};

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DispatcherStats {
    pub successes: u64,
    pub failures: u64,
    pub timeouts: u64,
    pub retries: u64,
}

#[derive(Default)]
struct Counters {
    successes: AtomicU64,
    failures: AtomicU64,
    timeouts: AtomicU64,
    retries: AtomicU64,
}

/// Front door for task execution: bounds request concurrency independently
/// of pool capacity, runs acquire/execute/release, and owns the single
/// bounded retry allowed after a timeout or tainted failure.
pub struct Dispatcher {
    pool: SessionPool,
    executor: TaskExecutor,
    limiter: Arc<Semaphore>,
    acquire_timeout: Duration,
    retry_budget: u32,
    counters: Counters,
}

impl Dispatcher {
    pub fn new(pool: SessionPool, config: DispatcherSection, acquire_timeout: Duration) -> Self {
        Self {
            pool,
            executor: TaskExecutor::new(),
            limiter: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            acquire_timeout,
            retry_budget: config.retry_budget,
            counters: Counters::default(),
        }
    }

    pub fn pool(&self) -> &SessionPool {
        &self.pool
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            successes: self.counters.successes.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
            timeouts: self.counters.timeouts.load(Ordering::Relaxed),
            retries: self.counters.retries.load(Ordering::Relaxed),
        }
    }

    pub async fn dispatch(&self, task: Task) -> Outcome {
        let permit = match timeout(self.acquire_timeout, self.limiter.clone().acquire_owned()).await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                let outcome =
                    Outcome::failure(FailureKind::PoolExhausted, "dispatcher is shut down");
                self.record(&outcome);
                return outcome;
            }
            Err(_) => {
                let outcome = Outcome::failure(
                    FailureKind::PoolExhausted,
                    "request concurrency limit reached",
                );
                self.record(&outcome);
                return outcome;
            }
        };

        let mut attempt = 0u32;
        let outcome = loop {
            let outcome = self.attempt(&task).await;
            if outcome.is_retryable() && attempt < self.retry_budget {
                attempt += 1;
                self.counters.retries.fetch_add(1, Ordering::Relaxed);
                warn!(task = %task.id, attempt, "retrying task against a fresh session");
                continue;
            }
            break outcome;
        };
        drop(permit);

        self.record(&outcome);
        outcome
    }

    async fn attempt(&self, task: &Task) -> Outcome {
        let mut session = match self.pool.acquire(self.acquire_timeout).await {
            Ok(session) => session,
            Err(PoolError::Exhausted(detail)) => {
                return Outcome::failure(FailureKind::PoolExhausted, detail)
            }
            Err(PoolError::CreationFailed(detail)) => {
                return Outcome::failure(FailureKind::SessionCreationFailed, detail)
            }
            Err(PoolError::Closed) => {
                return Outcome::failure(FailureKind::PoolExhausted, "session pool is closed")
            }
        };
        let report = self.executor.run(&mut session, task).await;
        self.pool.release(session, report.tainted);
        debug!(task = %task.id, tainted = report.tainted, "attempt finished");
        report.outcome
    }

    fn record(&self, outcome: &Outcome) {
        let counter = match outcome {
            Outcome::Success { .. } => &self.counters.successes,
            Outcome::Failure { .. } => &self.counters.failures,
            Outcome::Timeout => &self.counters.timeouts,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}
