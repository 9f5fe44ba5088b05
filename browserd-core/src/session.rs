use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use crate::driver::SessionDriver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    InUse,
    Probing,
    Draining,
    Dead,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::InUse => "in_use",
            SessionState::Probing => "probing",
            SessionState::Draining => "draining",
            SessionState::Dead => "dead",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One isolated browser execution context. A session is exclusively owned:
/// the pool moves it to exactly one caller at a time and takes it back on
/// release.
pub struct Session {
    id: Uuid,
    driver: Box<dyn SessionDriver>,
    state: SessionState,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
    use_count: u32,
}

impl Session {
    pub fn new(driver: Box<dyn SessionDriver>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            driver,
            state: SessionState::Idle,
            created_at: now,
            last_activity: now,
            use_count: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    pub fn use_count(&self) -> u32 {
        self.use_count
    }

    pub fn driver(&self) -> &dyn SessionDriver {
        self.driver.as_ref()
    }

    /// Bumps the use counter and refreshes the activity timestamp after a
    /// task ran against this session.
    pub fn record_activity(&mut self) {
        self.last_activity = Utc::now();
        self.use_count += 1;
    }

    pub(crate) fn mark_idle(&mut self) {
        self.state = SessionState::Idle;
    }

    pub(crate) fn mark_in_use(&mut self) {
        self.state = SessionState::InUse;
    }

    pub(crate) fn mark_probing(&mut self) {
        self.state = SessionState::Probing;
    }

    pub(crate) fn mark_draining(&mut self) {
        self.state = SessionState::Draining;
    }

    /// Terminates the underlying driver. Dead is terminal; the session is
    /// consumed and never re-enters the pool.
    pub(crate) async fn shutdown(mut self) {
        self.state = SessionState::Dead;
        if let Err(err) = self.driver.terminate().await {
            warn!(session = %self.id, error = %err, "session teardown reported an error");
        }
    }
}
