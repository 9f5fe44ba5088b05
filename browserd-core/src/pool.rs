use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PoolSection;
use crate::driver::SessionFactory;
use crate::session::Session;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("session pool exhausted: {0}")]
    Exhausted(String),
    #[error("session creation failed: {0}")]
    CreationFailed(String),
    #[error("session pool is closed")]
    Closed,
}

pub type PoolResult<T> = Result<T, PoolError>;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub idle: usize,
    pub in_use: usize,
    pub probing: usize,
    pub creating: usize,
    pub waiting: usize,
}

struct Waiter {
    id: Uuid,
    tx: oneshot::Sender<PoolResult<Session>>,
}

struct PoolState {
    capacity: usize,
    idle: Vec<Session>,
    waiters: VecDeque<Waiter>,
    in_use: usize,
    creating: usize,
    probing: usize,
    closed: bool,
}

impl PoolState {
    // Everything counted against capacity: live sessions plus launches in
    // flight.
    fn occupied(&self) -> usize {
        self.idle.len() + self.in_use + self.creating + self.probing
    }
}

struct PoolInner {
    factory: Arc<dyn SessionFactory>,
    config: PoolSection,
    state: Mutex<PoolState>,
}

/// Bounded pool of reusable browser sessions. Bookkeeping lives behind one
/// mutex that is never held across an await; session creation and teardown
/// happen outside the lock so a slow browser launch cannot block unrelated
/// acquisitions or releases.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolInner>,
}

impl SessionPool {
    pub fn new(factory: Arc<dyn SessionFactory>, config: PoolSection) -> Self {
        let capacity = config.capacity;
        Self {
            inner: Arc::new(PoolInner {
                factory,
                config,
                state: Mutex::new(PoolState {
                    capacity,
                    idle: Vec::new(),
                    waiters: VecDeque::new(),
                    in_use: 0,
                    creating: 0,
                    probing: 0,
                    closed: false,
                }),
            }),
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock().unwrap();
        PoolStats {
            capacity: state.capacity,
            idle: state.idle.len(),
            in_use: state.in_use,
            probing: state.probing,
            creating: state.creating,
            waiting: state.waiters.len(),
        }
    }

    /// Hands out a session, preferring the most recently warmed idle one.
    /// Below capacity a fresh session is created while the caller waits; at
    /// capacity the caller joins a FIFO queue. A caller whose wait budget
    /// elapses is removed from the queue and never granted a session late.
    pub async fn acquire(&self, wait_budget: Duration) -> PoolResult<Session> {
        let waiter = {
            let mut state = self.inner.state.lock().unwrap();
            if state.closed {
                return Err(PoolError::Closed);
            }
            if let Some(mut session) = state.idle.pop() {
                session.mark_in_use();
                state.in_use += 1;
                return Ok(session);
            }
            if state.occupied() < state.capacity {
                state.creating += 1;
                None
            } else {
                if state.waiters.len() >= self.inner.config.max_wait_queue {
                    return Err(PoolError::Exhausted("wait queue is full".into()));
                }
                let (tx, rx) = oneshot::channel();
                let id = Uuid::new_v4();
                state.waiters.push_back(Waiter { id, tx });
                Some((id, rx))
            }
        };

        match waiter {
            None => self.create_for_caller().await,
            Some((waiter_id, mut rx)) => {
                tokio::select! {
                    granted = &mut rx => match granted {
                        Ok(result) => result,
                        Err(_) => Err(PoolError::Closed),
                    },
                    _ = tokio::time::sleep(wait_budget) => {
                        self.cancel_waiter(waiter_id);
                        // A grant may have raced the deadline. Reclaim it so
                        // the session is not lost, but never hand it out here.
                        if let Ok(Ok(mut session)) = rx.try_recv() {
                            {
                                let mut state = self.inner.state.lock().unwrap();
                                state.in_use -= 1;
                            }
                            session.mark_idle();
                            self.offer(session);
                        }
                        Err(PoolError::Exhausted(
                            "timed out waiting for a session".into(),
                        ))
                    }
                }
            }
        }
    }

    /// Returns a session to the pool. Tainted or worn-out sessions are
    /// drained and destroyed; healthy ones go to the oldest waiter, or back
    /// onto the idle stack.
    pub fn release(&self, session: Session, tainted: bool) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.in_use -= 1;
        }
        let recycled = session.use_count() >= self.inner.config.recycle_after_uses;
        if tainted || recycled {
            info!(
                session = %session.id(),
                tainted,
                recycled,
                use_count = session.use_count(),
                "draining session"
            );
            self.spawn_teardown(session);
            self.spawn_replacement_if_needed();
        } else {
            self.offer(session);
        }
    }

    /// Atomically removes idle sessions whose last activity is older than
    /// the cutoff so the health monitor can probe them without racing
    /// acquire(). Each removed session must come back via `finish_probe`.
    pub fn begin_probe(&self, idle_after: chrono::Duration) -> Vec<Session> {
        let mut state = self.inner.state.lock().unwrap();
        let now = chrono::Utc::now();
        let mut stale = Vec::new();
        let mut keep = Vec::new();
        for mut session in state.idle.drain(..) {
            if now - session.last_activity() >= idle_after {
                session.mark_probing();
                stale.push(session);
            } else {
                keep.push(session);
            }
        }
        state.idle = keep;
        state.probing += stale.len();
        stale
    }

    pub fn finish_probe(&self, session: Session, healthy: bool) {
        {
            let mut state = self.inner.state.lock().unwrap();
            state.probing -= 1;
        }
        if healthy {
            self.offer(session);
        } else {
            warn!(session = %session.id(), "liveness probe failed, draining session");
            self.spawn_teardown(session);
            self.spawn_replacement_if_needed();
        }
    }

    /// Raises capacity at runtime. Queued waiters are demand, so replacement
    /// launches start immediately for as many of them as the new headroom
    /// allows.
    pub fn grow(&self, new_capacity: usize) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if state.closed || new_capacity <= state.capacity {
                return;
            }
            info!(from = state.capacity, to = new_capacity, "growing session pool");
            state.capacity = new_capacity;
        }
        while self.spawn_replacement_if_needed() {}
    }

    /// Lowers capacity at runtime. Excess idle sessions are drained right
    /// away; excess in-use sessions are drained as they come back instead of
    /// returning to the idle stack.
    pub fn shrink(&self, new_capacity: usize) {
        let drained = {
            let mut state = self.inner.state.lock().unwrap();
            if state.closed || new_capacity >= state.capacity {
                return;
            }
            info!(from = state.capacity, to = new_capacity, "shrinking session pool");
            state.capacity = new_capacity;
            let mut drained = Vec::new();
            while state.occupied() > state.capacity {
                match state.idle.pop() {
                    Some(session) => drained.push(session),
                    None => break,
                }
            }
            drained
        };
        for session in drained {
            self.spawn_teardown(session);
        }
    }

    /// Fails queued waiters and drains idle sessions. In-flight sessions are
    /// torn down as they are released.
    pub fn close(&self) {
        let (idle, waiters) = {
            let mut state = self.inner.state.lock().unwrap();
            state.closed = true;
            (
                std::mem::take(&mut state.idle),
                std::mem::take(&mut state.waiters),
            )
        };
        for waiter in waiters {
            let _ = waiter.tx.send(Err(PoolError::Closed));
        }
        for session in idle {
            self.spawn_teardown(session);
        }
        info!("session pool closed");
    }

    async fn create_for_caller(&self) -> PoolResult<Session> {
        // The caller's future can be dropped while the factory launch is in
        // flight; the guard gives the reserved slot back in that case.
        let guard = CreationGuard::new(self.clone());
        match self.inner.factory.create().await {
            Ok(driver) => {
                let mut session = Session::new(driver);
                session.mark_in_use();
                {
                    let mut state = self.inner.state.lock().unwrap();
                    state.creating -= 1;
                    state.in_use += 1;
                }
                guard.disarm();
                info!(session = %session.id(), "created browser session");
                Ok(session)
            }
            Err(err) => {
                drop(guard);
                warn!(error = %err, "browser session creation failed");
                Err(PoolError::CreationFailed(err.to_string()))
            }
        }
    }

    /// Hands a session to the oldest live waiter, or parks it on the idle
    /// stack. Waiters that already gave up are skipped.
    fn offer(&self, mut session: Session) {
        let mut state = self.inner.state.lock().unwrap();
        if state.closed {
            drop(state);
            self.spawn_teardown(session);
            return;
        }
        // The pool may have shrunk while this session was out; an excess
        // session is drained instead of idling or serving a waiter.
        if state.occupied() >= state.capacity {
            drop(state);
            debug!(session = %session.id(), "draining session released above capacity");
            self.spawn_teardown(session);
            return;
        }
        loop {
            match state.waiters.pop_front() {
                Some(waiter) => {
                    session.mark_in_use();
                    state.in_use += 1;
                    match waiter.tx.send(Ok(session)) {
                        Ok(()) => return,
                        Err(rejected) => {
                            state.in_use -= 1;
                            match rejected {
                                Ok(returned) => {
                                    session = returned;
                                    session.mark_idle();
                                }
                                // The channel only ever carries Ok grants.
                                Err(_) => return,
                            }
                        }
                    }
                }
                None => {
                    session.mark_idle();
                    state.idle.push(session);
                    return;
                }
            }
        }
    }

    fn cancel_waiter(&self, waiter_id: Uuid) {
        let mut state = self.inner.state.lock().unwrap();
        if let Some(position) = state
            .waiters
            .iter()
            .position(|waiter| waiter.id == waiter_id)
        {
            state.waiters.remove(position);
            debug!("removed elapsed waiter from acquisition queue");
        }
    }

    fn spawn_teardown(&self, mut session: Session) {
        session.mark_draining();
        tokio::spawn(async move {
            session.shutdown().await;
        });
    }

    /// A destroyed session leaves free capacity. Queued acquisitions are
    /// demand, so a replacement launch starts for the head waiter; with an
    /// empty queue the slot is refilled lazily by the next acquire().
    fn spawn_replacement_if_needed(&self) -> bool {
        let should_create = {
            let mut state = self.inner.state.lock().unwrap();
            if !state.closed && !state.waiters.is_empty() && state.occupied() < state.capacity {
                state.creating += 1;
                true
            } else {
                false
            }
        };
        if !should_create {
            return false;
        }
        let pool = self.clone();
        tokio::spawn(async move {
            match pool.inner.factory.create().await {
                Ok(driver) => {
                    {
                        let mut state = pool.inner.state.lock().unwrap();
                        state.creating -= 1;
                    }
                    let session = Session::new(driver);
                    info!(session = %session.id(), "created replacement browser session");
                    pool.offer(session);
                }
                Err(err) => {
                    // Creation failures surface to the waiting caller; the
                    // pool never retries on its own.
                    let waiter = {
                        let mut state = pool.inner.state.lock().unwrap();
                        state.creating -= 1;
                        state.waiters.pop_front()
                    };
                    warn!(error = %err, "replacement session creation failed");
                    if let Some(waiter) = waiter {
                        let _ = waiter
                            .tx
                            .send(Err(PoolError::CreationFailed(err.to_string())));
                    }
                }
            }
        });
        true
    }
}

/// Holds a reserved `creating` slot during a launch awaited by a caller.
/// If the caller's future is dropped mid-launch the guard returns the slot,
/// so a cancelled acquire leaves no trace in the bookkeeping.
struct CreationGuard {
    pool: SessionPool,
    armed: bool,
}

impl CreationGuard {
    fn new(pool: SessionPool) -> Self {
        Self { pool, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CreationGuard {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.pool.inner.state.lock().unwrap();
            state.creating -= 1;
        }
    }
}
