#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use browserd_core::config::PoolSection;
use browserd_core::driver::{DriverError, DriverResult, SessionDriver, SessionFactory};

/// Scripted behaviour for one executed command.
#[derive(Clone)]
pub enum FakeBehavior {
    Succeed(Value),
    /// Clean command failure; the session stays usable.
    Fail(&'static str),
    /// Transport failure; the session must be drained.
    Crash(&'static str),
    /// Never completes until the executor abandons it.
    Hang,
    Delay(Duration, Value),
}

/// Observation handle for one created driver, shared with the test body.
#[derive(Clone, Default)]
pub struct DriverHandle {
    pub alive: Arc<AtomicBool>,
    pub terminated: Arc<AtomicBool>,
    pub executed: Arc<AtomicUsize>,
    pub probes: Arc<AtomicUsize>,
}

pub struct FakeDriver {
    behaviors: Mutex<VecDeque<FakeBehavior>>,
    default: FakeBehavior,
    handle: DriverHandle,
}

impl FakeDriver {
    pub fn new(default: FakeBehavior, script: Vec<FakeBehavior>) -> (Self, DriverHandle) {
        let handle = DriverHandle::default();
        handle.alive.store(true, Ordering::SeqCst);
        let driver = Self {
            behaviors: Mutex::new(script.into()),
            default,
            handle: handle.clone(),
        };
        (driver, handle)
    }
}

#[async_trait]
impl SessionDriver for FakeDriver {
    async fn execute(&self, _command: &Value) -> DriverResult<Value> {
        self.handle.executed.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default.clone());
        match behavior {
            FakeBehavior::Succeed(value) => Ok(value),
            FakeBehavior::Fail(detail) => Err(DriverError::Command(detail.into())),
            FakeBehavior::Crash(detail) => Err(DriverError::Transport(detail.into())),
            FakeBehavior::Hang => {
                futures::future::pending::<()>().await;
                unreachable!()
            }
            FakeBehavior::Delay(duration, value) => {
                tokio::time::sleep(duration).await;
                Ok(value)
            }
        }
    }

    async fn terminate(&mut self) -> DriverResult<()> {
        self.handle.terminated.store(true, Ordering::SeqCst);
        self.handle.alive.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn is_alive(&self) -> bool {
        self.handle.probes.fetch_add(1, Ordering::SeqCst);
        self.handle.alive.load(Ordering::SeqCst)
    }
}

pub struct FakeFactory {
    default: FakeBehavior,
    scripts: Mutex<VecDeque<Vec<FakeBehavior>>>,
    pub fail_creation: AtomicBool,
    pub created: AtomicUsize,
    handles: Mutex<Vec<DriverHandle>>,
    create_delay: Mutex<Option<Duration>>,
}

impl FakeFactory {
    pub fn new(default: FakeBehavior) -> Arc<Self> {
        Arc::new(Self {
            default,
            scripts: Mutex::new(VecDeque::new()),
            fail_creation: AtomicBool::new(false),
            created: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
            create_delay: Mutex::new(None),
        })
    }

    /// Makes every subsequent creation take this long, like a slow browser
    /// launch.
    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub fn clear_create_delay(&self) {
        *self.create_delay.lock().unwrap() = None;
    }

    pub fn ok() -> Arc<Self> {
        Self::new(FakeBehavior::Succeed(json!({ "ok": true })))
    }

    /// Queues a behaviour script consumed by the next created driver.
    pub fn push_script(&self, script: Vec<FakeBehavior>) {
        self.scripts.lock().unwrap().push_back(script);
    }

    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Handle for the nth created driver.
    pub fn handle(&self, index: usize) -> DriverHandle {
        self.handles.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    async fn create(&self) -> DriverResult<Box<dyn SessionDriver>> {
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_creation.load(Ordering::SeqCst) {
            return Err(DriverError::Launch("browser process did not start".into()));
        }
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
        let (driver, handle) = FakeDriver::new(self.default.clone(), script);
        self.handles.lock().unwrap().push(handle);
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(driver))
    }
}

pub fn pool_section(capacity: usize) -> PoolSection {
    PoolSection {
        capacity,
        ..PoolSection::default()
    }
}

/// Lets spawned tasks and teardowns run to their next await point.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
