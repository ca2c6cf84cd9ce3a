//! In-memory controller.
//!
//! [`SimController`] implements [`ConnectionManager`] and hands out
//! sessions that serve values from a local table, queue notifications for
//! subscribed resources, and report a settable lifecycle state. Failures
//! can be injected per operation, and every call is counted so tests can
//! assert on recovery behaviour.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Notify, watch};
use tokio::time::Instant;
use tracing::debug;

use crate::error::Error;
use crate::session::{Communicator, ConnectionManager};
use crate::value::{ControllerState, ResourceId, ResourceValue, Value};

// ── Failure injection ────────────────────────────────────────────

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOperation {
    ResourceQuery,
    EnableNotifications,
    WaitValues,
    QueryState,
    WaitState,
    Connect,
    Reconnect,
    OpenConnection,
}

/// Class of error to inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFailure {
    /// Connection reset; classified as a transport failure.
    Io,
    Timeout,
    /// Refused by the controller; neither timeout nor transport.
    Rejected,
}

impl SimFailure {
    fn into_error(self) -> Error {
        match self {
            Self::Io => Error::Io(std::io::Error::from(std::io::ErrorKind::ConnectionReset)),
            Self::Timeout => Error::Timeout { timeout_secs: 0 },
            Self::Rejected => Error::Rejected {
                message: "simulated rejection".into(),
            },
        }
    }
}

/// Snapshot of how often each operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimCalls {
    pub resource_query: usize,
    pub enable_notifications: usize,
    pub wait_values: usize,
    pub wait_state: usize,
    pub connect: usize,
    pub reconnect: usize,
    pub open_connection: usize,
}

#[derive(Default)]
struct Counters {
    resource_query: AtomicUsize,
    enable_notifications: AtomicUsize,
    wait_values: AtomicUsize,
    wait_state: AtomicUsize,
    connect: AtomicUsize,
    reconnect: AtomicUsize,
    open_connection: AtomicUsize,
}

// ── SimController ────────────────────────────────────────────────

/// Simulated controller and connection manager.
///
/// Cheaply cloneable; all clones share one controller.
#[derive(Clone)]
pub struct SimController {
    inner: Arc<SimInner>,
}

struct SimInner {
    values: Mutex<HashMap<ResourceId, Value>>,
    subscribed: Mutex<HashSet<ResourceId>>,
    subscriptions: Mutex<Vec<Vec<ResourceId>>>,
    pending: Mutex<VecDeque<ResourceValue>>,
    value_notify: Notify,
    state: watch::Sender<ControllerState>,
    connected: AtomicBool,
    last_open: Mutex<Option<DateTime<Utc>>>,
    failures: Mutex<HashMap<SimOperation, VecDeque<SimFailure>>>,
    calls: Counters,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimController {
    /// A disconnected controller in the `Ready` state with no values.
    pub fn new() -> Self {
        let (state, _) = watch::channel(ControllerState::Ready);
        Self {
            inner: Arc::new(SimInner {
                values: Mutex::new(HashMap::new()),
                subscribed: Mutex::new(HashSet::new()),
                subscriptions: Mutex::new(Vec::new()),
                pending: Mutex::new(VecDeque::new()),
                value_notify: Notify::new(),
                state,
                connected: AtomicBool::new(false),
                last_open: Mutex::new(None),
                failures: Mutex::new(HashMap::new()),
                calls: Counters::default(),
            }),
        }
    }

    /// A controller that already has an open session.
    pub fn connected() -> Self {
        let sim = Self::new();
        sim.open_session();
        sim
    }

    /// Store a value. If the resource is subscribed, a notification is
    /// queued and any pending wait returns.
    pub fn set_value(&self, id: ResourceId, value: Value) {
        lock(&self.inner.values).insert(id, value.clone());

        if lock(&self.inner.subscribed).contains(&id) {
            lock(&self.inner.pending).push_back(ResourceValue::new(id, value));
            self.inner.value_notify.notify_waiters();
        }
    }

    /// Change the reported lifecycle state, waking state waiters.
    pub fn set_controller_state(&self, state: ControllerState) {
        self.inner.state.send_replace(state);
    }

    /// Make the next call of `operation` fail with `failure`. Calls queue up.
    pub fn fail_next(&self, operation: SimOperation, failure: SimFailure) {
        lock(&self.inner.failures)
            .entry(operation)
            .or_default()
            .push_back(failure);
    }

    /// Drop the session. `communicator()` returns `None` until the next
    /// successful `connect`/`reconnect`.
    pub fn drop_session(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        lock(&self.inner.subscribed).clear();
    }

    pub fn calls(&self) -> SimCalls {
        let c = &self.inner.calls;
        SimCalls {
            resource_query: c.resource_query.load(Ordering::SeqCst),
            enable_notifications: c.enable_notifications.load(Ordering::SeqCst),
            wait_values: c.wait_values.load(Ordering::SeqCst),
            wait_state: c.wait_state.load(Ordering::SeqCst),
            connect: c.connect.load(Ordering::SeqCst),
            reconnect: c.reconnect.load(Ordering::SeqCst),
            open_connection: c.open_connection.load(Ordering::SeqCst),
        }
    }

    /// Every id list passed to `enable_runtime_value_notifications`, oldest first.
    pub fn subscriptions(&self) -> Vec<Vec<ResourceId>> {
        lock(&self.inner.subscriptions).clone()
    }

    fn open_session(&self) {
        debug!("simulated session opened");
        self.inner.connected.store(true, Ordering::SeqCst);
        lock(&self.inner.subscribed).clear();
        *lock(&self.inner.last_open) = Some(Utc::now());
    }

    fn injected(&self, operation: SimOperation) -> Result<(), Error> {
        let failure = lock(&self.inner.failures)
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);
        match failure {
            Some(f) => {
                debug!(?operation, failure = ?f, "injecting simulated failure");
                Err(f.into_error())
            }
            None => Ok(()),
        }
    }
}

impl Default for SimController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionManager for SimController {
    fn communicator(&self) -> Option<Arc<dyn Communicator>> {
        if self.inner.connected.load(Ordering::SeqCst) {
            Some(Arc::new(SimSession { sim: self.clone() }))
        } else {
            None
        }
    }

    async fn connect(&self) -> Result<(), Error> {
        self.inner.calls.connect.fetch_add(1, Ordering::SeqCst);
        self.injected(SimOperation::Connect)?;
        self.open_session();
        Ok(())
    }

    async fn reconnect(&self) -> Result<(), Error> {
        self.inner.calls.reconnect.fetch_add(1, Ordering::SeqCst);
        self.injected(SimOperation::Reconnect)?;
        self.open_session();
        Ok(())
    }

    async fn open_connection(&self) -> Result<(), Error> {
        self.inner.calls.open_connection.fetch_add(1, Ordering::SeqCst);
        self.injected(SimOperation::OpenConnection)?;
        self.open_session();
        Ok(())
    }

    fn last_open_time(&self) -> Option<DateTime<Utc>> {
        *lock(&self.inner.last_open)
    }
}

// ── SimSession ───────────────────────────────────────────────────

struct SimSession {
    sim: SimController,
}

impl SimSession {
    fn take_pending(&self) -> Vec<ResourceValue> {
        lock(&self.sim.inner.pending).drain(..).collect()
    }
}

#[async_trait]
impl Communicator for SimSession {
    async fn resource_query(&self, id: ResourceId) -> Result<Option<ResourceValue>, Error> {
        self.sim.inner.calls.resource_query.fetch_add(1, Ordering::SeqCst);
        self.sim.injected(SimOperation::ResourceQuery)?;
        let value = lock(&self.sim.inner.values).get(&id).cloned();
        Ok(value.map(|v| ResourceValue::new(id, v)))
    }

    async fn enable_runtime_value_notifications(&self, ids: &[ResourceId]) -> Result<(), Error> {
        self.sim
            .inner
            .calls
            .enable_notifications
            .fetch_add(1, Ordering::SeqCst);
        self.sim.injected(SimOperation::EnableNotifications)?;
        *lock(&self.sim.inner.subscribed) = ids.iter().copied().collect();
        lock(&self.sim.inner.subscriptions).push(ids.to_vec());
        Ok(())
    }

    async fn wait_resource_value_notifications(
        &self,
        timeout: Duration,
    ) -> Result<Vec<ResourceValue>, Error> {
        self.sim.inner.calls.wait_values.fetch_add(1, Ordering::SeqCst);
        self.sim.injected(SimOperation::WaitValues)?;

        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a concurrent
            // `set_value` cannot slip between check and wait.
            let notified = self.sim.inner.value_notify.notified();
            let batch = self.take_pending();
            if !batch.is_empty() {
                return Ok(batch);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    async fn query_controller_state(&self) -> Result<ControllerState, Error> {
        self.sim.injected(SimOperation::QueryState)?;
        Ok(self.sim.inner.state.borrow().clone())
    }

    async fn wait_state_change_notifications(
        &self,
        prior: &ControllerState,
        timeout: Duration,
    ) -> Result<ControllerState, Error> {
        self.sim.inner.calls.wait_state.fetch_add(1, Ordering::SeqCst);
        self.sim.injected(SimOperation::WaitState)?;

        let mut rx = self.sim.inner.state.subscribe();
        let deadline = Instant::now() + timeout;
        loop {
            let current = rx.borrow_and_update().clone();
            if current != *prior {
                return Ok(current);
            }
            match tokio::time::timeout_at(deadline, rx.changed()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => return Ok(current),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_controller_has_no_session() {
        let sim = SimController::new();
        assert!(sim.communicator().is_none());

        sim.connect().await.unwrap();
        assert!(sim.communicator().is_some());
        assert!(sim.last_open_time().is_some());
    }

    #[tokio::test]
    async fn query_returns_stored_value() {
        let sim = SimController::connected();
        sim.set_value(7, Value::Integer(42));

        let session = sim.communicator().unwrap();
        let value = session.resource_query(7).await.unwrap();
        assert_eq!(value, Some(ResourceValue::new(7, Value::Integer(42))));
        assert_eq!(session.resource_query(8).await.unwrap(), None);
        assert_eq!(sim.calls().resource_query, 2);
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let sim = SimController::connected();
        sim.fail_next(SimOperation::ResourceQuery, SimFailure::Io);
        sim.fail_next(SimOperation::ResourceQuery, SimFailure::Rejected);

        let session = sim.communicator().unwrap();
        assert!(session.resource_query(1).await.unwrap_err().is_transport());
        let second = session.resource_query(1).await.unwrap_err();
        assert!(!second.is_transport() && !second.is_timeout());
        assert!(session.resource_query(1).await.is_ok());
    }

    #[tokio::test]
    async fn only_subscribed_resources_notify() {
        let sim = SimController::connected();
        let session = sim.communicator().unwrap();
        session.enable_runtime_value_notifications(&[1]).await.unwrap();

        sim.set_value(2, Value::Boolean(true));
        sim.set_value(1, Value::Boolean(false));

        let batch = session
            .wait_resource_value_notifications(Duration::from_millis(50))
            .await
            .unwrap();
        assert_eq!(batch, vec![ResourceValue::new(1, Value::Boolean(false))]);
        assert_eq!(sim.subscriptions(), vec![vec![1]]);
    }

    #[tokio::test(start_paused = true)]
    async fn value_wait_times_out_empty() {
        let sim = SimController::connected();
        let session = sim.communicator().unwrap();

        let batch = session
            .wait_resource_value_notifications(Duration::from_secs(10))
            .await
            .unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn state_wait_returns_on_change() {
        let sim = SimController::connected();
        let session = sim.communicator().unwrap();

        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                session
                    .wait_state_change_notifications(&ControllerState::Ready, Duration::from_secs(10))
                    .await
            })
        };
        tokio::task::yield_now().await;
        sim.set_controller_state(ControllerState::Initialize);

        let state = waiter.await.unwrap().unwrap();
        assert_eq!(state, ControllerState::Initialize);
    }

    #[tokio::test]
    async fn reopened_session_loses_subscriptions() {
        let sim = SimController::connected();
        let session = sim.communicator().unwrap();
        session.enable_runtime_value_notifications(&[1]).await.unwrap();

        sim.open_connection().await.unwrap();
        sim.set_value(1, Value::Integer(3));

        let batch = session
            .wait_resource_value_notifications(Duration::from_millis(20))
            .await
            .unwrap();
        assert!(batch.is_empty());
    }
}
