// ── Binding engine ──
//
// Owns the refresh scheduler and both listeners, and fans configuration
// callbacks from the host into the shared coordination state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ihc_api::{ConnectionManager, ControllerState};

use crate::config::BindingConfig;
use crate::context::Context;
use crate::error::CoreError;
use crate::listener::ListenerPhase;
use crate::listener::controller_state::ControllerStateListener;
use crate::listener::notification::NotificationListener;
use crate::publisher::EventPublisher;
use crate::registry::{BindingProvider, BindingRegistry, ItemRegistry};
use crate::scheduler::{RefreshScheduler, TickSummary, refresh_task};
use crate::store::CoordinationState;

/// The main entry point for hosts.
///
/// Cheaply cloneable via `Arc<BindingInner>`. Construction does nothing
/// on the network; [`start()`](Self::start) spawns the background tasks
/// and [`stop()`](Self::stop) joins them again.
#[derive(Clone)]
pub struct IhcBinding {
    inner: Arc<BindingInner>,
}

struct BindingInner {
    ctx: Arc<Context>,
    scheduler: RefreshScheduler,
    listener_phase: Arc<watch::Sender<ListenerPhase>>,
    controller_state: Arc<watch::Sender<Option<ControllerState>>>,
    cancel: Mutex<Option<CancellationToken>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl IhcBinding {
    pub fn new(
        config: BindingConfig,
        connection: Arc<dyn ConnectionManager>,
        items: Arc<dyn ItemRegistry>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let ctx = Arc::new(Context {
            config,
            connection,
            registry: Arc::new(BindingRegistry::new()),
            items,
            publisher,
            coordination: Arc::new(CoordinationState::new()),
        });
        let (listener_phase, _) = watch::channel(ListenerPhase::Stopped);
        let (controller_state, _) = watch::channel(None);

        Self {
            inner: Arc::new(BindingInner {
                scheduler: RefreshScheduler::new(Arc::clone(&ctx)),
                ctx,
                listener_phase: Arc::new(listener_phase),
                controller_state: Arc::new(controller_state),
                cancel: Mutex::new(None),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &BindingConfig {
        &self.inner.ctx.config
    }

    pub fn registry(&self) -> &Arc<BindingRegistry> {
        &self.inner.ctx.registry
    }

    pub fn coordination(&self) -> &Arc<CoordinationState> {
        &self.inner.ctx.coordination
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Spawn the refresh task (if enabled) and both listeners.
    ///
    /// Counts as a configuration change, so notifications are ordered
    /// once the settle delay has passed.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut cancel_slot = self.inner.cancel.lock().await;
        if cancel_slot.is_some() {
            return Err(CoreError::Config {
                message: "binding already started".into(),
            });
        }

        let cancel = CancellationToken::new();
        let ctx = &self.inner.ctx;
        ctx.coordination.touch_configuration_change();

        let mut handles = self.inner.task_handles.lock().await;

        if ctx.config.refresh_enabled {
            handles.push(tokio::spawn(refresh_task(
                self.inner.scheduler.clone(),
                ctx.config.refresh_tick,
                cancel.clone(),
            )));
        }

        let notifications = NotificationListener::new(
            Arc::clone(ctx),
            Arc::clone(&self.inner.listener_phase),
            cancel.clone(),
        );
        handles.push(tokio::spawn(notifications.run()));

        let states = ControllerStateListener::new(
            Arc::clone(ctx),
            Arc::clone(&self.inner.controller_state),
            cancel.clone(),
        );
        handles.push(tokio::spawn(states.run()));

        *cancel_slot = Some(cancel);
        info!(
            refresh = ctx.config.refresh_enabled,
            "binding started"
        );
        Ok(())
    }

    /// Cancel the background tasks and wait for them to finish. A no-op
    /// when not started.
    pub async fn stop(&self) {
        let Some(cancel) = self.inner.cancel.lock().await.take() else {
            return;
        };
        cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        info!("binding stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.cancel.lock().await.is_some()
    }

    // ── Refresh ──────────────────────────────────────────────────

    /// Run one scheduler tick now. Hosts that disable the internal
    /// refresh task drive polling through this.
    pub async fn refresh_now(&self) -> TickSummary {
        self.inner.scheduler.tick_at(Utc::now()).await
    }

    /// Run one scheduler tick as of `now`. Times past the wall clock are
    /// treated as the wall clock.
    pub async fn refresh_at(&self, now: DateTime<Utc>) -> TickSummary {
        self.inner.scheduler.tick_at(now).await
    }

    // ── Configuration callbacks ──────────────────────────────────

    pub fn add_provider(&self, provider: Arc<dyn BindingProvider>) {
        self.registry().add_provider(provider);
        self.configuration_updated();
    }

    pub fn remove_provider(&self, provider: &Arc<dyn BindingProvider>) -> bool {
        let removed = self.registry().remove_provider(provider);
        if removed {
            self.configuration_updated();
        }
        removed
    }

    /// The host's configuration changed as a whole.
    pub fn configuration_updated(&self) {
        debug!("configuration updated");
        self.coordination().touch_configuration_change();
    }

    /// One item's binding changed.
    pub fn binding_changed(&self, item_name: &str) {
        debug!(item = item_name, "binding changed");
        self.coordination().touch_configuration_change();
    }

    // ── State observation ────────────────────────────────────────

    pub fn listener_phase(&self) -> watch::Receiver<ListenerPhase> {
        self.inner.listener_phase.subscribe()
    }

    /// Last controller state seen by the state listener; `None` until
    /// the first query succeeds.
    pub fn controller_state(&self) -> watch::Receiver<Option<ControllerState>> {
        self.inner.controller_state.subscribe()
    }
}
