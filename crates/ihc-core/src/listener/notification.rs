// ── Value notification listener ──
//
// Orders runtime value notifications for every bound resource, then
// long-polls for changed values and publishes them. Subscriptions are
// (re)issued after a configuration change has settled, or after the
// connection manager opened a new session.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ihc_api::{Communicator, ResourceValue};

use super::backoff;
use crate::context::Context;
use crate::model::UpdateSource;

/// Observable phase of the notification listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ListenerPhase {
    /// Not running.
    Stopped,
    /// A configuration change is younger than the settle delay.
    WaitingForConfigSettle,
    /// Ordering notifications for the current resource set.
    Subscribing,
    /// Long-polling for value notifications.
    Listening,
}

/// Timestamps the subscription decision is made from.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Marks {
    pub(crate) configuration_change: Option<DateTime<Utc>>,
    pub(crate) last_open: Option<DateTime<Utc>>,
    pub(crate) last_order: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Plan {
    pub(crate) ready: bool,
    pub(crate) subscribe: bool,
}

impl Plan {
    fn phase(self) -> ListenerPhase {
        match (self.ready, self.subscribe) {
            (false, _) => ListenerPhase::WaitingForConfigSettle,
            (true, true) => ListenerPhase::Subscribing,
            (true, false) => ListenerPhase::Listening,
        }
    }
}

/// Decide whether the listener may proceed and whether it must re-order
/// notifications first.
///
/// A configuration change newer than the last order drops readiness until
/// it is at least `settle` old; a session opened after the last order
/// forces a re-order on its own. An order that never happened counts as
/// the epoch.
pub(crate) fn plan(marks: Marks, ready: bool, settle: TimeDelta, now: DateTime<Utc>) -> Plan {
    let order = marks.last_order.unwrap_or_default();
    let mut plan = Plan {
        ready,
        subscribe: false,
    };

    if let Some(changed) = marks.configuration_change.filter(|c| *c > order) {
        plan.ready = false;
        if now.signed_duration_since(changed) >= settle {
            plan.ready = true;
            plan.subscribe = true;
        }
    }

    if marks.last_open.is_some_and(|opened| opened > order) {
        plan.subscribe = true;
    }

    plan
}

pub(crate) struct NotificationListener {
    ctx: Arc<Context>,
    phase: Arc<watch::Sender<ListenerPhase>>,
    cancel: CancellationToken,
    ready: bool,
    last_order: Option<DateTime<Utc>>,
}

impl NotificationListener {
    pub(crate) fn new(
        ctx: Arc<Context>,
        phase: Arc<watch::Sender<ListenerPhase>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx,
            phase,
            cancel,
            ready: false,
            last_order: None,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("value notification listener started");
        let settle = TimeDelta::from_std(self.ctx.config.settle_delay).unwrap_or(TimeDelta::MAX);

        while !self.cancel.is_cancelled() {
            let marks = Marks {
                configuration_change: self.ctx.coordination.last_configuration_change(),
                last_open: self.ctx.connection.last_open_time(),
                last_order: self.last_order,
            };
            let plan = plan(marks, self.ready, settle, Utc::now());
            self.ready = plan.ready;
            self.set_phase(plan.phase());

            if !plan.ready {
                debug!("waiting for configuration to settle");
                if !backoff(&self.cancel, self.ctx.config.settle_delay).await {
                    break;
                }
                continue;
            }

            self.listen(plan.subscribe).await;
        }

        self.set_phase(ListenerPhase::Stopped);
        info!("value notification listener stopped");
    }

    async fn listen(&mut self, subscribe: bool) {
        let Some(session) = self.ctx.connection.communicator() else {
            warn!("no controller session, notification wait skipped");
            backoff(&self.cancel, self.ctx.config.error_backoff).await;
            return;
        };

        match self.subscribe_and_wait(&session, subscribe).await {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                debug!("notification wait timed out");
            }
            Err(e) if e.is_transport() => {
                error!(error = %e, "notification wait failed, reopening connection");
                if let Err(e) = self.recover().await {
                    error!(error = %e, "connection recovery failed");
                    self.last_order = None;
                    backoff(&self.cancel, self.ctx.config.recovery_backoff).await;
                }
            }
            Err(e) => {
                error!(error = %e, "notification listener error");
                backoff(&self.cancel, self.ctx.config.error_backoff).await;
            }
        }
    }

    async fn subscribe_and_wait(
        &mut self,
        session: &Arc<dyn Communicator>,
        subscribe: bool,
    ) -> Result<(), ihc_api::Error> {
        if subscribe {
            self.order_notifications(session).await?;
            self.set_phase(ListenerPhase::Listening);
        }

        let timeout = self.ctx.config.notification_timeout;
        let values = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(()),
            result = session.wait_resource_value_notifications(timeout) => result?,
        };

        if !values.is_empty() {
            debug!(count = values.len(), "value notifications received");
            self.dispatch(&values);
        }
        Ok(())
    }

    async fn order_notifications(
        &mut self,
        session: &Arc<dyn Communicator>,
    ) -> Result<(), ihc_api::Error> {
        let ids = self.ctx.registry.resource_ids();
        if ids.is_empty() {
            debug!("no bound resources, nothing to order");
            return Ok(());
        }

        info!(resources = ids.len(), "ordering runtime value notifications");
        session.enable_runtime_value_notifications(&ids).await?;
        self.last_order = Some(Utc::now());
        Ok(())
    }

    /// Open a fresh session and re-order on it.
    async fn recover(&mut self) -> Result<(), ihc_api::Error> {
        self.ctx.connection.open_connection().await?;
        let session = self
            .ctx
            .connection
            .communicator()
            .ok_or(ihc_api::Error::ConnectionClosed)?;
        self.order_notifications(&session).await
    }

    fn dispatch(&self, values: &[ResourceValue]) {
        let bindings = self.ctx.registry.bindings();

        for value in values {
            for binding in bindings
                .iter()
                .filter(|b| b.resource_id == value.resource_id)
            {
                if binding.out_binding_only {
                    debug!(item = %binding.item_name, "out-only binding, notification ignored");
                    continue;
                }
                if let Err(e) = self
                    .ctx
                    .publish(binding, &value.value, UpdateSource::Notification)
                {
                    error!(
                        item = %binding.item_name,
                        resource_id = value.resource_id,
                        error = %e,
                        "notification could not be published"
                    );
                }
            }
        }
    }

    fn set_phase(&self, phase: ListenerPhase) {
        self.phase.send_if_modified(|current| {
            if *current == phase {
                return false;
            }
            *current = phase;
            true
        });
    }
}
