// ── Controller state listener ──
//
// Long-polls the controller's operational state. A controller leaving
// `Initialize` or arriving at `Ready` has restarted its program, which
// invalidates the session, so the connection manager is asked to connect
// again.

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use ihc_api::{Communicator, ControllerState};

use super::backoff;
use crate::context::Context;

/// Whether a transition from `prior` to `current` calls for a fresh
/// connection.
pub(crate) fn requires_reconnect(prior: &ControllerState, current: &ControllerState) -> bool {
    prior != current
        && (*prior == ControllerState::Initialize || *current == ControllerState::Ready)
}

pub(crate) struct ControllerStateListener {
    ctx: Arc<Context>,
    state: Arc<watch::Sender<Option<ControllerState>>>,
    cancel: CancellationToken,
    held: Option<ControllerState>,
}

impl ControllerStateListener {
    pub(crate) fn new(
        ctx: Arc<Context>,
        state: Arc<watch::Sender<Option<ControllerState>>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx,
            state,
            cancel,
            held: None,
        }
    }

    pub(crate) async fn run(mut self) {
        info!("controller state listener started");

        while !self.cancel.is_cancelled() {
            let Some(session) = self.ctx.connection.communicator() else {
                warn!("no controller session, state wait skipped");
                backoff(&self.cancel, self.ctx.config.error_backoff).await;
                continue;
            };

            match self.observe(&session).await {
                Ok(()) => {}
                Err(e) if e.is_timeout() => {
                    debug!("controller state wait timed out");
                }
                Err(e) if e.is_transport() => {
                    error!(error = %e, "controller state wait failed, reconnecting");
                    if let Err(e) = self.ctx.connection.reconnect().await {
                        error!(error = %e, "reconnect failed");
                        backoff(&self.cancel, self.ctx.config.recovery_backoff).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "controller state listener error");
                    backoff(&self.cancel, self.ctx.config.error_backoff).await;
                }
            }
        }

        info!("controller state listener stopped");
    }

    async fn observe(&mut self, session: &Arc<dyn Communicator>) -> Result<(), ihc_api::Error> {
        let held = match &self.held {
            Some(state) => state.clone(),
            None => {
                let initial = session.query_controller_state().await?;
                info!(state = %initial, "controller state");
                self.remember(initial.clone());
                initial
            }
        };

        let timeout = self.ctx.config.state_change_timeout;
        let current = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Ok(()),
            result = session.wait_state_change_notifications(&held, timeout) => result?,
        };

        if current == held {
            return Ok(());
        }

        info!(from = %held, to = %current, "controller state changed");
        self.state.send_replace(Some(current.clone()));

        // The held state only advances once the reconnect went through, so
        // a failed connect is attempted again on the next pass.
        if requires_reconnect(&held, &current) {
            info!("controller restarted, reconnecting");
            self.ctx.connection.connect().await?;
        }
        self.held = Some(current);
        Ok(())
    }

    fn remember(&mut self, state: ControllerState) {
        self.held = Some(state.clone());
        self.state.send_replace(Some(state));
    }
}
