// ── Refresh scheduler ──
//
// Polls resources whose bindings ask for a refresh interval. One tick
// walks every binding, queries the stale ones and publishes the result.
// Ticks never overlap and never surface errors: each item's outcome is
// logged and the tick moves on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use ihc_api::Communicator;

use crate::context::Context;
use crate::error::CoreError;
use crate::model::{ItemBinding, UpdateSource};

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// No session was available; nothing was attempted.
    pub skipped: bool,
    /// Items whose interval had elapsed.
    pub due: usize,
    /// Items whose value was converted and published.
    pub published: usize,
    /// Items whose query, conversion or lookup failed.
    pub failed: usize,
}

#[derive(Clone)]
pub(crate) struct RefreshScheduler {
    ctx: Arc<Context>,
}

impl RefreshScheduler {
    pub(crate) fn new(ctx: Arc<Context>) -> Self {
        Self { ctx }
    }

    /// Run one tick as of `now`.
    ///
    /// `now` is clamped to `[UNIX_EPOCH, wall clock]` up front, the same
    /// way poll stamps are, so the due check and the stamp agree.
    pub(crate) async fn tick_at(&self, now: DateTime<Utc>) -> TickSummary {
        let now = now.clamp(DateTime::<Utc>::default(), Utc::now());
        let mut summary = TickSummary::default();

        let Some(session) = self.ctx.connection.communicator() else {
            warn!("no controller session, refresh cycle skipped");
            summary.skipped = true;
            return summary;
        };

        let bindings = self.ctx.registry.bindings();
        let live: HashSet<String> = bindings.iter().map(|b| b.item_name.clone()).collect();
        self.ctx.coordination.retain_items(&live);

        for binding in &bindings {
            let Some(interval) = binding.refresh_interval() else {
                continue;
            };
            let last = self.ctx.coordination.last_update(&binding.item_name);
            if !is_due(last, interval, now) {
                continue;
            }

            summary.due += 1;
            debug!(item = %binding.item_name, resource_id = binding.resource_id, "refreshing item");

            match self.refresh_item(&session, binding).await {
                Ok(true) => summary.published += 1,
                Ok(false) => {
                    debug!(item = %binding.item_name, "controller returned no value");
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(item = %binding.item_name, error = %e, "item refresh failed");
                }
            }

            // Stamp even on failure so a broken resource waits a full
            // interval before the next attempt.
            self.ctx.coordination.mark_updated(&binding.item_name, now);
        }

        if summary.due > 0 {
            debug!(
                due = summary.due,
                published = summary.published,
                failed = summary.failed,
                "refresh cycle complete"
            );
        }
        summary
    }

    /// Query one resource and publish it. Transport failures get exactly
    /// one retry after a reconnect.
    async fn refresh_item(
        &self,
        session: &Arc<dyn Communicator>,
        binding: &ItemBinding,
    ) -> Result<bool, CoreError> {
        let value = match session.resource_query(binding.resource_id).await {
            Ok(value) => value,
            Err(e) if e.is_transport() => {
                warn!(
                    item = %binding.item_name,
                    error = %e,
                    "value could not be read from controller, retrying once"
                );
                self.ctx.connection.reconnect().await?;
                let session = self
                    .ctx
                    .connection
                    .communicator()
                    .ok_or(CoreError::ControllerUnavailable)?;
                session.resource_query(binding.resource_id).await?
            }
            Err(e) => return Err(e.into()),
        };

        let Some(value) = value else {
            return Ok(false);
        };
        self.ctx.publish(binding, &value.value, UpdateSource::Poll)?;
        Ok(true)
    }
}

/// An item is due once its interval has fully elapsed since the last
/// attempt. Never-polled items count from the epoch.
fn is_due(last: Option<DateTime<Utc>>, interval: Duration, now: DateTime<Utc>) -> bool {
    let age = now.signed_duration_since(last.unwrap_or_default());
    TimeDelta::from_std(interval).is_ok_and(|interval| age >= interval)
}

/// Drive the scheduler from an internal timer until cancelled.
pub(crate) async fn refresh_task(
    scheduler: RefreshScheduler,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = scheduler.tick_at(Utc::now()) => {}
                }
            }
        }
    }
    debug!("refresh task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap_or_default()
    }

    #[test]
    fn never_polled_items_are_due() {
        assert!(is_due(None, Duration::from_secs(3600), at(0)));
    }

    #[test]
    fn due_exactly_when_interval_elapsed() {
        let interval = Duration::from_secs(60);
        assert!(!is_due(Some(at(0)), interval, at(59)));
        assert!(is_due(Some(at(0)), interval, at(60)));
        assert!(is_due(Some(at(0)), interval, at(61)));
    }

    #[test]
    fn clock_going_backwards_is_not_due() {
        assert!(!is_due(Some(at(100)), Duration::from_secs(1), at(50)));
    }
}
