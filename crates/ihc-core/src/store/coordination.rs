// ── Shared coordination state ──
//
// The only mutable data the scheduler and the listeners share. Nothing
// here is ever held across a controller call.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Timestamps shared between the refresh scheduler, the notification
/// listener and configuration callbacks.
#[derive(Default)]
pub struct CoordinationState {
    /// Item name → time of the last poll attempt. Written by the
    /// scheduler only, but pruned while configuration callbacks run.
    last_update: DashMap<String, DateTime<Utc>>,
    /// Epoch milliseconds of the last configuration change; 0 = never.
    last_configuration_change: AtomicI64,
}

impl CoordinationState {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Poll bookkeeping ─────────────────────────────────────────────

    pub fn last_update(&self, item_name: &str) -> Option<DateTime<Utc>> {
        self.last_update.get(item_name).map(|entry| *entry)
    }

    /// Record a poll attempt. Timestamps are clamped to
    /// `[UNIX_EPOCH, now]`.
    pub fn mark_updated(&self, item_name: &str, at: DateTime<Utc>) {
        let at = at.clamp(DateTime::<Utc>::default(), Utc::now());
        self.last_update.insert(item_name.to_owned(), at);
    }

    /// Drop bookkeeping for items that are no longer bound.
    pub fn retain_items(&self, live: &HashSet<String>) {
        self.last_update.retain(|name, _| live.contains(name));
    }

    pub fn tracked_items(&self) -> usize {
        self.last_update.len()
    }

    // ── Configuration changes ────────────────────────────────────────

    /// Note that bindings or binding configuration changed just now.
    pub fn touch_configuration_change(&self) {
        self.touch_configuration_change_at(Utc::now());
    }

    /// Note a configuration change at `at`. Never moves backwards.
    pub fn touch_configuration_change_at(&self, at: DateTime<Utc>) {
        self.last_configuration_change
            .fetch_max(at.timestamp_millis(), Ordering::SeqCst);
    }

    pub fn last_configuration_change(&self) -> Option<DateTime<Utc>> {
        match self.last_configuration_change.load(Ordering::SeqCst) {
            0 => None,
            millis => DateTime::from_timestamp_millis(millis),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn unknown_items_have_no_timestamp() {
        let state = CoordinationState::new();
        assert_eq!(state.last_update("Light"), None);
        assert_eq!(state.last_configuration_change(), None);
    }

    #[test]
    fn future_timestamps_are_clamped_to_now() {
        let state = CoordinationState::new();
        let future = Utc::now() + TimeDelta::hours(1);
        state.mark_updated("Light", future);

        assert!(state.last_update("Light").unwrap() <= Utc::now());
    }

    #[test]
    fn pre_epoch_timestamps_are_clamped_to_epoch() {
        let state = CoordinationState::new();
        let past = DateTime::from_timestamp(-3600, 0).unwrap();
        state.mark_updated("Light", past);

        assert_eq!(state.last_update("Light").unwrap().timestamp(), 0);
    }

    #[test]
    fn configuration_change_time_is_monotonic() {
        let state = CoordinationState::new();
        let now = Utc::now();
        state.touch_configuration_change_at(now);
        state.touch_configuration_change_at(now - TimeDelta::seconds(10));

        assert_eq!(
            state.last_configuration_change().unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
    }

    #[test]
    fn retain_drops_unbound_items() {
        let state = CoordinationState::new();
        state.mark_updated("a", Utc::now());
        state.mark_updated("b", Utc::now());

        state.retain_items(&HashSet::from(["a".to_owned()]));
        assert_eq!(state.tracked_items(), 1);
        assert!(state.last_update("b").is_none());
    }
}
