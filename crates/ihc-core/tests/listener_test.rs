// Integration tests for the background tasks of a started binding:
// value notifications, controller state tracking and the refresh timer.
// These run in real time with millisecond timings.
#![allow(clippy::unwrap_used)]

mod common;

use std::time::{Duration, Instant};

use pretty_assertions::assert_eq;

use ihc_api::sim::{SimController, SimFailure, SimOperation};
use ihc_api::{ConnectionManager, ControllerState, Value};
use ihc_core::{BindingConfig, ItemBinding, ItemKind, ListenerPhase, UpdateSource};

use common::{eventually, fast_config, harness, harness_with};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

fn item(name: &str, id: i32, kind: ItemKind) -> (ItemBinding, ItemKind) {
    (ItemBinding::new(name, id), kind)
}

// ── Lifecycle ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_start_twice_is_rejected_and_stop_is_idempotent() {
    let h = harness(fast_config(), Vec::new());

    h.binding.start().await.unwrap();
    assert!(h.binding.is_running().await);
    assert!(h.binding.start().await.is_err());

    h.binding.stop().await;
    h.binding.stop().await;
    assert!(!h.binding.is_running().await);
    assert_eq!(*h.binding.listener_phase().borrow(), ListenerPhase::Stopped);

    // A stopped binding can be started again.
    h.binding.start().await.unwrap();
    h.binding.stop().await;
}

#[tokio::test]
async fn test_listener_reaches_listening_phase() {
    let h = harness(fast_config(), vec![item("light", 1, ItemKind::Switch)]);
    let mut phase = h.binding.listener_phase();

    h.binding.start().await.unwrap();
    let reached = tokio::time::timeout(
        RECV_TIMEOUT,
        phase.wait_for(|p| *p == ListenerPhase::Listening),
    )
    .await
    .is_ok_and(|r| r.is_ok());
    assert!(reached);

    h.binding.stop().await;
}

// ── Value notifications ─────────────────────────────────────────────

#[tokio::test]
async fn test_subscribes_after_settle_and_publishes_notifications() {
    let h = harness(
        fast_config(),
        vec![
            item("light", 12, ItemKind::Switch),
            item("temp", 3, ItemKind::Number),
        ],
    );
    let mut rx = h.publisher.subscribe();

    h.binding.start().await.unwrap();
    assert!(eventually(|| !h.sim.subscriptions().is_empty()).await);
    assert_eq!(h.sim.subscriptions(), vec![vec![3, 12]]);

    h.sim.set_value(12, Value::Boolean(true));
    let update = tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.item_name, "light");
    assert_eq!(update.state.to_string(), "ON");
    assert_eq!(update.source, UpdateSource::Notification);

    h.binding.stop().await;
}

#[tokio::test]
async fn test_out_only_binding_ignores_notifications() {
    let h = harness(
        fast_config(),
        vec![
            (ItemBinding::new("command", 5).out_only(), ItemKind::Switch),
            item("feedback", 6, ItemKind::Switch),
        ],
    );
    let mut rx = h.publisher.subscribe();

    h.binding.start().await.unwrap();
    assert!(eventually(|| !h.sim.subscriptions().is_empty()).await);

    h.sim.set_value(5, Value::Boolean(true));
    h.sim.set_value(6, Value::Boolean(false));

    let update = tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.item_name, "feedback");

    h.binding.stop().await;
}

#[tokio::test]
async fn test_configuration_change_resubscribes() {
    let h = harness(fast_config(), vec![item("light", 1, ItemKind::Switch)]);

    h.binding.start().await.unwrap();
    assert!(eventually(|| h.sim.subscriptions().len() == 1).await);

    h.items
        .insert(ItemBinding::new("door", 2), ItemKind::Contact);
    h.binding.binding_changed("door");

    assert!(eventually(|| h.sim.subscriptions().len() == 2).await);
    assert_eq!(h.sim.subscriptions()[1], vec![1, 2]);

    h.binding.stop().await;
}

#[tokio::test]
async fn test_rapid_configuration_changes_subscribe_once() {
    let settle = Duration::from_millis(150);
    let config = BindingConfig {
        settle_delay: settle,
        ..fast_config()
    };
    let h = harness(config, vec![item("light", 1, ItemKind::Switch)]);

    h.binding.start().await.unwrap();
    assert!(eventually(|| h.sim.subscriptions().len() == 1).await);

    h.binding.binding_changed("light");
    tokio::time::sleep(Duration::from_millis(40)).await;
    let last_change = Instant::now();
    h.binding.binding_changed("light");

    assert!(eventually(|| h.sim.subscriptions().len() == 2).await);
    assert!(last_change.elapsed() >= settle);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(h.sim.subscriptions().len(), 2);

    h.binding.stop().await;
}

#[tokio::test]
async fn test_new_session_resubscribes() {
    let h = harness(fast_config(), vec![item("light", 1, ItemKind::Switch)]);

    h.binding.start().await.unwrap();
    assert!(eventually(|| h.sim.subscriptions().len() == 1).await);

    // Someone else (e.g. the state listener) opened a new session.
    h.sim.reconnect().await.unwrap();
    assert!(eventually(|| h.sim.subscriptions().len() == 2).await);

    h.binding.stop().await;
}

#[tokio::test]
async fn test_empty_binding_set_never_subscribes() {
    let h = harness(fast_config(), Vec::new());

    h.binding.start().await.unwrap();
    assert!(eventually(|| h.sim.calls().wait_values > 0).await);
    assert_eq!(h.sim.calls().enable_notifications, 0);

    h.binding.stop().await;
}

#[tokio::test]
async fn test_transport_failure_reopens_and_resubscribes() {
    let h = harness(fast_config(), vec![item("light", 1, ItemKind::Switch)]);
    h.sim.fail_next(SimOperation::WaitValues, SimFailure::Io);

    h.binding.start().await.unwrap();
    assert!(eventually(|| h.sim.subscriptions().len() >= 2).await);
    assert_eq!(h.sim.calls().open_connection, 1);

    h.binding.stop().await;
}

#[tokio::test]
async fn test_failed_recovery_backs_off_and_retries() {
    let h = harness(fast_config(), vec![item("light", 1, ItemKind::Switch)]);
    h.sim.fail_next(SimOperation::WaitValues, SimFailure::Io);
    h.sim.fail_next(SimOperation::OpenConnection, SimFailure::Io);

    h.binding.start().await.unwrap();
    assert!(eventually(|| h.sim.subscriptions().len() >= 2).await);
    assert_eq!(h.sim.calls().open_connection, 1);

    h.binding.stop().await;
}

#[tokio::test]
async fn test_missing_session_waits_for_connection() {
    let h = harness_with(
        SimController::new(),
        fast_config(),
        vec![item("light", 1, ItemKind::Switch)],
    );

    h.binding.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(h.sim.subscriptions().is_empty());

    h.sim.connect().await.unwrap();
    assert!(eventually(|| h.sim.subscriptions().len() == 1).await);

    h.binding.stop().await;
}

// ── Controller state ────────────────────────────────────────────────

#[tokio::test]
async fn test_controller_restart_triggers_connect() {
    let h = harness(fast_config(), Vec::new());
    let state = h.binding.controller_state();

    h.binding.start().await.unwrap();
    assert!(eventually(|| *state.borrow() == Some(ControllerState::Ready)).await);

    h.sim.set_controller_state(ControllerState::Initialize);
    assert!(eventually(|| *state.borrow() == Some(ControllerState::Initialize)).await);
    assert_eq!(h.sim.calls().connect, 0);

    h.sim.set_controller_state(ControllerState::Ready);
    assert!(eventually(|| h.sim.calls().connect == 1).await);
    assert_eq!(*state.borrow(), Some(ControllerState::Ready));

    h.binding.stop().await;
}

#[tokio::test]
async fn test_rejected_restart_connect_is_retried() {
    let h = harness(fast_config(), Vec::new());
    let state = h.binding.controller_state();
    h.sim.fail_next(SimOperation::Connect, SimFailure::Rejected);

    h.binding.start().await.unwrap();
    assert!(eventually(|| *state.borrow() == Some(ControllerState::Ready)).await);

    h.sim.set_controller_state(ControllerState::Initialize);
    assert!(eventually(|| *state.borrow() == Some(ControllerState::Initialize)).await);

    h.sim.set_controller_state(ControllerState::Ready);
    assert!(eventually(|| h.sim.calls().connect == 2).await);

    // Once connected, the held state is Ready and nothing fires again.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(h.sim.calls().connect, 2);
    assert_eq!(h.sim.calls().reconnect, 0);

    h.binding.stop().await;
}

#[tokio::test]
async fn test_state_wait_transport_failure_reconnects() {
    let h = harness(fast_config(), Vec::new());
    h.sim.fail_next(SimOperation::WaitState, SimFailure::Io);

    h.binding.start().await.unwrap();
    assert!(eventually(|| h.sim.calls().reconnect >= 1).await);

    h.binding.stop().await;
}

// ── Refresh timer ───────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_task_polls_when_enabled() {
    let config = BindingConfig {
        refresh_enabled: true,
        ..fast_config()
    };
    let h = harness(
        config,
        vec![(ItemBinding::new("temp", 100).with_refresh(60), ItemKind::Number)],
    );
    let mut rx = h.publisher.subscribe();
    h.sim.set_value(100, Value::Integer(19));

    h.binding.start().await.unwrap();
    let update = tokio::time::timeout(RECV_TIMEOUT, rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(update.source, UpdateSource::Poll);
    assert_eq!(update.state.to_string(), "19");

    // Several ticks later the 60 s interval still holds.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(h.sim.calls().resource_query, 1);

    h.binding.stop().await;
}
