// Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use ihc_api::sim::SimController;
use ihc_core::{
    BindingConfig, BroadcastPublisher, IhcBinding, ItemBinding, ItemKind, StaticProvider,
};

pub struct Harness {
    pub sim: SimController,
    pub items: Arc<StaticProvider>,
    pub publisher: BroadcastPublisher,
    pub binding: IhcBinding,
}

/// Timings small enough to watch the listeners cycle in real time.
pub fn fast_config() -> BindingConfig {
    BindingConfig {
        refresh_tick: Duration::from_millis(20),
        refresh_enabled: false,
        notification_timeout: Duration::from_millis(50),
        state_change_timeout: Duration::from_millis(50),
        settle_delay: Duration::from_millis(30),
        recovery_backoff: Duration::from_millis(20),
        error_backoff: Duration::from_millis(20),
    }
}

pub fn harness(config: BindingConfig, entries: Vec<(ItemBinding, ItemKind)>) -> Harness {
    harness_with(SimController::connected(), config, entries)
}

pub fn harness_with(
    sim: SimController,
    config: BindingConfig,
    entries: Vec<(ItemBinding, ItemKind)>,
) -> Harness {
    let items: Arc<StaticProvider> = Arc::new(entries.into_iter().collect());
    let publisher = BroadcastPublisher::new();
    let binding = IhcBinding::new(
        config,
        Arc::new(sim.clone()),
        items.clone(),
        Arc::new(publisher.clone()),
    );
    binding.add_provider(items.clone());

    Harness {
        sim,
        items,
        publisher,
        binding,
    }
}

/// Poll `condition` every 10 ms for up to two seconds.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
