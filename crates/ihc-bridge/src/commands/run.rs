//! `run`: drive the binding engine and print every item update.
//!
//! Only the in-memory controller is wired up here. It is seeded with one
//! value per bound resource and then changes one resource at a time, so
//! both the poll path and the notification path produce traffic.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use ihc_api::sim::SimController;
use ihc_api::{ConnectionManager, ResourceId, Value};
use ihc_config::ItemEntry;
use ihc_core::{BroadcastPublisher, CoreError, IhcBinding, ItemKind, ItemUpdate};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if !args.simulate {
        return Err(CliError::NoTransport);
    }

    let (config, path) = super::load(global)?;
    let items = Arc::new(
        config
            .item_table()
            .map_err(|e| CliError::from_config(e, &path))?,
    );

    let mut driver = ValueDriver::new(&config.items);
    let sim = SimController::new();
    driver.seed(&sim);
    sim.connect().await.map_err(CoreError::from)?;

    let publisher = BroadcastPublisher::new();
    let mut updates = publisher.subscribe();
    let binding = IhcBinding::new(
        config.binding_config(),
        Arc::new(sim.clone()),
        items.clone(),
        Arc::new(publisher),
    );
    binding.add_provider(items);
    binding.start().await?;
    info!(
        items = config.items.len(),
        resources = driver.len(),
        "bindings running against simulated controller"
    );

    let mut changes = tokio::time::interval(Duration::from_millis(args.change_every.max(1)));
    changes.set_missed_tick_behavior(MissedTickBehavior::Delay);
    changes.tick().await;

    let stop = shutdown_signal(args.duration);
    tokio::pin!(stop);

    loop {
        tokio::select! {
            () = &mut stop => break,
            _ = changes.tick() => driver.step(&sim),
            update = updates.recv() => match update {
                Ok(update) => print_update(&update, global.quiet),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "update stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    binding.stop().await;
    Ok(())
}

async fn shutdown_signal(duration: Option<u64>) {
    match duration {
        Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
        None => {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "could not listen for ctrl-c, stopping");
            }
        }
    }
}

fn print_update(update: &ItemUpdate, quiet: bool) {
    info!(item = %update.item_name, state = %update.state, source = %update.source, "item updated");
    output::print_output(
        &format!(
            "{:<12} {} = {}",
            update.source, update.item_name, update.state
        ),
        quiet,
    );
}

// ── Simulated value changes ─────────────────────────────────────────

/// Round-robin source of plausible values, one entry per resource.
struct ValueDriver {
    resources: Vec<(ResourceId, ItemKind)>,
    step: u32,
}

impl ValueDriver {
    fn new(items: &[ItemEntry]) -> Self {
        let mut seen = HashSet::new();
        let resources = items
            .iter()
            .filter(|item| seen.insert(item.resource))
            .filter_map(|item| item.item_kind().ok().map(|kind| (item.resource, kind)))
            .collect();
        Self { resources, step: 0 }
    }

    fn len(&self) -> usize {
        self.resources.len()
    }

    fn seed(&self, sim: &SimController) {
        for (id, kind) in &self.resources {
            sim.set_value(*id, sample_value(*kind, 0));
        }
    }

    fn step(&mut self, sim: &SimController) {
        if self.resources.is_empty() {
            return;
        }
        self.step = self.step.wrapping_add(1);
        let index = usize::try_from(self.step).unwrap_or_default() % self.resources.len();
        if let Some((id, kind)) = self.resources.get(index) {
            sim.set_value(*id, sample_value(*kind, self.step));
        }
    }
}

fn sample_value(kind: ItemKind, n: u32) -> Value {
    match kind {
        ItemKind::Number => Value::FloatingPoint(20.0 + f64::from(n % 20) * 0.25),
        ItemKind::Switch | ItemKind::Contact => Value::Boolean(n % 2 == 1),
        ItemKind::DateTime => Value::Time {
            hours: (n / 3600) % 24,
            minutes: (n / 60) % 60,
            seconds: n % 60,
        },
        ItemKind::String => Value::Enum {
            name: match n % 3 {
                0 => "Off",
                1 => "Low",
                _ => "High",
            }
            .into(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, resource: ResourceId, kind: &str) -> ItemEntry {
        ItemEntry {
            name: name.into(),
            resource,
            kind: kind.into(),
            refresh: 0,
            out_only: false,
        }
    }

    #[test]
    fn driver_dedups_resources() {
        let driver = ValueDriver::new(&[
            entry("a", 1, "switch"),
            entry("b", 1, "contact"),
            entry("c", 2, "number"),
        ]);
        assert_eq!(driver.len(), 2);
    }

    #[test]
    fn sample_values_convert_for_their_kind() {
        for kind in [
            ItemKind::Number,
            ItemKind::Switch,
            ItemKind::Contact,
            ItemKind::DateTime,
            ItemKind::String,
        ] {
            for n in [0, 1, 59, 3601] {
                assert!(ihc_core::convert(kind, &sample_value(kind, n)).is_ok());
            }
        }
    }
}
