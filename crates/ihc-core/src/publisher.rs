// ── Event publishing ──
//
// The engine only writes item state; it never reads it back.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::model::ItemUpdate;

const UPDATE_CHANNEL_SIZE: usize = 256;

/// Sink for converted item updates (the host's event bus).
pub trait EventPublisher: Send + Sync {
    fn post_update(&self, update: ItemUpdate);
}

/// [`EventPublisher`] backed by a `broadcast` channel.
///
/// Cheaply cloneable. Updates posted while nobody is subscribed are
/// dropped; slow subscribers see `RecvError::Lagged`.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<Arc<ItemUpdate>>,
}

impl BroadcastPublisher {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(UPDATE_CHANNEL_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<ItemUpdate>> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn post_update(&self, update: ItemUpdate) {
        // No subscribers is not an error.
        let _ = self.tx.send(Arc::new(update));
    }
}
