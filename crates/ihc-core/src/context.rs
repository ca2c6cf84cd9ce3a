// ── Shared engine context ──
//
// Explicit dependency bundle handed to the scheduler and both listeners
// instead of process-wide singletons.

use std::sync::Arc;

use ihc_api::{ConnectionManager, Value};

use crate::config::BindingConfig;
use crate::convert::convert;
use crate::error::CoreError;
use crate::model::{ItemBinding, ItemUpdate, State, UpdateSource};
use crate::publisher::EventPublisher;
use crate::registry::{BindingRegistry, ItemRegistry};
use crate::store::CoordinationState;

pub(crate) struct Context {
    pub(crate) config: BindingConfig,
    pub(crate) connection: Arc<dyn ConnectionManager>,
    pub(crate) registry: Arc<BindingRegistry>,
    pub(crate) items: Arc<dyn ItemRegistry>,
    pub(crate) publisher: Arc<dyn EventPublisher>,
    pub(crate) coordination: Arc<CoordinationState>,
}

impl Context {
    /// Convert `value` for the item behind `binding` and post it.
    pub(crate) fn publish(
        &self,
        binding: &ItemBinding,
        value: &Value,
        source: UpdateSource,
    ) -> Result<State, CoreError> {
        let kind = self
            .items
            .item_kind(&binding.item_name)
            .ok_or_else(|| CoreError::ItemNotFound {
                item: binding.item_name.clone(),
            })?;
        let state = convert(kind, value)?;

        self.publisher.post_update(ItemUpdate {
            item_name: binding.item_name.clone(),
            state: state.clone(),
            source,
        });
        Ok(state)
    }
}
