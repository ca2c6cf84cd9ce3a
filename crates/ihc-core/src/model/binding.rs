// ── Item bindings ──

use std::time::Duration;

use strum::{Display, EnumString};

use ihc_api::ResourceId;

/// Semantic category of an item. Decides which wire values it accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ItemKind {
    Number,
    Switch,
    Contact,
    #[strum(serialize = "datetime")]
    DateTime,
    String,
}

/// Association of one item with one controller resource.
///
/// Several bindings may share a resource; updates fan out to all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemBinding {
    pub item_name: String,
    pub resource_id: ResourceId,
    /// Poll period in seconds. `0` means notification-only.
    pub refresh_interval_secs: u32,
    /// The item only ever writes to the controller; inbound values are
    /// never published for it.
    pub out_binding_only: bool,
}

impl ItemBinding {
    /// A notification-only, bidirectional binding.
    pub fn new(item_name: impl Into<String>, resource_id: ResourceId) -> Self {
        Self {
            item_name: item_name.into(),
            resource_id,
            refresh_interval_secs: 0,
            out_binding_only: false,
        }
    }

    pub fn with_refresh(mut self, secs: u32) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    pub fn out_only(mut self) -> Self {
        self.out_binding_only = true;
        self
    }

    /// The poll period, or `None` for notification-only bindings.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0)
            .then(|| Duration::from_secs(u64::from(self.refresh_interval_secs)))
    }
}
