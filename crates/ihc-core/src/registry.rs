// ── Binding and item registries ──
//
// Narrow views onto the host's item model. The engine reads bindings
// fresh on every tick and every subscription, so providers may change
// underneath it at any time.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, PoisonError, RwLock};

use ihc_api::ResourceId;

use crate::model::{ItemBinding, ItemKind};

/// Source of item bindings.
pub trait BindingProvider: Send + Sync {
    /// Current bindings. Called on every tick; must be cheap.
    fn bindings(&self) -> Vec<ItemBinding>;
}

/// Lookup of an item's semantic kind.
pub trait ItemRegistry: Send + Sync {
    /// `None` if the item is unknown or of a kind the engine can't feed.
    fn item_kind(&self, item_name: &str) -> Option<ItemKind>;
}

// ── BindingRegistry ──────────────────────────────────────────────

/// The set of providers the engine iterates.
#[derive(Default)]
pub struct BindingRegistry {
    providers: RwLock<Vec<Arc<dyn BindingProvider>>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_provider(&self, provider: Arc<dyn BindingProvider>) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(provider);
    }

    /// Remove a provider by identity. Returns `false` if it wasn't registered.
    pub fn remove_provider(&self, provider: &Arc<dyn BindingProvider>) -> bool {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = providers.len();
        providers.retain(|p| !Arc::ptr_eq(p, provider));
        providers.len() != before
    }

    /// Snapshot of every binding across all providers.
    pub fn bindings(&self) -> Vec<ItemBinding> {
        // Clone the provider list so no lock is held while providers run.
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        providers.iter().flat_map(|p| p.bindings()).collect()
    }

    /// Distinct resource ids referenced by any binding, ascending.
    pub fn resource_ids(&self) -> Vec<ResourceId> {
        self.bindings()
            .into_iter()
            .map(|b| b.resource_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

// ── StaticProvider ───────────────────────────────────────────────

/// In-memory item table: bindings plus the kind of each bound item.
///
/// Serves as both [`BindingProvider`] and [`ItemRegistry`] for hosts that
/// declare their items up front (configuration files, tests).
#[derive(Debug, Default)]
pub struct StaticProvider {
    items: RwLock<BTreeMap<String, (ItemBinding, ItemKind)>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the binding for `binding.item_name`.
    pub fn insert(&self, binding: ItemBinding, kind: ItemKind) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(binding.item_name.clone(), (binding, kind));
    }

    pub fn remove(&self, item_name: &str) -> Option<ItemBinding> {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(item_name)
            .map(|(binding, _)| binding)
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<(ItemBinding, ItemKind)> for StaticProvider {
    fn from_iter<I: IntoIterator<Item = (ItemBinding, ItemKind)>>(iter: I) -> Self {
        let provider = Self::new();
        for (binding, kind) in iter {
            provider.insert(binding, kind);
        }
        provider
    }
}

impl BindingProvider for StaticProvider {
    fn bindings(&self) -> Vec<ItemBinding> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|(binding, _)| binding.clone())
            .collect()
    }
}

impl ItemRegistry for StaticProvider {
    fn item_kind(&self, item_name: &str) -> Option<ItemKind> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(item_name)
            .map(|(_, kind)| *kind)
    }
}
