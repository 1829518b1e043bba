use super::naming::{CapabilityIndex, normalize_name};
use super::traits::{Capability, CapabilitySpec};
use std::sync::Arc;

/// Central registry of invocable capabilities, in registration order.
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    capabilities: Vec<Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a capability. Replaces any existing capability whose primary
    /// name normalizes to the same key, keeping its position.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let key = normalize_name(capability.name());
        if let Some(slot) = self
            .capabilities
            .iter_mut()
            .find(|existing| normalize_name(existing.name()) == key)
        {
            *slot = capability;
        } else {
            self.capabilities.push(capability);
        }
    }

    pub fn with(mut self, capability: Arc<dyn Capability>) -> Self {
        self.register(capability);
        self
    }

    /// Remove a capability by primary name. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        let key = normalize_name(name);
        let before = self.capabilities.len();
        self.capabilities
            .retain(|existing| normalize_name(existing.name()) != key);
        self.capabilities.len() != before
    }

    /// Snapshot lookup structure covering primary names and aliases.
    pub fn index(&self) -> CapabilityIndex {
        CapabilityIndex::build(&self.capabilities)
    }

    /// Resolve by name or alias without keeping an index around.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.index().resolve(name).cloned()
    }

    /// Return sorted list of primary capability names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.capabilities.iter().map(|c| c.name()).collect();
        names.sort_unstable();
        names
    }

    pub fn specs(&self) -> Vec<CapabilitySpec> {
        self.capabilities.iter().map(|c| c.spec()).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
