use crate::capabilities::Capability;
use std::collections::HashMap;
use std::sync::Arc;

/// Canonical form used wherever a capability name is matched: lower-cased,
/// with all whitespace and underscores removed.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized name/alias → capability, built once per execution.
#[derive(Clone, Default)]
pub struct CapabilityIndex {
    entries: HashMap<String, Arc<dyn Capability>>,
}

impl CapabilityIndex {
    /// Primary names are indexed before aliases, so an alias never shadows
    /// another capability's primary name. Otherwise the first entry wins.
    pub fn build<'a, I>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = &'a Arc<dyn Capability>>,
        I::IntoIter: Clone,
    {
        let capabilities = capabilities.into_iter();
        let mut entries: HashMap<String, Arc<dyn Capability>> = HashMap::new();

        for capability in capabilities.clone() {
            entries
                .entry(normalize_name(capability.name()))
                .or_insert_with(|| Arc::clone(capability));
        }
        for capability in capabilities {
            for alias in capability.aliases() {
                entries
                    .entry(normalize_name(&alias))
                    .or_insert_with(|| Arc::clone(capability));
            }
        }

        Self { entries }
    }

    pub fn resolve(&self, name: &str) -> Option<&Arc<dyn Capability>> {
        self.entries.get(&normalize_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
