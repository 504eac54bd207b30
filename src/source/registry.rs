//! Registry of live coverage layers.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{CoverageSource, LayerReference, LayerResolver};

/// Owner of coverage sources, keyed by layer id.
///
/// Plays the role of the surrounding project: it owns the sources, resolves
/// persisted references, and reports which ids went away on removal so the
/// caller can forward them to `AtlasEngine::layers_removed`.
#[derive(Default)]
pub struct LayerRegistry {
    layers: BTreeMap<String, Arc<dyn CoverageSource>>,
}

impl LayerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source and return the shared handle.
    pub fn add(&mut self, source: Arc<dyn CoverageSource>) -> Arc<dyn CoverageSource> {
        self.layers.insert(source.layer_id().to_string(), Arc::clone(&source));
        source
    }

    /// Look up a layer by id.
    pub fn get(&self, layer_id: &str) -> Option<Arc<dyn CoverageSource>> {
        self.layers.get(layer_id).cloned()
    }

    /// Remove layers, returning the ids that were present.
    pub fn remove(&mut self, layer_ids: &[&str]) -> Vec<String> {
        layer_ids
            .iter()
            .filter_map(|id| self.layers.remove(*id).map(|_| id.to_string()))
            .collect()
    }

    /// Number of registered layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl LayerResolver for LayerRegistry {
    /// Resolves by id, falling back to a unique name match.
    fn resolve(&self, reference: &LayerReference) -> Option<Arc<dyn CoverageSource>> {
        if let Some(source) = self.layers.get(&reference.id) {
            return Some(Arc::clone(source));
        }
        let mut by_name = self.layers.values().filter(|s| s.layer_name() == reference.name);
        match (by_name.next(), by_name.next()) {
            (Some(only), None) => Some(Arc::clone(only)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemoryCoverageSource;

    #[test]
    fn test_resolve_by_id_then_name() {
        let mut registry = LayerRegistry::new();
        registry.add(Arc::new(InMemoryCoverageSource::new("a1", "Countries")));
        registry.add(Arc::new(InMemoryCoverageSource::new("b2", "Rivers")));

        let by_id = registry.resolve(&LayerReference::new("a1", "whatever")).unwrap();
        assert_eq!(by_id.layer_name(), "Countries");

        let by_name = registry.resolve(&LayerReference::new("gone", "Rivers")).unwrap();
        assert_eq!(by_name.layer_id(), "b2");

        assert!(registry.resolve(&LayerReference::new("gone", "Lakes")).is_none());
    }

    #[test]
    fn test_remove_reports_present_ids() {
        let mut registry = LayerRegistry::new();
        registry.add(Arc::new(InMemoryCoverageSource::new("a1", "Countries")));
        assert_eq!(registry.remove(&["a1", "zz"]), vec!["a1".to_string()]);
        assert!(registry.is_empty());
    }
}
