//! Page and page sequence types.
//!
//! A [`PageSequence`] is the addressable set produced by one requery. It is
//! built together with its sort-key mapping and position index and is never
//! mutated afterwards; a new requery replaces it as a whole.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::canonical::canonical_hash_hex;
use super::feature::FeatureId;
use super::value::Value;

/// One addressable atlas page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Feature bound to this page.
    pub feature_id: FeatureId,
    /// Resolved page name.
    pub name: String,
}

/// Ordered, immutable sequence of pages.
#[derive(Debug, Clone, Default)]
pub struct PageSequence {
    pages: Vec<Page>,
    /// Sort key per feature, empty when sorting was disabled.
    sort_keys: BTreeMap<FeatureId, Value>,
    positions: HashMap<FeatureId, usize>,
    fingerprint: String,
}

impl PageSequence {
    /// Create an empty sequence.
    pub fn empty() -> Self {
        Self::new(Vec::new(), BTreeMap::new())
    }

    /// Build a sequence from ordered pages and the sort keys used to order them.
    pub fn new(pages: Vec<Page>, sort_keys: BTreeMap<FeatureId, Value>) -> Self {
        let positions = pages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.feature_id, i))
            .collect();
        let fingerprint = canonical_hash_hex(&pages);
        Self {
            pages,
            sort_keys,
            positions,
            fingerprint,
        }
    }

    /// Copy of this sequence with new page names, same ids and order.
    pub(crate) fn renamed(&self, names: Vec<String>) -> Self {
        let pages = self
            .pages
            .iter()
            .zip(names)
            .map(|(p, name)| Page { feature_id: p.feature_id, name })
            .collect();
        Self::new(pages, self.sort_keys.clone())
    }

    /// Number of pages.
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Check if the sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Page at a 0-based index.
    pub fn get(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// All pages in order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Feature identifiers in page order.
    pub fn feature_ids(&self) -> Vec<FeatureId> {
        self.pages.iter().map(|p| p.feature_id).collect()
    }

    /// Position of a feature in the sequence.
    pub fn position_of(&self, id: FeatureId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// Sort key computed for a feature during the requery that built this sequence.
    pub fn sort_key(&self, id: FeatureId) -> Option<&Value> {
        self.sort_keys.get(&id)
    }

    /// Canonical fingerprint of the (id, name) list.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl PartialEq for PageSequence {
    fn eq(&self, other: &Self) -> bool {
        self.pages == other.pages
    }
}
