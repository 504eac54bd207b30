//! Feature key sorter.
//!
//! Orders feature identifiers by externally supplied sort keys.
//!
//! ## Ordering Rules
//!
//! 1. Null keys come first, in both directions
//! 2. Non-null keys compare with [`Value::total_cmp`]; descending reverses only this step
//! 3. Equal keys keep source iteration order (the sort is stable)

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::types::{FeatureId, Value};

/// Sort key per feature, built once per requery.
pub type SortKeys = BTreeMap<FeatureId, Value>;

/// Compare two sort keys under the null-first rule.
pub fn compare_sort_keys(a: &Value, b: &Value, ascending: bool) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => {
            let ord = a.total_cmp(b);
            if ascending {
                ord
            } else {
                ord.reverse()
            }
        }
    }
}

/// Stable sort of arbitrary items by an extracted key.
pub fn sort_by_key<T, F>(items: &mut [T], ascending: bool, key: F)
where
    F: Fn(&T) -> &Value,
{
    items.sort_by(|a, b| compare_sort_keys(key(a), key(b), ascending));
}

/// Sorter over feature identifiers.
#[derive(Debug, Clone, Copy)]
pub struct FeatureKeySorter {
    ascending: bool,
}

impl FeatureKeySorter {
    /// Create a sorter.
    pub fn new(ascending: bool) -> Self {
        Self { ascending }
    }

    /// Whether the sorter orders ascending.
    pub fn ascending(&self) -> bool {
        self.ascending
    }

    /// Sort identifiers given in source order. Missing keys count as null.
    pub fn sort(&self, ids: &mut [FeatureId], keys: &SortKeys) {
        static NULL: Value = Value::Null;
        let mut keyed: Vec<(FeatureId, &Value)> = ids
            .iter()
            .map(|id| (*id, keys.get(id).unwrap_or(&NULL)))
            .collect();
        sort_by_key(&mut keyed, self.ascending, |entry| entry.1);
        for (slot, (id, _)) in ids.iter_mut().zip(keyed) {
            *slot = id;
        }
    }
}
