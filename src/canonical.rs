//! Canonical serialization for page-sequence fingerprints.
//!
//! Two requeries over the same configuration and the same source data must
//! produce byte-identical canonical forms, so fingerprints can be compared
//! to detect whether the addressable set actually changed.
//!
//! - Struct fields serialize in declaration order
//! - Vec order is preserved
//! - Maps in hashed data must be BTreeMap

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Types hashed here have no fallible `Serialize` impls (no non-string map
/// keys), so a failure means a programming error.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("canonical serialization of plain data cannot fail")
}

/// Compute canonical hash of a serializable value.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// Compute canonical hash and return as hex string.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_determinism() {
        let pages = vec![(1_i64, "North".to_string()), (2, "South".to_string())];
        assert_eq!(canonical_hash(&pages), canonical_hash(&pages.clone()));
    }

    #[test]
    fn test_order_sensitive() {
        let a = vec![1_i64, 2, 3];
        let b = vec![3_i64, 2, 1];
        assert_ne!(canonical_hash_hex(&a), canonical_hash_hex(&b));
    }

    #[test]
    fn test_btreemap_insertion_order_irrelevant() {
        let mut a = BTreeMap::new();
        a.insert("x", 1);
        a.insert("y", 2);
        let mut b = BTreeMap::new();
        b.insert("y", 2);
        b.insert("x", 1);
        assert_eq!(canonical_hash_hex(&a), canonical_hash_hex(&b));
    }
}
