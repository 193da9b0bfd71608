//! Canonical serialization for plan fingerprints.
//!
//! Alignment plans, configurations and measure registries are fingerprinted
//! by hashing their canonical JSON with xxh64.
//!
//! ## Determinism Guarantees
//!
//! - Struct fields serialize in declaration order
//! - Vectors serialize in index order
//! - Name sets and maps are BTree collections, never hash maps
//! - Dataset metadata handles are skipped, so a plan hashes the same for
//!   equal metadata loaded twice

use serde::Serialize;
use xxhash_rust::xxh64::xxh64;

/// Serialize a value to canonical JSON bytes for hashing.
///
/// Plan types contain only string-keyed maps, so serialization cannot fail.
pub fn to_canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    serde_json::to_vec(value).expect("plan types serialize to JSON")
}

/// xxh64 of the canonical bytes.
pub fn canonical_hash<T: Serialize>(value: &T) -> u64 {
    xxh64(&to_canonical_bytes(value), 0)
}

/// [`canonical_hash`] as 16 lowercase hex digits.
pub fn canonical_hash_hex<T: Serialize>(value: &T) -> String {
    format!("{:016x}", canonical_hash(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DimensionRange, VariableAssignment};
    use std::collections::BTreeSet;

    #[test]
    fn test_determinism() {
        let range = DimensionRange::new("time", 0, 11, true).unwrap();
        assert_eq!(canonical_hash(&range), canonical_hash(&range.clone()));
        assert_eq!(canonical_hash_hex(&range).len(), 16);
    }

    #[test]
    fn test_set_order_does_not_matter() {
        let forward: BTreeSet<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let backward: BTreeSet<String> = ["c", "b", "a"].iter().map(|s| s.to_string()).collect();
        let a = VariableAssignment::constants_only(forward);
        let b = VariableAssignment::constants_only(backward);
        assert_eq!(canonical_hash(&a), canonical_hash(&b));
    }

    #[test]
    fn test_different_values_differ() {
        let a = DimensionRange::new("time", 0, 11, true).unwrap();
        let b = DimensionRange::new("time", 0, 12, true).unwrap();
        assert_ne!(canonical_hash(&a), canonical_hash(&b));
    }
}
