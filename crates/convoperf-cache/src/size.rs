//! SizeEstimator — a pure, deterministic byte-footprint estimator used only
//! for eviction accounting. It need not be exact, but must be deterministic
//! for a given artifact shape and monotone in cardinality (spec §4.1).

/// Conservative fallback returned when an artifact cannot be sized (e.g. a
/// serialization failure). Matches the "Exception-as-control-flow" design
/// note: failure yields a `Result`-shaped default, never a thrown
/// exception, and the cache accounting never depends on it.
pub const FALLBACK_SIZE_BYTES: usize = 1024;

/// Fixed per-entry bookkeeping overhead attributed to every cached value,
/// independent of its serialized payload (map bucket, key, metadata).
const CONTAINER_OVERHEAD_BYTES: usize = 96;

/// Estimate the in-memory footprint of an artifact in bytes.
///
/// The estimate is derived from the artifact's JSON serialization length.
/// This is not an exact accounting of heap usage, but it is deterministic
/// for a given artifact shape (the same logical value always serializes to
/// the same length) and monotone in cardinality (a superset collection
/// serializes to a string at least as long as any of its subsets).
pub fn estimate<V: serde::Serialize>(artifact: &V) -> usize {
    match serde_json::to_vec(artifact) {
        Ok(bytes) => (bytes.len() + CONTAINER_OVERHEAD_BYTES).max(1),
        Err(err) => {
            tracing::warn!(error = %err, "size estimation failed, using conservative fallback");
            FALLBACK_SIZE_BYTES
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn estimate_is_positive_and_includes_overhead() {
        let bytes = estimate(&json!({"a": 1}));
        assert!(bytes >= CONTAINER_OVERHEAD_BYTES);
    }

    #[test]
    fn estimate_is_deterministic() {
        let value = json!({"id": "c1", "messages": [1, 2, 3]});
        assert_eq!(estimate(&value), estimate(&value));
    }

    #[test]
    fn estimate_is_monotone_in_cardinality() {
        let small = json!({"items": [1, 2]});
        let large = json!({"items": [1, 2, 3, 4, 5, 6, 7, 8]});
        assert!(estimate(&large) > estimate(&small));
    }

    #[test]
    fn estimate_never_returns_zero() {
        assert!(estimate(&json!(null)) > 0);
    }
}
