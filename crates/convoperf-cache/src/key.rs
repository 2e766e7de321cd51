//! KeyBuilder — deterministic, collision-resistant cache keys for
//! `(operation, normalized parameters, content fingerprint)` tuples (spec
//! §4.2).
//!
//! Per the "Dynamic key-as-string cache" design note, keys are content
//! hashed strings under the hood, but [`CacheKey`] is a strong value type:
//! there is no way to construct one outside this module, which prevents
//! ad-hoc string keys from leaking into [`crate::MemoryCache`].

use std::collections::BTreeMap;
use std::fmt;

/// Maximum length of the textual form of a key, per the spec's `≤200 chars`
/// bound.
const MAX_KEY_LEN: usize = 200;

/// A deterministic, content-addressed cache key.
///
/// Two `CacheKey`s are equal iff they were built from equal normalized
/// inputs, regardless of construction order (spec §8, property 4).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Escape hatch for components that only deal with already-built keys
    /// (e.g. reading one back from a [`crate::Pattern`] sequence). Not
    /// exported outside the crate; callers must go through [`KeyBuilder`].
    pub(crate) fn from_raw(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Simple case-sensitive substring containment, used by
    /// `MemoryCache::invalidate_pattern`.
    pub fn contains(&self, needle: &str) -> bool {
        self.0.contains(needle)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Normalizes query parameters into a stable encoding independent of
/// insertion order: sorted by parameter name, then serialized as
/// `name=value` pairs joined by `&`.
fn normalize_params(params: &BTreeMap<String, serde_json::Value>) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{name}={}", canonical_json(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Canonical (sorted-key) JSON rendering so that object-valued parameters
/// also normalize regardless of field order.
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<&String, &serde_json::Value> = map.iter().collect();
            let inner = sorted
                .iter()
                .map(|(k, v)| format!("\"{k}\":{}", canonical_json(v)))
                .collect::<Vec<_>>()
                .join(",");
            format!("{{{inner}}}")
        }
        serde_json::Value::Array(items) => {
            let inner = items.iter().map(canonical_json).collect::<Vec<_>>().join(",");
            format!("[{inner}]")
        }
        other => other.to_string(),
    }
}

fn digest(input: &str) -> String {
    sha256::digest(input)
}

fn truncated(tag: &str, digest: &str) -> CacheKey {
    let raw = format!("{tag}:{digest}");
    if raw.len() <= MAX_KEY_LEN {
        CacheKey::from_raw(raw)
    } else {
        CacheKey::from_raw(raw[..MAX_KEY_LEN].to_string())
    }
}

/// Builds cache keys. Stateless; every method is a pure function of its
/// inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyBuilder;

impl KeyBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Query key: `key(queryId, sql, params)`.
    ///
    /// Equal `(queryId, sql, params-as-multiset)` tuples always produce
    /// equal keys, independent of the order `params` was constructed in.
    pub fn query_key<I>(&self, query_id: &str, sql: &str, params: I) -> CacheKey
    where
        I: IntoIterator<Item = (String, serde_json::Value)>,
    {
        let normalized: BTreeMap<String, serde_json::Value> = params.into_iter().collect();
        let param_str = normalize_params(&normalized);
        let payload = format!("{query_id}|{sql}|{param_str}");
        truncated(query_id, &digest(&payload))
    }

    /// Content key: `key(operation, content)` — digests arbitrary content,
    /// suitable for memoizing e.g. topic-extraction over message text.
    pub fn content_key(&self, operation: &str, content: &str) -> CacheKey {
        truncated(operation, &digest(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn equal_param_maps_produce_equal_keys_regardless_of_order() {
        let builder = KeyBuilder::new();
        let a = builder.query_key(
            "qA",
            "SELECT 1",
            vec![
                ("x".to_string(), serde_json::json!(1)),
                ("y".to_string(), serde_json::json!("z")),
            ],
        );
        let b = builder.query_key(
            "qA",
            "SELECT 1",
            vec![
                ("y".to_string(), serde_json::json!("z")),
                ("x".to_string(), serde_json::json!(1)),
            ],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn different_sql_produces_different_keys() {
        let builder = KeyBuilder::new();
        let a = builder.query_key("qA", "SELECT 1", std::iter::empty());
        let b = builder.query_key("qA", "SELECT 2", std::iter::empty());
        assert_ne!(a, b);
    }

    #[test]
    fn content_key_is_deterministic() {
        let builder = KeyBuilder::new();
        assert_eq!(
            builder.content_key("topics", "hello world"),
            builder.content_key("topics", "hello world")
        );
        assert_ne!(
            builder.content_key("topics", "hello world"),
            builder.content_key("topics", "hello there")
        );
    }

    #[test]
    fn keys_never_exceed_max_length() {
        let builder = KeyBuilder::new();
        let huge_sql = "SELECT ".to_string() + &"x".repeat(5000);
        let key = builder.query_key("q", &huge_sql, std::iter::empty());
        assert!(key.as_str().len() <= MAX_KEY_LEN);
    }

    proptest! {
        #[test]
        fn determinism_holds_for_arbitrary_param_orderings(
            names in prop::collection::vec("[a-z]{1,8}", 1..6),
            values in prop::collection::vec(0i64..1000, 1..6),
        ) {
            let n = names.len().min(values.len());
            let mut pairs: Vec<(String, serde_json::Value)> = (0..n)
                .map(|i| (names[i].clone(), serde_json::json!(values[i])))
                .collect();
            let builder = KeyBuilder::new();
            let key_a = builder.query_key("q", "SELECT 1", pairs.clone());
            pairs.reverse();
            let key_b = builder.query_key("q", "SELECT 1", pairs);
            prop_assert_eq!(key_a, key_b);
        }
    }
}
