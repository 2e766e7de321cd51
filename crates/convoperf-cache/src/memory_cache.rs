//! MemoryCache — a bounded, TTL-aware associative store with approximate
//! LRU+frequency eviction and per-key hit/miss counters (spec §4.3).

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::key::CacheKey;
use crate::size::estimate;

/// A single stored artifact plus the bookkeeping the eviction policy and
/// TTL check need.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub insertion_time_ms: i64,
    pub ttl_ms: i64,
    pub hits: u64,
    pub size_bytes: usize,
}

impl<V> CacheEntry<V> {
    /// Eviction score: `insertionTime + hits * 1000` (ms units). Lower
    /// scores are evicted first. One hit is worth exactly 1 simulated
    /// second of additional freshness — an explicit, reproducible rule,
    /// not a tuning knob.
    fn score(&self) -> i64 {
        self.insertion_time_ms + self.hits as i64 * 1000
    }

    fn is_live(&self, now_ms: i64) -> bool {
        now_ms - self.insertion_time_ms <= self.ttl_ms
    }
}

/// Per-key hit/miss counters. Persist for the lifetime of the cache, even
/// across eviction of the underlying entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessStat {
    pub hits: u64,
    pub misses: u64,
}

impl AccessStat {
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Outcome reported to an optional [`CacheObserver`] on every `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Hit,
    Miss,
    MissExpired,
}

/// Observer hook so callers (e.g. `PatternLearner`) can be notified of
/// every cache access without `MemoryCache` depending on them directly.
pub trait CacheObserver: Send + Sync {
    fn on_access(&self, key: &CacheKey, kind: AccessKind);
}

/// Whether `set` actually stored the value. `Rejected` only occurs when a
/// single artifact's estimated size exceeds `max_bytes` outright — no
/// amount of eviction can make room for it. Per §4.3, this is not an error;
/// the caller treats the cache as disabled for that key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    Inserted,
    Rejected,
}

#[derive(Debug, Clone)]
pub struct PerKeyStat {
    pub hit_rate: f64,
    pub requests: u64,
}

#[derive(Debug, Clone)]
pub struct CacheStatsSnapshot {
    pub entries: usize,
    pub bytes: usize,
    pub per_key: HashMap<CacheKey, PerKeyStat>,
}

/// Bounded, TTL-aware associative store.
///
/// Concurrency: the entry map is a [`DashMap`] (sharded locking); the
/// aggregate byte counter is a single [`parking_lot::Mutex`] updated in the
/// same critical section as entry insertion/removal so `Σ entry.size ==
/// currentMemoryUsage` holds at every observable instant (spec §8,
/// property 1).
pub struct MemoryCache<V: Clone + Send + Sync + 'static, C: Clock = SystemClock> {
    entries: DashMap<CacheKey, CacheEntry<V>>,
    access_stats: DashMap<CacheKey, AccessStat>,
    usage_bytes: Mutex<usize>,
    max_bytes: usize,
    default_ttl_ms: i64,
    clock: Arc<C>,
}

impl<V: Clone + serde::Serialize + Send + Sync + 'static> MemoryCache<V, SystemClock> {
    pub fn new(max_bytes: usize, default_ttl_ms: i64) -> Self {
        Self::with_clock(max_bytes, default_ttl_ms, Arc::new(SystemClock::new()))
    }
}

impl<V: Clone + serde::Serialize + Send + Sync + 'static, C: Clock> MemoryCache<V, C> {
    pub fn with_clock(max_bytes: usize, default_ttl_ms: i64, clock: Arc<C>) -> Self {
        Self {
            entries: DashMap::new(),
            access_stats: DashMap::new(),
            usage_bytes: Mutex::new(0),
            max_bytes,
            default_ttl_ms,
            clock,
        }
    }

    pub fn default_ttl_ms(&self) -> i64 {
        self.default_ttl_ms
    }

    /// Read a value, recording the outcome and notifying `observer` if
    /// given. An expired entry is deleted and counted as a miss, never
    /// returned.
    pub fn get(&self, key: &CacheKey, observer: Option<&dyn CacheObserver>) -> Option<V> {
        let now = self.clock.now_millis();

        let mut expired = false;
        let hit_value = if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.is_live(now) {
                entry.hits += 1;
                Some(entry.value.clone())
            } else {
                expired = true;
                None
            }
        } else {
            None
        };

        if expired {
            if let Some((_, entry)) = self.entries.remove(key) {
                *self.usage_bytes.lock() -= entry.size_bytes;
            }
            self.record(key, AccessKind::MissExpired);
            if let Some(obs) = observer {
                obs.on_access(key, AccessKind::MissExpired);
            }
            return None;
        }

        match hit_value {
            Some(value) => {
                self.record(key, AccessKind::Hit);
                if let Some(obs) = observer {
                    obs.on_access(key, AccessKind::Hit);
                }
                Some(value)
            }
            None => {
                self.record(key, AccessKind::Miss);
                if let Some(obs) = observer {
                    obs.on_access(key, AccessKind::Miss);
                }
                None
            }
        }
    }

    fn record(&self, key: &CacheKey, kind: AccessKind) {
        let mut stat = self.access_stats.entry(key.clone()).or_default();
        match kind {
            AccessKind::Hit => stat.hits += 1,
            AccessKind::Miss | AccessKind::MissExpired => stat.misses += 1,
        }
    }

    /// Insert `value` under `key`, evicting lower-scored entries until
    /// enough space is freed. Returns [`SetOutcome::Rejected`] only if the
    /// single value alone exceeds `max_bytes`.
    pub fn set(&self, key: CacheKey, value: V, ttl_ms: i64) -> SetOutcome {
        let size = estimate(&value);
        if size > self.max_bytes {
            tracing::warn!(key = %key, size, max_bytes = self.max_bytes, "artifact exceeds cache capacity, skipping cache for this key");
            return SetOutcome::Rejected;
        }

        self.evict_until_fits(size, Some(&key));

        let now = self.clock.now_millis();
        let entry = CacheEntry {
            value,
            insertion_time_ms: now,
            ttl_ms,
            hits: 0,
            size_bytes: size,
        };

        let mut usage = self.usage_bytes.lock();
        if let Some(old) = self.entries.insert(key, entry) {
            *usage -= old.size_bytes;
        }
        *usage += size;
        SetOutcome::Inserted
    }

    /// Evict lowest-scored entries (ascending `score`, ties broken by
    /// iteration order) until at least `needed` bytes are free, or the
    /// cache is empty. `protect` is excluded from eviction consideration
    /// (used when overwriting an existing key in place).
    fn evict_until_fits(&self, needed: usize, protect: Option<&CacheKey>) {
        loop {
            let used = *self.usage_bytes.lock();
            if used + needed <= self.max_bytes {
                return;
            }

            let victim = self
                .entries
                .iter()
                .filter(|e| protect.map_or(true, |p| e.key() != p))
                .min_by_key(|e| e.value().score())
                .map(|e| e.key().clone());

            match victim {
                Some(victim_key) => {
                    if let Some((_, entry)) = self.entries.remove(&victim_key) {
                        *self.usage_bytes.lock() -= entry.size_bytes;
                    }
                }
                None => return, // nothing left to evict; caller's insert may still exceed max_bytes
            }
        }
    }

    /// Remove all entries whose key contains `substring` (simple
    /// case-sensitive containment). O(n).
    pub fn invalidate_pattern(&self, substring: &str) -> usize {
        let victims: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|e| e.key().contains(substring))
            .map(|e| e.key().clone())
            .collect();

        for key in &victims {
            if let Some((_, entry)) = self.entries.remove(key) {
                *self.usage_bytes.lock() -= entry.size_bytes;
            }
        }
        victims.len()
    }

    pub fn current_memory_usage(&self) -> usize {
        *self.usage_bytes.lock()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_live(&self, key: &CacheKey) -> bool {
        let now = self.clock.now_millis();
        self.entries.get(key).map_or(false, |e| e.is_live(now))
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        let per_key = self
            .access_stats
            .iter()
            .map(|e| {
                (
                    e.key().clone(),
                    PerKeyStat {
                        hit_rate: e.value().hit_rate(),
                        requests: e.value().requests(),
                    },
                )
            })
            .collect();

        CacheStatsSnapshot {
            entries: self.entries.len(),
            bytes: self.current_memory_usage(),
            per_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::key::KeyBuilder;
    use serde_json::json;

    fn key(s: &str) -> CacheKey {
        KeyBuilder::new().content_key("test", s)
    }

    #[test]
    fn ttl_expiry_deletes_and_reports_miss() {
        let clock = Arc::new(ManualClock::new(0));
        let cache: MemoryCache<serde_json::Value, ManualClock> =
            MemoryCache::with_clock(1_000_000, 100, clock.clone());
        let k = key("a");
        cache.set(k.clone(), json!("v"), 100);
        assert_eq!(cache.get(&k, None), Some(json!("v")));

        clock.advance(101);
        assert_eq!(cache.get(&k, None), None);
        assert!(!cache.contains_live(&k));
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn cache_accounting_matches_sum_of_entry_sizes() {
        let cache: MemoryCache<serde_json::Value> = MemoryCache::new(1_000_000, 60_000);
        for i in 0..20 {
            cache.set(key(&format!("k{i}")), json!({"i": i}), 60_000);
        }
        let sum: usize = cache
            .entries
            .iter()
            .map(|e| e.value().size_bytes)
            .sum();
        assert_eq!(sum, cache.current_memory_usage());
        assert!(cache.current_memory_usage() <= 1_000_000);
    }

    #[test]
    fn eviction_prefers_fewer_hits_at_equal_insertion_time() {
        let clock = Arc::new(ManualClock::new(0));
        // Small enough cap that inserting a third same-sized entry forces one eviction.
        let one_entry_size = crate::size::estimate(&json!({"k": "v"})).max(1);
        let max_bytes = one_entry_size * 2;
        let cache: MemoryCache<serde_json::Value, ManualClock> =
            MemoryCache::with_clock(max_bytes, 10_000_000, clock.clone());

        let a = key("a");
        let b = key("b");
        let c = key("c");

        cache.set(a.clone(), json!({"k": "v"}), 10_000_000); // T=0
        clock.set(1);
        cache.set(b.clone(), json!({"k": "v"}), 10_000_000); // T=1
        clock.set(2);
        assert_eq!(cache.get(&a, None), Some(json!({"k": "v"}))); // a.hits = 1

        cache.set(c.clone(), json!({"k": "v"}), 10_000_000); // forces an eviction

        assert!(cache.contains_live(&a));
        assert!(cache.contains_live(&c));
        assert!(!cache.contains_live(&b));
    }

    #[test]
    fn invalidate_pattern_removes_matching_keys_only() {
        let cache: MemoryCache<serde_json::Value> = MemoryCache::new(1_000_000, 60_000);
        let flow_key = KeyBuilder::new().content_key("flow_analysis", "c1");
        let prod_key = KeyBuilder::new().content_key("productivity", "c1");
        cache.set(flow_key.clone(), json!(1), 60_000);
        cache.set(prod_key.clone(), json!(2), 60_000);

        let removed = cache.invalidate_pattern("flow_analysis");
        assert_eq!(removed, 1);
        assert!(!cache.contains_live(&flow_key));
        assert!(cache.contains_live(&prod_key));
    }

    #[test]
    fn oversized_single_artifact_is_rejected_not_errored() {
        let cache: MemoryCache<serde_json::Value> = MemoryCache::new(16, 60_000);
        let outcome = cache.set(key("huge"), json!({"payload": "x".repeat(1000)}), 60_000);
        assert_eq!(outcome, SetOutcome::Rejected);
        assert_eq!(cache.current_memory_usage(), 0);
    }

    #[test]
    fn hit_and_miss_counters_are_tracked_per_key() {
        let cache: MemoryCache<serde_json::Value> = MemoryCache::new(1_000_000, 60_000);
        let k = key("stats");
        assert_eq!(cache.get(&k, None), None); // miss
        cache.set(k.clone(), json!("v"), 60_000);
        assert_eq!(cache.get(&k, None), Some(json!("v"))); // hit

        let stats = cache.stats();
        let per_key = &stats.per_key[&k];
        assert_eq!(per_key.requests, 2);
        assert_eq!(per_key.hit_rate, 0.5);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(u8),
        Get(u8),
        InvalidateAll,
    }

    proptest::prelude::proptest! {
        #[test]
        fn accounting_matches_entry_sizes_after_arbitrary_op_sequences(
            ops in proptest::collection::vec(
                (0u8..3, 0u8..6).prop_map(|(tag, k)| match tag {
                    0 => Op::Set(k),
                    1 => Op::Get(k),
                    _ => Op::InvalidateAll,
                }),
                1..40,
            )
        ) {
            let one_entry = crate::size::estimate(&json!({"k": "v"})).max(1);
            let cache: MemoryCache<serde_json::Value> = MemoryCache::new(one_entry * 3, 60_000);

            for op in ops {
                match op {
                    Op::Set(k) => {
                        cache.set(key(&format!("k{k}")), json!({"k": "v"}), 60_000);
                    }
                    Op::Get(k) => {
                        cache.get(&key(&format!("k{k}")), None);
                    }
                    Op::InvalidateAll => {
                        cache.invalidate_pattern("k");
                    }
                }

                let sum: usize = cache.entries.iter().map(|e| e.value().size_bytes).sum();
                proptest::prop_assert_eq!(sum, cache.current_memory_usage());
                proptest::prop_assert!(cache.current_memory_usage() <= one_entry * 3);
            }
        }
    }
}
