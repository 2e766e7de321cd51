//! PatternLearner — sliding-window request recorder that extracts
//! length-2..5 sequential access patterns with frequency/confidence/recency
//! and contextual features (spec §4.6).

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use convoperf_cache::CacheKey;
use parking_lot::RwLock;

const SESSION_MAX_LEN: usize = 100;
const SESSION_TRIM_TO: usize = 50;
const REQUEST_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;
const PATTERN_MAX_AGE_MS: i64 = 30 * 24 * 60 * 60 * 1000;
const MIN_SEQUENCE_LEN: usize = 2;
const MAX_SEQUENCE_LEN: usize = 5;

/// Contextual features captured alongside a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    pub hour_of_day: u8, // 0..=23
    pub day_of_week: u8, // 0..=6, 0 = Sunday
    pub query_types: Vec<String>,
    pub session_duration_ms: i64,
}

#[derive(Debug, Clone)]
pub struct RequestRecord {
    pub key: CacheKey,
    pub user_id: String,
    pub timestamp_ms: i64,
    pub context: RequestContext,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    key: CacheKey,
    timestamp_ms: i64,
    context: RequestContext,
}

/// Aggregated contextual features for a [`Pattern`]: the modal hour/day and
/// the union of query types among the pattern's source requests.
#[derive(Debug, Clone, Default)]
pub struct PatternContext {
    pub modal_hour_of_day: u8,
    pub modal_day_of_week: u8,
    pub query_types: BTreeSet<String>,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub id: String,
    pub user_id: String,
    pub sequence: Vec<CacheKey>,
    pub frequency: u64,
    pub last_seen_ms: i64,
    pub confidence: f64,
    pub context: PatternContext,
}

fn pattern_id(sequence: &[CacheKey]) -> String {
    sequence
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join("->")
}

fn modal<T: Eq + std::hash::Hash + Clone>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    let mut order: Vec<T> = Vec::new();
    for v in values {
        if !counts.contains_key(&v) {
            order.push(v.clone());
        }
        *counts.entry(v).or_insert(0) += 1;
    }
    order
        .into_iter()
        .max_by_key(|v| counts[v])
}

struct LearnerState {
    requests: VecDeque<RequestRecord>,
    sessions: HashMap<String, VecDeque<SessionEntry>>,
    patterns: HashMap<String, Pattern>,
}

/// Configuration for pruning thresholds.
#[derive(Debug, Clone, Copy)]
pub struct PatternLearnerConfig {
    pub max_pattern_history: usize,
    pub min_pattern_frequency: u64,
    pub prediction_threshold: f64,
}

impl Default for PatternLearnerConfig {
    fn default() -> Self {
        Self {
            max_pattern_history: 5000,
            min_pattern_frequency: 2,
            prediction_threshold: 0.1,
        }
    }
}

/// Sliding-window request recorder and pattern extractor.
pub struct PatternLearner {
    state: RwLock<LearnerState>,
    config: PatternLearnerConfig,
    learning_enabled: AtomicBool,
}

#[derive(Debug, Clone)]
pub struct ScoredPattern {
    pub pattern: Pattern,
    pub score: f64,
}

impl PatternLearner {
    pub fn new(config: PatternLearnerConfig) -> Self {
        Self {
            state: RwLock::new(LearnerState {
                requests: VecDeque::new(),
                sessions: HashMap::new(),
                patterns: HashMap::new(),
            }),
            config,
            learning_enabled: AtomicBool::new(true),
        }
    }

    /// Temporarily disables learning (per `resetPerformanceState`, §5): the
    /// request is neither recorded into the ring nor used to extract
    /// patterns while disabled, so resets don't get learned as a pattern.
    pub fn set_learning_enabled(&self, enabled: bool) {
        self.learning_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_learning_enabled(&self) -> bool {
        self.learning_enabled.load(Ordering::SeqCst)
    }

    /// Record one cache access and extract all newly-formed contiguous
    /// sub-sequences of length `2..=min(5, sessionLen)`.
    pub fn record_request(
        &self,
        key: CacheKey,
        user_id: &str,
        context: RequestContext,
        now_ms: i64,
    ) {
        if !self.is_learning_enabled() {
            return;
        }

        let mut state = self.state.write();

        state.requests.push_back(RequestRecord {
            key: key.clone(),
            user_id: user_id.to_string(),
            timestamp_ms: now_ms,
            context: context.clone(),
        });
        while let Some(front) = state.requests.front() {
            if now_ms - front.timestamp_ms > REQUEST_WINDOW_MS {
                state.requests.pop_front();
            } else {
                break;
            }
        }

        let session = state.sessions.entry(user_id.to_string()).or_default();
        session.push_back(SessionEntry {
            key,
            timestamp_ms: now_ms,
            context,
        });
        if session.len() > SESSION_MAX_LEN {
            while session.len() > SESSION_TRIM_TO {
                session.pop_front();
            }
        }

        let session_snapshot: Vec<SessionEntry> = session.iter().cloned().collect();
        let session_len = session_snapshot.len();
        let max_len = MAX_SEQUENCE_LEN.min(session_len);

        for len in MIN_SEQUENCE_LEN..=max_len.max(MIN_SEQUENCE_LEN.saturating_sub(1)) {
            if len > session_len || len < MIN_SEQUENCE_LEN {
                continue;
            }
            let start = session_len - len;
            let slice = &session_snapshot[start..];
            self.upsert_pattern(&mut state, user_id, slice, now_ms);
        }
    }

    fn upsert_pattern(
        &self,
        state: &mut LearnerState,
        user_id: &str,
        slice: &[SessionEntry],
        now_ms: i64,
    ) {
        let sequence: Vec<CacheKey> = slice.iter().map(|e| e.key.clone()).collect();
        let id = pattern_id(&sequence);

        match state.patterns.get_mut(&id) {
            Some(existing) => {
                existing.frequency += 1;
                existing.last_seen_ms = now_ms;
                existing.confidence = (existing.confidence + 0.01).min(1.0);
            }
            None => {
                let hour = modal(slice.iter().map(|e| e.context.hour_of_day)).unwrap_or(0);
                let day = modal(slice.iter().map(|e| e.context.day_of_week)).unwrap_or(0);
                let mut query_types = BTreeSet::new();
                for e in slice {
                    query_types.extend(e.context.query_types.iter().cloned());
                }

                state.patterns.insert(
                    id.clone(),
                    Pattern {
                        id,
                        user_id: user_id.to_string(),
                        sequence,
                        frequency: 1,
                        last_seen_ms: now_ms,
                        confidence: 0.1,
                        context: PatternContext {
                            modal_hour_of_day: hour,
                            modal_day_of_week: day,
                            query_types,
                        },
                    },
                );
            }
        }

        if state.patterns.len() > self.config.max_pattern_history {
            Self::prune_locked(state, now_ms, self.config.min_pattern_frequency);
        }
    }

    fn prune_locked(state: &mut LearnerState, now_ms: i64, min_pattern_frequency: u64) {
        state.patterns.retain(|_, p| {
            !(now_ms - p.last_seen_ms > PATTERN_MAX_AGE_MS && p.frequency < min_pattern_frequency)
        });
    }

    /// Prunes patterns older than 30 days with frequency below the
    /// configured minimum. Safe to call on a cadence independent of
    /// insertion-triggered pruning (spec §4.6, §5 cleanup timer).
    pub fn prune(&self, now_ms: i64) {
        let mut state = self.state.write();
        Self::prune_locked(&mut state, now_ms, self.config.min_pattern_frequency);
    }

    /// Score of the longest matching suffix-aligned overlap between
    /// `prefix` (a pattern's sequence minus its last element) and the
    /// caller's `recent` key trail.
    fn suffix_overlap_ratio(prefix: &[CacheKey], recent: &[CacheKey]) -> (bool, f64) {
        if prefix.is_empty() {
            return (false, 0.0);
        }
        let max_len = prefix.len().min(recent.len());
        let mut matched = 0;
        for i in 1..=max_len {
            if prefix[prefix.len() - i] == recent[recent.len() - i] {
                matched = i;
            } else {
                break;
            }
        }
        let exact = matched == prefix.len();
        (exact, matched as f64 / prefix.len() as f64)
    }

    fn context_similarity(a: &RequestContext, pattern_ctx: &PatternContext) -> f64 {
        let tod_match = (a.hour_of_day as i16 - pattern_ctx.modal_hour_of_day as i16).abs() <= 1;
        let dow_match = a.day_of_week == pattern_ctx.modal_day_of_week;
        let mut ratio = 0.0;
        if tod_match {
            ratio += 0.5;
        }
        if dow_match {
            ratio += 0.5;
        }
        ratio
    }

    fn score(pattern: &Pattern, recent_keys: &[CacheKey], ctx: &RequestContext, now_ms: i64) -> f64 {
        let prefix = &pattern.sequence[..pattern.sequence.len().saturating_sub(1)];
        let (exact, overlap_ratio) = Self::suffix_overlap_ratio(prefix, recent_keys);
        let sequence_score = if exact { 0.6 } else { overlap_ratio * 0.4 };

        let frequency_score = (pattern.frequency as f64 / 100.0).min(0.2);
        let confidence_score = pattern.confidence * 0.1;
        let context_score = Self::context_similarity(ctx, &pattern.context) * 0.1;

        let hours_since = ((now_ms - pattern.last_seen_ms).max(0) as f64) / 3_600_000.0;
        let recency_bonus = (0.1 - hours_since / 168.0).max(0.0);

        sequence_score + frequency_score + confidence_score + context_score + recency_bonus
    }

    /// Top-10 patterns (by [`Self::score`]) scoring at or above
    /// `self.config.prediction_threshold`.
    pub fn predictive_patterns(
        &self,
        recent_keys: &[CacheKey],
        ctx: &RequestContext,
        now_ms: i64,
    ) -> Vec<ScoredPattern> {
        let state = self.state.read();
        let mut scored: Vec<ScoredPattern> = state
            .patterns
            .values()
            .filter_map(|p| {
                let score = Self::score(p, recent_keys, ctx, now_ms);
                if score >= self.config.prediction_threshold {
                    Some(ScoredPattern {
                        pattern: p.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(10);
        scored
    }

    pub fn pattern_count(&self) -> usize {
        self.state.read().patterns.len()
    }

    pub fn get_pattern(&self, id: &str) -> Option<Pattern> {
        self.state.read().patterns.get(id).cloned()
    }

    /// Snapshot of the recent (already window-trimmed) request ring, used
    /// by the temporal prediction sub-model.
    pub fn recent_requests(&self) -> Vec<RequestRecord> {
        self.state.read().requests.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoperf_cache::KeyBuilder;

    fn ctx() -> RequestContext {
        RequestContext {
            hour_of_day: 10,
            day_of_week: 2,
            query_types: vec!["flow".to_string()],
            session_duration_ms: 0,
        }
    }

    fn key(s: &str) -> CacheKey {
        KeyBuilder::new().content_key("op", s)
    }

    #[test]
    fn repeated_sequence_grows_frequency_and_confidence_monotonically() {
        let learner = PatternLearner::new(PatternLearnerConfig::default());
        let k1 = key("k1");
        let k2 = key("k2");
        let k3 = key("k3");

        for round in 0..2 {
            let base = round * 1000;
            learner.record_request(k1.clone(), "u1", ctx(), base);
            learner.record_request(k2.clone(), "u1", ctx(), base + 1);
            learner.record_request(k3.clone(), "u1", ctx(), base + 2);
        }

        let id = pattern_id(&[k1.clone(), k2.clone()]);
        let pattern = learner.get_pattern(&id).expect("pattern k1->k2 exists");
        assert!(pattern.frequency >= 2);
        assert!(pattern.confidence >= 0.11);

        let id23 = pattern_id(&[k2.clone(), k3.clone()]);
        let pattern23 = learner.get_pattern(&id23).expect("pattern k2->k3 exists");
        assert!(pattern23.frequency >= 2);
    }

    #[test]
    fn predictive_patterns_favor_exact_suffix_match() {
        let learner = PatternLearner::new(PatternLearnerConfig::default());
        let k1 = key("k1");
        let k2 = key("k2");
        let k3 = key("k3");
        for round in 0..3 {
            let base = round * 1000;
            learner.record_request(k1.clone(), "u1", ctx(), base);
            learner.record_request(k2.clone(), "u1", ctx(), base + 1);
            learner.record_request(k3.clone(), "u1", ctx(), base + 2);
        }

        let recent = vec![k1.clone(), k2.clone()];
        let predictions = learner.predictive_patterns(&recent, &ctx(), 3000);
        assert!(!predictions.is_empty());
        let top = &predictions[0];
        assert_eq!(top.pattern.sequence.last().unwrap(), &k3);
        assert!(top.score >= 0.1);
    }

    #[test]
    fn pruning_removes_only_old_and_infrequent_patterns() {
        let config = PatternLearnerConfig {
            max_pattern_history: 1,
            min_pattern_frequency: 5,
            prediction_threshold: 0.1,
        };
        let learner = PatternLearner::new(config);
        let k1 = key("k1");
        let k2 = key("k2");
        learner.record_request(k1.clone(), "u1", ctx(), 0);
        learner.record_request(k2.clone(), "u1", ctx(), 1);
        // Second pattern insertion triggers prune(); the first pattern is young, so it survives.
        let k3 = key("k3");
        learner.record_request(k3, "u1", ctx(), 2);
        assert!(learner.pattern_count() >= 1);
    }
}
