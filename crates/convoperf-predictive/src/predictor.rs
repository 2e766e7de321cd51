//! Predictor — merges scored candidates from four sub-models into a ranked,
//! deduplicated prediction list, and tracks per-model accuracy via an EMA
//! over observed outcomes (spec §4.7).

use std::collections::{HashMap, VecDeque};

use convoperf_cache::CacheKey;
use parking_lot::RwLock;

use crate::pattern::{PatternLearner, RequestContext};

const TRAINING_RING_MAX: usize = 10_000;
const TRAINING_RING_TRIM_TO: usize = 5_000;
const RECOMPUTE_EVERY: u64 = 100;
const RECOMPUTE_WINDOW: usize = 1_000;
const EMA_ALPHA: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelKind {
    Sequence,
    Temporal,
    Contextual,
    /// Always produces zero predictions; see [`Predictor`] docs for why.
    Collaborative,
}

impl ModelKind {
    /// Fixed per-model priority coefficient folded into the final
    /// `priority * confidence * estimated_value` ranking.
    fn priority_coefficient(self) -> f64 {
        match self {
            ModelKind::Sequence => 100.0,
            ModelKind::Temporal => 80.0,
            ModelKind::Contextual => 60.0,
            ModelKind::Collaborative => 40.0,
        }
    }

    /// TTL stamped onto predictions from this sub-model.
    fn ttl_ms(self) -> i64 {
        match self {
            ModelKind::Sequence => 60 * 60_000,
            ModelKind::Temporal => 120 * 60_000,
            ModelKind::Contextual => 30 * 60_000,
            ModelKind::Collaborative => 45 * 60_000,
        }
    }
}

/// Per-call switches for the sequence/temporal/contextual sub-models.
/// Collaborative filtering has its own enable path (installing a
/// [`CollaborativeProvider`]) and is not part of this struct.
#[derive(Debug, Clone, Copy)]
pub struct ModelToggles {
    pub enable_sequence_analysis: bool,
    pub enable_temporal_patterns: bool,
    pub enable_contextual_predictions: bool,
}

impl Default for ModelToggles {
    fn default() -> Self {
        Self {
            enable_sequence_analysis: true,
            enable_temporal_patterns: true,
            enable_contextual_predictions: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub cache_key: CacheKey,
    pub model_kind: ModelKind,
    pub confidence: f64,
    pub priority: f64,
    pub estimated_value: f64,
    pub context: RequestContext,
    pub expiry_time_ms: i64,
}

impl Prediction {
    fn rank_score(&self) -> f64 {
        self.priority * self.confidence * self.estimated_value
    }
}

/// Multiplicative value heuristic keyed off a [`CacheKey`]'s operation tag
/// (the portion before the first `:`, per the `tag:digest` encoding in
/// `convoperf_cache::key`): `flow` x3, `knowledge_gap` x2.5, `productivity`
/// x2, `search` x1.5, `batch`/`all` x2, anything else x1.
fn estimated_value_for_key(key: &CacheKey) -> f64 {
    let tag = key.as_str().split(':').next().unwrap_or("");
    match tag {
        "flow" => 3.0,
        "knowledge_gap" | "knowledgeGap" => 2.5,
        "productivity" => 2.0,
        "search" => 1.5,
        "batch" | "all" => 2.0,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelStats {
    pub total: u64,
    pub accurate: u64,
    /// EMA-smoothed accuracy, updated on every observation; occasionally
    /// recomputed exactly from the trailing window to correct drift.
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct TrainingSample {
    pub model_kind: ModelKind,
    pub accurate: bool,
    pub recorded_ms: i64,
}

struct PredictorState {
    training: VecDeque<TrainingSample>,
    stats: HashMap<ModelKind, ModelStats>,
    samples_since_recompute: u64,
}

/// Optional plug-in for a real collaborative-filtering sub-model. None of
/// the reference data needed to produce real collaborative predictions
/// (other users' access histories) is available here, so by default the
/// collaborative model is disabled and always contributes zero candidates;
/// supplying a `CollaborativeProvider` is the extension point for wiring one
/// in later without touching the merge/ranking logic.
pub trait CollaborativeProvider: Send + Sync {
    fn predict(&self, user_id: &str, now_ms: i64) -> Vec<Prediction>;
}

pub struct Predictor {
    learner: std::sync::Arc<PatternLearner>,
    state: RwLock<PredictorState>,
    collaborative: Option<Box<dyn CollaborativeProvider>>,
}

impl Predictor {
    pub fn new(learner: std::sync::Arc<PatternLearner>) -> Self {
        Self {
            learner,
            state: RwLock::new(PredictorState {
                training: VecDeque::new(),
                stats: HashMap::new(),
                samples_since_recompute: 0,
            }),
            collaborative: None,
        }
    }

    /// Installs a real collaborative-filtering model. Absent this call, the
    /// collaborative sub-model stays disabled (zero predictions).
    pub fn with_collaborative_provider(mut self, provider: Box<dyn CollaborativeProvider>) -> Self {
        self.collaborative = Some(provider);
        self
    }

    pub fn is_collaborative_enabled(&self) -> bool {
        self.collaborative.is_some()
    }

    /// For each predictive pattern, the last element is proposed as the
    /// next key; `confidence = pattern.confidence * min(1, freq/100)`.
    fn sequence_predictions(
        &self,
        recent_keys: &[CacheKey],
        ctx: &RequestContext,
        now_ms: i64,
    ) -> Vec<Prediction> {
        self.learner
            .predictive_patterns(recent_keys, ctx, now_ms)
            .into_iter()
            .filter_map(|scored| {
                let pattern = scored.pattern;
                pattern.sequence.last().cloned().map(|key| {
                    let confidence = pattern.confidence * (pattern.frequency as f64 / 100.0).min(1.0);
                    Prediction {
                        estimated_value: estimated_value_for_key(&key),
                        cache_key: key,
                        model_kind: ModelKind::Sequence,
                        confidence,
                        priority: ModelKind::Sequence.priority_coefficient(),
                        context: ctx.clone(),
                        expiry_time_ms: now_ms + ModelKind::Sequence.ttl_ms(),
                    }
                })
            })
            .collect()
    }

    /// Keys historically requested around the same hour-of-day / day-of-week
    /// as `ctx`, scored by how much of the user's recent traffic they
    /// account for.
    fn temporal_predictions(
        &self,
        user_id: &str,
        ctx: &RequestContext,
        now_ms: i64,
    ) -> Vec<Prediction> {
        let requests = self.learner.recent_requests();
        let relevant: Vec<_> = requests
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter(|r| {
                (r.context.hour_of_day as i16 - ctx.hour_of_day as i16).abs() <= 1
                    && r.context.day_of_week == ctx.day_of_week
            })
            .collect();
        if relevant.is_empty() {
            return Vec::new();
        }

        let mut counts: HashMap<CacheKey, u64> = HashMap::new();
        for r in &relevant {
            *counts.entry(r.key.clone()).or_insert(0) += 1;
        }
        let total = relevant.len() as f64;

        let mut predictions: Vec<Prediction> = counts
            .into_iter()
            .map(|(key, count)| {
                let confidence = (count as f64 / total).min(1.0);
                let estimated_value = estimated_value_for_key(&key);
                Prediction {
                    cache_key: key,
                    model_kind: ModelKind::Temporal,
                    confidence,
                    priority: ModelKind::Temporal.priority_coefficient(),
                    estimated_value,
                    context: ctx.clone(),
                    expiry_time_ms: now_ms + ModelKind::Temporal.ttl_ms(),
                }
            })
            .collect();
        predictions.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        predictions
    }

    /// Fixed relevance assigned to every contextual candidate; the spec
    /// describes this sub-model as a "key-substring heuristic with fixed
    /// relevance" rather than a frequency- or similarity-derived score.
    const CONTEXTUAL_RELEVANCE: f64 = 0.5;

    /// For each `queryType` in the current session context, proposes
    /// previously-seen keys whose operation tag contains that query type as
    /// a substring.
    fn contextual_predictions(
        &self,
        user_id: &str,
        ctx: &RequestContext,
        now_ms: i64,
    ) -> Vec<Prediction> {
        if ctx.query_types.is_empty() {
            return Vec::new();
        }
        let requests = self.learner.recent_requests();

        let mut seen: HashMap<CacheKey, ()> = HashMap::new();
        let mut predictions = Vec::new();
        for r in requests.iter().filter(|r| r.user_id == user_id) {
            if seen.contains_key(&r.key) {
                continue;
            }
            let matches = ctx.query_types.iter().any(|qt| r.key.contains(qt));
            if !matches {
                continue;
            }
            seen.insert(r.key.clone(), ());
            predictions.push(Prediction {
                estimated_value: estimated_value_for_key(&r.key),
                cache_key: r.key.clone(),
                model_kind: ModelKind::Contextual,
                confidence: Self::CONTEXTUAL_RELEVANCE,
                priority: ModelKind::Contextual.priority_coefficient(),
                context: ctx.clone(),
                expiry_time_ms: now_ms + ModelKind::Contextual.ttl_ms(),
            });
        }
        predictions
    }

    /// Runs all four sub-models, deduplicates by cache key (keeping the
    /// highest-confidence candidate), ranks by `priority * confidence *
    /// estimated_value` descending, and truncates to
    /// `max_concurrent_predictions`.
    pub fn predict(
        &self,
        user_id: &str,
        recent_keys: &[CacheKey],
        ctx: &RequestContext,
        now_ms: i64,
        max_concurrent_predictions: usize,
        toggles: ModelToggles,
    ) -> Vec<Prediction> {
        let mut candidates = Vec::new();
        if toggles.enable_sequence_analysis {
            candidates.extend(self.sequence_predictions(recent_keys, ctx, now_ms));
        }
        if toggles.enable_temporal_patterns {
            candidates.extend(self.temporal_predictions(user_id, ctx, now_ms));
        }
        if toggles.enable_contextual_predictions {
            candidates.extend(self.contextual_predictions(user_id, ctx, now_ms));
        }
        if let Some(provider) = &self.collaborative {
            candidates.extend(provider.predict(user_id, now_ms));
        }

        let mut by_key: HashMap<CacheKey, Prediction> = HashMap::new();
        for candidate in candidates {
            match by_key.get(&candidate.cache_key) {
                Some(existing) if existing.confidence >= candidate.confidence => {}
                _ => {
                    by_key.insert(candidate.cache_key.clone(), candidate);
                }
            }
        }

        let mut ranked: Vec<Prediction> = by_key.into_values().collect();
        ranked.sort_by(|a, b| {
            b.rank_score()
                .partial_cmp(&a.rank_score())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(max_concurrent_predictions);
        ranked
    }

    /// Records whether a prediction's warmed key was actually used before
    /// expiry, folding it into that model's EMA accuracy and, every 100
    /// samples, recomputing an exact ratio over the trailing 1000 to correct
    /// drift.
    pub fn update(&self, model_kind: ModelKind, accurate: bool, now_ms: i64) {
        let mut state = self.state.write();

        state.training.push_back(TrainingSample {
            model_kind,
            accurate,
            recorded_ms: now_ms,
        });
        if state.training.len() > TRAINING_RING_MAX {
            while state.training.len() > TRAINING_RING_TRIM_TO {
                state.training.pop_front();
            }
        }

        let stats = state.stats.entry(model_kind).or_default();
        stats.total += 1;
        if accurate {
            stats.accurate += 1;
        }
        let observation = if accurate { 1.0 } else { 0.0 };
        stats.accuracy = if stats.total == 1 {
            observation
        } else {
            EMA_ALPHA * observation + (1.0 - EMA_ALPHA) * stats.accuracy
        };

        state.samples_since_recompute += 1;
        if state.samples_since_recompute >= RECOMPUTE_EVERY {
            state.samples_since_recompute = 0;
            self.recompute_window(&mut state, model_kind);
        }
    }

    fn recompute_window(&self, state: &mut PredictorState, model_kind: ModelKind) {
        let window: Vec<&TrainingSample> = state
            .training
            .iter()
            .rev()
            .filter(|s| s.model_kind == model_kind)
            .take(RECOMPUTE_WINDOW)
            .collect();
        if window.is_empty() {
            return;
        }
        let accurate = window.iter().filter(|s| s.accurate).count() as f64;
        let ratio = accurate / window.len() as f64;
        if let Some(stats) = state.stats.get_mut(&model_kind) {
            stats.accuracy = ratio;
        }
    }

    pub fn model_stats(&self, model_kind: ModelKind) -> ModelStats {
        self.state
            .read()
            .stats
            .get(&model_kind)
            .cloned()
            .unwrap_or_default()
    }
}
