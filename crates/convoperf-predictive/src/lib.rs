//! Predictive caching loop: a [`PatternLearner`] that extracts sequential
//! access patterns, a [`Predictor`] that merges four scored sub-models into
//! a ranked prediction list, and a [`WarmingScheduler`] that admits and
//! executes warming work under resource pressure (spec §4.6–§4.8).

pub mod pattern;
pub mod predictor;
pub mod warming;

pub use pattern::{
    Pattern, PatternContext, PatternLearner, PatternLearnerConfig, RequestContext, RequestRecord,
    ScoredPattern,
};
pub use predictor::{
    CollaborativeProvider, ModelKind, ModelStats, ModelToggles, Prediction, Predictor, TrainingSample,
};
pub use warming::{WarmingConfig, WarmingCounters, WarmingScheduler, WarmingStrategy};
