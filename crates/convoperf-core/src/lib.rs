//! `PerformanceManager` and its public API surface: the top-level
//! orchestrator composing caching, predictive warming, query execution,
//! and index monitoring into the analytics service's performance-
//! management layer (spec §2, §6).

pub mod analyzers;
pub mod automation;
pub mod config;
pub mod manager;
pub mod strategies;

pub use analyzers::{
    AnalyzerRegistry, ConversationBundle, DecisionTracker, FlowAnalyzer, KnowledgeGapDetector, ProductivityAnalyzer,
};
pub use automation::{AutomationDecision, AutomationHistory, AutomationKind, Decision};
pub use config::PerformanceConfig;
pub use manager::{PerformanceManager, PredictiveCachingStatus};
