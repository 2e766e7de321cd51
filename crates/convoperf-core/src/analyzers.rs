//! External analytics collaborators, consumed as pure `(bundle) → artifact`
//! functions (spec §6). Modeled as separate single-method traits rather
//! than one reflection-driven interface, so `BatchExecutor`'s processor
//! stays a plain closure and never branches on a collaborator's concrete
//! type.

use std::sync::Arc;

use async_trait::async_trait;
use convoperf_errors::PerfResult;
use serde::{Deserialize, Serialize};

/// One conversation plus its messages, as handed to an analytics
/// collaborator. The core never interprets `payload` — it is forwarded
/// verbatim and only used, via `id`, to build the cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationBundle {
    pub id: String,
    pub user_id: String,
    pub payload: serde_json::Value,
}

impl ConversationBundle {
    /// Content fingerprint fed to `KeyBuilder::content_key`: the bundle id
    /// plus a canonical rendering of its payload, so two calls with the
    /// same conversation and same message content always collide on the
    /// same cache key.
    pub fn fingerprint(&self) -> String {
        format!("{}|{}", self.id, self.payload)
    }
}

#[async_trait]
pub trait FlowAnalyzer: Send + Sync {
    async fn analyze_flow(&self, bundle: &ConversationBundle) -> PerfResult<serde_json::Value>;
}

#[async_trait]
pub trait ProductivityAnalyzer: Send + Sync {
    async fn analyze_productivity(&self, bundle: &ConversationBundle) -> PerfResult<serde_json::Value>;
}

#[async_trait]
pub trait KnowledgeGapDetector: Send + Sync {
    async fn detect_knowledge_gaps(&self, bundle: &ConversationBundle) -> PerfResult<serde_json::Value>;
}

#[async_trait]
pub trait DecisionTracker: Send + Sync {
    async fn track_decisions(&self, bundle: &ConversationBundle) -> PerfResult<serde_json::Value>;
}

/// Optional, once-at-construction wiring for the four analytics
/// collaborators. Absent an entry, `WarmingScheduler` has no strategy
/// registered for that operation tag and any matching prediction fails
/// with "no warming strategy registered" (counted under `failed`, per the
/// `WarmingError` taxonomy entry).
#[derive(Clone, Default)]
pub struct AnalyzerRegistry {
    pub flow: Option<Arc<dyn FlowAnalyzer>>,
    pub productivity: Option<Arc<dyn ProductivityAnalyzer>>,
    pub knowledge_gaps: Option<Arc<dyn KnowledgeGapDetector>>,
    pub decisions: Option<Arc<dyn DecisionTracker>>,
}
