//! Warming strategies: materialize a predicted cache key by fetching
//! candidate input rows through `QueryExecutor` and running the matching
//! analyzer, rather than just logging the prediction (spec §4.8, Design
//! Notes "simulated warming strategies").

use std::sync::Arc;

use async_trait::async_trait;
use convoperf_cache::{CacheKey, MemoryCache};
use convoperf_predictive::{RequestContext, WarmingStrategy};
use convoperf_query::QueryExecutor;
use rusqlite::types::Value as SqlValue;
use tracing::debug;

use crate::analyzers::{ConversationBundle, DecisionTracker, FlowAnalyzer, KnowledgeGapDetector, ProductivityAnalyzer};

fn sql_value_to_string(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Text(s) => Some(s.clone()),
        SqlValue::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

/// Fetches the single most recently updated conversation as the warming
/// input. The prediction names *which* cache key to populate, not which
/// conversation produced it; absent a reverse index from digest back to
/// source row, the most-recently-active conversation is the best available
/// proxy for "what the user is about to ask for again".
async fn fetch_latest_bundle(query_executor: &QueryExecutor) -> Option<ConversationBundle> {
    let rows = query_executor
        .execute(
            "warming:latest_conversation",
            "SELECT id FROM conversations ORDER BY updated_at DESC LIMIT 1",
            vec![],
        )
        .await
        .ok()?;
    let id = rows.first().and_then(|row| row.get("id")).and_then(sql_value_to_string)?;

    let messages = query_executor
        .execute(
            "warming:latest_conversation_messages",
            "SELECT role, content FROM messages WHERE conversation_id = ?1 ORDER BY created_at ASC",
            vec![SqlValue::Text(id.clone())],
        )
        .await
        .ok()?;
    let payload = serde_json::json!({ "messages": messages.len() });

    Some(ConversationBundle {
        id,
        user_id: "system".to_string(),
        payload,
    })
}

macro_rules! analyzer_strategy {
    ($name:ident, $trait_bound:ident, $method:ident) => {
        pub struct $name {
            pub cache: Arc<MemoryCache<serde_json::Value>>,
            pub query_executor: Arc<QueryExecutor>,
            pub analyzer: Arc<dyn $trait_bound>,
        }

        #[async_trait]
        impl WarmingStrategy for $name {
            async fn warm(&self, key: &CacheKey, _context: &RequestContext) -> Result<(), String> {
                let Some(bundle) = fetch_latest_bundle(&self.query_executor).await else {
                    return Err("no candidate conversation available to warm".to_string());
                };
                let artifact = self
                    .analyzer
                    .$method(&bundle)
                    .await
                    .map_err(|e| e.to_string())?;
                debug!(key = %key, "warming strategy materialized cache entry");
                self.cache.set(key.clone(), artifact, self.cache.default_ttl_ms());
                Ok(())
            }
        }
    };
}

analyzer_strategy!(FlowWarmingStrategy, FlowAnalyzer, analyze_flow);
analyzer_strategy!(ProductivityWarmingStrategy, ProductivityAnalyzer, analyze_productivity);
analyzer_strategy!(KnowledgeGapWarmingStrategy, KnowledgeGapDetector, detect_knowledge_gaps);
analyzer_strategy!(DecisionWarmingStrategy, DecisionTracker, track_decisions);

#[cfg(test)]
mod tests {
    use super::*;
    use convoperf_errors::PerfResult;
    use rusqlite::Connection;

    struct StubFlowAnalyzer;
    #[async_trait]
    impl FlowAnalyzer for StubFlowAnalyzer {
        async fn analyze_flow(&self, bundle: &ConversationBundle) -> PerfResult<serde_json::Value> {
            Ok(serde_json::json!({ "conversation": bundle.id }))
        }
    }

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE conversations(id TEXT PRIMARY KEY, title TEXT, created_at TEXT, updated_at TEXT, metadata TEXT);
             CREATE TABLE messages(id TEXT PRIMARY KEY, conversation_id TEXT, role TEXT, content TEXT, created_at TEXT, metadata TEXT);
             INSERT INTO conversations VALUES ('c1', 't', '2026-01-01', '2026-01-02', '{}');
             INSERT INTO messages VALUES ('m1', 'c1', 'user', 'hi', '2026-01-01', '{}');",
        )
        .unwrap();
        conn
    }

    #[tokio::test]
    async fn flow_strategy_materializes_real_cache_entry() {
        let cache = Arc::new(MemoryCache::new(1_000_000, 60_000));
        let query_executor = Arc::new(QueryExecutor::new(test_db()));
        let strategy = FlowWarmingStrategy {
            cache: cache.clone(),
            query_executor,
            analyzer: Arc::new(StubFlowAnalyzer),
        };
        let key = convoperf_cache::KeyBuilder::new().content_key("flow", "predicted");
        let ctx = RequestContext {
            hour_of_day: 0,
            day_of_week: 0,
            query_types: vec![],
            session_duration_ms: 0,
        };
        strategy.warm(&key, &ctx).await.unwrap();
        assert!(cache.contains_live(&key));
        let value = cache.get(&key, None).unwrap();
        assert_eq!(value["conversation"], "c1");
    }
}
