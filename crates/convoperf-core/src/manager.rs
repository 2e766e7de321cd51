//! `PerformanceManager` — the top-level orchestrator owning every
//! sub-component's lifecycle and exposing the `optimize*`/`initialize*`/
//! `trigger*` public API surface (spec §2 data/control flow, §6, §9).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{Datelike, TimeZone, Timelike, Utc};
use convoperf_cache::{CacheKey, KeyBuilder, MemoryCache};
use convoperf_errors::{HealthCheck, HealthStatus, PerfError, PerfResult};
use convoperf_monitoring::IndexMonitor;
use convoperf_predictive::{PatternLearner, Prediction, Predictor, RequestContext, WarmingConfig, WarmingScheduler};
use convoperf_query::{BatchExecutor, QueryExecutor, QueryStatSummary, Row};
use convoperf_resource::ResourceProbe;
use parking_lot::{Mutex, RwLock};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::analyzers::{AnalyzerRegistry, ConversationBundle, DecisionTracker, FlowAnalyzer, KnowledgeGapDetector, ProductivityAnalyzer};
use crate::automation::{self, AutomationDecision, AutomationHistory, Decision};
use crate::config::PerformanceConfig;
use crate::strategies::{DecisionWarmingStrategy, FlowWarmingStrategy, KnowledgeGapWarmingStrategy, ProductivityWarmingStrategy};

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn hour_of_day(now_ms: i64) -> u8 {
    Utc.timestamp_millis_opt(now_ms)
        .single()
        .map(|dt| dt.hour() as u8)
        .unwrap_or(0)
}

fn day_of_week(now_ms: i64) -> u8 {
    Utc.timestamp_millis_opt(now_ms)
        .single()
        .map(|dt| dt.weekday().num_days_from_sunday() as u8)
        .unwrap_or(0)
}

type BoxedArtifactFuture = Pin<Box<dyn Future<Output = Result<serde_json::Value, String>> + Send>>;

/// Point-in-time summary returned by `predictiveCachingStatus()`.
#[derive(Debug, Clone)]
pub struct PredictiveCachingStatus {
    pub enabled: bool,
    pub learning_enabled: bool,
    pub pattern_count: usize,
    pub queue_len: usize,
    pub warming_counters: (u64, u64, u64),
}

pub struct PerformanceManager {
    config: RwLock<PerformanceConfig>,
    cache: Arc<MemoryCache<serde_json::Value>>,
    query_executor: Arc<QueryExecutor>,
    batch: RwLock<Arc<BatchExecutor>>,
    learner: Arc<PatternLearner>,
    predictor: Arc<Predictor>,
    warming: Arc<WarmingScheduler>,
    monitor: Arc<IndexMonitor>,
    automation_history: Arc<AutomationHistory>,
    resource: Arc<dyn ResourceProbe>,
    predictive_task: Mutex<Option<JoinHandle<()>>>,
    monitoring_task: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl PerformanceManager {
    pub fn new(
        config: PerformanceConfig,
        conn: Connection,
        resource: Arc<dyn ResourceProbe>,
        analyzers: AnalyzerRegistry,
    ) -> Self {
        let cache = Arc::new(MemoryCache::new(
            (config.cache.max_memory_usage_mb * 1_048_576.0) as usize,
            config.cache.query_cache_ttl_minutes as i64 * 60_000,
        ));
        let query_executor = Arc::new(QueryExecutor::new(conn));
        let batch = Arc::new(BatchExecutor::new(config.parallelism.as_batch_config()));
        let learner = Arc::new(PatternLearner::new(config.predictive.as_pattern_learner_config()));
        learner.set_learning_enabled(config.predictive.learning_enabled);
        let predictor = Arc::new(Predictor::new(learner.clone()));

        let mut warming = WarmingScheduler::new(WarmingConfig {
            max_concurrent_predictions: config.predictive.max_concurrent_predictions,
            max_cpu_utilization: config.predictive.resource_thresholds.max_cpu_utilization,
            max_memory_usage_mb: config.predictive.resource_thresholds.max_memory_usage_mb,
            max_warming_operations_per_minute: config.predictive.warming_strategy.max_warming_operations_per_minute,
        });
        if let Some(analyzer) = analyzers.flow.clone() {
            warming.register_strategy(
                "flow",
                Arc::new(FlowWarmingStrategy {
                    cache: cache.clone(),
                    query_executor: query_executor.clone(),
                    analyzer,
                }),
            );
        }
        if let Some(analyzer) = analyzers.productivity.clone() {
            warming.register_strategy(
                "productivity",
                Arc::new(ProductivityWarmingStrategy {
                    cache: cache.clone(),
                    query_executor: query_executor.clone(),
                    analyzer,
                }),
            );
        }
        if let Some(analyzer) = analyzers.knowledge_gaps.clone() {
            warming.register_strategy(
                "knowledge_gap",
                Arc::new(KnowledgeGapWarmingStrategy {
                    cache: cache.clone(),
                    query_executor: query_executor.clone(),
                    analyzer,
                }),
            );
        }
        if let Some(analyzer) = analyzers.decisions.clone() {
            warming.register_strategy(
                "decision",
                Arc::new(DecisionWarmingStrategy {
                    cache: cache.clone(),
                    query_executor: query_executor.clone(),
                    analyzer,
                }),
            );
        }

        let monitor = Arc::new(IndexMonitor::new(config.monitoring));

        Self {
            config: RwLock::new(config),
            cache,
            query_executor,
            batch: RwLock::new(batch),
            learner,
            predictor,
            warming: Arc::new(warming),
            monitor,
            automation_history: Arc::new(AutomationHistory::new()),
            resource,
            predictive_task: Mutex::new(None),
            monitoring_task: Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    // ---- optimize* ----------------------------------------------------

    /// Cache-or-compute over a batch of conversation bundles: each bundle's
    /// artifact is looked up under its content-addressed key, computed via
    /// `compute` on miss, inserted with the configured TTL, and every
    /// access (hit or miss) is reported to `PatternLearner`.
    async fn optimize_generic<F, Fut>(
        &self,
        tag: &'static str,
        bundles: Vec<ConversationBundle>,
        compute: F,
    ) -> PerfResult<Vec<serde_json::Value>>
    where
        F: Fn(ConversationBundle) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = PerfResult<serde_json::Value>> + Send + 'static,
    {
        let cache = self.cache.clone();
        let learner = self.learner.clone();
        let (enable_caching, ttl_ms, enable_memory_optimization, streaming_threshold_items, max_memory_mb) = {
            let config = self.config.read();
            (
                config.cache.enable_query_caching,
                config.cache.query_cache_ttl_minutes as i64 * 60_000,
                config.parallelism.enable_memory_optimization,
                config.parallelism.streaming_threshold_items,
                config.cache.max_memory_usage_mb,
            )
        };
        let batch = self.batch.read().clone();
        let processor = move |bundle: ConversationBundle| {
            let cache = cache.clone();
            let learner = learner.clone();
            let key = KeyBuilder::new().content_key(tag, &bundle.fingerprint());
            let user_id = bundle.user_id.clone();
            let now = now_ms();
            let context = RequestContext {
                hour_of_day: hour_of_day(now),
                day_of_week: day_of_week(now),
                query_types: vec![tag.to_string()],
                session_duration_ms: 0,
            };

            if enable_caching {
                if let Some(value) = cache.get(&key, None) {
                    learner.record_request(key, &user_id, context, now);
                    let fut: BoxedArtifactFuture = Box::pin(async move { Ok(value) });
                    return fut;
                }
            }

            // Invoked synchronously (not inside the `async move` block below) so
            // `compute` itself never has to be moved out of this closure's
            // captured environment — only the future it returns does.
            let compute_fut = compute(bundle);
            let fut: BoxedArtifactFuture = Box::pin(async move {
                let value = compute_fut.await.map_err(|e| e.to_string())?;
                if enable_caching {
                    cache.set(key.clone(), value.clone(), ttl_ms);
                }
                learner.record_request(key, &user_id, context, now);
                Ok(value)
            });
            fut
        };

        let results = if enable_memory_optimization && bundles.len() > streaming_threshold_items {
            use futures::StreamExt;
            let mut stream = Box::pin(batch.stream_batches(
                bundles,
                processor,
                self.resource.clone(),
                max_memory_mb,
                Some(self.shutdown.clone()),
            ));
            let mut results = Vec::new();
            while let Some(batch_result) = stream.next().await {
                results.extend(batch_result);
            }
            results
        } else {
            batch.run_parallel(bundles, processor).await
        };

        Ok(results.into_iter().flatten().collect())
    }

    pub async fn optimize_flow_analysis(
        &self,
        bundles: Vec<ConversationBundle>,
        analyzer: Arc<dyn FlowAnalyzer>,
    ) -> PerfResult<Vec<serde_json::Value>> {
        self.optimize_generic("flow", bundles, move |bundle| {
            let analyzer = analyzer.clone();
            async move { analyzer.analyze_flow(&bundle).await }
        })
        .await
    }

    pub async fn optimize_productivity_analysis(
        &self,
        bundles: Vec<ConversationBundle>,
        analyzer: Arc<dyn ProductivityAnalyzer>,
    ) -> PerfResult<Vec<serde_json::Value>> {
        self.optimize_generic("productivity", bundles, move |bundle| {
            let analyzer = analyzer.clone();
            async move { analyzer.analyze_productivity(&bundle).await }
        })
        .await
    }

    pub async fn optimize_knowledge_gap_detection(
        &self,
        bundles: Vec<ConversationBundle>,
        detector: Arc<dyn KnowledgeGapDetector>,
    ) -> PerfResult<Vec<serde_json::Value>> {
        self.optimize_generic("knowledge_gap", bundles, move |bundle| {
            let detector = detector.clone();
            async move { detector.detect_knowledge_gaps(&bundle).await }
        })
        .await
    }

    pub async fn optimize_decision_tracking(
        &self,
        bundles: Vec<ConversationBundle>,
        tracker: Arc<dyn DecisionTracker>,
    ) -> PerfResult<Vec<serde_json::Value>> {
        self.optimize_generic("decision", bundles, move |bundle| {
            let tracker = tracker.clone();
            async move { tracker.track_decisions(&bundle).await }
        })
        .await
    }

    /// Direct, uncached pass-through to `QueryExecutor` — per-query latency
    /// accounting (§4.4) applies, but query results are not written to
    /// `MemoryCache` (the cache is for analytics artifacts, not raw rows).
    pub async fn optimize_query(&self, query_id: &str, sql: &str, params: Vec<SqlValue>) -> PerfResult<Vec<Row>> {
        self.query_executor.execute(query_id, sql, params).await
    }

    // ---- predictive caching --------------------------------------------

    pub fn configure_predictive_caching(&self, enabled: bool, learning_enabled: bool) {
        self.config.write().predictive.enabled = enabled;
        self.config.write().predictive.learning_enabled = learning_enabled;
        self.learner.set_learning_enabled(enabled && learning_enabled);
    }

    /// Runs one predictive-warming cycle synchronously for every user seen
    /// in recent request history, queues the resulting predictions onto
    /// `WarmingScheduler`, drives one `process()` round, and returns the
    /// full set of predictions generated (spec §6: `Prediction[]`).
    pub async fn trigger_predictive_cache_warming(&self) -> Vec<Prediction> {
        if !self.config.read().predictive.enabled {
            return Vec::new();
        }

        let now = now_ms();
        let recent = self.learner.recent_requests();
        let mut user_ids: Vec<String> = recent.iter().map(|r| r.user_id.clone()).collect();
        user_ids.sort();
        user_ids.dedup();

        let (max_predictions, toggles) = {
            let config = self.config.read();
            (
                config.predictive.max_concurrent_predictions,
                config.predictive.models.as_predictor_toggles(),
            )
        };
        let mut all_predictions = Vec::new();

        for user_id in user_ids {
            let recent_keys: Vec<CacheKey> = recent
                .iter()
                .filter(|r| r.user_id == user_id)
                .map(|r| r.key.clone())
                .collect();
            let context = recent
                .iter()
                .rev()
                .find(|r| r.user_id == user_id)
                .map(|r| r.context.clone())
                .unwrap_or(RequestContext {
                    hour_of_day: hour_of_day(now),
                    day_of_week: day_of_week(now),
                    query_types: Vec::new(),
                    session_duration_ms: 0,
                });

            let predictions = self
                .predictor
                .predict(&user_id, &recent_keys, &context, now, max_predictions, toggles);
            all_predictions.extend(predictions);
        }

        self.warming.queue(all_predictions.clone());
        self.warming.process(self.resource.clone(), now).await;

        all_predictions
    }

    pub fn predictive_caching_status(&self) -> PredictiveCachingStatus {
        let config = self.config.read();
        PredictiveCachingStatus {
            enabled: config.predictive.enabled,
            learning_enabled: self.learner.is_learning_enabled(),
            pattern_count: self.learner.pattern_count(),
            queue_len: self.warming.queue_len(),
            warming_counters: self.warming.counters().snapshot(),
        }
    }

    /// Spawns the background predictive-caching loop: on each tick, prunes
    /// stale patterns and runs one warming cycle. Cancellable via
    /// `shutdown()`.
    pub fn initialize_predictive_caching(self: &Arc<Self>) {
        if self.predictive_task.lock().is_some() {
            return;
        }
        let manager = self.clone();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        manager.learner.prune(now_ms());
                        manager.trigger_predictive_cache_warming().await;
                    }
                }
            }
            info!("predictive caching loop stopped");
        });
        *self.predictive_task.lock() = Some(handle);
    }

    // ---- performance monitoring ----------------------------------------

    /// One monitoring tick: samples already recorded via `IndexMonitor`
    /// are checked for threshold breaches, each alert is routed through
    /// the automation policy, and approved decisions execute immediately
    /// if the current hour falls in the maintenance window, or are queued
    /// as a `MaintenanceTask` to retry on a later, in-window tick
    /// otherwise (spec §4.9 state machine: `approve − window = deferred`).
    async fn run_monitoring_cycle(&self) {
        let now = now_ms();
        self.monitor.prune_expired_maintenance(now);

        let alerts = self.monitor.check_alerts(now);
        if alerts.is_empty() {
            return;
        }
        let recommendations = self.monitor.recommend(&alerts);
        let optimization = self.config.read().optimization.clone();
        let in_window = automation::within_maintenance_window(&optimization, hour_of_day(now));

        for alert in &alerts {
            let decision = automation::decide(alert, &optimization, now);
            self.automation_history.record(decision.clone());

            if decision.decision != Decision::Approve {
                continue;
            }

            let Some(recommendation) = recommendations.iter().find(|r| r.index_name == alert.index_name) else {
                continue;
            };

            if in_window {
                let query_id = format!("maintenance:{}", alert.index_name);
                match self.query_executor.exec(&query_id, &recommendation.action.to_sql()).await {
                    Ok(()) => self.automation_history.record_result(&decision.id, "executed".to_string()),
                    Err(err) => {
                        warn!(index = %alert.index_name, error = %err, "maintenance action failed");
                        self.automation_history.record_result(&decision.id, format!("failed: {err}"));
                    }
                }
            } else {
                self.monitor.queue_maintenance(convoperf_monitoring::MaintenanceTask {
                    id: decision.id.clone(),
                    action: recommendation.action.clone(),
                    target: alert.index_name.clone(),
                    scheduled_time_ms: now,
                    priority: recommendation.priority,
                    estimated_duration_ms: 0,
                });
                self.automation_history
                    .record_result(&decision.id, "deferred: outside maintenance window".to_string());
            }
        }
    }

    pub fn initialize_performance_monitoring(self: &Arc<Self>) {
        if self.monitoring_task.lock().is_some() {
            return;
        }
        let interval_minutes = self.config.read().monitoring.interval_minutes.max(1);
        let manager = self.clone();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_minutes * 60));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        manager.run_monitoring_cycle().await;
                    }
                }
            }
            info!("performance monitoring loop stopped");
        });
        *self.monitoring_task.lock() = Some(handle);
    }

    /// Per-component `pass|warning|fail` summary; never exposes a
    /// `PerfError` or internal identifier (spec §7).
    pub fn performance_health_check(&self) -> (HealthStatus, Vec<HealthCheck>) {
        let mut checks = Vec::new();

        let cache_stats = self.cache.stats();
        checks.push(HealthCheck {
            component: "cache".to_string(),
            status: HealthStatus::Pass,
            message: format!("{} entries, {} bytes in use", cache_stats.entries, cache_stats.bytes),
        });

        let predictive_status = self.predictive_caching_status();
        let predictive_health = if predictive_status.enabled {
            HealthStatus::Pass
        } else {
            HealthStatus::Warning
        };
        checks.push(HealthCheck {
            component: "predictive".to_string(),
            status: predictive_health,
            message: format!("{} known patterns, queue length {}", predictive_status.pattern_count, predictive_status.queue_len),
        });

        let monitoring_enabled = self.config.read().monitoring.enabled;
        let monitoring_health = if monitoring_enabled {
            HealthStatus::Pass
        } else {
            HealthStatus::Warning
        };
        checks.push(HealthCheck {
            component: "monitoring".to_string(),
            status: monitoring_health,
            message: format!("{} maintenance tasks pending", self.monitor.maintenance_dashboard().len()),
        });

        let overall = if checks.iter().any(|c| c.status == HealthStatus::Fail) {
            HealthStatus::Fail
        } else if checks.iter().any(|c| c.status == HealthStatus::Warning) {
            HealthStatus::Warning
        } else {
            HealthStatus::Pass
        };

        (overall, checks)
    }

    pub fn automation_history(&self) -> Vec<AutomationDecision> {
        self.automation_history.snapshot()
    }

    /// Cancels and awaits every background loop. Idempotent.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(handle) = self.predictive_task.lock().take() {
            if let Err(err) = handle.await {
                error!(error = %err, "predictive caching task panicked during shutdown");
            }
        }
        if let Some(handle) = self.monitoring_task.lock().take() {
            if let Err(err) = handle.await {
                error!(error = %err, "performance monitoring task panicked during shutdown");
            }
        }
    }

    pub fn shutdown_performance_monitoring(&self) {
        if let Some(handle) = self.monitoring_task.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OptimizationConfig, RiskTolerance};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE conversations(id TEXT PRIMARY KEY, title TEXT, created_at TEXT, updated_at TEXT, metadata TEXT);
             CREATE TABLE messages(id TEXT PRIMARY KEY, conversation_id TEXT, role TEXT, content TEXT, created_at TEXT, metadata TEXT);
             INSERT INTO conversations VALUES ('c1', 't', '2026-01-01', '2026-01-02', '{}');",
        )
        .unwrap();
        conn
    }

    struct CountingFlowAnalyzer {
        calls: StdArc<AtomicUsize>,
    }

    #[async_trait]
    impl FlowAnalyzer for CountingFlowAnalyzer {
        async fn analyze_flow(&self, bundle: &ConversationBundle) -> PerfResult<serde_json::Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!({ "id": "r1", "conversation": bundle.id }))
        }
    }

    fn bundle() -> ConversationBundle {
        ConversationBundle {
            id: "c1".to_string(),
            user_id: "u1".to_string(),
            payload: serde_json::json!({ "messages": 1 }),
        }
    }

    #[tokio::test]
    async fn s1_cache_hit_skips_compute() {
        let mut config = PerformanceConfig::default();
        config.cache.max_memory_usage_mb = 8.0;
        let resource = Arc::new(convoperf_resource::TestResourceProbe::new(10.0, 10.0));
        let manager = Arc::new(PerformanceManager::new(config, test_db(), resource, AnalyzerRegistry::default()));

        let calls = StdArc::new(AtomicUsize::new(0));
        let analyzer: Arc<dyn FlowAnalyzer> = Arc::new(CountingFlowAnalyzer { calls: calls.clone() });

        let first = manager.optimize_flow_analysis(vec![bundle()], analyzer.clone()).await.unwrap();
        let second = manager.optimize_flow_analysis(vec![bundle()], analyzer).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn streaming_mode_is_used_above_the_configured_threshold() {
        let mut config = PerformanceConfig::default();
        config.parallelism.enable_memory_optimization = true;
        config.parallelism.streaming_threshold_items = 1;
        config.parallelism.batch_size = 1;
        let resource = Arc::new(convoperf_resource::TestResourceProbe::new(10.0, 10.0));
        let manager = PerformanceManager::new(config, test_db(), resource, AnalyzerRegistry::default());

        let calls = StdArc::new(AtomicUsize::new(0));
        let analyzer: Arc<dyn FlowAnalyzer> = Arc::new(CountingFlowAnalyzer { calls: calls.clone() });
        let bundles = vec![
            ConversationBundle {
                id: "c1".to_string(),
                user_id: "u1".to_string(),
                payload: serde_json::json!({ "messages": 1 }),
            },
            ConversationBundle {
                id: "c2".to_string(),
                user_id: "u1".to_string(),
                payload: serde_json::json!({ "messages": 2 }),
            },
        ];

        let results = manager.optimize_flow_analysis(bundles, analyzer).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn s5_critical_slow_query_alert_is_approved_and_recorded() {
        let mut config = PerformanceConfig::default();
        config.optimization = OptimizationConfig {
            risk_tolerance: RiskTolerance::Moderate,
            ..OptimizationConfig::default()
        };
        let resource = Arc::new(convoperf_resource::TestResourceProbe::new(10.0, 10.0));
        let manager = PerformanceManager::new(config, test_db(), resource, AnalyzerRegistry::default());

        manager.monitor.record_sample(convoperf_monitoring::IndexStat {
            index_name: "idx_conv_title".to_string(),
            table_name: "conversations".to_string(),
            usage_count: 10,
            effectiveness_score: 0.8,
            write_impact: 0.1,
            size_bytes: 4096,
            last_used_ms: 0,
            avg_query_time_ms: 2000.0,
        });
        manager.run_monitoring_cycle().await;

        let history = manager.automation_history();
        let decision = history.iter().find(|d| d.decision == Decision::Approve);
        assert!(decision.is_some());
        let decision = decision.unwrap();
        assert!((decision.confidence - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn s6_query_stats_bounded_to_thousand_samples() {
        let config = PerformanceConfig::default();
        let resource = Arc::new(convoperf_resource::TestResourceProbe::new(10.0, 10.0));
        let manager = PerformanceManager::new(config, test_db(), resource, AnalyzerRegistry::default());

        for _ in 0..1005 {
            manager
                .optimize_query("qA", "SELECT 1 WHERE ?1", vec![SqlValue::Integer(1)])
                .await
                .unwrap();
        }

        let stats = manager.query_executor.stats();
        let summary: &QueryStatSummary = stats.get("qA").unwrap();
        assert_eq!(summary.count, 1000);
        assert!(summary.min_micros as f64 <= summary.avg_micros);
        assert!(summary.avg_micros <= summary.max_micros as f64);
    }

    #[tokio::test]
    async fn shutdown_joins_background_loops_without_panicking() {
        let config = PerformanceConfig::default();
        let resource = Arc::new(convoperf_resource::TestResourceProbe::new(10.0, 10.0));
        let manager = Arc::new(PerformanceManager::new(config, test_db(), resource, AnalyzerRegistry::default()));
        manager.initialize_predictive_caching();
        manager.initialize_performance_monitoring();
        manager.shutdown().await;
    }
}
