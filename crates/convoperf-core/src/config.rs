//! `PerformanceConfig` — composes every sub-component's config into one
//! `serde`-derived, `Default`-implementing tree (spec §6, ambient-stack
//! expansion §1).

use convoperf_monitoring::MonitoringConfig as IndexMonitoringConfig;
use convoperf_predictive::PatternLearnerConfig;
use convoperf_query::BatchConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggressiveness {
    Conservative,
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enable_query_caching: bool,
    pub max_memory_usage_mb: f64,
    pub query_cache_ttl_minutes: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_query_caching: true,
            max_memory_usage_mb: 256.0,
            query_cache_ttl_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParallelismConfig {
    pub parallel_workers: usize,
    pub batch_size: usize,
    pub enable_parallel_processing: bool,
    /// Above this item count, `optimize*` switches to `BatchExecutor`'s
    /// streaming mode instead of collecting the whole result set in memory.
    pub enable_memory_optimization: bool,
    pub streaming_threshold_items: usize,
}

impl Default for ParallelismConfig {
    fn default() -> Self {
        Self {
            parallel_workers: num_cpus(),
            batch_size: 50,
            enable_parallel_processing: true,
            enable_memory_optimization: true,
            streaming_threshold_items: 1000,
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

impl ParallelismConfig {
    pub(crate) fn as_batch_config(&self) -> BatchConfig {
        BatchConfig {
            batch_size: self.batch_size,
            parallelism: self.parallel_workers,
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceThresholds {
    pub max_cpu_utilization: f64,
    pub max_memory_usage_mb: f64,
    pub max_disk_iops: f64,
}

impl Default for ResourceThresholds {
    fn default() -> Self {
        Self {
            max_cpu_utilization: 80.0,
            max_memory_usage_mb: 512.0,
            max_disk_iops: 5000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WarmingStrategyConfig {
    pub aggressiveness: Aggressiveness,
    pub max_warming_operations_per_minute: u32,
    pub priority_weighting: f64,
}

impl Default for WarmingStrategyConfig {
    fn default() -> Self {
        Self {
            aggressiveness: Aggressiveness::Moderate,
            max_warming_operations_per_minute: 10,
            priority_weighting: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelToggles {
    pub enable_sequence_analysis: bool,
    pub enable_collaborative_filtering: bool,
    pub enable_temporal_patterns: bool,
    pub enable_contextual_predictions: bool,
}

impl Default for ModelToggles {
    fn default() -> Self {
        Self {
            enable_sequence_analysis: true,
            enable_collaborative_filtering: false,
            enable_temporal_patterns: true,
            enable_contextual_predictions: true,
        }
    }
}

impl ModelToggles {
    pub(crate) fn as_predictor_toggles(&self) -> convoperf_predictive::ModelToggles {
        convoperf_predictive::ModelToggles {
            enable_sequence_analysis: self.enable_sequence_analysis,
            enable_temporal_patterns: self.enable_temporal_patterns,
            enable_contextual_predictions: self.enable_contextual_predictions,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictiveConfig {
    pub enabled: bool,
    pub learning_enabled: bool,
    pub max_pattern_history: usize,
    pub min_pattern_frequency: u64,
    pub prediction_threshold: f64,
    pub max_concurrent_predictions: usize,
    pub resource_thresholds: ResourceThresholds,
    pub warming_strategy: WarmingStrategyConfig,
    pub models: ModelToggles,
}

impl Default for PredictiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            learning_enabled: true,
            max_pattern_history: 5000,
            min_pattern_frequency: 2,
            prediction_threshold: 0.1,
            max_concurrent_predictions: 10,
            resource_thresholds: ResourceThresholds::default(),
            warming_strategy: WarmingStrategyConfig::default(),
            models: ModelToggles::default(),
        }
    }
}

impl PredictiveConfig {
    pub(crate) fn as_pattern_learner_config(&self) -> PatternLearnerConfig {
        PatternLearnerConfig {
            max_pattern_history: self.max_pattern_history,
            min_pattern_frequency: self.min_pattern_frequency,
            prediction_threshold: self.prediction_threshold,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub auto_optimize_enabled: bool,
    pub auto_drop_unused_indexes: bool,
    pub max_concurrent_optimizations: usize,
    /// Hours-of-day (0..24) during which DDL-level maintenance may execute.
    pub maintenance_window_hours: Vec<u8>,
    pub risk_tolerance: RiskTolerance,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            auto_optimize_enabled: true,
            auto_drop_unused_indexes: false,
            max_concurrent_optimizations: 2,
            maintenance_window_hours: (2..5).collect(),
            risk_tolerance: RiskTolerance::Moderate,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub email_notifications: bool,
    pub webhook_url: Option<String>,
    pub escalation_thresholds: Vec<f64>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            email_notifications: false,
            webhook_url: None,
            escalation_thresholds: vec![0.7, 0.9],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    pub cache: CacheConfig,
    pub parallelism: ParallelismConfig,
    pub predictive: PredictiveConfig,
    pub monitoring: IndexMonitoringConfig,
    pub optimization: OptimizationConfig,
    pub alerts: AlertsConfig,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            parallelism: ParallelismConfig::default(),
            predictive: PredictiveConfig::default(),
            monitoring: IndexMonitoringConfig::default(),
            optimization: OptimizationConfig::default(),
            alerts: AlertsConfig::default(),
        }
    }
}
