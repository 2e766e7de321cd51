//! Core type definitions for index monitoring, alerting, and maintenance
//! recommendation (spec §3, §4.9).

use serde::{Deserialize, Serialize};

/// Alert thresholds that trigger [`crate::IndexMonitor::check_alerts`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub slow_query_ms: f64,
    pub unused_index_days: i64,
    pub write_impact_threshold: f64,
    pub memory_usage_threshold_mb: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            slow_query_ms: 500.0,
            unused_index_days: 30,
            write_impact_threshold: 0.6,
            memory_usage_threshold_mb: 512.0,
        }
    }
}

/// Configuration for the index monitoring loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub interval_minutes: u64,
    pub alert_thresholds: AlertThresholds,
    pub retention_days: i64,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_minutes: 10,
            alert_thresholds: AlertThresholds::default(),
            retention_days: 30,
        }
    }
}

/// Per-index usage and health telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStat {
    pub index_name: String,
    pub table_name: String,
    /// Uses observed since the last sample.
    pub usage_count: u64,
    /// Fraction of eligible queries that touched this index.
    pub effectiveness_score: f64,
    /// `writes * index_participation`, an estimate of upkeep cost imposed on
    /// write-path latency.
    pub write_impact: f64,
    pub size_bytes: u64,
    pub last_used_ms: i64,
    /// Rolling average latency (ms) of queries attributed to this index.
    pub avg_query_time_ms: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    SlowQuery,
    UnusedIndex,
    IndexDegradation,
    WriteImpact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    pub details: String,
    pub index_name: String,
    pub resolved: bool,
    pub created_at_ms: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecommendationKind {
    Create,
    Drop,
    Rebuild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// `riskPenalty` term of the cost-benefit score (§4.9).
    pub(crate) fn penalty(self) -> f64 {
        match self {
            RiskLevel::Low => 1.0,
            RiskLevel::Medium => 0.7,
            RiskLevel::High => 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactWeight {
    High,
    Medium,
    Low,
}

impl ImpactWeight {
    /// `impactWeight` term of the cost-benefit score (§4.9).
    pub(crate) fn weight(self) -> f64 {
        match self {
            ImpactWeight::High => 3.0,
            ImpactWeight::Medium => 2.0,
            ImpactWeight::Low => 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub index_name: String,
    pub action: MaintenanceAction,
    pub sql: String,
    pub expected_impact: ImpactWeight,
    pub risk_level: RiskLevel,
    pub estimated_benefit: f64,
    /// Lower priority number = more urgent; divides into the score, per §4.9.
    pub priority: f64,
    /// `estimatedBenefit * impactWeight / priority * riskPenalty`, descending.
    pub score: f64,
}

/// Closed set of maintenance DDL actions. Kept as a variant enum rather than
/// ad-hoc SQL strings assembled inline so the automation policy's action
/// surface stays auditable (spec §4 implementation note). `CreateIndex`
/// carries the full `CREATE INDEX ...` statement; `DropIndex` carries only
/// the index name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaintenanceAction {
    Reindex(String),
    Analyze(String),
    Vacuum,
    PragmaOptimize,
    DropIndex(String),
    CreateIndex(String),
}

impl MaintenanceAction {
    /// Renders the action to the SQL (or pragma) statement executed via
    /// `QueryExecutor::exec`.
    pub fn to_sql(&self) -> String {
        match self {
            MaintenanceAction::Reindex(target) => format!("REINDEX {target}"),
            MaintenanceAction::Analyze(target) => format!("ANALYZE {target}"),
            MaintenanceAction::Vacuum => "VACUUM".to_string(),
            MaintenanceAction::PragmaOptimize => "PRAGMA optimize".to_string(),
            MaintenanceAction::DropIndex(name) => format!("DROP INDEX IF EXISTS {name}"),
            MaintenanceAction::CreateIndex(sql) => sql.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub id: String,
    pub action: MaintenanceAction,
    pub target: String,
    pub scheduled_time_ms: i64,
    pub priority: f64,
    pub estimated_duration_ms: i64,
}
