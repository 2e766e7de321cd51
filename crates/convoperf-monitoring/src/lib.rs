//! Index health monitoring, alerting, and maintenance recommendation loop
//! (spec §4.9).

pub mod monitor;
pub mod types;

pub use monitor::IndexMonitor;
pub use types::{
    Alert, AlertKind, AlertSeverity, AlertThresholds, ImpactWeight, IndexStat, MaintenanceAction,
    MaintenanceTask, MonitoringConfig, Recommendation, RecommendationKind, RiskLevel,
};
