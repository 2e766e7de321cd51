//! IndexMonitor — samples per-index usage/health telemetry, emits alerts
//! when configured thresholds are breached, and derives ranked optimization
//! recommendations (spec §4.9).

use dashmap::DashMap;
use tracing::{debug, info};

use crate::types::{
    Alert, AlertKind, AlertSeverity, AlertThresholds, ImpactWeight, IndexStat, MaintenanceAction,
    MaintenanceTask, MonitoringConfig, Recommendation, RecommendationKind, RiskLevel,
};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
/// A drop in effectiveness larger than this between consecutive samples is
/// treated as a degradation, not ordinary noise.
const DEGRADATION_DROP_THRESHOLD: f64 = 0.3;

pub struct IndexMonitor {
    config: MonitoringConfig,
    stats: DashMap<String, IndexStat>,
    previous_effectiveness: DashMap<String, f64>,
    maintenance: DashMap<String, MaintenanceTask>,
}

impl IndexMonitor {
    pub fn new(config: MonitoringConfig) -> Self {
        Self {
            config,
            stats: DashMap::new(),
            previous_effectiveness: DashMap::new(),
            maintenance: DashMap::new(),
        }
    }

    /// Records (or overwrites) the latest sample for an index. Called once
    /// per index per monitoring cycle.
    pub fn record_sample(&self, stat: IndexStat) {
        debug!(index = %stat.index_name, usage = stat.usage_count, "index sample recorded");
        self.stats.insert(stat.index_name.clone(), stat);
    }

    pub fn stat(&self, index_name: &str) -> Option<IndexStat> {
        self.stats.get(index_name).map(|e| e.value().clone())
    }

    pub fn all_stats(&self) -> Vec<IndexStat> {
        self.stats.iter().map(|e| e.value().clone()).collect()
    }

    /// Evaluates every known index against the configured thresholds.
    /// Consecutive calls are what makes `IndexDegradation` detectable: the
    /// effectiveness score observed on the previous call is compared to the
    /// current one.
    pub fn check_alerts(&self, now_ms: i64) -> Vec<Alert> {
        let thresholds = self.config.alert_thresholds;
        let mut alerts = Vec::new();

        for entry in self.stats.iter() {
            let stat = entry.value();
            alerts.extend(self.alerts_for_index(stat, &thresholds, now_ms));
        }

        for alert in &alerts {
            if alert.kind != AlertKind::IndexDegradation {
                continue;
            }
            info!(index = %alert.index_name, severity = ?alert.severity, "index degradation alert");
        }

        for entry in self.stats.iter() {
            self.previous_effectiveness
                .insert(entry.key().clone(), entry.value().effectiveness_score);
        }

        alerts
    }

    fn alerts_for_index(
        &self,
        stat: &IndexStat,
        thresholds: &AlertThresholds,
        now_ms: i64,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();

        if stat.avg_query_time_ms > thresholds.slow_query_ms {
            let severity = if stat.avg_query_time_ms > thresholds.slow_query_ms * 2.0 {
                AlertSeverity::Critical
            } else {
                AlertSeverity::High
            };
            alerts.push(Alert {
                id: format!("slow_query:{}:{now_ms}", stat.index_name),
                kind: AlertKind::SlowQuery,
                severity,
                details: format!(
                    "avg query time {:.1}ms exceeds threshold {:.1}ms",
                    stat.avg_query_time_ms, thresholds.slow_query_ms
                ),
                index_name: stat.index_name.clone(),
                resolved: false,
                created_at_ms: now_ms,
            });
        }

        let unused_ms = thresholds.unused_index_days * DAY_MS;
        if now_ms - stat.last_used_ms > unused_ms {
            alerts.push(Alert {
                id: format!("unused_index:{}:{now_ms}", stat.index_name),
                kind: AlertKind::UnusedIndex,
                severity: AlertSeverity::Medium,
                details: format!(
                    "unused for {} days (threshold {})",
                    (now_ms - stat.last_used_ms) / DAY_MS,
                    thresholds.unused_index_days
                ),
                index_name: stat.index_name.clone(),
                resolved: false,
                created_at_ms: now_ms,
            });
        }

        if let Some(previous) = self.previous_effectiveness.get(&stat.index_name) {
            let drop = *previous - stat.effectiveness_score;
            if drop > DEGRADATION_DROP_THRESHOLD {
                alerts.push(Alert {
                    id: format!("index_degradation:{}:{now_ms}", stat.index_name),
                    kind: AlertKind::IndexDegradation,
                    severity: AlertSeverity::High,
                    details: format!(
                        "effectiveness dropped from {:.2} to {:.2}",
                        *previous, stat.effectiveness_score
                    ),
                    index_name: stat.index_name.clone(),
                    resolved: false,
                    created_at_ms: now_ms,
                });
            }
        }

        if stat.write_impact > thresholds.write_impact_threshold {
            alerts.push(Alert {
                id: format!("write_impact:{}:{now_ms}", stat.index_name),
                kind: AlertKind::WriteImpact,
                severity: AlertSeverity::Medium,
                details: format!(
                    "write impact {:.2} exceeds threshold {:.2}",
                    stat.write_impact, thresholds.write_impact_threshold
                ),
                index_name: stat.index_name.clone(),
                resolved: false,
                created_at_ms: now_ms,
            });
        }

        alerts
    }

    /// Derives ranked recommendations from the current alert set:
    /// unused indexes are candidates for drop, slow/degraded indexes for
    /// rebuild. Scored by `estimatedBenefit * impactWeight / priority *
    /// riskPenalty`, descending.
    pub fn recommend(&self, alerts: &[Alert]) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        for alert in alerts {
            let Some(stat) = self.stat(&alert.index_name) else {
                continue;
            };
            let recommendation = match alert.kind {
                AlertKind::UnusedIndex => {
                    let action = MaintenanceAction::DropIndex(stat.index_name.clone());
                    Some(Recommendation {
                        kind: RecommendationKind::Drop,
                        index_name: stat.index_name.clone(),
                        sql: action.to_sql(),
                        action,
                        expected_impact: ImpactWeight::Medium,
                        risk_level: RiskLevel::Low,
                        estimated_benefit: stat.size_bytes as f64 / 1_048_576.0,
                        priority: 2.0,
                        score: 0.0,
                    })
                }
                AlertKind::SlowQuery | AlertKind::IndexDegradation => {
                    let action = MaintenanceAction::Reindex(stat.index_name.clone());
                    Some(Recommendation {
                        kind: RecommendationKind::Rebuild,
                        index_name: stat.index_name.clone(),
                        sql: action.to_sql(),
                        action,
                        expected_impact: ImpactWeight::High,
                        risk_level: RiskLevel::Medium,
                        estimated_benefit: stat.avg_query_time_ms,
                        priority: 1.0,
                        score: 0.0,
                    })
                }
                AlertKind::WriteImpact => {
                    let action = MaintenanceAction::DropIndex(stat.index_name.clone());
                    Some(Recommendation {
                        kind: RecommendationKind::Drop,
                        index_name: stat.index_name.clone(),
                        sql: action.to_sql(),
                        action,
                        expected_impact: ImpactWeight::Medium,
                        risk_level: RiskLevel::High,
                        estimated_benefit: stat.write_impact,
                        priority: 1.5,
                        score: 0.0,
                    })
                }
            };

            if let Some(mut recommendation) = recommendation {
                recommendation.score = recommendation.estimated_benefit
                    * recommendation.expected_impact.weight()
                    / recommendation.priority
                    * recommendation.risk_level.penalty();
                recommendations.push(recommendation);
            }
        }

        recommendations.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        recommendations
    }

    /// Adds a task to the maintenance dashboard.
    pub fn queue_maintenance(&self, task: MaintenanceTask) {
        self.maintenance.insert(task.id.clone(), task);
    }

    /// Removes a task on successful (or failed-but-terminal) completion.
    pub fn complete_maintenance(&self, task_id: &str) {
        self.maintenance.remove(task_id);
    }

    /// Removes tasks older than 24h that were never completed.
    pub fn prune_expired_maintenance(&self, now_ms: i64) {
        self.maintenance
            .retain(|_, task| now_ms - task.scheduled_time_ms <= DAY_MS);
    }

    pub fn maintenance_dashboard(&self) -> Vec<MaintenanceTask> {
        self.maintenance.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(name: &str, avg_ms: f64, last_used_ms: i64, effectiveness: f64) -> IndexStat {
        IndexStat {
            index_name: name.to_string(),
            table_name: "conversations".to_string(),
            usage_count: 10,
            effectiveness_score: effectiveness,
            write_impact: 0.1,
            size_bytes: 4096,
            last_used_ms,
            avg_query_time_ms: avg_ms,
        }
    }

    #[test]
    fn slow_query_above_threshold_raises_alert() {
        let monitor = IndexMonitor::new(MonitoringConfig::default());
        monitor.record_sample(stat("idx_conv_title", 900.0, 0, 0.8));
        let alerts = monitor.check_alerts(0);
        assert!(alerts.iter().any(|a| a.kind == AlertKind::SlowQuery));
    }

    #[test]
    fn unused_index_past_threshold_raises_alert() {
        let monitor = IndexMonitor::new(MonitoringConfig::default());
        let unused_for = 40 * DAY_MS;
        monitor.record_sample(stat("idx_old", 10.0, 0, 0.8));
        let alerts = monitor.check_alerts(unused_for);
        assert!(alerts.iter().any(|a| a.kind == AlertKind::UnusedIndex));
    }

    #[test]
    fn effectiveness_drop_across_samples_raises_degradation_alert() {
        let monitor = IndexMonitor::new(MonitoringConfig::default());
        monitor.record_sample(stat("idx_hot", 10.0, 0, 0.9));
        monitor.check_alerts(0);
        monitor.record_sample(stat("idx_hot", 10.0, 0, 0.4));
        let alerts = monitor.check_alerts(1);
        assert!(alerts.iter().any(|a| a.kind == AlertKind::IndexDegradation));
    }

    #[test]
    fn recommendations_are_sorted_descending_by_score() {
        let monitor = IndexMonitor::new(MonitoringConfig::default());
        monitor.record_sample(stat("idx_unused", 10.0, -100 * DAY_MS, 0.8));
        monitor.record_sample(stat("idx_slow", 900.0, 0, 0.8));
        let alerts = monitor.check_alerts(0);
        let recommendations = monitor.recommend(&alerts);
        assert!(!recommendations.is_empty());
        for pair in recommendations.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn expired_maintenance_tasks_are_pruned() {
        let monitor = IndexMonitor::new(MonitoringConfig::default());
        monitor.queue_maintenance(MaintenanceTask {
            id: "t1".to_string(),
            action: MaintenanceAction::Vacuum,
            target: "conversations".to_string(),
            scheduled_time_ms: 0,
            priority: 1.0,
            estimated_duration_ms: 1000,
        });
        monitor.prune_expired_maintenance(DAY_MS + 1);
        assert!(monitor.maintenance_dashboard().is_empty());
    }
}
