//! AutomationDecision rolling history and the alert-routing policy (spec
//! §3 invariants, §4.9, §8 property 10, scenario S5).

use std::collections::VecDeque;

use convoperf_monitoring::{Alert, AlertKind, AlertSeverity};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{OptimizationConfig, RiskTolerance};

const HISTORY_MAX: usize = 10_000;
const HISTORY_TRIM_TO: usize = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomationKind {
    IndexOptimization,
    AlertEscalation,
    MaintenanceTask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Defer,
    Escalate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationDecision {
    pub id: String,
    pub kind: AutomationKind,
    pub decision: Decision,
    pub reason: String,
    pub confidence: f64,
    pub result: Option<String>,
    pub timestamp_ms: i64,
}

/// For a fixed `risk_tolerance`, deterministically maps an alert's
/// `(kind, severity)` to approve/defer (spec §8 property 10).
///
/// - `slow_query` + `severity=critical` + risk tolerance != conservative ->
///   approve (confidence 0.8); else defer.
/// - `unused_index` + `auto_drop_unused_indexes=true` + not critical ->
///   approve (0.9); else defer.
/// - otherwise defer.
pub fn decide(alert: &Alert, optimization: &OptimizationConfig, now_ms: i64) -> AutomationDecision {
    let is_critical = alert.severity == AlertSeverity::Critical;

    let (decision, confidence, reason) = match alert.kind {
        AlertKind::SlowQuery
            if is_critical && optimization.risk_tolerance != RiskTolerance::Conservative =>
        {
            (
                Decision::Approve,
                0.8,
                "critical slow query with non-conservative risk tolerance".to_string(),
            )
        }
        AlertKind::UnusedIndex if optimization.auto_drop_unused_indexes && !is_critical => (
            Decision::Approve,
            0.9,
            "unused index auto-drop enabled".to_string(),
        ),
        _ => (
            Decision::Defer,
            0.5,
            "no approval rule matched; deferring to manual review".to_string(),
        ),
    };

    AutomationDecision {
        id: format!("decision:{}:{now_ms}", alert.id),
        kind: AutomationKind::AlertEscalation,
        decision,
        reason,
        confidence,
        result: None,
        timestamp_ms: now_ms,
    }
}

/// Whether `hour` (0..24) falls within the configured maintenance window.
pub fn within_maintenance_window(optimization: &OptimizationConfig, hour: u8) -> bool {
    optimization.maintenance_window_hours.contains(&hour)
}

/// Rolling, lock-protected history of every automation decision, bounded to
/// 10k entries and trimmed to 5k once exceeded.
pub struct AutomationHistory {
    entries: Mutex<VecDeque<AutomationDecision>>,
}

impl AutomationHistory {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, decision: AutomationDecision) {
        let mut entries = self.entries.lock();
        entries.push_back(decision);
        if entries.len() > HISTORY_MAX {
            while entries.len() > HISTORY_TRIM_TO {
                entries.pop_front();
            }
        }
    }

    /// Attaches an execution result to the most recent decision matching
    /// `id`, if present.
    pub fn record_result(&self, id: &str, result: String) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.iter_mut().rev().find(|e| e.id == id) {
            entry.result = Some(result);
        }
    }

    pub fn snapshot(&self) -> Vec<AutomationDecision> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AutomationHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoperf_monitoring::AlertKind;

    fn alert(kind: AlertKind, severity: AlertSeverity) -> Alert {
        Alert {
            id: "a1".to_string(),
            kind,
            severity,
            details: "test".to_string(),
            index_name: "idx".to_string(),
            resolved: false,
            created_at_ms: 0,
        }
    }

    #[test]
    fn critical_slow_query_is_approved_under_moderate_risk_tolerance() {
        let optimization = OptimizationConfig {
            risk_tolerance: RiskTolerance::Moderate,
            ..OptimizationConfig::default()
        };
        let decision = decide(&alert(AlertKind::SlowQuery, AlertSeverity::Critical), &optimization, 0);
        assert_eq!(decision.decision, Decision::Approve);
        assert!((decision.confidence - 0.8).abs() < 1e-9);
        assert_eq!(decision.kind, AutomationKind::AlertEscalation);
    }

    #[test]
    fn critical_slow_query_is_deferred_under_conservative_risk_tolerance() {
        let optimization = OptimizationConfig {
            risk_tolerance: RiskTolerance::Conservative,
            ..OptimizationConfig::default()
        };
        let decision = decide(&alert(AlertKind::SlowQuery, AlertSeverity::Critical), &optimization, 0);
        assert_eq!(decision.decision, Decision::Defer);
    }

    #[test]
    fn unused_index_approved_only_when_auto_drop_enabled() {
        let mut optimization = OptimizationConfig::default();
        optimization.auto_drop_unused_indexes = true;
        let decision = decide(&alert(AlertKind::UnusedIndex, AlertSeverity::Medium), &optimization, 0);
        assert_eq!(decision.decision, Decision::Approve);

        optimization.auto_drop_unused_indexes = false;
        let decision = decide(&alert(AlertKind::UnusedIndex, AlertSeverity::Medium), &optimization, 0);
        assert_eq!(decision.decision, Decision::Defer);
    }

    #[test]
    fn history_trims_once_over_capacity() {
        let history = AutomationHistory::new();
        for i in 0..(HISTORY_MAX + 10) {
            history.record(AutomationDecision {
                id: format!("d{i}"),
                kind: AutomationKind::AlertEscalation,
                decision: Decision::Defer,
                reason: "x".to_string(),
                confidence: 0.5,
                result: None,
                timestamp_ms: i as i64,
            });
        }
        assert_eq!(history.len(), HISTORY_TRIM_TO);
    }
}
