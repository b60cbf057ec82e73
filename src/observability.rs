use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Workflow transition metrics
#[derive(Debug, Default)]
pub struct EngineMetrics {
    pub transitions_applied: AtomicU64,
    pub transitions_rejected: AtomicU64,
    pub awards: AtomicU64,
    pub audits: AtomicU64,
    pub findings_resolved: AtomicU64,
    pub ai_evaluations_discarded: AtomicU64,
    pub version_conflicts: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_applied(&self) {
        self.transitions_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.transitions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_award(&self) {
        self.awards.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit(&self) {
        self.audits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finding_resolved(&self) {
        self.findings_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ai_discarded(&self) {
        self.ai_evaluations_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_version_conflict(&self) {
        self.version_conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> EngineStats {
        EngineStats {
            transitions_applied: self.transitions_applied.load(Ordering::Relaxed),
            transitions_rejected: self.transitions_rejected.load(Ordering::Relaxed),
            awards: self.awards.load(Ordering::Relaxed),
            audits: self.audits.load(Ordering::Relaxed),
            findings_resolved: self.findings_resolved.load(Ordering::Relaxed),
            ai_evaluations_discarded: self.ai_evaluations_discarded.load(Ordering::Relaxed),
            version_conflicts: self.version_conflicts.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            applied = stats.transitions_applied,
            rejected = stats.transitions_rejected,
            awards = stats.awards,
            audits = stats.audits,
            findings_resolved = stats.findings_resolved,
            ai_discarded = stats.ai_evaluations_discarded,
            version_conflicts = stats.version_conflicts,
            "Workflow engine metrics"
        );
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub transitions_applied: u64,
    pub transitions_rejected: u64,
    pub awards: u64,
    pub audits: u64,
    pub findings_resolved: u64,
    pub ai_evaluations_discarded: u64,
    pub version_conflicts: u64,
}

/// Time an operation and log its duration
pub struct OperationTimer {
    operation: &'static str,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    pub fn finish(self, outcome: &str) {
        let duration = self.start.elapsed();
        info!(
            operation = self.operation,
            outcome = outcome,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = EngineMetrics::new();
        metrics.record_applied();
        metrics.record_applied();
        metrics.record_rejected();
        metrics.record_award();
        let stats = metrics.get_stats();
        assert_eq!(stats.transitions_applied, 2);
        assert_eq!(stats.transitions_rejected, 1);
        assert_eq!(stats.awards, 1);
        assert_eq!(stats.audits, 0);
    }
}
