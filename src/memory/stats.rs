//! Derived diagnostics for the experience store.

use serde::{Deserialize, Serialize};

use super::{MemoryStore, Priority};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total_entries: usize,
    pub max_size: usize,
    pub utilization_pct: f64,
    pub by_priority: PriorityCounts,
    pub with_outcome: usize,
    pub successful: usize,
    pub failed: usize,
    pub reviewed: usize,
    pub unreviewed: usize,
    pub avg_importance: f64,
    pub oldest_timestamp: Option<u64>,
    pub newest_timestamp: Option<u64>,
    /// Share of entries carrying an outcome, percent
    pub outcome_ratio_pct: f64,
    pub unreviewed_pct: f64,
    /// Successful / outcome-bearing entries, percent; `None` without outcomes
    pub success_rate_pct: Option<f64>,
    pub total_pushed: u64,
    pub total_evicted: u64,
    pub total_compressions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryHealth {
    pub status: HealthStatus,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub utilization_pct: f64,
    pub outcome_ratio_pct: f64,
    pub unreviewed_pct: f64,
    pub success_rate_pct: Option<f64>,
}

fn pct(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

impl MemoryStore {
    pub fn memory_stats(&self) -> MemoryStats {
        let total = self.len();
        let mut by_priority = PriorityCounts::default();
        let (mut with_outcome, mut successful, mut reviewed) = (0, 0, 0);
        let mut importance_sum = 0.0;
        let mut oldest: Option<u64> = None;
        let mut newest: Option<u64> = None;

        for e in self.entries() {
            match e.priority {
                Priority::Low => by_priority.low += 1,
                Priority::Medium => by_priority.medium += 1,
                Priority::High => by_priority.high += 1,
                Priority::Critical => by_priority.critical += 1,
            }
            if let Some(o) = &e.state.outcome {
                with_outcome += 1;
                if o.success {
                    successful += 1;
                }
            }
            if e.reviewed {
                reviewed += 1;
            }
            importance_sum += e.importance;
            let ts = e.state.timestamp;
            oldest = Some(oldest.map_or(ts, |o| o.min(ts)));
            newest = Some(newest.map_or(ts, |n| n.max(ts)));
        }

        let counters = self.counters();
        MemoryStats {
            total_entries: total,
            max_size: self.max_size(),
            utilization_pct: pct(total, self.max_size()),
            by_priority,
            with_outcome,
            successful,
            failed: with_outcome - successful,
            reviewed,
            unreviewed: total - reviewed,
            avg_importance: if total == 0 { 0.0 } else { importance_sum / total as f64 },
            oldest_timestamp: oldest,
            newest_timestamp: newest,
            outcome_ratio_pct: pct(with_outcome, total),
            unreviewed_pct: pct(total - reviewed, total),
            success_rate_pct: (with_outcome > 0).then(|| pct(successful, with_outcome)),
            total_pushed: counters.total_pushed,
            total_evicted: counters.total_evicted,
            total_compressions: counters.total_compressions,
        }
    }

    pub fn memory_health(&self) -> MemoryHealth {
        let stats = self.memory_stats();
        let mut status = HealthStatus::Healthy;
        let mut issues = Vec::new();
        let mut recommendations = Vec::new();

        if stats.utilization_pct > 95.0 {
            status = HealthStatus::Critical;
            issues.push(format!("memory nearly full ({:.1}%)", stats.utilization_pct));
            recommendations.push("compress memory or raise max_size".to_string());
        } else if stats.utilization_pct > 80.0 {
            status = status.max(HealthStatus::Warning);
            issues.push(format!("memory utilization high ({:.1}%)", stats.utilization_pct));
            recommendations.push("schedule a compression pass".to_string());
        }

        if stats.total_entries > 0 {
            if stats.outcome_ratio_pct < 20.0 {
                status = status.max(HealthStatus::Warning);
                issues.push(format!("few entries with outcomes ({:.1}%)", stats.outcome_ratio_pct));
                recommendations.push("attach outcomes to closed trades".to_string());
            }
            if stats.unreviewed_pct > 70.0 {
                status = status.max(HealthStatus::Warning);
                issues.push(format!("most entries unreviewed ({:.1}%)", stats.unreviewed_pct));
                recommendations.push("review or replay stored experiences".to_string());
            }
        }

        if let Some(rate) = stats.success_rate_pct {
            if rate > 90.0 || rate < 10.0 {
                status = status.max(HealthStatus::Warning);
                issues.push(format!("outcomes unbalanced (success rate {:.1}%)", rate));
                recommendations.push("use balanced sampling for training".to_string());
            }
        }

        MemoryHealth {
            status,
            issues,
            recommendations,
            utilization_pct: stats.utilization_pct,
            outcome_ratio_pct: stats.outcome_ratio_pct,
            unreviewed_pct: stats.unreviewed_pct,
            success_rate_pct: stats.success_rate_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::snapshot::{StateSnapshot, TradeOutcome};

    fn with_outcome(ts: u64, success: bool) -> StateSnapshot {
        StateSnapshot {
            timestamp: ts,
            outcome: Some(TradeOutcome {
                profit: if success { 1.0 } else { -1.0 },
                profit_pct: if success { 1.0 } else { -1.0 },
                duration_ms: 0,
                success,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_store_is_healthy() {
        let m = MemoryStore::default();
        let h = m.memory_health();
        assert_eq!(h.status, HealthStatus::Healthy);
        assert!(h.issues.is_empty());
        assert_eq!(m.memory_stats().success_rate_pct, None);
    }

    #[test]
    fn test_stats_counts() {
        let mut m = MemoryStore::default();
        m.push(with_outcome(5, true), Priority::High);
        m.push(with_outcome(3, false), Priority::Medium);
        m.push(StateSnapshot { timestamp: 9, ..Default::default() }, Priority::Low);
        m.mark_as_reviewed(5);

        let s = m.memory_stats();
        assert_eq!(s.total_entries, 3);
        assert_eq!(s.by_priority.high, 1);
        assert_eq!(s.with_outcome, 2);
        assert_eq!(s.successful, 1);
        assert_eq!(s.failed, 1);
        assert_eq!(s.reviewed, 1);
        assert_eq!(s.oldest_timestamp, Some(3));
        assert_eq!(s.newest_timestamp, Some(9));
        assert_eq!(s.success_rate_pct, Some(50.0));
        assert!((s.utilization_pct - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_full_store_is_critical() {
        let mut m = MemoryStore::new(MemoryConfig {
            max_size: 500,
            compression_threshold: 1500,
        });
        for ts in 0..490 {
            let success = ts % 2 == 0;
            m.push(with_outcome(ts, success), Priority::Medium);
        }
        m.mark_all_reviewed();
        let h = m.memory_health();
        assert_eq!(h.status, HealthStatus::Critical);
        assert_eq!(h.issues.len(), 1);
    }

    #[test]
    fn test_warning_thresholds() {
        let mut m = MemoryStore::default();
        // no outcomes, all unreviewed
        for ts in 0..10 {
            m.push(StateSnapshot { timestamp: ts, ..Default::default() }, Priority::Low);
        }
        let h = m.memory_health();
        assert_eq!(h.status, HealthStatus::Warning);
        assert_eq!(h.issues.len(), 2);

        // all successes: outcome ratio fine, success rate too high
        let mut m = MemoryStore::default();
        for ts in 0..10 {
            m.push(with_outcome(ts, true), Priority::Low);
        }
        m.mark_all_reviewed();
        let h = m.memory_health();
        assert_eq!(h.status, HealthStatus::Warning);
        assert_eq!(h.issues.len(), 1);
        assert!(h.issues[0].contains("unbalanced"));
    }
}
