//! Importance scoring for experience entries.

use serde::{Deserialize, Serialize};

use crate::snapshot::StateSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Low, Priority::Medium, Priority::High, Priority::Critical];

    pub fn bonus(&self) -> f64 {
        match self {
            Priority::Low => 0.0,
            Priority::Medium => 20.0,
            Priority::High => 40.0,
            Priority::Critical => 60.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }
}

const BASE: f64 = 50.0;

/// Heuristic 0..100 score used for eviction order, compression and
/// prioritized sampling.
pub fn score(state: &StateSnapshot, priority: Priority) -> f64 {
    let mut s = BASE + priority.bonus();

    if let Some(outcome) = &state.outcome {
        s += 20.0;
        if outcome.profit_pct.abs() > 5.0 {
            s += 10.0;
        }
    }
    if state.engine.shield_active {
        s += 10.0;
    }
    if state.engine.threat_level > 70.0 {
        s += 10.0;
    }
    if state.override_state.active && state.override_state.severity > 70.0 {
        s += 15.0;
    }
    if state.fusion.confidence > 80.0 {
        s += 10.0;
    }

    s.min(100.0)
}
