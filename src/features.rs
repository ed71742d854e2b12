//! Fixed-order feature encoding for decision snapshots.
//!
//! The order and normalization of [`FEATURE_NAMES`] is a compatibility
//! contract: stored vectors from older runs must line up with new ones.

use serde::Serialize;

use crate::snapshot::StateSnapshot;

pub const FEATURE_COUNT: usize = 14;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "price",
    "volatility",
    "trend",
    "liquidity",
    "momentum",
    "shield_active",
    "threat_level",
    "fusion_confidence",
    "fusion_quality",
    "has_position",
    "position_size",
    "position_pnl",
    "override_active",
    "override_severity",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncodedState {
    pub values: [f64; FEATURE_COUNT],
    pub names: [&'static str; FEATURE_COUNT],
}

impl EncodedState {
    /// Share of finite features, 0..1.
    pub fn valid_fraction(&self) -> f64 {
        let valid = self.values.iter().filter(|v| v.is_finite()).count();
        valid as f64 / FEATURE_COUNT as f64
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names.iter().position(|n| *n == name).map(|i| self.values[i])
    }
}

/// Clamp into [0, 1]; NaN and infinities become NaN so they count as invalid.
fn unit(v: f64) -> f64 {
    if v.is_finite() {
        v.clamp(0.0, 1.0)
    } else {
        f64::NAN
    }
}

fn min_max(x: f64, lo: f64, hi: f64) -> f64 {
    unit((x - lo) / (hi - lo))
}

fn pct(x: f64) -> f64 {
    unit(x / 100.0)
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

pub fn encode_state(s: &StateSnapshot) -> EncodedState {
    let values = [
        min_max(s.market.price, 0.0, 100_000.0),
        pct(s.market.volatility),
        min_max(s.market.trend, -100.0, 100.0),
        pct(s.market.liquidity),
        min_max(s.market.momentum, -100.0, 100.0),
        flag(s.engine.shield_active),
        pct(s.engine.threat_level),
        pct(s.fusion.confidence),
        pct(s.fusion.quality),
        flag(s.position.has_position),
        min_max(s.position.size, 0.0, 10.0),
        min_max(s.position.pnl, -100.0, 100.0),
        flag(s.override_state.active),
        pct(s.override_state.severity),
    ];
    EncodedState {
        values,
        names: FEATURE_NAMES,
    }
}
