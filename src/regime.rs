//! Regime classification from market conditions.
//!
//! The registry is an ordered list of profiles with inclusive ranges on
//! volatility, trend strength and liquidity. Ranges overlap, so the first
//! matching profile wins and the order of [`REGISTRY`] is part of the
//! contract.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::weights::{RewardKey, RewardOverride};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    Stable,
    Volatile,
    Trending,
    Ranging,
    Breakout,
    Crisis,
}

impl Regime {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Stable => "STABLE",
            Regime::Volatile => "VOLATILE",
            Regime::Trending => "TRENDING",
            Regime::Ranging => "RANGING",
            Regime::Breakout => "BREAKOUT",
            Regime::Crisis => "CRISIS",
        }
    }

    pub fn profile(&self) -> &'static RegimeProfile {
        // Every variant has exactly one registry row.
        REGISTRY
            .iter()
            .find(|p| p.regime == *self)
            .unwrap_or(&REGISTRY[0])
    }

    /// Whether a free-form label names a registry profile.
    pub fn is_known(label: &str) -> bool {
        label.parse::<Regime>().is_ok()
    }
}

impl Default for Regime {
    fn default() -> Self {
        Regime::Stable
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Regime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        REGISTRY
            .iter()
            .map(|p| p.regime)
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.to_string())
    }
}

/// Market readings used for detection. Trend strength is unsigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketConditions {
    pub volatility: f64,
    pub trend_strength: f64,
    pub liquidity: f64,
}

impl MarketConditions {
    pub fn new(volatility: f64, trend_strength: f64, liquidity: f64) -> Self {
        Self {
            volatility,
            trend_strength,
            liquidity,
        }
    }

    /// Build from a signed trend reading.
    pub fn from_signed_trend(volatility: f64, trend: f64, liquidity: f64) -> Self {
        Self::new(volatility, trend.abs(), liquidity)
    }
}

#[derive(Debug, Clone)]
pub struct RegimeProfile {
    pub regime: Regime,
    pub volatility: RangeInclusive<f64>,
    pub trend_strength: RangeInclusive<f64>,
    pub liquidity: RangeInclusive<f64>,
    /// Reward weights considered optimal in this regime
    pub optimal_weights: &'static [RewardOverride],
}

impl RegimeProfile {
    pub fn matches(&self, m: &MarketConditions) -> bool {
        self.volatility.contains(&m.volatility)
            && self.trend_strength.contains(&m.trend_strength)
            && self.liquidity.contains(&m.liquidity)
    }
}

const fn ov(key: RewardKey, value: f64) -> RewardOverride {
    RewardOverride { key, value }
}

/// Fixed, ordered profile registry.
pub static REGISTRY: [RegimeProfile; 6] = [
    RegimeProfile {
        regime: Regime::Stable,
        volatility: 0.0..=30.0,
        trend_strength: 0.0..=40.0,
        liquidity: 50.0..=100.0,
        optimal_weights: &[
            ov(RewardKey::ProfitMultiplier, 1.0),
            ov(RewardKey::TimeEfficiency, 0.4),
        ],
    },
    RegimeProfile {
        regime: Regime::Volatile,
        volatility: 60.0..=100.0,
        trend_strength: 0.0..=40.0,
        liquidity: 40.0..=100.0,
        optimal_weights: &[
            ov(RewardKey::RiskAdjustedReturn, 1.5),
            ov(RewardKey::ShieldCompliance, 2.0),
        ],
    },
    RegimeProfile {
        regime: Regime::Trending,
        volatility: 20.0..=60.0,
        trend_strength: 60.0..=100.0,
        liquidity: 40.0..=100.0,
        optimal_weights: &[
            ov(RewardKey::ProfitMultiplier, 1.3),
            ov(RewardKey::TimeEfficiency, 0.2),
        ],
    },
    RegimeProfile {
        regime: Regime::Ranging,
        volatility: 10.0..=50.0,
        trend_strength: 0.0..=30.0,
        liquidity: 30.0..=100.0,
        optimal_weights: &[
            ov(RewardKey::TimeEfficiency, 0.5),
            ov(RewardKey::FusionAlignment, 1.2),
        ],
    },
    RegimeProfile {
        regime: Regime::Breakout,
        volatility: 50.0..=85.0,
        trend_strength: 50.0..=100.0,
        liquidity: 30.0..=100.0,
        optimal_weights: &[
            ov(RewardKey::ProfitMultiplier, 1.4),
            ov(RewardKey::AdaptiveAccuracy, 1.0),
        ],
    },
    RegimeProfile {
        regime: Regime::Crisis,
        volatility: 80.0..=100.0,
        trend_strength: 0.0..=100.0,
        liquidity: 0.0..=40.0,
        optimal_weights: &[
            ov(RewardKey::ShieldCompliance, 2.5),
            ov(RewardKey::RiskAdjustedReturn, 1.8),
            ov(RewardKey::ProfitMultiplier, 0.7),
        ],
    },
];

/// First profile in registry order whose ranges all contain the readings,
/// `STABLE` when none match.
pub fn detect_regime(market: &MarketConditions) -> Regime {
    REGISTRY
        .iter()
        .find(|p| p.matches(market))
        .map(|p| p.regime)
        .unwrap_or(Regime::Stable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crisis_wins_when_earlier_profiles_miss() {
        let m = MarketConditions::new(90.0, 50.0, 20.0);
        assert_eq!(detect_regime(&m), Regime::Crisis);
    }

    #[test]
    fn test_overlap_resolved_by_registry_order() {
        // Inside both STABLE and RANGING; STABLE is earlier.
        let m = MarketConditions::new(20.0, 10.0, 80.0);
        assert!(Regime::Ranging.profile().matches(&m));
        assert_eq!(detect_regime(&m), Regime::Stable);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let m = MarketConditions::new(30.0, 40.0, 50.0);
        assert_eq!(detect_regime(&m), Regime::Stable);
    }

    #[test]
    fn test_no_match_falls_back_to_stable() {
        // Liquidity 45 with vol 40 / trend 45 hits nothing.
        let m = MarketConditions::new(40.0, 45.0, 25.0);
        assert!(REGISTRY.iter().all(|p| !p.matches(&m)));
        assert_eq!(detect_regime(&m), Regime::Stable);
    }

    #[test]
    fn test_nan_readings_fall_back_to_stable() {
        let m = MarketConditions::new(f64::NAN, 10.0, 80.0);
        assert_eq!(detect_regime(&m), Regime::Stable);
    }

    #[test]
    fn test_signed_trend_uses_magnitude() {
        let m = MarketConditions::from_signed_trend(40.0, -80.0, 70.0);
        assert_eq!(detect_regime(&m), Regime::Trending);
    }

    #[test]
    fn test_detection_always_returns_registry_member() {
        for v in (0..=100).step_by(10) {
            for t in (0..=100).step_by(10) {
                for l in (0..=100).step_by(10) {
                    let r = detect_regime(&MarketConditions::new(v as f64, t as f64, l as f64));
                    assert!(REGISTRY.iter().any(|p| p.regime == r));
                }
            }
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("crisis".parse::<Regime>(), Ok(Regime::Crisis));
        assert_eq!("BREAKOUT".parse::<Regime>(), Ok(Regime::Breakout));
        assert!(!Regime::is_known("SIDEWAYS"));
    }
}
