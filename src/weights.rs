//! Reward and penalty weight vectors.
//!
//! Every weight lives in `[MIN_WEIGHT, MAX_WEIGHT]`. The only way to change a
//! weight is [`RewardWeights::set`] / [`PenaltyWeights::set`], which clamp the
//! requested value and refuse non-finite input, so repeated multiplicative
//! adjustment can neither blow up nor collapse to zero.

use serde::{Deserialize, Serialize};

use crate::error::{ensure, Result};

/// Lower bound for every weight.
pub const MIN_WEIGHT: f64 = 0.01;
/// Upper bound for every weight.
pub const MAX_WEIGHT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKey {
    ProfitMultiplier,
    RiskAdjustedReturn,
    TimeEfficiency,
    ShieldCompliance,
    FusionAlignment,
    AdaptiveAccuracy,
    WinRateImprovement,
}

impl RewardKey {
    pub const ALL: [RewardKey; 7] = [
        RewardKey::ProfitMultiplier,
        RewardKey::RiskAdjustedReturn,
        RewardKey::TimeEfficiency,
        RewardKey::ShieldCompliance,
        RewardKey::FusionAlignment,
        RewardKey::AdaptiveAccuracy,
        RewardKey::WinRateImprovement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RewardKey::ProfitMultiplier => "profit_multiplier",
            RewardKey::RiskAdjustedReturn => "risk_adjusted_return",
            RewardKey::TimeEfficiency => "time_efficiency",
            RewardKey::ShieldCompliance => "shield_compliance",
            RewardKey::FusionAlignment => "fusion_alignment",
            RewardKey::AdaptiveAccuracy => "adaptive_accuracy",
            RewardKey::WinRateImprovement => "win_rate_improvement",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKey {
    LossMultiplier,
    DrawdownPenalty,
    OverrideViolation,
    PoorEntry,
    PoorExit,
    RegimeMismatch,
    Oversizing,
    IgnoredConflict,
}

impl PenaltyKey {
    pub const ALL: [PenaltyKey; 8] = [
        PenaltyKey::LossMultiplier,
        PenaltyKey::DrawdownPenalty,
        PenaltyKey::OverrideViolation,
        PenaltyKey::PoorEntry,
        PenaltyKey::PoorExit,
        PenaltyKey::RegimeMismatch,
        PenaltyKey::Oversizing,
        PenaltyKey::IgnoredConflict,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PenaltyKey::LossMultiplier => "loss_multiplier",
            PenaltyKey::DrawdownPenalty => "drawdown_penalty",
            PenaltyKey::OverrideViolation => "override_violation",
            PenaltyKey::PoorEntry => "poor_entry",
            PenaltyKey::PoorExit => "poor_exit",
            PenaltyKey::RegimeMismatch => "regime_mismatch",
            PenaltyKey::Oversizing => "oversizing",
            PenaltyKey::IgnoredConflict => "ignored_conflict",
        }
    }
}

/// Either side of the weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightKey {
    Reward(RewardKey),
    Penalty(PenaltyKey),
}

impl WeightKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            WeightKey::Reward(k) => k.as_str(),
            WeightKey::Penalty(k) => k.as_str(),
        }
    }

    /// All keys, rewards first.
    pub fn all() -> impl Iterator<Item = WeightKey> {
        RewardKey::ALL
            .into_iter()
            .map(WeightKey::Reward)
            .chain(PenaltyKey::ALL.into_iter().map(WeightKey::Penalty))
    }
}

/// Result of a bounded write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightChange {
    pub before: f64,
    pub after: f64,
    pub requested: f64,
}

impl WeightChange {
    pub fn clamped(&self) -> bool {
        self.requested.is_finite() && (self.requested - self.after).abs() > f64::EPSILON
    }

    pub fn rejected(&self) -> bool {
        !self.requested.is_finite()
    }

    pub fn changed(&self) -> bool {
        (self.after - self.before).abs() > f64::EPSILON
    }
}

fn bounded_write(slot: &mut f64, requested: f64) -> WeightChange {
    let before = *slot;
    if requested.is_finite() {
        *slot = requested.clamp(MIN_WEIGHT, MAX_WEIGHT);
    }
    WeightChange {
        before,
        after: *slot,
        requested,
    }
}

fn in_bounds(v: f64) -> bool {
    v.is_finite() && (MIN_WEIGHT..=MAX_WEIGHT).contains(&v)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RewardWeights {
    pub profit_multiplier: f64,
    pub risk_adjusted_return: f64,
    pub time_efficiency: f64,
    pub shield_compliance: f64,
    pub fusion_alignment: f64,
    pub adaptive_accuracy: f64,
    pub win_rate_improvement: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            profit_multiplier: 1.0,
            risk_adjusted_return: 1.2,
            time_efficiency: 0.3,
            shield_compliance: 1.5,
            fusion_alignment: 1.0,
            adaptive_accuracy: 0.8,
            win_rate_improvement: 0.5,
        }
    }
}

impl RewardWeights {
    pub fn get(&self, key: RewardKey) -> f64 {
        match key {
            RewardKey::ProfitMultiplier => self.profit_multiplier,
            RewardKey::RiskAdjustedReturn => self.risk_adjusted_return,
            RewardKey::TimeEfficiency => self.time_efficiency,
            RewardKey::ShieldCompliance => self.shield_compliance,
            RewardKey::FusionAlignment => self.fusion_alignment,
            RewardKey::AdaptiveAccuracy => self.adaptive_accuracy,
            RewardKey::WinRateImprovement => self.win_rate_improvement,
        }
    }

    fn slot(&mut self, key: RewardKey) -> &mut f64 {
        match key {
            RewardKey::ProfitMultiplier => &mut self.profit_multiplier,
            RewardKey::RiskAdjustedReturn => &mut self.risk_adjusted_return,
            RewardKey::TimeEfficiency => &mut self.time_efficiency,
            RewardKey::ShieldCompliance => &mut self.shield_compliance,
            RewardKey::FusionAlignment => &mut self.fusion_alignment,
            RewardKey::AdaptiveAccuracy => &mut self.adaptive_accuracy,
            RewardKey::WinRateImprovement => &mut self.win_rate_improvement,
        }
    }

    /// Bounded write: clamps into the weight range, ignores non-finite input.
    pub fn set(&mut self, key: RewardKey, value: f64) -> WeightChange {
        bounded_write(self.slot(key), value)
    }

    pub fn validate(&self) -> Result<()> {
        for key in RewardKey::ALL {
            let v = self.get(key);
            ensure(in_bounds(v), || {
                format!("reward weight {} = {} outside [{}, {}]", key.as_str(), v, MIN_WEIGHT, MAX_WEIGHT)
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PenaltyWeights {
    pub loss_multiplier: f64,
    pub drawdown_penalty: f64,
    pub override_violation: f64,
    pub poor_entry: f64,
    pub poor_exit: f64,
    pub regime_mismatch: f64,
    pub oversizing: f64,
    pub ignored_conflict: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            loss_multiplier: 1.5,
            drawdown_penalty: 2.0,
            override_violation: 3.0,
            poor_entry: 0.8,
            poor_exit: 0.8,
            regime_mismatch: 1.0,
            oversizing: 2.5,
            ignored_conflict: 1.2,
        }
    }
}

impl PenaltyWeights {
    pub fn get(&self, key: PenaltyKey) -> f64 {
        match key {
            PenaltyKey::LossMultiplier => self.loss_multiplier,
            PenaltyKey::DrawdownPenalty => self.drawdown_penalty,
            PenaltyKey::OverrideViolation => self.override_violation,
            PenaltyKey::PoorEntry => self.poor_entry,
            PenaltyKey::PoorExit => self.poor_exit,
            PenaltyKey::RegimeMismatch => self.regime_mismatch,
            PenaltyKey::Oversizing => self.oversizing,
            PenaltyKey::IgnoredConflict => self.ignored_conflict,
        }
    }

    fn slot(&mut self, key: PenaltyKey) -> &mut f64 {
        match key {
            PenaltyKey::LossMultiplier => &mut self.loss_multiplier,
            PenaltyKey::DrawdownPenalty => &mut self.drawdown_penalty,
            PenaltyKey::OverrideViolation => &mut self.override_violation,
            PenaltyKey::PoorEntry => &mut self.poor_entry,
            PenaltyKey::PoorExit => &mut self.poor_exit,
            PenaltyKey::RegimeMismatch => &mut self.regime_mismatch,
            PenaltyKey::Oversizing => &mut self.oversizing,
            PenaltyKey::IgnoredConflict => &mut self.ignored_conflict,
        }
    }

    /// Bounded write: clamps into the weight range, ignores non-finite input.
    pub fn set(&mut self, key: PenaltyKey, value: f64) -> WeightChange {
        bounded_write(self.slot(key), value)
    }

    pub fn validate(&self) -> Result<()> {
        for key in PenaltyKey::ALL {
            let v = self.get(key);
            ensure(in_bounds(v), || {
                format!("penalty weight {} = {} outside [{}, {}]", key.as_str(), v, MIN_WEIGHT, MAX_WEIGHT)
            })?;
        }
        Ok(())
    }
}

/// Partial reward-weight override carried by a regime profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardOverride {
    pub key: RewardKey,
    pub value: f64,
}
