//! Rule engine: turns closed trades into reward / penalty scalars and owns
//! the mutable weight vectors, learning config and active regime.
//!
//! All weight writes go through the bounded setters in [`crate::weights`].

use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{clamp_unit, LearningConfig};
use crate::error::{LearningError, RegimeWarning, Result};
use crate::logging::{
    log_audit, log_import_rejected, log_regime_change, log_reward, log_unknown_regime,
    log_weight_change, log_weight_clamped,
};
use crate::regime::{detect_regime, MarketConditions, Regime};
use crate::snapshot::TradeResult;
use crate::weights::{
    PenaltyKey, PenaltyWeights, RewardKey, RewardWeights, WeightChange, WeightKey,
};

/// Jitter span for random mutation: factor in `1 ± MUTATION_SPAN / 2`.
pub const MUTATION_SPAN: f64 = 0.2;

/// Exportable rule-engine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSnapshot {
    pub reward_weights: RewardWeights,
    pub penalty_weights: PenaltyWeights,
    pub config: LearningConfig,
    pub regime: Regime,
}

impl RuleSnapshot {
    pub fn validate(&self) -> Result<()> {
        self.reward_weights.validate()?;
        self.penalty_weights.validate()?;
        self.config.validate_import()
    }

    pub fn fingerprint(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }
}

/// Percentage drift of one weight from its default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightDrift {
    pub key: WeightKey,
    pub default: f64,
    pub current: f64,
    pub drift_pct: f64,
}

#[derive(Debug, Clone)]
pub struct RuleEngine {
    reward: RewardWeights,
    penalty: PenaltyWeights,
    config: LearningConfig,
    /// Config the engine was built with; "revert to default" targets this.
    base_config: LearningConfig,
    regime: Regime,
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(LearningConfig::default())
    }
}

impl RuleEngine {
    pub fn new(config: LearningConfig) -> Self {
        Self {
            reward: RewardWeights::default(),
            penalty: PenaltyWeights::default(),
            config,
            base_config: config,
            regime: Regime::Stable,
        }
    }

    pub fn reward_weights(&self) -> &RewardWeights {
        &self.reward
    }

    pub fn penalty_weights(&self) -> &PenaltyWeights {
        &self.penalty
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn regime(&self) -> Regime {
        self.regime
    }

    pub fn weight(&self, key: WeightKey) -> f64 {
        match key {
            WeightKey::Reward(k) => self.reward.get(k),
            WeightKey::Penalty(k) => self.penalty.get(k),
        }
    }

    // =========================================================================
    // Scalar signals
    // =========================================================================

    pub fn calculate_trade_reward(&self, trade: &TradeResult) -> f64 {
        let w = &self.reward;
        let profit = trade.profit_pct * w.profit_multiplier;
        let risk = if trade.risk_reward > 0.0 {
            trade.risk_reward * w.risk_adjusted_return
        } else {
            0.0
        };
        let time_score = (1.0 - trade.hours() / 24.0).max(0.0);
        let timing = time_score * w.time_efficiency;

        let mut bonus = 0.0;
        if trade.shield_compliant {
            bonus += w.shield_compliance;
        }
        if trade.fusion_aligned {
            bonus += w.fusion_alignment;
        }
        if trade.regime_matched {
            bonus += w.adaptive_accuracy;
        }

        let total = non_negative(profit + risk + timing + bonus);
        log_reward(
            "trade_reward",
            &trade.symbol,
            total,
            &[("profit", profit), ("risk", risk), ("timing", timing), ("bonus", bonus)],
        );
        total
    }

    pub fn calculate_trade_penalty(&self, trade: &TradeResult) -> f64 {
        let w = &self.penalty;
        let loss = trade.profit_pct.min(0.0).abs() * w.loss_multiplier;
        let drawdown = trade.max_drawdown_pct.abs() * w.drawdown_penalty;

        let mut behaviour = 0.0;
        for (flag, key) in [
            (trade.override_violated, PenaltyKey::OverrideViolation),
            (trade.poor_entry, PenaltyKey::PoorEntry),
            (trade.poor_exit, PenaltyKey::PoorExit),
            (trade.regime_mismatch, PenaltyKey::RegimeMismatch),
            (trade.oversized, PenaltyKey::Oversizing),
            (trade.ignored_conflict, PenaltyKey::IgnoredConflict),
        ] {
            if flag {
                behaviour += w.get(key);
            }
        }

        let total = non_negative(loss + drawdown + behaviour);
        log_reward(
            "trade_penalty",
            &trade.symbol,
            total,
            &[("loss", loss), ("drawdown", drawdown), ("behaviour", behaviour)],
        );
        total
    }

    /// Reward for win-rate improvement, rates in percent.
    pub fn calculate_win_rate_reward(&self, previous_pct: f64, current_pct: f64) -> f64 {
        non_negative((current_pct - previous_pct).max(0.0) * self.reward.win_rate_improvement)
    }

    /// Reward for prediction-accuracy improvement, amplified by regime
    /// sensitivity when the improvement spans a regime change.
    pub fn calculate_adaptive_reward(
        &self,
        previous_accuracy: f64,
        current_accuracy: f64,
        regime_changed: bool,
    ) -> f64 {
        let gain = (current_accuracy - previous_accuracy).max(0.0) * self.reward.adaptive_accuracy;
        let scale = if regime_changed {
            1.0 + self.config.regime_sensitivity
        } else {
            1.0
        };
        non_negative(gain * scale)
    }

    // =========================================================================
    // Regimes
    // =========================================================================

    pub fn detect_regime(&self, market: &MarketConditions) -> Regime {
        detect_regime(market)
    }

    /// Merge a regime's optimal reward weights into the live weights.
    pub fn apply_regime_weights(&mut self, name: &str) -> Option<RegimeWarning> {
        match name.parse::<Regime>() {
            Ok(regime) => {
                self.apply_regime(regime);
                None
            }
            Err(_) => {
                log_unknown_regime(name, "apply_regime_weights");
                Some(RegimeWarning::UnknownRegime(name.to_string()))
            }
        }
    }

    pub fn apply_regime(&mut self, regime: Regime) {
        for ov in regime.profile().optimal_weights {
            let change = self.reward.set(ov.key, ov.value);
            self.record(WeightKey::Reward(ov.key), change, "regime_weights");
        }
    }

    /// Switch the active regime.
    pub fn set_regime(&mut self, name: &str) -> Option<RegimeWarning> {
        match name.parse::<Regime>() {
            Ok(regime) => {
                if regime != self.regime {
                    log_regime_change(self.regime.as_str(), regime.as_str(), "set_regime");
                }
                self.regime = regime;
                None
            }
            Err(_) => {
                log_unknown_regime(name, "set_regime");
                Some(RegimeWarning::UnknownRegime(name.to_string()))
            }
        }
    }

    // =========================================================================
    // Weight mutation
    // =========================================================================

    pub fn adjust_reward_weight(&mut self, key: RewardKey, factor: f64) -> WeightChange {
        let change = self.reward.set(key, self.reward.get(key) * factor);
        self.record(WeightKey::Reward(key), change, "adjust");
        change
    }

    pub fn adjust_penalty_weight(&mut self, key: PenaltyKey, factor: f64) -> WeightChange {
        let change = self.penalty.set(key, self.penalty.get(key) * factor);
        self.record(WeightKey::Penalty(key), change, "adjust");
        change
    }

    pub fn adjust_weight(&mut self, key: WeightKey, factor: f64) -> WeightChange {
        match key {
            WeightKey::Reward(k) => self.adjust_reward_weight(k, factor),
            WeightKey::Penalty(k) => self.adjust_penalty_weight(k, factor),
        }
    }

    fn reset_weight(&mut self, key: WeightKey) {
        let change = match key {
            WeightKey::Reward(k) => self.reward.set(k, RewardWeights::default().get(k)),
            WeightKey::Penalty(k) => self.penalty.set(k, PenaltyWeights::default().get(k)),
        };
        self.record(key, change, "revert_default");
    }

    /// Independent Bernoulli(`mutation_rate`) trial per key; winners are
    /// scaled by a uniform factor in `[0.9, 1.1)`. Returns the mutated keys.
    pub fn mutate_weights<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<WeightKey> {
        let rate = self.config.mutation_rate;
        let mut mutated = Vec::new();
        for key in WeightKey::all() {
            if rng.gen::<f64>() >= rate {
                continue;
            }
            let factor = 1.0 + (rng.gen::<f64>() - 0.5) * MUTATION_SPAN;
            let change = match key {
                WeightKey::Reward(k) => self.reward.set(k, self.reward.get(k) * factor),
                WeightKey::Penalty(k) => self.penalty.set(k, self.penalty.get(k) * factor),
            };
            self.record(key, change, "mutation");
            mutated.push(key);
        }
        mutated
    }

    fn record(&self, key: WeightKey, change: WeightChange, reason: &str) {
        if change.clamped() || change.rejected() {
            log_weight_clamped(key.as_str(), change.requested, change.after);
        }
        if change.changed() {
            log_weight_change(key.as_str(), change.before, change.after, reason);
        }
    }

    // =========================================================================
    // Condition-driven nudges
    // =========================================================================

    pub fn adjust_for_shield(&mut self, active: bool) {
        let keys = [
            (WeightKey::Reward(RewardKey::ShieldCompliance), 1.2),
            (WeightKey::Penalty(PenaltyKey::OverrideViolation), 1.3),
        ];
        for (key, factor) in keys {
            if active {
                self.adjust_weight(key, factor);
            } else {
                self.reset_weight(key);
            }
        }
    }

    pub fn adjust_for_threat_level(&mut self, level: f64) {
        if level > 70.0 {
            self.adjust_penalty_weight(PenaltyKey::DrawdownPenalty, 1.3);
            self.adjust_reward_weight(RewardKey::RiskAdjustedReturn, 1.2);
            self.config.exploration_rate =
                clamp_unit(self.config.exploration_rate, self.config.exploration_rate * 0.5);
            self.config.confidence_threshold = (self.config.confidence_threshold * 1.1).min(100.0);
        } else if level >= 30.0 {
            self.adjust_penalty_weight(PenaltyKey::DrawdownPenalty, 1.1);
        } else if level < 30.0 {
            self.reset_weight(WeightKey::Penalty(PenaltyKey::DrawdownPenalty));
            self.reset_weight(WeightKey::Reward(RewardKey::RiskAdjustedReturn));
            self.config.exploration_rate = self.base_config.exploration_rate;
            self.config.confidence_threshold = self.base_config.confidence_threshold;
        }
    }

    pub fn adjust_for_volatility(&mut self, level: f64) {
        if level > 70.0 {
            self.adjust_reward_weight(RewardKey::RiskAdjustedReturn, 1.3);
            self.adjust_reward_weight(RewardKey::TimeEfficiency, 0.8);
            self.config.mutation_rate =
                clamp_unit(self.config.mutation_rate, self.config.mutation_rate * 0.5);
        } else if level < 30.0 {
            self.reset_weight(WeightKey::Reward(RewardKey::RiskAdjustedReturn));
            self.reset_weight(WeightKey::Reward(RewardKey::TimeEfficiency));
            self.config.mutation_rate = self.base_config.mutation_rate;
        }
    }

    pub fn set_exploration_rate(&mut self, rate: f64) {
        self.config.exploration_rate = clamp_unit(self.config.exploration_rate, rate);
    }

    // =========================================================================
    // Snapshot / reset
    // =========================================================================

    pub fn export(&self) -> RuleSnapshot {
        RuleSnapshot {
            reward_weights: self.reward,
            penalty_weights: self.penalty,
            config: self.config,
            regime: self.regime,
        }
    }

    /// Replace state wholesale. Invalid snapshots are rejected and leave the
    /// engine untouched.
    pub fn import(&mut self, snapshot: RuleSnapshot) -> Result<()> {
        if let Err(err) = snapshot.validate() {
            log_import_rejected("rules", &err.to_string());
            return Err(err);
        }
        log_audit("import", "rules", &snapshot.fingerprint());
        self.reward = snapshot.reward_weights;
        self.penalty = snapshot.penalty_weights;
        self.config = snapshot.config;
        self.regime = snapshot.regime;
        Ok(())
    }

    pub fn import_json(&mut self, raw: &str) -> Result<()> {
        let snapshot: RuleSnapshot = serde_json::from_str(raw).map_err(|e| {
            log_import_rejected("rules", &e.to_string());
            LearningError::Validation(e.to_string())
        })?;
        self.import(snapshot)
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.export())?)
    }

    pub fn reset(&mut self) {
        self.reward = RewardWeights::default();
        self.penalty = PenaltyWeights::default();
        self.config = self.base_config;
        self.regime = Regime::Stable;
    }

    pub fn weight_drift(&self) -> Vec<WeightDrift> {
        let reward_defaults = RewardWeights::default();
        let penalty_defaults = PenaltyWeights::default();
        WeightKey::all()
            .map(|key| {
                let default = match key {
                    WeightKey::Reward(k) => reward_defaults.get(k),
                    WeightKey::Penalty(k) => penalty_defaults.get(k),
                };
                let current = self.weight(key);
                WeightDrift {
                    key,
                    default,
                    current,
                    drift_pct: (current - default) / default * 100.0,
                }
            })
            .collect()
    }
}

fn non_negative(v: f64) -> f64 {
    if v.is_finite() {
        v.max(0.0)
    } else {
        0.0
    }
}
