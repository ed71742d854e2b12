//! Adaptation engine: gates and applies weight updates from trade outcomes.
//!
//! Each update call ends in one of two states:
//! - ACCEPTED: weights scaled through the rule engine, record appended
//! - SKIPPED: confidence under the gate, nothing mutated, zeroed record
//!
//! The engine borrows the rule engine and memory store per call; it never
//! owns them.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::config::AdaptationConfig;
use crate::error::RegimeWarning;
use crate::features::{encode_state, EncodedState};
use crate::logging::{log_config_clamped, log_reward, log_update, ts_epoch_ms, ProfileScope};
use crate::memory::{MemoryStore, Priority};
use crate::regime::Regime;
use crate::rules::{RuleEngine, WeightDrift};
use crate::snapshot::{StateSnapshot, TradeResult};
use crate::weights::{PenaltyKey, RewardKey, WeightKey};

const REWARD_KEYS: [WeightKey; 2] = [
    WeightKey::Reward(RewardKey::ProfitMultiplier),
    WeightKey::Reward(RewardKey::RiskAdjustedReturn),
];
const PENALTY_KEYS: [WeightKey; 2] = [
    WeightKey::Penalty(PenaltyKey::LossMultiplier),
    WeightKey::Penalty(PenaltyKey::DrawdownPenalty),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    Accepted,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightDelta {
    pub key: WeightKey,
    pub before: f64,
    pub after: f64,
}

/// One adaptation decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RlUpdate {
    pub reward: f64,
    pub penalty: f64,
    /// Deltas actually applied; empty when skipped or net is zero
    pub weight_deltas: Vec<WeightDelta>,
    pub timestamp: u64,
    /// Effective learning rate used for this update
    pub learning_rate: f64,
    pub confidence: f64,
    pub status: UpdateStatus,
}

impl RlUpdate {
    fn skipped(timestamp: u64) -> Self {
        Self {
            reward: 0.0,
            penalty: 0.0,
            weight_deltas: Vec::new(),
            timestamp,
            learning_rate: 0.0,
            confidence: 0.0,
            status: UpdateStatus::Skipped,
        }
    }

    pub fn net(&self) -> f64 {
        self.reward - self.penalty
    }

    pub fn is_accepted(&self) -> bool {
        self.status == UpdateStatus::Accepted
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOutcome {
    pub update: RlUpdate,
    pub reward: f64,
    pub penalty: f64,
    pub priority: Priority,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegimeShiftOutcome {
    pub from: String,
    pub to: String,
    /// Observability only; never fed into `update_model`
    pub signal: f64,
    pub warning: Option<RegimeWarning>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdaptationStats {
    pub accepted_updates: u64,
    pub skipped_updates: u64,
    pub trades_trained: u64,
    pub regime_shifts: u64,
    pub avg_reward: f64,
    pub avg_penalty: f64,
    pub avg_net: f64,
    pub avg_confidence: f64,
    pub history_len: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentPerformance {
    pub sample_size: usize,
    pub win_rate_pct: f64,
    pub avg_profit_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningSummary {
    pub stats: AdaptationStats,
    pub recent_performance: RecentPerformance,
    pub adaptation_score: f64,
    pub weight_drift: Vec<WeightDrift>,
    pub regime: Regime,
    pub exploration_rate: f64,
    pub memory_entries: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    accepted: u64,
    skipped: u64,
    trades: u64,
    regime_shifts: u64,
    reward_sum: f64,
    penalty_sum: f64,
    confidence_sum: f64,
}

#[derive(Debug, Clone)]
pub struct AdaptationEngine {
    config: AdaptationConfig,
    history: VecDeque<RlUpdate>,
    totals: Totals,
}

impl Default for AdaptationEngine {
    fn default() -> Self {
        Self::new(AdaptationConfig::default())
    }
}

/// Confidence in 0..100 for a given net signal, scaled by feature validity.
pub fn update_confidence(encoded: &EncodedState, known_regime: bool, net: f64) -> f64 {
    let regime_bonus = if known_regime { 10.0 } else { 0.0 };
    let signal = if net.is_finite() { (net.abs() * 3.0).min(30.0) } else { 0.0 };
    let base = (50.0 + signal + regime_bonus).clamp(0.0, 100.0);
    base * encoded.valid_fraction()
}

impl AdaptationEngine {
    /// Build an engine; a zero history capacity is raised to 1.
    pub fn new(mut config: AdaptationConfig) -> Self {
        if config.history_capacity == 0 {
            log_config_clamped("adaptation.history_capacity", 0.0, 1.0);
            config.history_capacity = 1;
        }
        Self {
            config,
            history: VecDeque::with_capacity(config.history_capacity),
            totals: Totals::default(),
        }
    }

    pub fn config(&self) -> &AdaptationConfig {
        &self.config
    }

    pub fn encode_state(&self, state: &StateSnapshot) -> EncodedState {
        encode_state(state)
    }

    pub fn history(&self) -> impl Iterator<Item = &RlUpdate> {
        self.history.iter()
    }

    /// Last `n` accepted updates, oldest first.
    pub fn recent_updates(&self, n: usize) -> Vec<&RlUpdate> {
        let skip = self.history.len().saturating_sub(n);
        self.history.iter().skip(skip).collect()
    }

    pub fn update_model(
        &mut self,
        rules: &mut RuleEngine,
        state: &StateSnapshot,
        reward: f64,
        penalty: f64,
    ) -> RlUpdate {
        let encoded = encode_state(state);
        self.update_encoded(rules, &encoded, state.has_known_regime(), reward, penalty)
    }

    fn update_encoded(
        &mut self,
        rules: &mut RuleEngine,
        encoded: &EncodedState,
        known_regime: bool,
        reward: f64,
        penalty: f64,
    ) -> RlUpdate {
        let net = reward - penalty;
        let confidence = update_confidence(encoded, known_regime, net);
        let now = ts_epoch_ms();

        if confidence.is_nan() || confidence < self.config.min_confidence {
            self.totals.skipped += 1;
            log_update("skipped", reward, penalty, confidence, 0);
            return RlUpdate::skipped(now);
        }

        let cfg = *rules.config();
        let factor = 1.0 + cfg.learning_rate * (confidence / 100.0) * 0.1;
        let keys: &[WeightKey] = if net > 0.0 {
            &REWARD_KEYS
        } else if net < 0.0 {
            &PENALTY_KEYS
        } else {
            &[]
        };

        let weight_deltas: Vec<WeightDelta> = keys
            .iter()
            .map(|&key| {
                let change = rules.adjust_weight(key, factor);
                WeightDelta {
                    key,
                    before: change.before,
                    after: change.after,
                }
            })
            .collect();

        let learning_rate = if cfg.adaptive_scaling {
            cfg.learning_rate * confidence / 100.0
        } else {
            cfg.learning_rate
        };

        let update = RlUpdate {
            reward,
            penalty,
            weight_deltas,
            timestamp: now,
            learning_rate,
            confidence,
            status: UpdateStatus::Accepted,
        };

        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(update.clone());

        self.totals.accepted += 1;
        self.totals.reward_sum += reward;
        self.totals.penalty_sum += penalty;
        self.totals.confidence_sum += confidence;

        let decayed = (cfg.exploration_rate * self.config.exploration_decay)
            .max(self.config.exploration_floor);
        rules.set_exploration_rate(decayed);

        log_update("accepted", reward, penalty, confidence, update.weight_deltas.len());
        update
    }

    /// Learn from a closed trade and store it for replay.
    pub fn train_on_closed_trade(
        &mut self,
        rules: &mut RuleEngine,
        memory: &mut MemoryStore,
        trade: &TradeResult,
    ) -> TrainingOutcome {
        let _scope = ProfileScope::new("train_on_closed_trade");
        let encoded = encode_state(&trade.entry_state);
        let reward = rules.calculate_trade_reward(trade);
        let penalty = rules.calculate_trade_penalty(trade);
        let update = self.update_encoded(
            rules,
            &encoded,
            trade.entry_state.has_known_regime(),
            reward,
            penalty,
        );

        let priority = if reward > penalty {
            Priority::High
        } else {
            Priority::Medium
        };
        let snapshot = trade.entry_state.clone().with_outcome(trade.outcome());
        let importance = memory.push(snapshot, priority);
        self.totals.trades += 1;

        TrainingOutcome {
            update,
            reward,
            penalty,
            priority,
            importance,
        }
    }

    /// Switch the active regime and report a success/failure signal. The
    /// signal is not applied to weights.
    pub fn train_on_regime_shift(
        &mut self,
        rules: &mut RuleEngine,
        old: &str,
        new: &str,
        successful: bool,
    ) -> RegimeShiftOutcome {
        let warning = rules.set_regime(new);
        let signal = if successful {
            rules.reward_weights().adaptive_accuracy
        } else {
            -rules.penalty_weights().regime_mismatch
        };
        if warning.is_none() {
            self.totals.regime_shifts += 1;
            log_reward(
                "regime_shift_signal",
                new,
                signal,
                &[("successful", if successful { 1.0 } else { 0.0 })],
            );
        }
        RegimeShiftOutcome {
            from: old.to_string(),
            to: new.to_string(),
            signal,
            warning,
        }
    }

    pub fn statistics(&self) -> AdaptationStats {
        let t = &self.totals;
        let n = t.accepted as f64;
        let avg = |sum: f64| if t.accepted == 0 { 0.0 } else { sum / n };
        AdaptationStats {
            accepted_updates: t.accepted,
            skipped_updates: t.skipped,
            trades_trained: t.trades,
            regime_shifts: t.regime_shifts,
            avg_reward: avg(t.reward_sum),
            avg_penalty: avg(t.penalty_sum),
            avg_net: avg(t.reward_sum - t.penalty_sum),
            avg_confidence: avg(t.confidence_sum),
            history_len: self.history.len(),
        }
    }

    /// `0.5 × avg confidence + clamp(avg net × 5, 0, 50)` over the last
    /// `score_window` accepted updates.
    pub fn adaptation_score(&self) -> f64 {
        let recent = self.recent_updates(self.config.score_window);
        if recent.is_empty() {
            return 0.0;
        }
        let n = recent.len() as f64;
        let avg_conf = recent.iter().map(|u| u.confidence).sum::<f64>() / n;
        let avg_net = recent.iter().map(|u| u.net()).sum::<f64>() / n;
        0.5 * avg_conf + (avg_net * 5.0).clamp(0.0, 50.0)
    }

    pub fn recent_performance(&self, memory: &MemoryStore) -> RecentPerformance {
        let recent = memory.recent_with_outcome(self.config.performance_window);
        if recent.is_empty() {
            return RecentPerformance::default();
        }
        let n = recent.len();
        let (wins, profit_sum) = recent
            .iter()
            .filter_map(|e| e.state.outcome)
            .fold((0usize, 0.0), |(w, p), o| (w + o.success as usize, p + o.profit_pct));
        RecentPerformance {
            sample_size: n,
            win_rate_pct: wins as f64 / n as f64 * 100.0,
            avg_profit_pct: profit_sum / n as f64,
        }
    }

    pub fn learning_summary(&self, rules: &RuleEngine, memory: &MemoryStore) -> LearningSummary {
        LearningSummary {
            stats: self.statistics(),
            recent_performance: self.recent_performance(memory),
            adaptation_score: self.adaptation_score(),
            weight_drift: rules.weight_drift(),
            regime: rules.regime(),
            exploration_rate: rules.config().exploration_rate,
            memory_entries: memory.len(),
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.totals = Totals::default();
    }
}
