//! Integration tests: closed trades flowing through scoring, adaptation and
//! memory inside one learning context.

use tradelearn::adaptation::UpdateStatus;
use tradelearn::config::{Config, LearningConfig};
use tradelearn::context::LearningContext;
use tradelearn::memory::Priority;
use tradelearn::regime::{MarketConditions, Regime};
use tradelearn::rules::RuleEngine;
use tradelearn::snapshot::{StateSnapshot, TradeAction, TradeResult};
use tradelearn::weights::{RewardKey, WeightKey, MAX_WEIGHT, MIN_WEIGHT};

fn entry(ts: u64, regime: &str) -> StateSnapshot {
    let mut s = StateSnapshot::default();
    s.timestamp = ts;
    s.market.price = 42_000.0;
    s.market.volatility = 25.0;
    s.market.trend = 10.0;
    s.market.liquidity = 75.0;
    s.market.regime = regime.to_string();
    s.fusion.confidence = 65.0;
    s.fusion.quality = 70.0;
    s
}

fn winning_trade(ts: u64) -> TradeResult {
    let mut t = TradeResult::new("BTCUSDT", TradeAction::Buy, 500.0, 5.0, entry(ts, "STABLE"));
    t.risk_reward = 2.0;
    t.duration_ms = 3_600_000;
    t.shield_compliant = true;
    t.fusion_aligned = true;
    t.regime_matched = true;
    t
}

fn losing_trade(ts: u64) -> TradeResult {
    let mut t = TradeResult::new("BTCUSDT", TradeAction::Sell, -300.0, -3.0, entry(ts, "STABLE"));
    t.max_drawdown_pct = 4.0;
    t.poor_exit = true;
    t
}

#[test]
fn test_winning_trade_reward_value() {
    let rules = RuleEngine::default();
    let reward = rules.calculate_trade_reward(&winning_trade(1));
    assert!((reward - 10.9875).abs() < 1e-9, "reward={}", reward);
    assert_eq!(rules.calculate_trade_penalty(&winning_trade(1)), 0.0);
}

#[test]
fn test_losing_trade_penalty_value() {
    let rules = RuleEngine::default();
    // 3 * 1.5 + 4 * 2.0 + 0.8
    let penalty = rules.calculate_trade_penalty(&losing_trade(1));
    assert!((penalty - 13.3).abs() < 1e-9, "penalty={}", penalty);
}

#[test]
fn test_training_session_moves_weights_in_signal_direction() {
    let mut ctx = LearningContext::seeded(Config::default(), 5);
    for ts in 0..20 {
        let out = ctx.train_on_closed_trade(&winning_trade(ts));
        assert_eq!(out.update.status, UpdateStatus::Accepted);
        assert_eq!(out.priority, Priority::High);
    }
    let after_wins = *ctx.rules().reward_weights();
    assert!(after_wins.profit_multiplier > 1.0);
    assert!(after_wins.risk_adjusted_return > 1.2);
    assert_eq!(ctx.rules().penalty_weights().loss_multiplier, 1.5);

    for ts in 20..30 {
        let out = ctx.train_on_closed_trade(&losing_trade(ts));
        assert_eq!(out.priority, Priority::Medium);
    }
    assert!(ctx.rules().penalty_weights().loss_multiplier > 1.5);
    assert!(ctx.rules().penalty_weights().drawdown_penalty > 2.0);
    assert_eq!(ctx.rules().reward_weights().profit_multiplier, after_wins.profit_multiplier);

    let summary = ctx.summary();
    assert_eq!(summary.stats.trades_trained, 30);
    assert_eq!(summary.stats.accepted_updates, 30);
    assert_eq!(summary.recent_performance.sample_size, 30);
    assert!((summary.recent_performance.win_rate_pct - 200.0 / 3.0).abs() < 1e-9);
    assert!(summary.exploration_rate < 0.2);
    assert_eq!(ctx.memory().len(), 30);
}

#[test]
fn test_weights_stay_bounded_under_sustained_pressure() {
    let mut ctx = LearningContext::seeded(
        Config {
            learning: LearningConfig {
                learning_rate: 1.0,
                mutation_rate: 1.0,
                ..LearningConfig::default()
            },
            ..Config::default()
        },
        9,
    );
    for ts in 0..2000 {
        ctx.train_on_closed_trade(&winning_trade(ts));
        ctx.mutate_weights();
    }
    for key in WeightKey::all() {
        let w = ctx.rules().weight(key);
        assert!((MIN_WEIGHT..=MAX_WEIGHT).contains(&w), "{} = {}", key.as_str(), w);
    }
    assert!(ctx.rules().weight(WeightKey::Reward(RewardKey::ProfitMultiplier)) > 5.0);
}

#[test]
fn test_regime_detection_and_overlay() {
    let mut rules = RuleEngine::default();
    let crisis = MarketConditions::new(90.0, 50.0, 20.0);
    let regime = rules.detect_regime(&crisis);
    assert_eq!(regime, Regime::Crisis);

    assert!(rules.apply_regime_weights(regime.as_str()).is_none());
    assert_eq!(rules.reward_weights().shield_compliance, 2.5);
    assert_eq!(rules.reward_weights().profit_multiplier, 0.7);

    let warning = rules.apply_regime_weights("SIDEWAYS");
    assert!(warning.is_some());
    assert_eq!(rules.reward_weights().shield_compliance, 2.5);
}

#[test]
fn test_regime_shift_keeps_weights() {
    let mut ctx = LearningContext::seeded(Config::default(), 1);
    let before = ctx.rules().export();
    let out = ctx.train_on_regime_shift("STABLE", "trending", true);
    assert!(out.warning.is_none());
    assert_eq!(ctx.rules().regime(), Regime::Trending);
    let after = ctx.rules().export();
    assert_eq!(after.reward_weights, before.reward_weights);
    assert_eq!(after.penalty_weights, before.penalty_weights);
}

#[test]
fn test_context_round_trips_through_json() {
    let mut ctx = LearningContext::seeded(Config::default(), 2);
    for ts in 0..10 {
        ctx.train_on_closed_trade(&winning_trade(ts));
    }
    ctx.train_on_regime_shift("STABLE", "RANGING", true);

    let json = serde_json::to_string(&ctx.export()).unwrap();
    let mut restored = LearningContext::seeded(Config::default(), 3);
    restored.import(serde_json::from_str(&json).unwrap()).unwrap();

    assert_eq!(restored.rules().export(), ctx.rules().export());
    assert_eq!(restored.memory().len(), 10);
    assert_eq!(restored.export().fingerprint, ctx.export().fingerprint);
}

/// A session with mutation, decay and non-round percentages must export,
/// travel through a JSON string, and import into a fresh context unchanged.
#[test]
fn test_trained_context_survives_json_round_trip() {
    for seed in 0..20u64 {
        let mut ctx = LearningContext::seeded(Config::default(), seed);
        for i in 0..40u64 {
            let pct = -2.78 + i as f64 * 0.37;
            let mut s = entry(seed * 100 + i, if i % 3 == 0 { "VOLATILE" } else { "STABLE" });
            s.market.volatility = 17.3 + i as f64 * 1.13;
            s.engine.threat_level = (i as f64 * 2.71) % 100.0;
            let action = if pct >= 0.0 { TradeAction::Buy } else { TradeAction::Sell };
            let mut t = TradeResult::new("BTCUSDT", action, pct * 97.1, pct, s);
            t.max_drawdown_pct = (i % 5) as f64 * 0.83;
            t.risk_reward = 0.4 + (i % 7) as f64 * 0.29;
            t.duration_ms = 60_000 + i * 7_919;
            t.shield_compliant = i % 2 == 0;
            ctx.train_on_closed_trade(&t);
            ctx.mutate_weights();
            if (i + 1) % 7 == 0 {
                ctx.decay_tick();
            }
        }

        let exported = ctx.export();
        let json = serde_json::to_string(&exported).unwrap();
        let mut restored = LearningContext::seeded(Config::default(), seed + 1000);
        if let Err(e) = restored.import(serde_json::from_str(&json).unwrap()) {
            panic!("seed {} import failed: {}", seed, e);
        }
        assert_eq!(restored.export(), exported, "seed {}", seed);

        let mut rules = RuleEngine::default();
        rules.import_json(&ctx.rules().export_json().unwrap()).unwrap();
        assert_eq!(rules.export(), ctx.rules().export(), "seed {}", seed);
    }
}

#[test]
fn test_rules_import_rejects_out_of_range_weights() {
    let mut rules = RuleEngine::default();
    let mut raw: serde_json::Value = serde_json::from_str(&rules.export_json().unwrap()).unwrap();
    raw["reward_weights"]["profit_multiplier"] = serde_json::json!(25.0);

    let before = rules.export();
    assert!(rules.import_json(&raw.to_string()).is_err());
    assert_eq!(rules.export(), before);

    raw["reward_weights"]["profit_multiplier"] = serde_json::json!(2.0);
    raw["reward_weights"]["mystery"] = serde_json::json!(1.0);
    assert!(rules.import_json(&raw.to_string()).is_err());
    assert_eq!(rules.export(), before);
}

#[test]
fn test_observe_then_decay_cycle() {
    let mut ctx = LearningContext::seeded(Config::default(), 4);
    for ts in 0..50u64 {
        let mut s = entry(ts, "VOLATILE");
        s.engine.threat_level = (ts * 2) as f64;
        ctx.observe_snapshot(s);
    }
    assert_eq!(ctx.memory().by_priority(Priority::Critical).len(), 7);

    // 0.95^20 ≈ 0.358: LOW entries (50) fall under the compression floor
    let mut removed = 0;
    for _ in 0..20 {
        removed += ctx.decay_tick().removed;
    }
    assert!(removed > 0);
    assert!(ctx.memory().entries().all(|e| e.importance >= 30.0));
}
