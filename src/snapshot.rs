//! Decision snapshots and closed-trade records.
//!
//! Snapshots come from the trading layer at decision time. The outcome is
//! attached once the trade closes.

use serde::{Deserialize, Serialize};

use crate::regime::{MarketConditions, Regime};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketFeatures {
    pub price: f64,
    /// 0..100
    pub volatility: f64,
    /// -100..100
    pub trend: f64,
    /// 0..100
    pub liquidity: f64,
    /// -100..100
    pub momentum: f64,
    /// Regime label as reported by the trading layer
    #[serde(default)]
    pub regime: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineFeatures {
    pub shield_active: bool,
    /// 0..100
    pub threat_level: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FusionFeatures {
    /// 0..100
    pub confidence: f64,
    /// 0..100
    pub quality: f64,
    #[serde(default)]
    pub signal: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionFeatures {
    pub has_position: bool,
    pub size: f64,
    pub pnl: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideFeatures {
    pub active: bool,
    /// 0..100
    pub severity: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub profit: f64,
    pub profit_pct: f64,
    pub duration_ms: u64,
    pub success: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Epoch milliseconds
    pub timestamp: u64,
    pub market: MarketFeatures,
    pub engine: EngineFeatures,
    pub fusion: FusionFeatures,
    pub position: PositionFeatures,
    #[serde(rename = "override")]
    pub override_state: OverrideFeatures,
    #[serde(default)]
    pub outcome: Option<TradeOutcome>,
}

impl StateSnapshot {
    pub fn conditions(&self) -> MarketConditions {
        MarketConditions::from_signed_trend(
            self.market.volatility,
            self.market.trend,
            self.market.liquidity,
        )
    }

    pub fn has_known_regime(&self) -> bool {
        Regime::is_known(&self.market.regime)
    }

    pub fn with_outcome(mut self, outcome: TradeOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn is_success(&self) -> Option<bool> {
        self.outcome.map(|o| o.success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

/// Closed trade as delivered by the execution layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub symbol: String,
    pub action: TradeAction,
    pub profit: f64,
    pub profit_pct: f64,
    pub duration_ms: u64,
    #[serde(default)]
    pub max_drawdown_pct: f64,
    #[serde(default)]
    pub risk_reward: f64,

    #[serde(default)]
    pub shield_compliant: bool,
    #[serde(default)]
    pub fusion_aligned: bool,
    #[serde(default)]
    pub regime_matched: bool,

    #[serde(default)]
    pub override_violated: bool,
    #[serde(default)]
    pub poor_entry: bool,
    #[serde(default)]
    pub poor_exit: bool,
    #[serde(default)]
    pub regime_mismatch: bool,
    #[serde(default)]
    pub oversized: bool,
    #[serde(default)]
    pub ignored_conflict: bool,

    pub entry_state: StateSnapshot,
    #[serde(default)]
    pub exit_state: Option<StateSnapshot>,
}

impl TradeResult {
    pub fn hours(&self) -> f64 {
        self.duration_ms as f64 / 3_600_000.0
    }

    pub fn outcome(&self) -> TradeOutcome {
        TradeOutcome {
            profit: self.profit,
            profit_pct: self.profit_pct,
            duration_ms: self.duration_ms,
            success: self.profit > 0.0,
        }
    }

    /// Bare trade with every flag cleared.
    pub fn new(symbol: &str, action: TradeAction, profit: f64, profit_pct: f64, entry_state: StateSnapshot) -> Self {
        Self {
            symbol: symbol.to_string(),
            action,
            profit,
            profit_pct,
            duration_ms: 0,
            max_drawdown_pct: 0.0,
            risk_reward: 0.0,
            shield_compliant: false,
            fusion_aligned: false,
            regime_matched: false,
            override_violated: false,
            poor_entry: false,
            poor_exit: false,
            regime_mismatch: false,
            oversized: false,
            ignored_conflict: false,
            entry_state,
            exit_state: None,
        }
    }
}
