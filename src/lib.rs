//! Adaptive-learning core for a trading assistant.
//!
//! - [`rules`]: reward / penalty scoring, bounded weights, regime overlays
//! - [`memory`]: capacity-bounded experience store with importance scoring
//! - [`adaptation`]: confidence-gated weight updates and learning summaries
//! - [`context`]: the three wired together, plus shared ownership
//! - [`service`]: tokio actor front-end over a context

pub mod adaptation;
pub mod config;
pub mod context;
pub mod error;
pub mod features;
pub mod logging;
pub mod memory;
pub mod regime;
pub mod replay;
pub mod rules;
pub mod service;
pub mod snapshot;
pub mod weights;

pub use adaptation::{AdaptationEngine, LearningSummary, RlUpdate, TrainingOutcome, UpdateStatus};
pub use config::{AdaptationConfig, Config, LearningConfig, MemoryConfig};
pub use context::{ContextSnapshot, LearningContext, SharedLearning};
pub use error::{LearningError, RegimeWarning, Result};
pub use memory::{MemoryStore, PrioritizedEntry, Priority, SamplingStrategy};
pub use regime::{detect_regime, MarketConditions, Regime};
pub use rules::{RuleEngine, RuleSnapshot};
pub use service::{LearningHandle, LearningService};
pub use snapshot::{StateSnapshot, TradeAction, TradeOutcome, TradeResult};
pub use weights::{PenaltyKey, RewardKey, WeightKey};
