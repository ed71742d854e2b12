//! Learning context: one rule engine, one memory store and one adaptation
//! engine wired together, plus the shared-ownership wrapper.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::adaptation::{
    AdaptationEngine, LearningSummary, RegimeShiftOutcome, RlUpdate, TrainingOutcome,
};
use crate::config::Config;
use crate::error::{ensure, Result};
use crate::logging::{log, log_audit, log_import_rejected, obj, v_num, v_str, Domain, Level};
use crate::memory::{MemoryHealth, MemorySnapshot, MemoryStore, PrioritizedEntry, Priority, SamplingStrategy};
use crate::rules::{RuleEngine, RuleSnapshot};
use crate::snapshot::{StateSnapshot, TradeResult};
use crate::weights::WeightKey;

/// Full exportable state. The fingerprint covers both parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContextSnapshot {
    pub rules: RuleSnapshot,
    pub memory: MemorySnapshot,
    pub fingerprint: String,
}

fn fingerprint(rules: &RuleSnapshot, memory: &MemorySnapshot) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(rules).unwrap_or_default());
    hasher.update(serde_json::to_vec(memory).unwrap_or_default());
    hex::encode(hasher.finalize())
}

impl ContextSnapshot {
    pub fn validate(&self) -> Result<()> {
        self.rules.validate()?;
        self.memory.validate()?;
        ensure(fingerprint(&self.rules, &self.memory) == self.fingerprint, || {
            "fingerprint does not match snapshot contents".to_string()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub priority: Priority,
    pub importance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayReport {
    pub factor: f64,
    pub removed: usize,
    pub remaining: usize,
}

/// Priority of an in-flight snapshot, from the engine threat level.
pub fn priority_for_threat(threat: f64) -> Priority {
    if threat > 85.0 {
        Priority::Critical
    } else if threat > 70.0 {
        Priority::High
    } else if threat > 40.0 {
        Priority::Medium
    } else {
        Priority::Low
    }
}

#[derive(Debug)]
pub struct LearningContext {
    rules: RuleEngine,
    memory: MemoryStore,
    adaptation: AdaptationEngine,
    rng: StdRng,
}

impl LearningContext {
    pub fn new(config: Config) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    /// Deterministic mutation and sampling.
    pub fn seeded(config: Config, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: Config, rng: StdRng) -> Self {
        Self {
            rules: RuleEngine::new(config.learning),
            memory: MemoryStore::new(config.memory),
            adaptation: AdaptationEngine::new(config.adaptation),
            rng,
        }
    }

    pub fn from_env() -> Self {
        Self::new(Config::from_env())
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleEngine {
        &mut self.rules
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut MemoryStore {
        &mut self.memory
    }

    pub fn adaptation(&self) -> &AdaptationEngine {
        &self.adaptation
    }

    pub fn train_on_closed_trade(&mut self, trade: &TradeResult) -> TrainingOutcome {
        self.adaptation
            .train_on_closed_trade(&mut self.rules, &mut self.memory, trade)
    }

    pub fn train_on_regime_shift(&mut self, old: &str, new: &str, successful: bool) -> RegimeShiftOutcome {
        self.adaptation
            .train_on_regime_shift(&mut self.rules, old, new, successful)
    }

    pub fn update_model(&mut self, state: &StateSnapshot, reward: f64, penalty: f64) -> RlUpdate {
        self.adaptation
            .update_model(&mut self.rules, state, reward, penalty)
    }

    /// Record an in-flight snapshot and nudge weights for its conditions.
    pub fn observe_snapshot(&mut self, state: StateSnapshot) -> Observation {
        let priority = priority_for_threat(state.engine.threat_level);
        self.rules.adjust_for_shield(state.engine.shield_active);
        self.rules.adjust_for_threat_level(state.engine.threat_level);
        self.rules.adjust_for_volatility(state.market.volatility);
        let importance = self.memory.push(state, priority);
        Observation {
            priority,
            importance,
        }
    }

    /// Periodic maintenance: decay importance, then compress.
    pub fn decay_tick(&mut self) -> DecayReport {
        let factor = self.rules.config().memory_decay;
        self.memory.decay_importance(factor);
        let removed = self.memory.compress_memory();
        let report = DecayReport {
            factor,
            removed,
            remaining: self.memory.len(),
        };
        log(
            Level::Debug,
            Domain::Memory,
            "decay_tick",
            obj(&[
                ("factor", v_num(factor)),
                ("removed", v_num(removed as f64)),
                ("remaining", v_num(report.remaining as f64)),
            ]),
        );
        report
    }

    pub fn mutate_weights(&mut self) -> Vec<WeightKey> {
        self.rules.mutate_weights(&mut self.rng)
    }

    pub fn sample(&mut self, n: usize, strategy: SamplingStrategy) -> Vec<PrioritizedEntry> {
        self.memory
            .sample(n, strategy, &mut self.rng)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn summary(&self) -> LearningSummary {
        self.adaptation.learning_summary(&self.rules, &self.memory)
    }

    pub fn health(&self) -> MemoryHealth {
        self.memory.memory_health()
    }

    pub fn export(&self) -> ContextSnapshot {
        let rules = self.rules.export();
        let memory = self.memory.export();
        let fingerprint = fingerprint(&rules, &memory);
        log_audit("export", "context", &fingerprint);
        ContextSnapshot {
            rules,
            memory,
            fingerprint,
        }
    }

    /// Both halves are validated before either is applied.
    pub fn import(&mut self, snapshot: ContextSnapshot) -> Result<()> {
        if let Err(err) = snapshot.validate() {
            log_import_rejected("context", &err.to_string());
            return Err(err);
        }
        let fp = snapshot.fingerprint;
        self.rules.import(snapshot.rules)?;
        self.memory.import(snapshot.memory)?;
        log(
            Level::Info,
            Domain::Audit,
            "context_imported",
            obj(&[("fingerprint", v_str(&fp))]),
        );
        Ok(())
    }

    pub fn reset(&mut self) {
        self.rules.reset();
        self.memory.clear();
        self.adaptation.reset();
    }
}

/// Shared handle over one context. Each call holds the lock for its whole
/// read-modify-write sequence.
#[derive(Debug, Clone)]
pub struct SharedLearning {
    inner: Arc<Mutex<LearningContext>>,
}

impl SharedLearning {
    pub fn new(ctx: LearningContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ctx)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LearningContext> {
        // a panicked writer leaves bounded, validated state behind
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Run a closure against the locked context.
    pub fn with<T>(&self, f: impl FnOnce(&mut LearningContext) -> T) -> T {
        f(&mut self.lock())
    }

    pub fn train_on_closed_trade(&self, trade: &TradeResult) -> TrainingOutcome {
        self.lock().train_on_closed_trade(trade)
    }

    pub fn train_on_regime_shift(&self, old: &str, new: &str, successful: bool) -> RegimeShiftOutcome {
        self.lock().train_on_regime_shift(old, new, successful)
    }

    pub fn observe_snapshot(&self, state: StateSnapshot) -> Observation {
        self.lock().observe_snapshot(state)
    }

    pub fn decay_tick(&self) -> DecayReport {
        self.lock().decay_tick()
    }

    pub fn mutate_weights(&self) -> Vec<WeightKey> {
        self.lock().mutate_weights()
    }

    pub fn sample(&self, n: usize, strategy: SamplingStrategy) -> Vec<PrioritizedEntry> {
        self.lock().sample(n, strategy)
    }

    pub fn summary(&self) -> LearningSummary {
        self.lock().summary()
    }

    pub fn export(&self) -> ContextSnapshot {
        self.lock().export()
    }

    pub fn import(&self, snapshot: ContextSnapshot) -> Result<()> {
        self.lock().import(snapshot)
    }
}
