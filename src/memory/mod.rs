//! Experience store: a capacity-bounded, priority-aware replay buffer of
//! decision snapshots.
//!
//! Entries live in a `VecDeque` in insertion order. Overflow evicts exactly
//! one entry per push (lowest-importance unreviewed first, oldest as the
//! fallback); compression is a separate one-shot repack.

pub mod importance;
pub mod sampling;
pub mod stats;

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::config::{clamp_unit, MemoryConfig, MAX_MEMORY_SIZE, MIN_MEMORY_SIZE};
use crate::error::{ensure, Result};
use crate::logging::{
    log_audit, log_compression, log_config_clamped, log_eviction, log_import_rejected, v_num,
    ProfileScope,
};
use crate::snapshot::StateSnapshot;

pub use importance::Priority;
pub use sampling::SamplingStrategy;
pub use stats::{HealthStatus, MemoryHealth, MemoryStats};

/// Entries scoring below this are dropped by compression.
pub const COMPRESSION_FLOOR: f64 = 30.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrioritizedEntry {
    pub state: StateSnapshot,
    pub priority: Priority,
    /// 0..100
    pub importance: f64,
    pub reviewed: bool,
}

/// Lifetime counters, carried through export / import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCounters {
    pub total_pushed: u64,
    pub total_evicted: u64,
    pub total_compressions: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemorySnapshot {
    pub entries: Vec<PrioritizedEntry>,
    pub config: MemoryConfig,
    pub stats: MemoryStats,
}

impl MemorySnapshot {
    pub fn validate(&self) -> Result<()> {
        self.config
            .validate()
            .map_err(|e| crate::error::LearningError::Validation(e.to_string()))?;
        ensure(self.entries.len() <= self.config.max_size, || {
            format!(
                "{} entries exceed max_size {}",
                self.entries.len(),
                self.config.max_size
            )
        })?;
        for (i, e) in self.entries.iter().enumerate() {
            ensure(e.importance.is_finite() && (0.0..=100.0).contains(&e.importance), || {
                format!("entry {} importance {} outside [0, 100]", i, e.importance)
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: VecDeque<PrioritizedEntry>,
    config: MemoryConfig,
    counters: MemoryCounters,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryConfig::default())
    }
}

impl MemoryStore {
    /// Build a store; `max_size` is clamped into `[500, 2000]` and a zero
    /// compression threshold falls back to the default.
    pub fn new(config: MemoryConfig) -> Self {
        let mut store = Self {
            entries: VecDeque::with_capacity(config.max_size.min(MAX_MEMORY_SIZE) + 1),
            config,
            counters: MemoryCounters::default(),
        };
        store.config.max_size = clamp_size(config.max_size);
        if config.compression_threshold == 0 {
            let fallback = MemoryConfig::default().compression_threshold;
            log_config_clamped("memory.compression_threshold", 0.0, fallback as f64);
            store.config.compression_threshold = fallback;
        }
        store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn max_size(&self) -> usize {
        self.config.max_size
    }

    pub fn counters(&self) -> MemoryCounters {
        self.counters
    }

    pub fn entries(&self) -> impl Iterator<Item = &PrioritizedEntry> {
        self.entries.iter()
    }

    /// Append a snapshot and return its importance. No deduplication.
    pub fn push(&mut self, state: StateSnapshot, priority: Priority) -> f64 {
        let importance = importance::score(&state, priority);
        self.entries.push_back(PrioritizedEntry {
            state,
            priority,
            importance,
            reviewed: false,
        });
        self.counters.total_pushed += 1;

        if self.entries.len() > self.config.max_size {
            self.evict_one();
        }
        if self.entries.len() >= self.config.compression_threshold {
            self.compress_memory();
        }
        importance
    }

    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.reviewed)
            .fold(None::<(usize, f64)>, |best, (i, e)| match best {
                Some((_, imp)) if imp <= e.importance => best,
                _ => Some((i, e.importance)),
            })
            .map(|(i, _)| i)
            .unwrap_or(0);

        if let Some(e) = self.entries.remove(victim) {
            self.counters.total_evicted += 1;
            log_eviction(e.state.timestamp, e.importance, e.reviewed, self.entries.len());
        }
    }

    /// Drop entries under the compression floor, then keep the top
    /// `max_size` by importance.
    pub fn compress_memory(&mut self) -> usize {
        self.compress_to(self.config.max_size)
    }

    /// Same repack against an explicit target. Survivors keep store order.
    pub fn compress_to(&mut self, target: usize) -> usize {
        let _scope = ProfileScope::with_context("compress_to", &[("target", v_num(target as f64))]);
        let before = self.entries.len();
        let mut kept: Vec<(usize, PrioritizedEntry)> = self
            .entries
            .drain(..)
            .enumerate()
            .filter(|(_, e)| e.importance >= COMPRESSION_FLOOR)
            .collect();

        if kept.len() > target {
            kept.sort_by(|a, b| {
                b.1.importance
                    .partial_cmp(&a.1.importance)
                    .unwrap_or(Ordering::Equal)
                    .then(a.0.cmp(&b.0))
            });
            kept.truncate(target);
            kept.sort_by_key(|(i, _)| *i);
        }

        self.entries = kept.into_iter().map(|(_, e)| e).collect();
        self.counters.total_compressions += 1;
        log_compression(before, self.entries.len(), target);
        before - self.entries.len()
    }

    /// Clamp into `[500, 2000]`; compress when the store is now over capacity.
    pub fn set_max_size(&mut self, requested: usize) -> usize {
        let applied = clamp_size(requested);
        self.config.max_size = applied;
        if self.entries.len() > applied {
            self.compress_memory();
        }
        applied
    }

    /// Multiply every importance by `factor` (clamped to `[0, 1]`).
    pub fn decay_importance(&mut self, factor: f64) {
        let factor = clamp_unit(1.0, factor);
        for e in self.entries.iter_mut() {
            e.importance *= factor;
        }
    }

    /// Mark the first entry with this exact timestamp as reviewed.
    pub fn mark_as_reviewed(&mut self, timestamp: u64) -> bool {
        match self.entries.iter_mut().find(|e| e.state.timestamp == timestamp) {
            Some(e) => {
                e.reviewed = true;
                true
            }
            None => false,
        }
    }

    pub fn mark_all_reviewed(&mut self) -> usize {
        let mut n = 0;
        for e in self.entries.iter_mut().filter(|e| !e.reviewed) {
            e.reviewed = true;
            n += 1;
        }
        n
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // =========================================================================
    // Filters
    // =========================================================================

    fn filter(&self, pred: impl Fn(&PrioritizedEntry) -> bool) -> Vec<&PrioritizedEntry> {
        self.entries.iter().filter(|e| pred(e)).collect()
    }

    pub fn by_priority(&self, priority: Priority) -> Vec<&PrioritizedEntry> {
        self.filter(move |e| e.priority == priority)
    }

    pub fn with_min_importance(&self, floor: f64) -> Vec<&PrioritizedEntry> {
        self.filter(move |e| e.importance >= floor)
    }

    pub fn unreviewed(&self) -> Vec<&PrioritizedEntry> {
        self.filter(|e| !e.reviewed)
    }

    pub fn with_outcome(&self) -> Vec<&PrioritizedEntry> {
        self.filter(|e| e.state.outcome.is_some())
    }

    pub fn without_outcome(&self) -> Vec<&PrioritizedEntry> {
        self.filter(|e| e.state.outcome.is_none())
    }

    pub fn successful(&self) -> Vec<&PrioritizedEntry> {
        self.filter(|e| e.state.is_success() == Some(true))
    }

    pub fn failed(&self) -> Vec<&PrioritizedEntry> {
        self.filter(|e| e.state.is_success() == Some(false))
    }

    /// Inclusive on both ends.
    pub fn in_time_range(&self, start: u64, end: u64) -> Vec<&PrioritizedEntry> {
        self.filter(move |e| (start..=end).contains(&e.state.timestamp))
    }

    pub fn by_regime(&self, label: &str) -> Vec<&PrioritizedEntry> {
        self.filter(|e| e.state.market.regime.eq_ignore_ascii_case(label))
    }

    pub fn shield_active(&self) -> Vec<&PrioritizedEntry> {
        self.filter(|e| e.state.engine.shield_active)
    }

    pub fn threat_at_least(&self, level: f64) -> Vec<&PrioritizedEntry> {
        self.filter(move |e| e.state.engine.threat_level >= level)
    }

    pub fn override_active(&self) -> Vec<&PrioritizedEntry> {
        self.filter(|e| e.state.override_state.active)
    }

    /// Most recent `n` entries carrying an outcome, oldest first.
    pub fn recent_with_outcome(&self, n: usize) -> Vec<&PrioritizedEntry> {
        let mut recent: Vec<&PrioritizedEntry> = self
            .entries
            .iter()
            .rev()
            .filter(|e| e.state.outcome.is_some())
            .take(n)
            .collect();
        recent.reverse();
        recent
    }

    // =========================================================================
    // Snapshot
    // =========================================================================

    pub fn export(&self) -> MemorySnapshot {
        MemorySnapshot {
            entries: self.entries.iter().cloned().collect(),
            config: self.config,
            stats: self.memory_stats(),
        }
    }

    /// Replace contents wholesale; invalid snapshots leave the store as is.
    pub fn import(&mut self, snapshot: MemorySnapshot) -> Result<()> {
        if let Err(err) = snapshot.validate() {
            log_import_rejected("memory", &err.to_string());
            return Err(err);
        }
        log_audit("import", "memory", &format!("{} entries", snapshot.entries.len()));
        self.counters = MemoryCounters {
            total_pushed: snapshot.stats.total_pushed,
            total_evicted: snapshot.stats.total_evicted,
            total_compressions: snapshot.stats.total_compressions,
        };
        self.config = snapshot.config;
        self.entries = snapshot.entries.into();
        Ok(())
    }
}

fn clamp_size(requested: usize) -> usize {
    let applied = requested.clamp(MIN_MEMORY_SIZE, MAX_MEMORY_SIZE);
    if applied != requested {
        log_config_clamped("memory.max_size", requested as f64, applied as f64);
    }
    applied
}
