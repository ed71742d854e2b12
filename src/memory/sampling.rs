//! Sampling disciplines over the experience store.
//!
//! - random: uniform Fisher–Yates partial shuffle, no duplicates
//! - prioritized: draws proportional to importance, **with replacement**
//! - balanced: first ⌊n/2⌋ successes and first ⌊n/2⌋ failures in store
//!   order; only the presentation order is shuffled

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{MemoryStore, PrioritizedEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    Random,
    Prioritized,
    Balanced,
}

impl MemoryStore {
    pub fn sample<R: Rng + ?Sized>(
        &self,
        n: usize,
        strategy: SamplingStrategy,
        rng: &mut R,
    ) -> Vec<&PrioritizedEntry> {
        match strategy {
            SamplingStrategy::Random => self.sample_random(n, rng),
            SamplingStrategy::Prioritized => self.sample_prioritized(n, rng),
            SamplingStrategy::Balanced => self.sample_balanced(n, rng),
        }
    }

    pub fn sample_random<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<&PrioritizedEntry> {
        let mut refs: Vec<&PrioritizedEntry> = self.entries().collect();
        let (chosen, _) = refs.partial_shuffle(rng, n);
        chosen.to_vec()
    }

    pub fn sample_prioritized<R: Rng + ?Sized>(
        &self,
        n: usize,
        rng: &mut R,
    ) -> Vec<&PrioritizedEntry> {
        let refs: Vec<&PrioritizedEntry> = self.entries().collect();
        if refs.is_empty() {
            return Vec::new();
        }
        match WeightedIndex::new(refs.iter().map(|e| e.importance.max(0.0))) {
            Ok(dist) => (0..n).map(|_| refs[dist.sample(rng)]).collect(),
            // every importance decayed to zero: fall back to uniform draws
            Err(_) => (0..n).map(|_| refs[rng.gen_range(0..refs.len())]).collect(),
        }
    }

    pub fn sample_balanced<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<&PrioritizedEntry> {
        let half = n / 2;
        let mut out: Vec<&PrioritizedEntry> = self
            .entries()
            .filter(|e| e.state.is_success() == Some(true))
            .take(half)
            .collect();
        out.extend(
            self.entries()
                .filter(|e| e.state.is_success() == Some(false))
                .take(half),
        );
        out.shuffle(rng);
        out
    }
}
