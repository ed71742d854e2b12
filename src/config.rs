use serde::{Deserialize, Serialize};

use crate::error::{ensure, LearningError, Result};

pub const MIN_MEMORY_SIZE: usize = 500;
pub const MAX_MEMORY_SIZE: usize = 2000;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Tunables owned by the rule engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LearningConfig {
    pub mutation_rate: f64,
    pub learning_rate: f64,
    pub regime_sensitivity: f64,
    pub exploration_rate: f64,
    pub memory_decay: f64,
    /// 0..100. Advisory level published to the trading layer; raised under
    /// high threat. The update gate is `AdaptationConfig::min_confidence`.
    pub confidence_threshold: f64,
    pub adaptive_scaling: bool,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            mutation_rate: 0.1,
            learning_rate: 0.01,
            regime_sensitivity: 0.5,
            exploration_rate: 0.2,
            memory_decay: 0.95,
            confidence_threshold: 70.0,
            adaptive_scaling: true,
        }
    }
}

impl LearningConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            mutation_rate: env_or("MUTATION_RATE", d.mutation_rate),
            learning_rate: env_or("LEARNING_RATE", d.learning_rate),
            regime_sensitivity: env_or("REGIME_SENSITIVITY", d.regime_sensitivity),
            exploration_rate: env_or("EXPLORATION_RATE", d.exploration_rate),
            memory_decay: env_or("MEMORY_DECAY", d.memory_decay),
            confidence_threshold: env_or("CONFIDENCE_THRESHOLD", d.confidence_threshold),
            adaptive_scaling: env_or("ADAPTIVE_SCALING", d.adaptive_scaling),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("mutation_rate", self.mutation_rate),
            ("learning_rate", self.learning_rate),
            ("regime_sensitivity", self.regime_sensitivity),
            ("exploration_rate", self.exploration_rate),
            ("memory_decay", self.memory_decay),
        ] {
            in_range(field, value, 0.0, 1.0)?;
        }
        in_range("confidence_threshold", self.confidence_threshold, 0.0, 100.0)
    }

    /// Same checks as [`validate`](Self::validate), reported as an import failure.
    pub fn validate_import(&self) -> Result<()> {
        self.validate()
            .map_err(|e| LearningError::Validation(e.to_string()))
    }
}

/// Clamp a fractional config value; NaN keeps the previous value.
pub fn clamp_unit(previous: f64, requested: f64) -> f64 {
    if requested.is_finite() {
        requested.clamp(0.0, 1.0)
    } else {
        previous
    }
}

fn in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(LearningError::ConfigOutOfRange { field, value, min, max })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    pub max_size: usize,
    pub compression_threshold: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_size: 1000,
            compression_threshold: 1500,
        }
    }
}

impl MemoryConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_size: env_or("MEMORY_MAX_SIZE", d.max_size),
            compression_threshold: env_or("MEMORY_COMPRESSION_THRESHOLD", d.compression_threshold),
        }
    }

    pub fn validate(&self) -> Result<()> {
        in_range(
            "max_size",
            self.max_size as f64,
            MIN_MEMORY_SIZE as f64,
            MAX_MEMORY_SIZE as f64,
        )?;
        ensure(self.compression_threshold > 0, || {
            "compression_threshold must be positive".to_string()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdaptationConfig {
    /// Updates below this confidence (0..100) are skipped
    pub min_confidence: f64,
    pub history_capacity: usize,
    pub exploration_decay: f64,
    pub exploration_floor: f64,
    /// Window of outcome-bearing memory entries for recent performance
    pub performance_window: usize,
    /// Window of accepted updates for the adaptation score
    pub score_window: usize,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 50.0,
            history_capacity: 200,
            exploration_decay: 0.995,
            exploration_floor: 0.01,
            performance_window: 50,
            score_window: 20,
        }
    }
}

impl AdaptationConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_confidence: env_or("MIN_UPDATE_CONFIDENCE", d.min_confidence),
            history_capacity: env_or("UPDATE_HISTORY_CAP", d.history_capacity),
            exploration_decay: env_or("EXPLORATION_DECAY", d.exploration_decay),
            exploration_floor: env_or("EXPLORATION_FLOOR", d.exploration_floor),
            performance_window: d.performance_window,
            score_window: d.score_window,
        }
    }

    pub fn validate(&self) -> Result<()> {
        in_range("min_confidence", self.min_confidence, 0.0, 100.0)?;
        in_range("exploration_decay", self.exploration_decay, 0.0, 1.0)?;
        in_range("exploration_floor", self.exploration_floor, 0.0, 1.0)?;
        ensure(self.history_capacity > 0, || {
            "history_capacity must be positive".to_string()
        })
    }
}

/// Everything needed to build a learning context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub learning: LearningConfig,
    pub memory: MemoryConfig,
    pub adaptation: AdaptationConfig,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            learning: LearningConfig::from_env(),
            memory: MemoryConfig::from_env(),
            adaptation: AdaptationConfig::from_env(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.learning.validate()?;
        self.memory.validate()?;
        self.adaptation.validate()
    }
}
