//! Error taxonomy for the learning core.
//!
//! Nothing in normal operation returns an error. Imports and config
//! validation are the only fallible paths, and both fail closed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LearningError {
    /// Malformed import payload; existing state was left untouched.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("config field {field} = {value} outside [{min}, {max}]")]
    ConfigOutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("snapshot parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The learning service task has exited.
    #[error("learning service stopped")]
    ServiceStopped,
}

pub type Result<T> = std::result::Result<T, LearningError>;

/// Non-fatal conditions surfaced to the caller instead of an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegimeWarning {
    UnknownRegime(String),
}

impl std::fmt::Display for RegimeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegimeWarning::UnknownRegime(name) => write!(f, "unknown regime '{}'", name),
        }
    }
}

/// Check helper used by every import validator.
pub(crate) fn ensure(cond: bool, msg: impl FnOnce() -> String) -> Result<()> {
    if cond {
        Ok(())
    } else {
        Err(LearningError::Validation(msg()))
    }
}
