//! Error types for the reactor simulation core

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Caller supplied an invalid argument or a malformed constant set.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Integrated state became non-finite or left its sanity bounds.
    #[error("Simulation diverged at t={time:.3}s: {message}")]
    Divergence { time: f64, message: String },

    /// Governor thresholds are inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type SimResult<T> = Result<T, SimError>;

/// Reject non-finite or non-positive values.
pub(crate) fn require_positive(name: &str, value: f64) -> SimResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(SimError::Validation(format!(
            "{name} must be finite and > 0 (got {value})"
        )));
    }
    Ok(())
}

/// Reject non-finite or negative values.
pub(crate) fn require_non_negative(name: &str, value: f64) -> SimResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimError::Validation(format!(
            "{name} must be finite and >= 0 (got {value})"
        )));
    }
    Ok(())
}

pub(crate) fn require_finite(name: &str, value: f64) -> SimResult<()> {
    if !value.is_finite() {
        return Err(SimError::Validation(format!(
            "{name} must be finite (got {value})"
        )));
    }
    Ok(())
}
