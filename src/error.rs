//! Error types for dispersion computations.
//!
//! Precondition violations are reported at the call that introduced the bad
//! value. Discarded eigenvalues are regular output, not errors.

use thiserror::Error;

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, ScmError>;

/// Main error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScmError {
    /// A physical parameter, frequency or collocation count is out of range.
    #[error("'{field}' {reason}")]
    Validation { field: &'static str, reason: String },

    /// An operation was called before its preconditions were met.
    #[error("invalid state: {0}")]
    State(String),

    /// The dense eigensolver failed.
    #[error("numerical failure: {0}")]
    Numerical(String),
}

impl ScmError {
    pub(crate) fn not_positive(field: &'static str, value: f64) -> Self {
        ScmError::Validation {
            field,
            reason: format!("must be positive; got {value} instead."),
        }
    }

    pub(crate) fn not_finite(field: &'static str, value: f64) -> Self {
        ScmError::Validation {
            field,
            reason: format!("must be a finite number; got {value} instead."),
        }
    }

    /// True for `Validation` errors.
    pub fn is_validation(&self) -> bool {
        matches!(self, ScmError::Validation { .. })
    }

    /// True for `State` errors.
    pub fn is_state(&self) -> bool {
        matches!(self, ScmError::State(_))
    }
}

/// Check that `value` is finite and strictly positive.
pub(crate) fn require_positive(field: &'static str, value: f64) -> Result<f64> {
    if !value.is_finite() {
        return Err(ScmError::not_finite(field, value));
    }
    if value <= 0.0 {
        return Err(ScmError::not_positive(field, value));
    }
    Ok(value)
}
