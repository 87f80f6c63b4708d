//! # Errors
//!
//! Typed failure taxonomy shared by the forecasting, optimization and
//! backtesting engines.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, QuantError>;

/// Failure taxonomy of the research engines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantError {
  /// Every grid candidate and the deterministic fallback order failed to fit.
  #[error("model fitting failed: no grid candidate and no fallback order produced a usable fit")]
  ModelFitFailure,

  /// A forecast was requested with neither a fitted model nor a training series.
  #[error("forecast requested without a fitted model or training series")]
  NotFitted,

  /// Requested or benchmark tickers absent from the return matrix. Carries the
  /// complete set of offenders, not merely the first.
  #[error("assets missing from return matrix: {}", .0.join(", "))]
  MissingAssets(Vec<String>),

  /// A weight vector sums to zero or carries disallowed negative entries.
  #[error("invalid weights: {reason}")]
  InvalidWeights { reason: String },

  /// Malformed construction input (unsorted dates, length mismatch, bad alpha).
  #[error("invalid input: {reason}")]
  InvalidInput { reason: String },

  /// A constrained solve has no solution for the requested target.
  #[error("infeasible optimization target: {reason}")]
  Infeasible { reason: String },
}

impl QuantError {
  /// Shorthand for an [`QuantError::InvalidInput`] with a formatted reason.
  pub fn invalid_input(reason: impl Into<String>) -> Self {
    Self::InvalidInput {
      reason: reason.into(),
    }
  }

  /// Shorthand for an [`QuantError::InvalidWeights`] with a formatted reason.
  pub fn invalid_weights(reason: impl Into<String>) -> Self {
    Self::InvalidWeights {
      reason: reason.into(),
    }
  }

  /// Shorthand for an [`QuantError::Infeasible`] with a formatted reason.
  pub fn infeasible(reason: impl Into<String>) -> Self {
    Self::Infeasible {
      reason: reason.into(),
    }
  }
}
