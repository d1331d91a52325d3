//! # Errors
//!
//! $$
//! \text{run} : \text{PriceTable} \to \text{AllocationPlan} \;\cup\; \text{PortfolioError}
//! $$
//!
//! Error taxonomy shared by every stage of the portfolio pipeline.

use thiserror::Error;

/// Failure of a single optimization run. Errors never carry partial results.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PortfolioError {
  /// Price history too short or degenerate for the listed instruments.
  #[error("insufficient price data for {tickers:?}: {reason}")]
  InsufficientData {
    tickers: Vec<String>,
    reason: String,
  },

  /// The weight bounds admit no vector summing to one.
  #[error(
    "infeasible weight constraints: lower bounds sum to {lower_sum:.4}, upper bounds sum to {upper_sum:.4}"
  )]
  InfeasibleConstraints { lower_sum: f64, upper_sum: f64 },

  /// The covariance matrix is not symmetric positive-semidefinite.
  #[error(
    "covariance matrix is ill-conditioned (min eigenvalue {min_eigenvalue:.3e}); retry with a shrinkage estimator such as Ledoit-Wolf"
  )]
  IllConditionedInput { min_eigenvalue: f64 },

  /// No feasible portfolio earns more than the risk-free rate.
  #[error("no feasible portfolio has an expected return above the risk-free rate {risk_free}")]
  NoExcessReturn { risk_free: f64 },

  #[error("dimension mismatch: {0}")]
  DimensionMismatch(String),

  /// The QP backend did not reach a solution.
  #[error("solver failed: {0}")]
  Solver(String),

  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("duplicate ticker {0}")]
  DuplicateTicker(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, PortfolioError>;
