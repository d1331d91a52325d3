//! # Portfolio Types
//!
//! $$
//! \mathbf{w}^\*=\arg\max_{\mathbf{w}\in\mathcal W} \frac{\mathbb E[R_p]-r_f}{\sigma_p},\qquad
//! \mathcal W=\{\mathbf{w} : \mathbf 1^\top\mathbf{w}=1,\ \ell\le\mathbf{w}\le u\}
//! $$
//!
//! Shared enums and result containers for portfolio optimization.

use std::collections::HashSet;

use crate::error::PortfolioError;
use crate::error::Result;

/// Covariance estimator used by the return/risk model.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RiskModel {
  /// Annualized sample covariance of simple daily returns.
  #[default]
  SampleCov,
  /// Ledoit-Wolf shrinkage toward a constant-variance target.
  LedoitWolf,
}

impl RiskModel {
  /// Parse a string into a [`RiskModel`], falling back to the sample covariance.
  pub fn from_str(s: &str) -> Self {
    Self::parse(s).unwrap_or_default()
  }

  /// Parse a known model name, `None` for anything else.
  pub fn parse(s: &str) -> Option<Self> {
    match s.to_lowercase().as_str() {
      "sample" | "sample-cov" | "sample_cov" | "samplecov" | "sample-covariance" => {
        Some(Self::SampleCov)
      }
      "ledoit-wolf" | "ledoit_wolf" | "ledoitwolf" | "lw" | "shrinkage" => Some(Self::LedoitWolf),
      _ => None,
    }
  }
}

/// Output of a portfolio optimization run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PortfolioResult {
  /// Final portfolio weights, aligned with the input asset order.
  pub weights: Vec<f64>,
  /// Model expected portfolio return (annualized if inputs are annualized).
  pub expected_return: f64,
  /// Model portfolio volatility.
  pub volatility: f64,
  /// Sharpe ratio computed as `(expected_return - risk_free) / volatility`.
  pub sharpe: f64,
}

/// Per-asset lower and upper weight bounds.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightBounds {
  lower: Vec<f64>,
  upper: Vec<f64>,
}

impl WeightBounds {
  /// Same `[lower, upper]` interval for each of `n` assets.
  pub fn uniform(n: usize, lower: f64, upper: f64) -> Self {
    Self {
      lower: vec![lower; n],
      upper: vec![upper; n],
    }
  }

  /// Asset-specific bounds. Both vectors must have the same length.
  pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
    if lower.len() != upper.len() {
      return Err(PortfolioError::DimensionMismatch(format!(
        "{} lower bounds vs {} upper bounds",
        lower.len(),
        upper.len()
      )));
    }
    Ok(Self { lower, upper })
  }

  pub fn len(&self) -> usize {
    self.lower.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lower.is_empty()
  }

  pub fn lower(&self) -> &[f64] {
    &self.lower
  }

  pub fn upper(&self) -> &[f64] {
    &self.upper
  }

  pub fn lower_sum(&self) -> f64 {
    self.lower.iter().sum()
  }

  pub fn upper_sum(&self) -> f64 {
    self.upper.iter().sum()
  }

  /// Whether any lower bound permits a short position.
  pub fn allows_short(&self) -> bool {
    self.lower.iter().any(|&lo| lo < 0.0)
  }

  /// Fails unless some weight vector within the bounds sums to one.
  pub fn check_feasible(&self) -> Result<()> {
    let bad_value = self
      .lower
      .iter()
      .zip(self.upper.iter())
      .any(|(lo, hi)| !lo.is_finite() || !hi.is_finite() || lo > hi);

    let lower_sum = self.lower_sum();
    let upper_sum = self.upper_sum();
    if bad_value || lower_sum - 1.0 > 1e-9 || upper_sum + 1e-9 < 1.0 {
      return Err(self.infeasible());
    }

    Ok(())
  }

  pub(crate) fn infeasible(&self) -> PortfolioError {
    PortfolioError::InfeasibleConstraints {
      lower_sum: self.lower_sum(),
      upper_sum: self.upper_sum(),
    }
  }
}

/// Ordered `(ticker, weight)` pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WeightVector {
  entries: Vec<(String, f64)>,
}

impl WeightVector {
  /// Zip tickers with weights in the same order. Tickers must be unique.
  pub fn new(tickers: &[String], weights: &[f64]) -> Result<Self> {
    if tickers.len() != weights.len() {
      return Err(PortfolioError::DimensionMismatch(format!(
        "{} tickers vs {} weights",
        tickers.len(),
        weights.len()
      )));
    }

    let mut seen = HashSet::with_capacity(tickers.len());
    if let Some(dup) = tickers.iter().find(|t| !seen.insert(t.as_str())) {
      return Err(PortfolioError::DuplicateTicker(dup.clone()));
    }

    Ok(Self {
      entries: tickers.iter().cloned().zip(weights.iter().copied()).collect(),
    })
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
    self.entries.iter().map(|(t, w)| (t.as_str(), *w))
  }

  /// Weight of `ticker`, if present.
  pub fn get(&self, ticker: &str) -> Option<f64> {
    self
      .entries
      .iter()
      .find(|(t, _)| t == ticker)
      .map(|(_, w)| *w)
  }

  pub fn sum(&self) -> f64 {
    self.entries.iter().map(|(_, w)| w).sum()
  }
}

impl FromIterator<(String, f64)> for WeightVector {
  fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}
