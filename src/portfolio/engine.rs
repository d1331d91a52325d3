//! # Portfolio Engine
//!
//! $$
//! P \xrightarrow{\text{estimate}} (\mu,\Sigma) \xrightarrow{\text{optimize}} \mathbf{w}^\*
//! \xrightarrow{\text{clean}} \tilde{\mathbf{w}} \xrightarrow{\text{allocate}} (\mathbf n, \text{cash})
//! $$
//!
//! High-level orchestration of one point-in-time portfolio run.

use std::collections::HashMap;

use crate::error::Result;
use super::cleaning::DEFAULT_CUTOFF;
use super::cleaning::DEFAULT_ROUNDING;
use super::cleaning::clean_weights;
use super::data::PriceTable;
use super::discrete::AllocationPlan;
use super::discrete::allocate;
use super::estimators::RiskReturnModel;
use super::estimators::TRADING_DAYS_PER_YEAR;
use super::estimators::estimate;
use super::optimizers::efficient_frontier;
use super::optimizers::max_sharpe;
use super::report::ReportRow;
use super::report::breakdown;
use super::solver::ClarabelSolver;
use super::solver::QpSolver;
use super::types::PortfolioResult;
use super::types::RiskModel;
use super::types::WeightBounds;
use super::types::WeightVector;

/// Runtime configuration for [`PortfolioEngine`].
#[derive(Clone, Debug)]
pub struct PortfolioEngineConfig {
  /// Periods per year used to annualize returns and covariance.
  pub frequency: usize,
  /// Covariance estimator.
  pub risk_model: RiskModel,
  /// Lower weight bound applied to every asset.
  pub lower_bound: f64,
  /// Upper weight bound applied to every asset.
  pub upper_bound: f64,
  /// Risk-free rate used in Sharpe computations.
  pub risk_free: f64,
  /// Weights below this are dropped when cleaning.
  pub cutoff: f64,
  /// Decimals kept when cleaning, `None` for full precision.
  pub rounding: Option<u32>,
  /// Cash to allocate into whole shares.
  pub budget: f64,
  /// Number of efficient-frontier points for plotting.
  pub frontier_points: usize,
}

impl Default for PortfolioEngineConfig {
  fn default() -> Self {
    Self {
      frequency: TRADING_DAYS_PER_YEAR,
      risk_model: RiskModel::SampleCov,
      lower_bound: 0.02,
      upper_bound: 0.19,
      risk_free: 0.0,
      cutoff: DEFAULT_CUTOFF,
      rounding: Some(DEFAULT_ROUNDING),
      budget: 20_000.0,
      frontier_points: 50,
    }
  }
}

/// Everything a run produces, from the risk model to the report rows.
#[derive(Clone, Debug)]
pub struct PortfolioReport {
  pub model: RiskReturnModel,
  /// Max-Sharpe weights and their performance, before cleaning.
  pub optimal: PortfolioResult,
  pub cleaned: WeightVector,
  pub latest_prices: HashMap<String, f64>,
  pub allocation: AllocationPlan,
  pub rows: Vec<ReportRow>,
}

/// Single entry point for a portfolio run.
#[derive(Clone, Debug)]
pub struct PortfolioEngine<S: QpSolver = ClarabelSolver> {
  config: PortfolioEngineConfig,
  solver: S,
}

impl PortfolioEngine<ClarabelSolver> {
  /// Engine backed by the default Clarabel solver.
  pub fn new(config: PortfolioEngineConfig) -> Self {
    Self::with_solver(config, ClarabelSolver::default())
  }
}

impl<S: QpSolver> PortfolioEngine<S> {
  pub fn with_solver(config: PortfolioEngineConfig, solver: S) -> Self {
    Self { config, solver }
  }

  /// Borrow engine configuration.
  pub fn config(&self) -> &PortfolioEngineConfig {
    &self.config
  }

  pub fn bounds(&self, n: usize) -> WeightBounds {
    WeightBounds::uniform(n, self.config.lower_bound, self.config.upper_bound)
  }

  pub fn estimate(&self, table: &PriceTable) -> Result<RiskReturnModel> {
    estimate(table, self.config.risk_model, self.config.frequency)
  }

  /// Max-Sharpe weights for an estimated model.
  pub fn optimize(&self, model: &RiskReturnModel) -> Result<PortfolioResult> {
    max_sharpe(
      &model.expected_returns,
      &model.covariance,
      &self.bounds(model.tickers.len()),
      self.config.risk_free,
      &self.solver,
    )
  }

  pub fn clean(&self, tickers: &[String], result: &PortfolioResult) -> Result<WeightVector> {
    let raw = WeightVector::new(tickers, &result.weights)?;
    clean_weights(&raw, self.config.cutoff, self.config.rounding)
  }

  pub fn allocate(
    &self,
    weights: &WeightVector,
    latest_prices: &HashMap<String, f64>,
  ) -> Result<AllocationPlan> {
    allocate(weights, latest_prices, self.config.budget)
  }

  /// Efficient frontier for plotting.
  pub fn frontier(&self, model: &RiskReturnModel) -> Result<Vec<PortfolioResult>> {
    efficient_frontier(
      &model.expected_returns,
      &model.covariance,
      &self.bounds(model.tickers.len()),
      self.config.frontier_points,
      self.config.risk_free,
      &self.solver,
    )
  }

  /// Estimate, optimize, clean, allocate and assemble the report rows.
  pub fn run(&self, table: &PriceTable) -> Result<PortfolioReport> {
    let model = self.estimate(table)?;
    let optimal = self.optimize(&model)?;
    let cleaned = self.clean(&model.tickers, &optimal)?;
    let latest_prices = table.latest_prices()?;
    let allocation = self.allocate(&cleaned, &latest_prices)?;
    let rows = breakdown(&allocation, &latest_prices);

    Ok(PortfolioReport {
      model,
      optimal,
      cleaned,
      latest_prices,
      allocation,
      rows,
    })
  }
}
