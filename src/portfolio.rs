//! # Portfolio
//!
//! $$
//! \sigma_p^2 = \mathbf{w}^\top \Sigma \mathbf{w}
//! $$
//!
//! Price tables, return/risk estimation, constrained max-Sharpe optimization,
//! weight cleaning, discrete share allocation and reporting.

pub mod cleaning;
pub mod data;
pub mod discrete;
pub mod engine;
pub mod estimators;
pub mod loaders;
pub mod optimizers;
pub mod report;
pub mod solver;
pub mod types;
#[cfg(feature = "yahoo")]
pub mod yahoo;

pub use cleaning::clean_weights;
pub use data::PriceTable;
pub use data::correlation_matrix;
pub use data::simple_returns;
pub use discrete::AllocationPlan;
pub use discrete::allocate;
pub use engine::PortfolioEngine;
pub use engine::PortfolioEngineConfig;
pub use engine::PortfolioReport;
pub use estimators::RiskReturnModel;
pub use estimators::estimate;
pub use estimators::ledoit_wolf;
pub use estimators::mean_historical_return;
pub use estimators::sample_covariance;
pub use loaders::load_price_csv;
pub use optimizers::efficient_frontier;
pub use optimizers::efficient_return;
pub use optimizers::max_sharpe;
pub use optimizers::min_volatility;
pub use optimizers::performance;
pub use report::ReportRow;
pub use report::breakdown;
pub use solver::ClarabelSolver;
pub use solver::QpSolver;
pub use solver::QuadraticProgram;
pub use types::PortfolioResult;
pub use types::RiskModel;
pub use types::WeightBounds;
pub use types::WeightVector;
#[cfg(feature = "yahoo")]
pub use yahoo::download_prices;
