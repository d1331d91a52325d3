//! # portfolio-rs
//!
//! $$
//! \text{prices} \xrightarrow{\ \mu,\Sigma\ } \mathbf{w}^\* \xrightarrow{\ \text{clean}\ } \tilde{\mathbf{w}} \xrightarrow{\ B\ } (\mathbf{n}, \text{cash})
//! $$
//!
//! Maximum-Sharpe portfolio construction under per-asset bounds, followed by
//! a whole-share allocation of a cash budget.

pub mod error;
pub mod portfolio;
pub mod visualization;

pub use error::PortfolioError;
pub use error::Result;
