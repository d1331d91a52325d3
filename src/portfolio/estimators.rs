//! # Return and Risk Estimators
//!
//! $$
//! \mu_i = \Big(\prod_{t=1}^{T-1}(1+r_{t,i})\Big)^{f/(T-1)} - 1,\qquad
//! \Sigma = f\cdot\widehat{\operatorname{cov}}(r)
//! $$
//!
//! Annualized expected returns and covariance from a [`PriceTable`].

use nalgebra::DMatrix;
use ndarray::Array2;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray_stats::CorrelationExt;
use ndarray_stats::QuantileExt;

use crate::error::PortfolioError;
use crate::error::Result;
use super::data::PriceTable;
use super::data::column_means;
use super::types::RiskModel;

/// Trading periods per year for daily data.
pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// Expected returns and covariance, aligned with the table's tickers.
#[derive(Clone, Debug, PartialEq)]
pub struct RiskReturnModel {
  pub tickers: Vec<String>,
  pub expected_returns: Vec<f64>,
  pub covariance: DMatrix<f64>,
}

/// Estimate expected returns and covariance with the chosen risk model.
pub fn estimate(table: &PriceTable, model: RiskModel, frequency: usize) -> Result<RiskReturnModel> {
  let expected_returns = mean_historical_return(table, frequency)?;
  let covariance = match model {
    RiskModel::SampleCov => sample_covariance(table, frequency)?,
    RiskModel::LedoitWolf => ledoit_wolf(table, frequency)?.0,
  };

  tracing::debug!(
    assets = table.n_assets(),
    observations = table.n_observations(),
    ?model,
    "estimated risk/return model"
  );

  Ok(RiskReturnModel {
    tickers: table.tickers().to_vec(),
    expected_returns,
    covariance,
  })
}

/// Reject tables that cannot support return estimation.
pub fn validate_history(table: &PriceTable) -> Result<()> {
  if table.n_assets() == 0 {
    return Err(PortfolioError::InsufficientData {
      tickers: Vec::new(),
      reason: "price table has no instruments".to_string(),
    });
  }

  if table.n_observations() < 2 {
    return Err(PortfolioError::InsufficientData {
      tickers: table.tickers().to_vec(),
      reason: format!(
        "{} observation(s), at least 2 are required",
        table.n_observations()
      ),
    });
  }

  let prices = table.prices();
  let non_positive = offending(table, |j| prices.column(j).iter().any(|&p| p <= 0.0));
  if !non_positive.is_empty() {
    return Err(PortfolioError::InsufficientData {
      tickers: non_positive,
      reason: "prices must be strictly positive".to_string(),
    });
  }

  let constant = offending(table, |j| {
    let col = prices.column(j);
    match (col.min(), col.max()) {
      (Ok(lo), Ok(hi)) => hi - lo <= f64::EPSILON * hi.abs(),
      _ => true,
    }
  });
  if !constant.is_empty() {
    return Err(PortfolioError::InsufficientData {
      tickers: constant,
      reason: "price history is constant".to_string(),
    });
  }

  Ok(())
}

fn offending(table: &PriceTable, is_bad: impl Fn(usize) -> bool) -> Vec<String> {
  table
    .tickers()
    .iter()
    .enumerate()
    .filter(|(j, _)| is_bad(*j))
    .map(|(_, t)| t.clone())
    .collect()
}

/// Compounded annual growth rate over the whole history.
///
/// Equivalent to `(last / first)^(frequency / (T - 1)) - 1`.
pub fn mean_historical_return(table: &PriceTable, frequency: usize) -> Result<Vec<f64>> {
  validate_history(table)?;

  let returns = table.returns();
  let periods = returns.nrows() as f64;
  let exponent = frequency as f64 / periods;

  Ok(
    returns
      .axis_iter(Axis(1))
      .map(|col| {
        let growth: f64 = col.iter().map(|r| 1.0 + r).product();
        growth.powf(exponent) - 1.0
      })
      .collect(),
  )
}

/// Daily returns of a validated history with at least two return rows.
fn covariance_returns(table: &PriceTable) -> Result<Array2<f64>> {
  validate_history(table)?;

  let returns = table.returns();
  if returns.nrows() < 2 {
    return Err(PortfolioError::InsufficientData {
      tickers: table.tickers().to_vec(),
      reason: "covariance needs at least two returns".to_string(),
    });
  }
  Ok(returns)
}

/// Annualized sample covariance (ddof = 1) of simple daily returns.
pub fn sample_covariance(table: &PriceTable, frequency: usize) -> Result<DMatrix<f64>> {
  let returns = covariance_returns(table)?;
  let cov = returns
    .t()
    .cov(1.0)
    .map_err(|e| PortfolioError::InsufficientData {
      tickers: table.tickers().to_vec(),
      reason: e.to_string(),
    })?;

  Ok(to_dmatrix(&cov) * frequency as f64)
}

/// Ledoit-Wolf shrinkage toward `mu * I`, annualized.
///
/// Returns the shrunk covariance and the shrinkage intensity in `[0, 1]`.
pub fn ledoit_wolf(table: &PriceTable, frequency: usize) -> Result<(DMatrix<f64>, f64)> {
  let returns = covariance_returns(table)?;
  let (cov, shrinkage) = ledoit_wolf_shrunk(returns.view());

  tracing::debug!(shrinkage, "ledoit-wolf shrinkage intensity");

  Ok((to_dmatrix(&cov) * frequency as f64, shrinkage))
}

fn ledoit_wolf_shrunk(returns: ArrayView2<'_, f64>) -> (Array2<f64>, f64) {
  let n_samples = returns.nrows() as f64;
  let n_features = returns.ncols() as f64;

  let means = ndarray::Array1::from(column_means(returns));
  let x = &returns - &means;
  let x2 = x.mapv(|v| v * v);

  let emp_cov = x.t().dot(&x) / n_samples;
  let emp_cov_trace = x2.sum_axis(Axis(0)) / n_samples;
  let mu = emp_cov_trace.sum() / n_features;

  let beta_ = x2.t().dot(&x2).sum();
  let delta_ = x.t().dot(&x).mapv(|v| v * v).sum() / (n_samples * n_samples);

  let beta = (beta_ / n_samples - delta_) / (n_features * n_samples);
  let delta = (delta_ - 2.0 * mu * emp_cov_trace.sum() + n_features * mu * mu) / n_features;
  let beta = beta.min(delta);
  let shrinkage = if beta == 0.0 || delta == 0.0 {
    0.0
  } else {
    (beta / delta).clamp(0.0, 1.0)
  };

  let mut shrunk = emp_cov * (1.0 - shrinkage);
  for i in 0..shrunk.nrows() {
    shrunk[[i, i]] += shrinkage * mu;
  }

  (shrunk, shrinkage)
}

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
  DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

#[cfg(test)]
mod tests {
  use approx::assert_relative_eq;
  use chrono::Duration;
  use chrono::NaiveDate;
  use ndarray::array;

  use super::*;

  fn table(prices: Array2<f64>) -> PriceTable {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let dates = (0..prices.nrows())
      .map(|i| start + Duration::days(i as i64))
      .collect();
    let tickers = (0..prices.ncols()).map(|j| format!("T{j}")).collect();
    PriceTable::new(tickers, dates, prices).unwrap()
  }

  #[test]
  fn compounded_return_matches_endpoint_growth() {
    let t = table(array![[100.0, 50.0], [110.0, 45.0], [99.0, 60.0], [121.0, 55.0]]);
    let mu = mean_historical_return(&t, 252).unwrap();

    assert_relative_eq!(mu[0], 1.21_f64.powf(252.0 / 3.0) - 1.0, max_relative = 1e-10);
    assert_relative_eq!(mu[1], 1.1_f64.powf(252.0 / 3.0) - 1.0, max_relative = 1e-10);
  }

  #[test]
  fn sample_covariance_is_annualized_and_symmetric() {
    let t = table(array![[10.0, 20.0], [11.0, 19.0], [12.1, 20.9], [11.0, 20.0]]);
    let returns = t.returns();
    let cov = sample_covariance(&t, 252).unwrap();

    let r0: Vec<f64> = returns.column(0).to_vec();
    let m0 = r0.iter().sum::<f64>() / 3.0;
    let var0 = r0.iter().map(|r| (r - m0).powi(2)).sum::<f64>() / 2.0;

    assert_relative_eq!(cov[(0, 0)], var0 * 252.0, max_relative = 1e-10);
    assert_relative_eq!(cov[(0, 1)], cov[(1, 0)], epsilon = 1e-15);
  }

  #[test]
  fn single_observation_is_insufficient() {
    let t = table(array![[10.0, 20.0]]);
    match mean_historical_return(&t, 252) {
      Err(PortfolioError::InsufficientData { tickers, .. }) => {
        assert_eq!(tickers, vec!["T0".to_string(), "T1".to_string()]);
      }
      other => panic!("expected insufficient data, got {other:?}"),
    }
  }

  #[test]
  fn constant_history_names_the_offending_ticker() {
    let t = table(array![[10.0, 5.0, 7.0], [11.0, 5.0, 8.0], [12.0, 5.0, 7.5]]);
    match sample_covariance(&t, 252) {
      Err(PortfolioError::InsufficientData { tickers, reason }) => {
        assert_eq!(tickers, vec!["T1".to_string()]);
        assert!(reason.contains("constant"));
      }
      other => panic!("expected insufficient data, got {other:?}"),
    }
  }

  #[test]
  fn both_covariance_estimators_need_two_returns() {
    let t = table(array![[10.0, 20.0], [10.5, 19.0]]);

    assert!(matches!(
      sample_covariance(&t, 252),
      Err(PortfolioError::InsufficientData { .. })
    ));
    assert!(matches!(
      ledoit_wolf(&t, 252),
      Err(PortfolioError::InsufficientData { .. })
    ));
    assert!(matches!(
      estimate(&t, RiskModel::LedoitWolf, 252),
      Err(PortfolioError::InsufficientData { .. })
    ));
  }

  #[test]
  fn non_positive_prices_are_rejected() {
    let t = table(array![[10.0, 0.0], [11.0, 5.0]]);
    assert!(matches!(
      estimate(&t, RiskModel::SampleCov, 252),
      Err(PortfolioError::InsufficientData { .. })
    ));
  }

  #[test]
  fn ledoit_wolf_blends_toward_scaled_identity() {
    let t = table(array![
      [10.0, 20.0, 30.0],
      [10.5, 19.0, 30.3],
      [10.2, 19.5, 30.9],
      [10.9, 20.4, 30.1],
      [11.1, 20.1, 31.0],
      [10.8, 21.0, 31.4],
    ]);
    let (shrunk, delta) = ledoit_wolf(&t, 1).unwrap();

    let returns = t.returns();
    let emp = returns.t().cov(0.0).unwrap();
    let mu = (0..3).map(|i| emp[[i, i]]).sum::<f64>() / 3.0;

    assert!((0.0..=1.0).contains(&delta));
    for i in 0..3 {
      for j in 0..3 {
        let target = if i == j { mu } else { 0.0 };
        let expected = (1.0 - delta) * emp[[i, j]] + delta * target;
        assert_relative_eq!(shrunk[(i, j)], expected, epsilon = 1e-14);
      }
    }

    let eig = shrunk.symmetric_eigen().eigenvalues;
    assert!(eig.iter().all(|&e| e > 0.0));
  }
}
