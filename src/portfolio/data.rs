//! # Portfolio Data Utilities
//!
//! $$
//! r_{t,i} = \frac{P_{t,i}}{P_{t-1,i}} - 1,\qquad
//! \rho_{ij} = \frac{\operatorname{cov}(r_i, r_j)}{\sigma_i \sigma_j}
//! $$
//!
//! Aligned price table plus return and correlation helpers.

use std::collections::HashMap;
use std::collections::HashSet;

use chrono::NaiveDate;
use ndarray::Array2;
use ndarray::ArrayView1;
use ndarray::ArrayView2;
use ndarray::Axis;
use ndarray::s;
use ndarray_stats::CorrelationExt;

use crate::error::PortfolioError;
use crate::error::Result;

/// Closing prices, one row per date and one column per ticker.
///
/// Every cell is finite; dates are strictly increasing.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceTable {
  tickers: Vec<String>,
  dates: Vec<NaiveDate>,
  prices: Array2<f64>,
}

impl PriceTable {
  /// Build a table from an already aligned price matrix.
  pub fn new(tickers: Vec<String>, dates: Vec<NaiveDate>, prices: Array2<f64>) -> Result<Self> {
    if prices.nrows() != dates.len() || prices.ncols() != tickers.len() {
      return Err(PortfolioError::DimensionMismatch(format!(
        "price matrix is {}x{} but there are {} dates and {} tickers",
        prices.nrows(),
        prices.ncols(),
        dates.len(),
        tickers.len()
      )));
    }

    check_unique(&tickers)?;

    if dates.windows(2).any(|w| w[0] >= w[1]) {
      return Err(PortfolioError::InvalidArgument(
        "dates must be strictly increasing".to_string(),
      ));
    }

    if let Some(((_, col), _)) = prices.indexed_iter().find(|(_, p)| !p.is_finite()) {
      return Err(PortfolioError::InvalidArgument(format!(
        "non-finite price for {}",
        tickers[col]
      )));
    }

    Ok(Self {
      tickers,
      dates,
      prices,
    })
  }

  /// Build a table from raw observations, sorting by date and dropping every
  /// row where any ticker has a missing or non-finite price.
  pub fn from_observations(
    tickers: Vec<String>,
    mut rows: Vec<(NaiveDate, Vec<Option<f64>>)>,
  ) -> Result<Self> {
    check_unique(&tickers)?;
    rows.sort_by_key(|(date, _)| *date);

    let n = tickers.len();
    let mut dates = Vec::with_capacity(rows.len());
    let mut flat = Vec::with_capacity(rows.len() * n);
    let mut dropped = 0usize;
    let mut prev_date = None;

    for (date, values) in rows {
      if values.len() != n {
        return Err(PortfolioError::DimensionMismatch(format!(
          "row {date} has {} values for {n} tickers",
          values.len()
        )));
      }
      if prev_date == Some(date) {
        return Err(PortfolioError::InvalidArgument(format!(
          "duplicate observation date {date}"
        )));
      }
      prev_date = Some(date);

      let complete: Option<Vec<f64>> = values
        .into_iter()
        .map(|v| v.filter(|p| p.is_finite()))
        .collect();

      match complete {
        Some(row) => {
          dates.push(date);
          flat.extend(row);
        }
        None => dropped += 1,
      }
    }

    if dropped > 0 {
      tracing::debug!(dropped, kept = dates.len(), "dropped incomplete price rows");
    }

    let prices = Array2::from_shape_vec((dates.len(), n), flat)
      .map_err(|e| PortfolioError::DimensionMismatch(e.to_string()))?;

    Self::new(tickers, dates, prices)
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  /// Price matrix, rows are dates.
  pub fn prices(&self) -> ArrayView2<'_, f64> {
    self.prices.view()
  }

  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  pub fn n_observations(&self) -> usize {
    self.dates.len()
  }

  /// Price history of a single ticker.
  pub fn column(&self, ticker: &str) -> Option<ArrayView1<'_, f64>> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|j| self.prices.column(j))
  }

  /// Most recent observed price per ticker.
  pub fn latest_prices(&self) -> Result<HashMap<String, f64>> {
    let last = self.prices.nrows().checked_sub(1).ok_or_else(|| {
      PortfolioError::InsufficientData {
        tickers: self.tickers.clone(),
        reason: "price table has no observations".to_string(),
      }
    })?;

    Ok(
      self
        .tickers
        .iter()
        .cloned()
        .zip(self.prices.row(last).iter().copied())
        .collect(),
    )
  }

  /// Simple daily returns, one row fewer than the table.
  pub fn returns(&self) -> Array2<f64> {
    simple_returns(self.prices.view())
  }
}

fn check_unique(tickers: &[String]) -> Result<()> {
  let mut seen = HashSet::with_capacity(tickers.len());
  for t in tickers {
    if !seen.insert(t.as_str()) {
      return Err(PortfolioError::DuplicateTicker(t.clone()));
    }
  }
  Ok(())
}

/// Convert a price matrix (rows are dates) to simple percentage returns.
pub fn simple_returns(prices: ArrayView2<'_, f64>) -> Array2<f64> {
  if prices.nrows() < 2 {
    return Array2::zeros((0, prices.ncols()));
  }

  let prev = prices.slice(s![..-1, ..]);
  let next = prices.slice(s![1.., ..]);
  &next / &prev - 1.0
}

/// Column means of a return matrix.
pub(crate) fn column_means(returns: ArrayView2<'_, f64>) -> Vec<f64> {
  returns
    .mean_axis(Axis(0))
    .map(|m| m.to_vec())
    .unwrap_or_else(|| vec![0.0; returns.ncols()])
}

/// Pearson correlation matrix of return columns.
///
/// Columns with zero variance get zero off-diagonal correlation.
pub fn correlation_matrix(returns: ArrayView2<'_, f64>) -> Array2<f64> {
  let n = returns.ncols();
  if returns.nrows() < 2 {
    return Array2::eye(n);
  }

  let mut corr = returns
    .t()
    .pearson_correlation()
    .unwrap_or_else(|_| Array2::eye(n));

  for i in 0..n {
    for j in 0..n {
      if i == j {
        corr[[i, j]] = 1.0;
      } else if !corr[[i, j]].is_finite() {
        corr[[i, j]] = 0.0;
      } else {
        corr[[i, j]] = corr[[i, j]].clamp(-1.0, 1.0);
      }
    }
  }

  corr
}
