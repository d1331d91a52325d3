//! # Portfolio Optimizers
//!
//! $$
//! \min_{\mathbf{y},\kappa}\ \tfrac12\mathbf{y}^\top\Sigma\mathbf{y}
//! \quad\text{s.t.}\quad (\mu-r_f)^\top\mathbf{y}=1,\ \mathbf 1^\top\mathbf{y}=\kappa,\
//! \kappa\ell\le\mathbf{y}\le\kappa u,\ \kappa\ge0,\qquad \mathbf{w}^\*=\mathbf{y}/\kappa
//! $$
//!
//! Long-only (or bounded long-short) mean-variance optimizers over box and
//! budget constraints.

use nalgebra::DMatrix;
use nalgebra::DVector;

use crate::error::PortfolioError;
use crate::error::Result;
use super::solver::QpSolver;
use super::solver::QuadraticProgram;
use super::types::PortfolioResult;
use super::types::WeightBounds;

fn dot(a: &[f64], b: &[f64]) -> f64 {
  a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Expected return, volatility and Sharpe ratio of `weights`.
pub fn performance(
  weights: &[f64],
  mu: &[f64],
  cov: &DMatrix<f64>,
  risk_free: f64,
) -> PortfolioResult {
  let w = DVector::from_column_slice(weights);
  let expected_return = dot(weights, mu);
  let volatility = (w.transpose() * cov * &w)[(0, 0)].max(0.0).sqrt();
  let sharpe = if volatility > 1e-15 {
    (expected_return - risk_free) / volatility
  } else {
    0.0
  };

  PortfolioResult {
    weights: weights.to_vec(),
    expected_return,
    volatility,
    sharpe,
  }
}

/// Reject covariance matrices that are not finite, symmetric and PSD.
pub fn check_covariance(cov: &DMatrix<f64>) -> Result<()> {
  if !cov.is_square() {
    return Err(PortfolioError::DimensionMismatch(format!(
      "covariance matrix is {}x{}",
      cov.nrows(),
      cov.ncols()
    )));
  }

  if cov.iter().any(|v| !v.is_finite()) {
    return Err(PortfolioError::InvalidArgument(
      "covariance matrix has non-finite entries".to_string(),
    ));
  }

  let scale = cov.amax().max(f64::MIN_POSITIVE);
  let n = cov.nrows();
  for i in 0..n {
    for j in (i + 1)..n {
      if (cov[(i, j)] - cov[(j, i)]).abs() > 1e-10 * scale {
        return Err(PortfolioError::InvalidArgument(format!(
          "covariance matrix is not symmetric at ({i}, {j})"
        )));
      }
    }
  }

  let eigenvalues = cov.clone().symmetric_eigen().eigenvalues;
  let min_eigenvalue = eigenvalues.min();
  let max_abs = eigenvalues.amax();
  if min_eigenvalue < -1e-10 * max_abs.max(1.0) {
    return Err(PortfolioError::IllConditionedInput { min_eigenvalue });
  }

  Ok(())
}

fn check_inputs(mu: &[f64], cov: &DMatrix<f64>, bounds: &WeightBounds) -> Result<()> {
  let n = mu.len();
  if n == 0 {
    return Err(PortfolioError::InvalidArgument(
      "no assets to optimize".to_string(),
    ));
  }
  if cov.nrows() != n || cov.ncols() != n || bounds.len() != n {
    return Err(PortfolioError::DimensionMismatch(format!(
      "{n} expected returns, {}x{} covariance, {} bounds",
      cov.nrows(),
      cov.ncols(),
      bounds.len()
    )));
  }
  if mu.iter().any(|m| !m.is_finite()) {
    return Err(PortfolioError::InvalidArgument(
      "expected returns must be finite".to_string(),
    ));
  }

  check_covariance(cov)?;
  bounds.check_feasible()
}

/// Highest expected return any weight vector within `bounds` can reach.
///
/// Starts from the lower bounds and fills the highest-return assets first.
pub fn max_attainable_return(mu: &[f64], bounds: &WeightBounds) -> f64 {
  let mut w = bounds.lower().to_vec();
  let mut remaining = 1.0 - bounds.lower_sum();

  let mut order: Vec<usize> = (0..mu.len()).collect();
  order.sort_by(|&a, &b| mu[b].total_cmp(&mu[a]).then(a.cmp(&b)));

  for i in order {
    if remaining <= 0.0 {
      break;
    }
    let add = (bounds.upper()[i] - w[i]).min(remaining).max(0.0);
    w[i] += add;
    remaining -= add;
  }

  dot(&w, mu)
}

/// Euclidean projection onto `{w : sum(w) = 1, lower <= w <= upper}`.
///
/// Bisection on the shift `tau` in `clamp(v - tau, lower, upper)`. The bounds
/// must already be feasible.
pub fn project_to_bounds(v: &[f64], bounds: &WeightBounds) -> Vec<f64> {
  let lower = bounds.lower();
  let upper = bounds.upper();
  let shifted = |tau: f64| -> Vec<f64> {
    v.iter()
      .zip(lower.iter().zip(upper.iter()))
      .map(|(x, (lo, hi))| (x - tau).clamp(*lo, *hi))
      .collect()
  };

  let mut tau_lo = v
    .iter()
    .zip(upper.iter())
    .map(|(x, hi)| x - hi)
    .fold(f64::INFINITY, f64::min);
  let mut tau_hi = v
    .iter()
    .zip(lower.iter())
    .map(|(x, lo)| x - lo)
    .fold(f64::NEG_INFINITY, f64::max);

  for _ in 0..200 {
    if tau_hi - tau_lo <= 1e-15 * (1.0 + tau_hi.abs()) {
      break;
    }
    let tau = 0.5 * (tau_lo + tau_hi);
    if shifted(tau).iter().sum::<f64>() > 1.0 {
      tau_lo = tau;
    } else {
      tau_hi = tau;
    }
  }

  shifted(0.5 * (tau_lo + tau_hi))
}

/// Box rows `-w <= -lower`, `w <= upper` for the first `n` of `n_vars` variables.
fn box_rows(bounds: &WeightBounds, n_vars: usize) -> (DMatrix<f64>, DVector<f64>) {
  let n = bounds.len();
  let mut g = DMatrix::zeros(2 * n, n_vars);
  let mut h = DVector::zeros(2 * n);
  for i in 0..n {
    g[(i, i)] = -1.0;
    h[i] = -bounds.lower()[i];
    g[(n + i, i)] = 1.0;
    h[n + i] = bounds.upper()[i];
  }
  (g, h)
}

/// Maximum-Sharpe weights under per-asset bounds.
pub fn max_sharpe(
  mu: &[f64],
  cov: &DMatrix<f64>,
  bounds: &WeightBounds,
  risk_free: f64,
  solver: &dyn QpSolver,
) -> Result<PortfolioResult> {
  check_inputs(mu, cov, bounds)?;

  let best = max_attainable_return(mu, bounds);
  if best - risk_free <= 1e-12 {
    return Err(PortfolioError::NoExcessReturn { risk_free });
  }

  let n = mu.len();
  let kappa = n;

  let mut p = DMatrix::zeros(n + 1, n + 1);
  p.view_mut((0, 0), (n, n)).copy_from(cov);
  let q = DVector::zeros(n + 1);

  let mut a_eq = DMatrix::zeros(2, n + 1);
  for i in 0..n {
    a_eq[(0, i)] = mu[i] - risk_free;
    a_eq[(1, i)] = 1.0;
  }
  a_eq[(1, kappa)] = -1.0;
  let b_eq = DVector::from_vec(vec![1.0, 0.0]);

  // kappa * lower - y <= 0, y - kappa * upper <= 0, -kappa <= 0
  let mut g = DMatrix::zeros(2 * n + 1, n + 1);
  for i in 0..n {
    g[(i, i)] = -1.0;
    g[(i, kappa)] = bounds.lower()[i];
    g[(n + i, i)] = 1.0;
    g[(n + i, kappa)] = -bounds.upper()[i];
  }
  g[(2 * n, kappa)] = -1.0;
  let h = DVector::zeros(2 * n + 1);

  let qp = QuadraticProgram {
    p,
    q,
    a_eq,
    b_eq,
    g,
    h,
  };
  let x = solver
    .solve(&qp)
    .map_err(|e| remap_infeasible(e, bounds))?;

  let k = x[kappa];
  if !(k.is_finite() && k > 1e-12) {
    return Err(PortfolioError::Solver(format!(
      "degenerate scaling variable {k}"
    )));
  }

  let raw: Vec<f64> = x.rows(0, n).iter().map(|y| y / k).collect();
  let weights = project_to_bounds(&raw, bounds);
  let result = performance(&weights, mu, cov, risk_free);

  tracing::info!(
    expected_return = result.expected_return,
    volatility = result.volatility,
    sharpe = result.sharpe,
    "max-sharpe portfolio"
  );

  Ok(result)
}

/// Minimum-volatility weights under per-asset bounds.
pub fn min_volatility(
  mu: &[f64],
  cov: &DMatrix<f64>,
  bounds: &WeightBounds,
  risk_free: f64,
  solver: &dyn QpSolver,
) -> Result<PortfolioResult> {
  check_inputs(mu, cov, bounds)?;
  solve_min_variance(mu, cov, bounds, None, risk_free, solver)
}

/// Minimum-volatility weights earning at least `target_return`.
pub fn efficient_return(
  mu: &[f64],
  cov: &DMatrix<f64>,
  bounds: &WeightBounds,
  target_return: f64,
  risk_free: f64,
  solver: &dyn QpSolver,
) -> Result<PortfolioResult> {
  check_inputs(mu, cov, bounds)?;

  let best = max_attainable_return(mu, bounds);
  if target_return > best + 1e-12 {
    return Err(PortfolioError::InvalidArgument(format!(
      "target return {target_return} exceeds the maximum attainable {best}"
    )));
  }

  solve_min_variance(mu, cov, bounds, Some(target_return), risk_free, solver)
}

fn solve_min_variance(
  mu: &[f64],
  cov: &DMatrix<f64>,
  bounds: &WeightBounds,
  target_return: Option<f64>,
  risk_free: f64,
  solver: &dyn QpSolver,
) -> Result<PortfolioResult> {
  let n = mu.len();
  let (mut g, mut h) = box_rows(bounds, n);

  if let Some(target) = target_return {
    g = g.insert_row(2 * n, 0.0);
    h = h.insert_row(2 * n, -target);
    for i in 0..n {
      g[(2 * n, i)] = -mu[i];
    }
  }

  let qp = QuadraticProgram {
    p: cov.clone(),
    q: DVector::zeros(n),
    a_eq: DMatrix::from_element(1, n, 1.0),
    b_eq: DVector::from_element(1, 1.0),
    g,
    h,
  };
  let x = solver
    .solve(&qp)
    .map_err(|e| remap_infeasible(e, bounds))?;

  let weights = project_to_bounds(x.as_slice(), bounds);
  Ok(performance(&weights, mu, cov, risk_free))
}

/// `n_points` efficient portfolios from the minimum-volatility return up to
/// just below the maximum attainable return.
pub fn efficient_frontier(
  mu: &[f64],
  cov: &DMatrix<f64>,
  bounds: &WeightBounds,
  n_points: usize,
  risk_free: f64,
  solver: &dyn QpSolver,
) -> Result<Vec<PortfolioResult>> {
  if n_points < 2 {
    return Err(PortfolioError::InvalidArgument(
      "efficient frontier needs at least two points".to_string(),
    ));
  }

  let min_vol = min_volatility(mu, cov, bounds, risk_free, solver)?;
  let r_min = min_vol.expected_return;
  let r_max = (max_attainable_return(mu, bounds) - 1e-4).max(r_min);

  let mut frontier = Vec::with_capacity(n_points);
  frontier.push(min_vol);
  for k in 1..n_points {
    let target = r_min + (r_max - r_min) * k as f64 / (n_points - 1) as f64;
    frontier.push(solve_min_variance(
      mu,
      cov,
      bounds,
      Some(target),
      risk_free,
      solver,
    )?);
  }

  Ok(frontier)
}

fn remap_infeasible(err: PortfolioError, bounds: &WeightBounds) -> PortfolioError {
  match err {
    PortfolioError::InfeasibleConstraints { .. } => bounds.infeasible(),
    other => other,
  }
}
