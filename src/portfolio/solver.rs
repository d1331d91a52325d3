//! # Quadratic Programming
//!
//! $$
//! \min_{\mathbf{x}} \ \tfrac12\mathbf{x}^\top P\mathbf{x} + \mathbf{q}^\top\mathbf{x}
//! \quad\text{s.t.}\quad A\mathbf{x}=\mathbf{b},\ \ G\mathbf{x}\le\mathbf{h}
//! $$
//!
//! Solver-agnostic QP description and the default Clarabel backend.

use clarabel::algebra::CscMatrix;
use clarabel::solver::DefaultSettingsBuilder;
use clarabel::solver::DefaultSolver;
use clarabel::solver::IPSolver;
use clarabel::solver::SolverStatus;
use clarabel::solver::SupportedConeT::NonnegativeConeT;
use clarabel::solver::SupportedConeT::ZeroConeT;
use clarabel::solver::SupportedConeT;
use impl_new_derive::ImplNew;
use nalgebra::DMatrix;
use nalgebra::DVector;

use crate::error::PortfolioError;
use crate::error::Result;

/// Dense convex QP. `p` must be symmetric positive-semidefinite.
#[derive(Clone, Debug)]
pub struct QuadraticProgram {
  pub p: DMatrix<f64>,
  pub q: DVector<f64>,
  pub a_eq: DMatrix<f64>,
  pub b_eq: DVector<f64>,
  pub g: DMatrix<f64>,
  pub h: DVector<f64>,
}

impl QuadraticProgram {
  pub fn n_vars(&self) -> usize {
    self.q.len()
  }

  /// Check that every block agrees on the number of variables and rows.
  pub fn validate(&self) -> Result<()> {
    let n = self.n_vars();
    let ok = self.p.nrows() == n
      && self.p.ncols() == n
      && self.a_eq.ncols() == n
      && self.a_eq.nrows() == self.b_eq.len()
      && self.g.ncols() == n
      && self.g.nrows() == self.h.len();

    if ok {
      Ok(())
    } else {
      Err(PortfolioError::DimensionMismatch(format!(
        "inconsistent QP blocks: P {}x{}, q {}, A {}x{}, b {}, G {}x{}, h {}",
        self.p.nrows(),
        self.p.ncols(),
        n,
        self.a_eq.nrows(),
        self.a_eq.ncols(),
        self.b_eq.len(),
        self.g.nrows(),
        self.g.ncols(),
        self.h.len()
      )))
    }
  }
}

/// A backend able to solve [`QuadraticProgram`]s.
///
/// Implementations return [`PortfolioError::InfeasibleConstraints`] when the
/// constraint set is empty.
pub trait QpSolver {
  fn solve(&self, qp: &QuadraticProgram) -> Result<DVector<f64>>;
}

/// Interior-point backend built on Clarabel.
#[derive(ImplNew, Clone, Debug)]
pub struct ClarabelSolver {
  /// Iteration cap.
  pub max_iter: u32,
  /// Feasibility and duality-gap tolerance.
  pub tolerance: f64,
}

impl Default for ClarabelSolver {
  fn default() -> Self {
    Self {
      max_iter: 200,
      tolerance: 1e-9,
    }
  }
}

impl QpSolver for ClarabelSolver {
  fn solve(&self, qp: &QuadraticProgram) -> Result<DVector<f64>> {
    qp.validate()?;

    let n = qp.n_vars();
    let m_eq = qp.a_eq.nrows();
    let m_ineq = qp.g.nrows();

    let p = to_csc(&qp.p, true);
    let q: Vec<f64> = qp.q.iter().copied().collect();

    let mut a_dense = DMatrix::zeros(m_eq + m_ineq, n);
    a_dense.rows_mut(0, m_eq).copy_from(&qp.a_eq);
    a_dense.rows_mut(m_eq, m_ineq).copy_from(&qp.g);
    let a = to_csc(&a_dense, false);

    let mut b: Vec<f64> = qp.b_eq.iter().copied().collect();
    b.extend(qp.h.iter().copied());

    let mut cones: Vec<SupportedConeT<f64>> = Vec::with_capacity(2);
    if m_eq > 0 {
      cones.push(ZeroConeT(m_eq));
    }
    if m_ineq > 0 {
      cones.push(NonnegativeConeT(m_ineq));
    }

    let settings = DefaultSettingsBuilder::default()
      .max_iter(self.max_iter)
      .verbose(false)
      .tol_feas(self.tolerance)
      .tol_gap_abs(self.tolerance)
      .tol_gap_rel(self.tolerance)
      .build()
      .map_err(|e| PortfolioError::Solver(format!("failed to build settings: {e}")))?;

    let mut solver = DefaultSolver::new(&p, &q, &a, &b, &cones, settings)
      .map_err(|e| PortfolioError::Solver(format!("failed to create solver: {e:?}")))?;

    solver.solve();

    let status = &solver.solution.status;
    tracing::debug!(?status, iterations = solver.solution.iterations, "clarabel finished");

    match status {
      SolverStatus::Solved | SolverStatus::AlmostSolved => {
        Ok(DVector::from_vec(solver.solution.x.clone()))
      }
      SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
        Err(PortfolioError::InfeasibleConstraints {
          lower_sum: f64::NAN,
          upper_sum: f64::NAN,
        })
      }
      other => Err(PortfolioError::Solver(format!("clarabel status {other:?}"))),
    }
  }
}

/// Column-compressed copy of `mat`, optionally keeping only the upper triangle.
fn to_csc(mat: &DMatrix<f64>, upper_only: bool) -> CscMatrix<f64> {
  let (rows, cols) = mat.shape();
  let mut colptr = Vec::with_capacity(cols + 1);
  let mut rowval = Vec::new();
  let mut nzval = Vec::new();

  colptr.push(0);
  for j in 0..cols {
    let last_row = if upper_only { (j + 1).min(rows) } else { rows };
    for i in 0..last_row {
      let v = mat[(i, j)];
      if v != 0.0 {
        rowval.push(i);
        nzval.push(v);
      }
    }
    colptr.push(nzval.len());
  }

  CscMatrix::new(rows, cols, colptr, rowval, nzval)
}
