//! Base operators and the dense symmetric eigensolver used on them.

use crate::error::{Error, NumericalFailure, Result};

/// Relative tolerance of the symmetry check.
const SYMMETRY_RTOL: f64 = 1e-9;

/// Per-dimension budget of implicit QR iterations.
const EIGEN_ITERATIONS_PER_DIM: usize = 64;

/// Unperturbed operator the diagonal perturbation is added to.
#[derive(Debug, Clone)]
pub enum BaseOperator {
  /// Any symmetric matrix, e.g. a covariance-like matrix.
  Dense(na::DMatrix<f64>),
  /// A symmetric sparse matrix, e.g. a graph Laplacian.
  Sparse(nas::CsrMatrix<f64>),
  /// The generalized Laplacian $B^(-1) A$.
  ///
  /// Densified as the symmetric $L^(-1) A L^(-T)$ with $B = L L^T$,
  /// which has the same spectrum.
  GeneralizedLaplacian {
    stiffness: nas::CsrMatrix<f64>,
    mass: nas::CsrMatrix<f64>,
  },
}

impl BaseOperator {
  pub fn dim(&self) -> usize {
    match self {
      Self::Dense(m) => m.nrows(),
      Self::Sparse(m) => m.nrows(),
      Self::GeneralizedLaplacian { stiffness, .. } => stiffness.nrows(),
    }
  }

  /// Dense symmetric matrix of the operator.
  ///
  /// The dimension is checked against `max_dim` before anything is densified.
  pub fn to_dense_symmetric(&self, max_dim: usize) -> Result<na::DMatrix<f64>> {
    let dim = self.dim();
    if dim > max_dim {
      return Err(Error::ResourceExhausted { dim, max_dim });
    }
    tracing::debug!(dim, "densifying base operator");

    let dense = match self {
      Self::Dense(m) => {
        check_symmetric(m, "base operator")?;
        m.clone()
      }
      Self::Sparse(m) => {
        let m = sparse_to_dense(m);
        check_symmetric(&m, "base operator")?;
        m
      }
      Self::GeneralizedLaplacian { stiffness, mass } => {
        if mass.nrows() != dim || mass.ncols() != dim {
          return Err(Error::input(format!(
            "mass matrix is {}x{}, stiffness matrix is {dim}x{dim}",
            mass.nrows(),
            mass.ncols()
          )));
        }
        let stiffness = sparse_to_dense(stiffness);
        check_symmetric(&stiffness, "stiffness matrix")?;
        GeneralizedReduction::new(&stiffness, sparse_to_dense(mass))?.into_matrix()
      }
    };
    Ok(dense)
  }
}

pub fn sparse_to_dense(m: &nas::CsrMatrix<f64>) -> na::DMatrix<f64> {
  na::DMatrix::from(m)
}

fn check_symmetric(m: &na::DMatrix<f64>, what: &str) -> Result<()> {
  if !m.is_square() {
    return Err(Error::input(format!(
      "{what} must be square, got {}x{}",
      m.nrows(),
      m.ncols()
    )));
  }
  let scale = m.amax().max(f64::MIN_POSITIVE);
  let asym = (m - m.transpose()).amax();
  if asym > SYMMETRY_RTOL * scale {
    return Err(Error::input(format!(
      "{what} is not symmetric (max asymmetry {asym:e})"
    )));
  }
  Ok(())
}

/// Reduction of $A u = lambda B u$ to the standard symmetric problem
/// $C w = lambda w$, with $C = L^(-1) A L^(-T)$, $B = L L^T$ and $u = L^(-T) w$.
pub struct GeneralizedReduction {
  matrix: na::DMatrix<f64>,
  cholesky: na::Cholesky<f64, na::Dyn>,
}

impl GeneralizedReduction {
  /// Fails if `mass` is not symmetric positive definite.
  pub fn new(stiffness: &na::DMatrix<f64>, mass: na::DMatrix<f64>) -> Result<Self> {
    check_symmetric(&mass, "mass matrix")?;
    let cholesky = na::Cholesky::new(mass)
      .ok_or_else(|| Error::input("mass matrix is not positive definite"))?;

    let l = cholesky.l();
    let solve = |rhs: &na::DMatrix<f64>| {
      l.solve_lower_triangular(rhs)
        .ok_or_else(|| Error::input("mass matrix factor is singular"))
    };
    // A symmetric: L^-1 A L^-T = L^-1 (L^-1 A)^T
    let half = solve(stiffness)?;
    let matrix = solve(&half.transpose())?;
    let matrix = (&matrix + matrix.transpose()) * 0.5;

    Ok(Self { matrix, cholesky })
  }

  pub fn matrix(&self) -> &na::DMatrix<f64> {
    &self.matrix
  }
  pub fn into_matrix(self) -> na::DMatrix<f64> {
    self.matrix
  }

  /// Maps eigenvectors $w$ of the reduced problem to $u = L^(-T) w$.
  pub fn recover_eigenvectors(&self, w: na::DMatrix<f64>) -> Result<na::DMatrix<f64>> {
    self
      .cholesky
      .l()
      .tr_solve_lower_triangular(&w)
      .ok_or_else(|| Error::input("mass matrix factor is singular"))
  }
}

/// Full eigendecomposition of a symmetric matrix, ascending.
///
/// Eigenvectors are the unit-norm columns of the second matrix, in the
/// order of the eigenvalues.
pub fn sorted_symmetric_eigen(
  m: na::DMatrix<f64>,
) -> Result<(na::DVector<f64>, na::DMatrix<f64>), NumericalFailure> {
  let dim = m.nrows();
  if m.iter().any(|x| !x.is_finite()) {
    return Err(NumericalFailure::NonFiniteOperator);
  }
  let eigen = na::SymmetricEigen::try_new(m, f64::EPSILON, EIGEN_ITERATIONS_PER_DIM * dim.max(1))
    .ok_or(NumericalFailure::DecompositionFailed { dim })?;
  if eigen.eigenvalues.iter().any(|x| !x.is_finite()) {
    return Err(NumericalFailure::NonFiniteEigenvalues);
  }

  let mut order: Vec<usize> = (0..dim).collect();
  order.sort_by(|&a, &b| eigen.eigenvalues[a].total_cmp(&eigen.eigenvalues[b]));

  let eigenvals = na::DVector::from_iterator(dim, order.iter().map(|&i| eigen.eigenvalues[i]));
  let eigenvecs = na::DMatrix::from_columns(
    &order
      .iter()
      .map(|&i| eigen.eigenvectors.column(i))
      .collect::<Vec<_>>(),
  );
  Ok((eigenvals, eigenvecs))
}
