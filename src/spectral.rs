//! Spectral mismatch between a perturbed operator and a target spectrum.
//!
//! For a base operator $Sigma$, perturbation $v$ and target $y$ of length $k$:
//! $M = Sigma + "diag"(g(v))$, $lambda = "eig"(M)_(0..k)$,
//! $r_i = (lambda_i - y_i) / y_i$ and the loss is $r dot r$.
//!
//! The gradient uses $(partial lambda_i)/(partial M_(jj)) = u_(j i)^2$ for the
//! unit eigenvector $u_i$ of $lambda_i$, exact for simple eigenvalues.

use crate::{
  error::{Error, NumericalFailure, Result},
  operator,
};

use serde::{Deserialize, Serialize};

/// Reparameterization of the perturbation vector into diagonal entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
  /// $tau (tanh(v) + 1)$, ranging over $(0, 2 tau)$.
  #[default]
  ShiftedTanh,
  /// $tau tanh(v)$, ranging over $(-tau, tau)$.
  Tanh,
}

impl Gate {
  pub fn value(self, v: f64, tau: f64) -> f64 {
    match self {
      Self::ShiftedTanh => tau * (v.tanh() + 1.0),
      Self::Tanh => tau * v.tanh(),
    }
  }

  pub fn derivative(self, v: f64, tau: f64) -> f64 {
    let t = v.tanh();
    tau * (1.0 - t * t)
  }
}

/// $sum_i ((lambda_i - y_i) / y_i)^2$ over the common prefix of both sequences.
pub fn normalized_mismatch(eigenvals: &[f64], target: &[f64]) -> f64 {
  eigenvals
    .iter()
    .zip(target)
    .map(|(l, y)| {
      let r = (l - y) / y;
      r * r
    })
    .sum()
}

#[derive(Debug, Clone)]
pub struct SpectralObjective {
  base: na::DMatrix<f64>,
  target: na::DVector<f64>,
  tau: f64,
  gate: Gate,
}

impl SpectralObjective {
  /// Validates the inputs before any evaluation can happen.
  ///
  /// `base` must be square, `target` non-empty, no longer than the operator's
  /// dimension, finite and free of zeros.
  pub fn new(base: na::DMatrix<f64>, target: na::DVector<f64>, tau: f64, gate: Gate) -> Result<Self> {
    if !base.is_square() {
      return Err(Error::input(format!(
        "base operator must be square, got {}x{}",
        base.nrows(),
        base.ncols()
      )));
    }
    let n = base.nrows();
    let k = target.len();
    if k == 0 {
      return Err(Error::input("target spectrum is empty"));
    }
    if k > n {
      return Err(Error::input(format!(
        "target spectrum has {k} eigenvalues, but the operator has dimension {n}"
      )));
    }
    if let Some(i) = target.iter().position(|y| !y.is_finite()) {
      return Err(Error::input(format!("target eigenvalue {i} is not finite")));
    }
    if let Some(i) = target.iter().position(|&y| y == 0.0) {
      return Err(Error::input(format!(
        "target eigenvalue {i} is zero; the normalized residual is undefined"
      )));
    }
    if !(tau.is_finite() && tau > 0.0) {
      return Err(Error::input(format!("temperature must be positive, got {tau}")));
    }
    Ok(Self {
      base,
      target,
      tau,
      gate,
    })
  }

  pub fn dim(&self) -> usize {
    self.base.nrows()
  }
  pub fn base(&self) -> &na::DMatrix<f64> {
    &self.base
  }
  pub fn target(&self) -> &na::DVector<f64> {
    &self.target
  }
  pub fn tau(&self) -> f64 {
    self.tau
  }
  pub fn gate(&self) -> Gate {
    self.gate
  }

  /// $Sigma + "diag"(g(v))$
  ///
  /// # Panics
  /// If `v` does not have length [`Self::dim`].
  pub fn perturbed_operator(&self, v: &na::DVector<f64>) -> na::DMatrix<f64> {
    assert_eq!(v.len(), self.dim(), "perturbation has wrong length");
    let mut m = self.base.clone();
    for (j, &vj) in v.iter().enumerate() {
      m[(j, j)] += self.gate.value(vj, self.tau);
    }
    m
  }

  fn truncated_eigen(
    &self,
    v: &na::DVector<f64>,
  ) -> Result<(na::DVector<f64>, na::DMatrix<f64>), NumericalFailure> {
    let k = self.target.len();
    let (eigenvals, eigenvecs) = operator::sorted_symmetric_eigen(self.perturbed_operator(v))?;
    Ok((
      eigenvals.rows(0, k).into_owned(),
      eigenvecs.columns(0, k).into_owned(),
    ))
  }

  /// The first $k$ eigenvalues of the perturbed operator.
  pub fn perturbed_eigenvalues(&self, v: &na::DVector<f64>) -> Result<na::DVector<f64>, NumericalFailure> {
    self.truncated_eigen(v).map(|(vals, _)| vals)
  }

  pub fn loss(&self, v: &na::DVector<f64>) -> Result<f64, NumericalFailure> {
    let eigenvals = self.perturbed_eigenvalues(v)?;
    let loss = normalized_mismatch(eigenvals.as_slice(), self.target.as_slice());
    if !loss.is_finite() {
      return Err(NumericalFailure::NonFiniteLoss);
    }
    Ok(loss)
  }

  /// Loss and its gradient with respect to `v`; base and target are fixed.
  pub fn loss_and_gradient(
    &self,
    v: &na::DVector<f64>,
  ) -> Result<(f64, na::DVector<f64>), NumericalFailure> {
    let (eigenvals, eigenvecs) = self.truncated_eigen(v)?;

    let residuals = (&eigenvals - &self.target).component_div(&self.target);
    let loss = residuals.dot(&residuals);
    if !loss.is_finite() {
      return Err(NumericalFailure::NonFiniteLoss);
    }

    // dL/dlambda_i = 2 r_i / y_i
    let weights = (residuals * 2.0).component_div(&self.target);
    let sqr_eigenvecs = eigenvecs.map(|x| x * x);
    let dloss_ddiag = sqr_eigenvecs * weights;

    let gradient = na::DVector::from_iterator(
      v.len(),
      v.iter()
        .zip(dloss_ddiag.iter())
        .map(|(&vj, &dj)| dj * self.gate.derivative(vj, self.tau)),
    );
    if gradient.iter().any(|x| !x.is_finite()) {
      return Err(NumericalFailure::NonFiniteGradient);
    }
    Ok((loss, gradient))
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use approx::assert_relative_eq;

  fn path_laplacian(n: usize) -> na::DMatrix<f64> {
    let mut m = na::DMatrix::zeros(n, n);
    for i in 0..n - 1 {
      m[(i, i)] += 1.0;
      m[(i + 1, i + 1)] += 1.0;
      m[(i, i + 1)] -= 1.0;
      m[(i + 1, i)] -= 1.0;
    }
    m
  }

  #[test]
  fn mismatch_vanishes_on_target() {
    let y = [0.5, 1.5, 4.0];
    assert_eq!(normalized_mismatch(&y, &y), 0.0);
  }

  #[test]
  fn mismatch_is_scale_invariant() {
    let l = [0.7, 1.1, 3.9];
    let y = [0.5, 1.5, 4.0];
    let base = normalized_mismatch(&l, &y);
    for c in [1e-3, 0.5, 2.0, 17.0] {
      let lc = l.map(|x| c * x);
      let yc = y.map(|x| c * x);
      assert_relative_eq!(normalized_mismatch(&lc, &yc), base, max_relative = 1e-12);
    }
  }

  #[test]
  fn gate_values() {
    assert_eq!(Gate::ShiftedTanh.value(0.0, 2.0), 2.0);
    assert_eq!(Gate::Tanh.value(0.0, 2.0), 0.0);
    assert_relative_eq!(Gate::ShiftedTanh.derivative(0.3, 1.5), 1.5 * (1.0 - 0.3f64.tanh().powi(2)));
  }

  #[test]
  fn loss_is_zero_at_own_spectrum() {
    let base = path_laplacian(5);
    let v = na::DVector::from_vec(vec![0.1, -0.4, 0.3, 0.0, 0.9]);
    let probe = SpectralObjective::new(base.clone(), na::dvector![1.0], 1.0, Gate::ShiftedTanh).unwrap();
    let (full, _) = operator::sorted_symmetric_eigen(probe.perturbed_operator(&v)).unwrap();

    let target = full.rows(0, 3).into_owned();
    let objective = SpectralObjective::new(base, target.clone(), 1.0, Gate::ShiftedTanh).unwrap();
    assert_eq!(objective.perturbed_eigenvalues(&v).unwrap(), target);
    assert_eq!(objective.loss(&v).unwrap(), 0.0);
  }

  #[test]
  fn gradient_matches_finite_differences() {
    let base = path_laplacian(6);
    let target = na::dvector![0.8, 1.3, 2.2];
    for gate in [Gate::ShiftedTanh, Gate::Tanh] {
      let objective = SpectralObjective::new(base.clone(), target.clone(), 0.7, gate).unwrap();
      let v = na::DVector::from_vec(vec![0.3, -0.2, 0.5, -0.7, 0.1, 0.4]);
      let (loss, gradient) = objective.loss_and_gradient(&v).unwrap();
      assert_relative_eq!(loss, objective.loss(&v).unwrap(), epsilon = 1e-14);

      let h = 1e-6;
      for j in 0..v.len() {
        let mut vp = v.clone();
        let mut vm = v.clone();
        vp[j] += h;
        vm[j] -= h;
        let fd = (objective.loss(&vp).unwrap() - objective.loss(&vm).unwrap()) / (2.0 * h);
        assert_relative_eq!(gradient[j], fd, epsilon = 1e-6, max_relative = 1e-5);
      }
    }
  }

  #[test]
  fn validates_target() {
    let base = path_laplacian(3);
    let new = |target| SpectralObjective::new(base.clone(), target, 1.0, Gate::ShiftedTanh);
    assert!(matches!(new(na::DVector::zeros(0)), Err(Error::Input(_))));
    assert!(matches!(new(na::dvector![1.0, 0.0]), Err(Error::Input(_))));
    assert!(matches!(new(na::dvector![1.0, f64::NAN]), Err(Error::Input(_))));
    assert!(matches!(
      new(na::dvector![1.0, 2.0, 3.0, 4.0]),
      Err(Error::Input(_))
    ));
    assert!(new(na::dvector![1.0, 2.0, 3.0]).is_ok());
    assert!(SpectralObjective::new(base.clone(), na::dvector![1.0], 0.0, Gate::Tanh).is_err());
  }

  #[test]
  fn non_finite_perturbation_fails_numerically() {
    let objective =
      SpectralObjective::new(path_laplacian(3), na::dvector![1.0], 1.0, Gate::ShiftedTanh).unwrap();
    let v = na::dvector![f64::NAN, 0.0, 0.0];
    assert_eq!(
      objective.loss_and_gradient(&v).unwrap_err(),
      NumericalFailure::NonFiniteOperator
    );
  }
}
