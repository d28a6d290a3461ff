//! Inverse eigenvalue problem solved by plain gradient descent.
//!
//! A run starts from a constant perturbation and performs
//! `v <- v - lr * grad L(v)` for a fixed budget of iterations. A failed
//! evaluation ends the run, keeping the perturbation of the last successful
//! update.

use crate::{
  config::OptimizerConfig,
  error::{Error, NumericalFailure, Result},
  mesh::VertexIdx,
  spectral::SpectralObjective,
};

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
  /// Loss reached the configured tolerance.
  Converged,
  IterationLimitReached,
  /// An evaluation failed; see [`OptimizationReport::failure`].
  Aborted,
}

/// Read-only view of the optimizer after an evaluation.
#[derive(Debug)]
pub struct IterationSnapshot<'a> {
  pub iteration: usize,
  pub loss: f64,
  pub perturbation: &'a na::DVector<f64>,
  pub gradient: &'a na::DVector<f64>,
}

pub trait Observer {
  fn observe(&mut self, snapshot: &IterationSnapshot);
}

impl<F> Observer for F
where
  F: FnMut(&IterationSnapshot),
{
  fn observe(&mut self, snapshot: &IterationSnapshot) {
    self(snapshot)
  }
}

#[derive(Debug, Clone)]
pub struct OptimizationReport {
  /// Final perturbation, one entry per vertex.
  pub perturbation: na::DVector<f64>,
  pub state: TerminalState,
  /// Number of completed gradient updates.
  pub iterations: usize,
  /// Loss evaluated before each completed update, followed by the loss that
  /// met the tolerance on a converged run.
  pub loss_history: Vec<f64>,
  pub failure: Option<NumericalFailure>,
}

impl OptimizationReport {
  pub fn final_loss(&self) -> Option<f64> {
    self.loss_history.last().copied()
  }
}

pub struct InverseEigenSolver {
  objective: SpectralObjective,
  config: OptimizerConfig,
}

impl InverseEigenSolver {
  pub fn new(objective: SpectralObjective, config: OptimizerConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self { objective, config })
  }

  pub fn objective(&self) -> &SpectralObjective {
    &self.objective
  }
  pub fn config(&self) -> &OptimizerConfig {
    &self.config
  }

  pub fn initial_perturbation(&self) -> na::DVector<f64> {
    na::DVector::from_element(self.objective.dim(), self.config.initial_value)
  }

  pub fn run(&self, observer: Option<&mut dyn Observer>) -> OptimizationReport {
    self.descend(self.initial_perturbation(), observer)
  }

  /// Runs from an explicit starting perturbation of length [`SpectralObjective::dim`].
  pub fn run_from(
    &self,
    v: na::DVector<f64>,
    observer: Option<&mut dyn Observer>,
  ) -> Result<OptimizationReport> {
    if v.len() != self.objective.dim() {
      return Err(Error::input(format!(
        "starting perturbation has length {}, the operator has dimension {}",
        v.len(),
        self.objective.dim()
      )));
    }
    Ok(self.descend(v, observer))
  }

  fn descend(
    &self,
    mut v: na::DVector<f64>,
    mut observer: Option<&mut dyn Observer>,
  ) -> OptimizationReport {
    let config = &self.config;
    tracing::info!(
      dim = self.objective.dim(),
      neigen = self.objective.target().len(),
      iterations = config.iterations,
      learning_rate = config.learning_rate,
      "starting spectral optimization"
    );

    let mut loss_history = Vec::with_capacity(config.iterations);
    let mut iterations = 0;
    let mut state = TerminalState::IterationLimitReached;
    let mut failure = None;

    for iteration in 0..config.iterations {
      let (loss, gradient) = match self.objective.loss_and_gradient(&v) {
        Ok(eval) => eval,
        Err(e) => {
          tracing::warn!(iteration, error = %e, "aborting optimization");
          state = TerminalState::Aborted;
          failure = Some(e);
          break;
        }
      };
      tracing::debug!(iteration, loss, "evaluated");

      if let Some(observer) = observer.as_deref_mut() {
        if config.observe_every != 0 && iteration % config.observe_every == 0 {
          observer.observe(&IterationSnapshot {
            iteration,
            loss,
            perturbation: &v,
            gradient: &gradient,
          });
        }
      }

      if config.loss_tolerance.is_some_and(|tol| loss <= tol) {
        loss_history.push(loss);
        state = TerminalState::Converged;
        break;
      }

      let updated = &v - &gradient * config.learning_rate;
      if updated.iter().any(|x| !x.is_finite()) {
        tracing::warn!(iteration, "aborting optimization on non-finite update");
        state = TerminalState::Aborted;
        failure = Some(NumericalFailure::NonFiniteUpdate);
        break;
      }
      v = updated;
      loss_history.push(loss);
      iterations += 1;
    }

    tracing::info!(
      ?state,
      iterations,
      final_loss = loss_history.last().copied(),
      "spectral optimization finished"
    );
    OptimizationReport {
      perturbation: v,
      state,
      iterations,
      loss_history,
      failure,
    }
  }
}

/// Vertices whose perturbation exceeds `threshold`.
pub fn select_vertices(perturbation: &na::DVector<f64>, threshold: f64) -> Vec<VertexIdx> {
  perturbation
    .iter()
    .enumerate()
    .filter_map(|(i, &x)| (x > threshold).then_some(i))
    .collect()
}
