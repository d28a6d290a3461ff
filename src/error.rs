use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures of the matching engine.
#[derive(Error, Debug)]
pub enum Error {
  /// Malformed mesh, bad region size or unusable target spectrum.
  /// Always reported before any optimization step runs.
  #[error("input error: {0}")]
  Input(String),

  #[error("numerical failure: {0}")]
  Numerical(#[from] NumericalFailure),

  /// The dense operator would exceed the configured dimension ceiling.
  /// Recoverable by retrying on a smaller mesh or region.
  #[error("operator of dimension {dim} exceeds the configured ceiling of {max_dim}")]
  ResourceExhausted { dim: usize, max_dim: usize },

  #[error("config error: {0}")]
  Config(String),

  #[error("parse error on line {line}: {message}")]
  Parse { line: usize, message: String },

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl Error {
  pub(crate) fn input(msg: impl Into<String>) -> Self {
    Self::Input(msg.into())
  }
}

/// Failure of a single objective evaluation.
///
/// Inside the optimizer loop this never propagates as an `Err`;
/// it ends the run and is carried by the report instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NumericalFailure {
  #[error("perturbed operator contains non-finite entries")]
  NonFiniteOperator,
  #[error("symmetric eigendecomposition of a {dim}x{dim} matrix did not converge")]
  DecompositionFailed { dim: usize },
  #[error("eigendecomposition produced non-finite eigenvalues")]
  NonFiniteEigenvalues,
  #[error("loss is not finite")]
  NonFiniteLoss,
  #[error("gradient is not finite")]
  NonFiniteGradient,
  #[error("gradient step produced a non-finite perturbation")]
  NonFiniteUpdate,
}
