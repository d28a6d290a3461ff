//! Run configuration, loadable from JSON.
//!
//! Every section falls back to its defaults for missing fields.

use crate::{
  error::{Error, Result},
  spectral::Gate,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
  pub region: RegionConfig,
  pub spectrum: SpectrumConfig,
  pub optimizer: OptimizerConfig,
}

impl MatchConfig {
  pub fn validate(&self) -> Result<()> {
    self.region.validate()?;
    self.spectrum.validate()?;
    self.optimizer.validate()
  }

  pub fn from_json(json: &str) -> Result<Self> {
    let config: Self =
      serde_json::from_str(json).map_err(|e| Error::Config(format!("JSON parse error: {e}")))?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
    Self::from_json(&std::fs::read_to_string(path)?)
  }

  pub fn to_json(&self) -> Result<String> {
    serde_json::to_string_pretty(self).map_err(|e| Error::Config(format!("JSON encode error: {e}")))
  }
}

/// Extraction of the reference region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
  /// The region holds one face more than this.
  pub target_face_count: usize,
  pub seed: u64,
  /// Directory of the region cache; no caching if unset.
  pub cache_dir: Option<PathBuf>,
}

impl Default for RegionConfig {
  fn default() -> Self {
    Self {
      target_face_count: 1000,
      seed: 10,
      cache_dir: None,
    }
  }
}

impl RegionConfig {
  pub fn validate(&self) -> Result<()> {
    if self.target_face_count == 0 {
      return Err(Error::Config("target_face_count must be >= 1".to_string()));
    }
    Ok(())
  }
}

/// Which discrete Laplacian serves as base operator and target source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
  /// Graph Laplacian of the edge graph.
  Combinatorial,
  /// Cotangent stiffness over mass, $B^(-1) A$.
  Fem { lumped_mass: bool },
}

impl Default for OperatorKind {
  fn default() -> Self {
    Self::Fem { lumped_mass: true }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
  /// Length $k$ of the target spectrum.
  pub neigenvalues: usize,
  pub operator: OperatorKind,
  /// Skip leading eigenvalues with magnitude below `null_tolerance`
  /// (the constant modes) when building the target.
  pub drop_null_modes: bool,
  pub null_tolerance: f64,
  /// Truncate vertex coordinates to 16-bit integers before assembly.
  pub integer_coordinates: bool,
}

impl Default for SpectrumConfig {
  fn default() -> Self {
    Self {
      neigenvalues: 10,
      operator: OperatorKind::default(),
      drop_null_modes: true,
      null_tolerance: 1e-8,
      integer_coordinates: false,
    }
  }
}

impl SpectrumConfig {
  pub fn validate(&self) -> Result<()> {
    if self.neigenvalues == 0 {
      return Err(Error::Config("neigenvalues must be >= 1".to_string()));
    }
    if !(self.null_tolerance.is_finite() && self.null_tolerance >= 0.0) {
      return Err(Error::Config(format!(
        "null_tolerance must be finite and >= 0, got {}",
        self.null_tolerance
      )));
    }
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
  pub learning_rate: f64,
  pub iterations: usize,
  /// Temperature $tau$ scaling the gate.
  pub temperature: f64,
  /// Constant every entry of the perturbation starts from.
  pub initial_value: f64,
  pub gate: Gate,
  /// Largest operator dimension that will be densified.
  pub max_operator_dim: usize,
  /// Observer period in iterations; 0 disables the observer.
  pub observe_every: usize,
  /// Stop early once the loss is at or below this value.
  pub loss_tolerance: Option<f64>,
}

impl Default for OptimizerConfig {
  fn default() -> Self {
    Self {
      learning_rate: 1e-1,
      iterations: 100,
      temperature: 1.0,
      initial_value: 0.0,
      gate: Gate::ShiftedTanh,
      max_operator_dim: 4096,
      observe_every: 10,
      loss_tolerance: None,
    }
  }
}

impl OptimizerConfig {
  pub fn validate(&self) -> Result<()> {
    if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
      return Err(Error::Config(format!(
        "learning_rate must be > 0, got {}",
        self.learning_rate
      )));
    }
    if !(self.temperature.is_finite() && self.temperature > 0.0) {
      return Err(Error::Config(format!(
        "temperature must be > 0, got {}",
        self.temperature
      )));
    }
    if !self.initial_value.is_finite() {
      return Err(Error::Config(format!(
        "initial_value must be finite, got {}",
        self.initial_value
      )));
    }
    if self.max_operator_dim == 0 {
      return Err(Error::Config("max_operator_dim must be >= 1".to_string()));
    }
    if let Some(tol) = self.loss_tolerance {
      if !(tol.is_finite() && tol >= 0.0) {
        return Err(Error::Config(format!(
          "loss_tolerance must be finite and >= 0, got {tol}"
        )));
      }
    }
    Ok(())
  }
}
