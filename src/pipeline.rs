//! End-to-end matching run.
//!
//! A reference region is grown on the mesh, its Laplacian spectrum becomes
//! the target, and the perturbation of the full mesh's operator is optimized
//! towards that target.

use crate::{
  config::{MatchConfig, OperatorKind},
  error::{Error, Result},
  laplace::{combinatorial_laplacian, FemLaplacian},
  mesh::{adapter::LaplacianInput, Face, TriangleMesh, VertexIdx},
  operator::{self, BaseOperator},
  optimize::{select_vertices, InverseEigenSolver, Observer, OptimizationReport},
  region::{grow_region_cached, RegionCache},
  spectral::SpectralObjective,
};

use std::borrow::Cow;

#[derive(Debug, Clone)]
pub struct MatchOutcome {
  /// Face rows of the reference region, indexing the full mesh's vertices.
  pub region_faces: Vec<Face>,
  pub target: na::DVector<f64>,
  pub report: OptimizationReport,
  /// Vertices with positive final perturbation.
  pub selected: Vec<VertexIdx>,
}

pub struct SpectralMatcher {
  config: MatchConfig,
  cache: Option<RegionCache>,
}

impl SpectralMatcher {
  pub fn new(config: MatchConfig) -> Result<Self> {
    config.validate()?;
    let cache = config.region.cache_dir.as_ref().map(RegionCache::new);
    Ok(Self { config, cache })
  }

  pub fn config(&self) -> &MatchConfig {
    &self.config
  }

  pub fn run(&self, mesh: &TriangleMesh) -> Result<MatchOutcome> {
    self.run_observed(mesh, None)
  }

  pub fn run_observed(
    &self,
    mesh: &TriangleMesh,
    observer: Option<&mut dyn Observer>,
  ) -> Result<MatchOutcome> {
    let (region_faces, region) = self.extract_region(mesh)?;
    let target = self.target_spectrum(&region)?;

    let prepared = self.prepare(mesh)?;
    let base = self
      .base_operator(&prepared)?
      .to_dense_symmetric(self.config.optimizer.max_operator_dim)?;
    let optimizer = &self.config.optimizer;
    let objective = SpectralObjective::new(base, target.clone(), optimizer.temperature, optimizer.gate)?;
    let solver = InverseEigenSolver::new(objective, optimizer.clone())?;
    let report = solver.run(observer);

    let selected = select_vertices(&report.perturbation, 0.0);
    tracing::info!(
      nselected = selected.len(),
      nvertices = mesh.nvertices(),
      "matching finished"
    );
    Ok(MatchOutcome {
      region_faces,
      target,
      report,
      selected,
    })
  }

  /// Grows the reference region and returns its face rows together with the
  /// compacted sub-mesh.
  pub fn extract_region(&self, mesh: &TriangleMesh) -> Result<(Vec<Face>, TriangleMesh)> {
    let config = &self.config.region;
    let rows = grow_region_cached(
      self.cache.as_ref(),
      mesh.faces(),
      config.target_face_count,
      config.seed,
    )?;
    let (region, _) = mesh.submesh_from_rows(&rows)?;
    tracing::info!(
      nfaces = region.nfaces(),
      nvertices = region.nvertices(),
      "extracted reference region"
    );
    Ok((rows, region))
  }

  /// The configured Laplacian of `mesh`.
  pub fn base_operator(&self, mesh: &TriangleMesh) -> Result<BaseOperator> {
    let op = match self.config.spectrum.operator {
      OperatorKind::Combinatorial => BaseOperator::Sparse(combinatorial_laplacian(mesh)),
      OperatorKind::Fem { lumped_mass } => {
        let FemLaplacian { stiffness, mass } = FemLaplacian::assemble(mesh, lumped_mass)?;
        BaseOperator::GeneralizedLaplacian { stiffness, mass }
      }
    };
    Ok(op)
  }

  /// The smallest eigenvalues of the region's Laplacian.
  ///
  /// Leading null modes are skipped if configured; fails if fewer than
  /// `neigenvalues` eigenvalues remain.
  pub fn target_spectrum(&self, region: &TriangleMesh) -> Result<na::DVector<f64>> {
    let spectrum = &self.config.spectrum;
    let prepared = self.prepare(region)?;
    let dense = self
      .base_operator(&prepared)?
      .to_dense_symmetric(self.config.optimizer.max_operator_dim)?;
    let (eigenvals, _) = operator::sorted_symmetric_eigen(dense)?;

    let skip = if spectrum.drop_null_modes {
      eigenvals
        .iter()
        .take_while(|l| l.abs() <= spectrum.null_tolerance)
        .count()
    } else {
      0
    };
    let available = eigenvals.len() - skip;
    if available < spectrum.neigenvalues {
      return Err(Error::input(format!(
        "region spectrum has {available} usable eigenvalues, {} requested",
        spectrum.neigenvalues
      )));
    }
    tracing::debug!(skip, "built target spectrum");
    Ok(eigenvals.rows(skip, spectrum.neigenvalues).into_owned())
  }

  fn prepare<'a>(&self, mesh: &'a TriangleMesh) -> Result<Cow<'a, TriangleMesh>> {
    if self.config.spectrum.integer_coordinates {
      Ok(Cow::Owned(LaplacianInput::from_mesh(mesh)?.to_mesh()?))
    } else {
      Ok(Cow::Borrowed(mesh))
    }
  }
}
