//! Discrete Laplace-Beltrami operators of triangle surfaces.
//!
//! Piecewise linear finite elements: the stiffness matrix uses cotangent
//! weights, the mass matrix is either consistent or lumped (barycentric).
//! The combinatorial graph Laplacian is available for meshes whose geometry
//! should be ignored.

use crate::{
  error::{Error, Result},
  mesh::{FaceIdx, TriangleMesh, VertexIdx},
  operator,
};

use itertools::Itertools;
use std::collections::BTreeSet;

pub type GalMat = nas::CooMatrix<f64>;
pub type ElMat = na::Matrix3<f64>;

/// Geometry of a single triangle.
pub struct TriangleGeometry {
  vertices: [na::Vector3<f64>; 3],
  area: f64,
}
impl TriangleGeometry {
  pub fn new(vertices: [na::Vector3<f64>; 3]) -> Self {
    let [a, b, c] = &vertices;
    let area = 0.5 * (b - a).cross(&(c - a)).norm();
    Self { vertices, area }
  }
  pub fn from_face(mesh: &TriangleMesh, iface: FaceIdx) -> Self {
    Self::new(mesh.face_coords(iface).map(|c| *c))
  }

  pub fn area(&self) -> f64 {
    self.area
  }

  /// Cotangent of the interior angle at local vertex `i`.
  pub fn cot_angle(&self, i: usize) -> f64 {
    let p = &self.vertices[i];
    let e0 = self.vertices[(i + 1) % 3] - p;
    let e1 = self.vertices[(i + 2) % 3] - p;
    e0.dot(&e1) / e0.cross(&e1).norm()
  }
}

pub trait ElmatProvider {
  fn eval(&self, triangle: &TriangleGeometry) -> ElMat;
}

impl<F> ElmatProvider for F
where
  F: Fn(&TriangleGeometry) -> ElMat,
{
  fn eval(&self, triangle: &TriangleGeometry) -> ElMat {
    self(triangle)
  }
}

/// Element matrix of $integral nabla phi_i dot nabla phi_j$.
///
/// The edge opposite local vertex $k$ gets weight $1/2 cot(theta_k)$.
pub struct StiffnessElmat;
impl ElmatProvider for StiffnessElmat {
  fn eval(&self, triangle: &TriangleGeometry) -> ElMat {
    let mut elmat = ElMat::zeros();
    for k in 0..3 {
      let i = (k + 1) % 3;
      let j = (k + 2) % 3;
      let w = 0.5 * triangle.cot_angle(k);
      elmat[(i, j)] -= w;
      elmat[(j, i)] -= w;
      elmat[(i, i)] += w;
      elmat[(j, j)] += w;
    }
    elmat
  }
}

/// Exact element matrix of the $L^2$ inner product.
pub struct MassElmat;
impl ElmatProvider for MassElmat {
  fn eval(&self, triangle: &TriangleGeometry) -> ElMat {
    let v = triangle.area() / 12.0;
    let mut elmat = ElMat::from_element(v);
    elmat.fill_diagonal(2.0 * v);
    elmat
  }
}

/// Mass element matrix lumped onto the diagonal (trapezoidal rule).
pub struct LumpedMassElmat;
impl ElmatProvider for LumpedMassElmat {
  fn eval(&self, triangle: &TriangleGeometry) -> ElMat {
    ElMat::from_diagonal_element(triangle.area() / 3.0)
  }
}

/// Assembly algorithm for the Galerkin Matrix.
///
/// Fails on degenerate (zero area) faces.
pub fn assemble_galmat(mesh: &TriangleMesh, elmat: impl ElmatProvider) -> Result<GalMat> {
  let n = mesh.nvertices();
  let mut triplets: Vec<(usize, usize, f64)> = Vec::new();

  for (iface, face) in mesh.faces().iter().enumerate() {
    let geo = TriangleGeometry::from_face(mesh, iface);
    if geo.area() <= f64::EPSILON * mesh_scale_sqr(&geo) {
      return Err(Error::input(format!("face {iface} is degenerate")));
    }
    let elmat = elmat.eval(&geo);
    for (ilocal, &iglobal) in face.iter().enumerate() {
      for (jlocal, &jglobal) in face.iter().enumerate() {
        let val = elmat[(ilocal, jlocal)];
        if val != 0.0 {
          triplets.push((iglobal, jglobal, val));
        }
      }
    }
  }

  let (rows, cols, values) = triplets.into_iter().multiunzip();
  GalMat::try_from_triplets(n, n, rows, cols, values)
    .map_err(|e| Error::input(format!("assembly failed: {e}")))
}

fn mesh_scale_sqr(geo: &TriangleGeometry) -> f64 {
  let [a, b, c] = &geo.vertices;
  (b - a).norm_squared().max((c - a).norm_squared())
}

/// Stiffness and mass matrices of a mesh.
#[derive(Debug, Clone)]
pub struct FemLaplacian {
  pub stiffness: nas::CsrMatrix<f64>,
  pub mass: nas::CsrMatrix<f64>,
}
impl FemLaplacian {
  pub fn assemble(mesh: &TriangleMesh, lumped_mass: bool) -> Result<Self> {
    let stiffness = assemble_galmat(mesh, StiffnessElmat)?;
    let mass = if lumped_mass {
      assemble_galmat(mesh, LumpedMassElmat)?
    } else {
      assemble_galmat(mesh, MassElmat)?
    };
    Ok(Self {
      stiffness: nas::CsrMatrix::from(&stiffness),
      mass: nas::CsrMatrix::from(&mass),
    })
  }
}

/// Graph Laplacian $D - W$ of the mesh's edge graph, with unit edge weights.
///
/// Vertices without faces give zero rows.
pub fn combinatorial_laplacian(mesh: &TriangleMesh) -> nas::CsrMatrix<f64> {
  let edges: BTreeSet<(VertexIdx, VertexIdx)> = mesh
    .faces()
    .iter()
    .flat_map(|f| [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])])
    .map(|(a, b)| (a.min(b), a.max(b)))
    .collect();

  let n = mesh.nvertices();
  let mut coo = GalMat::new(n, n);
  for &(a, b) in &edges {
    coo.push(a, b, -1.0);
    coo.push(b, a, -1.0);
    coo.push(a, a, 1.0);
    coo.push(b, b, 1.0);
  }
  nas::CsrMatrix::from(&coo)
}

/// The `neigen` smallest eigenpairs of $A u = lambda B u$.
///
/// Eigenvalues ascend, eigenvectors are the columns of the returned matrix
/// and are $B$-orthonormal.
pub fn laplace_beltrami_spectrum(
  stiffness: &nas::CsrMatrix<f64>,
  mass: &nas::CsrMatrix<f64>,
  neigen: usize,
  max_dim: usize,
) -> Result<(na::DVector<f64>, na::DMatrix<f64>)> {
  let n = stiffness.nrows();
  if neigen > n {
    return Err(Error::input(format!(
      "requested {neigen} eigenpairs of an operator of dimension {n}"
    )));
  }
  if n > max_dim {
    return Err(Error::ResourceExhausted { dim: n, max_dim });
  }

  let stiffness = operator::sparse_to_dense(stiffness);
  let mass = operator::sparse_to_dense(mass);
  let reduced = operator::GeneralizedReduction::new(&stiffness, mass)?;
  let (eigenvals, eigenvecs) = operator::sorted_symmetric_eigen(reduced.matrix().clone())?;

  let eigenvals = eigenvals.rows(0, neigen).into_owned();
  let eigenvecs = reduced.recover_eigenvectors(eigenvecs.columns(0, neigen).into_owned())?;
  Ok((eigenvals, eigenvecs))
}
