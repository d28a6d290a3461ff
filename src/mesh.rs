//! Triangle surface meshes.
//!
//! A mesh is an ordered list of vertex positions and an ordered list of
//! triangles referencing them by 0-based index. Both orders are significant:
//! face order drives the tie-breaking of region growing and vertex order
//! defines the layout of every operator and perturbation vector.

pub mod adapter;
pub mod io;

use crate::error::{Error, Result};

use std::collections::BTreeMap;

pub type VertexIdx = usize;
pub type FaceIdx = usize;
pub type Face = [VertexIdx; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
  coords: Vec<na::Vector3<f64>>,
  faces: Vec<Face>,
}

impl TriangleMesh {
  /// Fails if a face references a vertex out of range or repeats a vertex.
  pub fn new(coords: Vec<na::Vector3<f64>>, faces: Vec<Face>) -> Result<Self> {
    let nvertices = coords.len();
    for (iface, face) in faces.iter().enumerate() {
      if let Some(&v) = face.iter().find(|&&v| v >= nvertices) {
        return Err(Error::input(format!(
          "face {iface} references vertex {v}, but the mesh has {nvertices} vertices"
        )));
      }
      if face[0] == face[1] || face[1] == face[2] || face[0] == face[2] {
        return Err(Error::input(format!(
          "face {iface} repeats a vertex: {face:?}"
        )));
      }
    }
    if let Some((ivertex, _)) = coords
      .iter()
      .enumerate()
      .find(|(_, c)| c.iter().any(|x| !x.is_finite()))
    {
      return Err(Error::input(format!(
        "vertex {ivertex} has non-finite coordinates"
      )));
    }
    Ok(Self { coords, faces })
  }

  pub fn nvertices(&self) -> usize {
    self.coords.len()
  }
  pub fn nfaces(&self) -> usize {
    self.faces.len()
  }
  pub fn coords(&self) -> &[na::Vector3<f64>] {
    &self.coords
  }
  pub fn faces(&self) -> &[Face] {
    &self.faces
  }
  pub fn face(&self, iface: FaceIdx) -> &Face {
    &self.faces[iface]
  }
  pub fn face_coords(&self, iface: FaceIdx) -> [&na::Vector3<f64>; 3] {
    self.faces[iface].map(|v| &self.coords[v])
  }

  pub fn into_parts(self) -> (Vec<na::Vector3<f64>>, Vec<Face>) {
    (self.coords, self.faces)
  }

  /// The sub-mesh spanned by the faces at `face_indices`.
  ///
  /// See [`Self::submesh_from_rows`].
  pub fn submesh(&self, face_indices: &[FaceIdx]) -> Result<(Self, Vec<VertexIdx>)> {
    let rows: Vec<Face> = face_indices
      .iter()
      .map(|&i| {
        self
          .faces
          .get(i)
          .copied()
          .ok_or_else(|| Error::input(format!("face index {i} out of range")))
      })
      .collect::<Result<_>>()?;
    self.submesh_from_rows(&rows)
  }

  /// Builds a compact mesh from face rows that reference this mesh's vertices.
  ///
  /// Only vertices touched by `rows` are kept, in ascending order of their
  /// original index. Also returns the local-to-global vertex map.
  pub fn submesh_from_rows(&self, rows: &[Face]) -> Result<(Self, Vec<VertexIdx>)> {
    let mut global2local: BTreeMap<VertexIdx, VertexIdx> = rows
      .iter()
      .flat_map(|f| f.iter().copied())
      .map(|v| (v, 0))
      .collect();
    for (ilocal, local) in global2local.values_mut().enumerate() {
      *local = ilocal;
    }

    let local2global: Vec<VertexIdx> = global2local.keys().copied().collect();
    if let Some(&v) = local2global.iter().find(|&&v| v >= self.nvertices()) {
      return Err(Error::input(format!(
        "face row references vertex {v}, but the mesh has {} vertices",
        self.nvertices()
      )));
    }

    let coords = local2global.iter().map(|&v| self.coords[v]).collect();
    let faces = rows.iter().map(|f| f.map(|v| global2local[&v])).collect();
    Ok((Self::new(coords, faces)?, local2global))
  }

  pub fn face_area(&self, iface: FaceIdx) -> f64 {
    let [a, b, c] = self.face_coords(iface);
    0.5 * (b - a).cross(&(c - a)).norm()
  }
}

#[cfg(test)]
pub(crate) mod test {
  use super::*;

  /// Regular tetrahedron inscribed in the cube $[-1,1]^3$, outward oriented.
  pub fn tetrahedron() -> TriangleMesh {
    let coords = vec![
      na::Vector3::new(1.0, 1.0, 1.0),
      na::Vector3::new(1.0, -1.0, -1.0),
      na::Vector3::new(-1.0, 1.0, -1.0),
      na::Vector3::new(-1.0, -1.0, 1.0),
    ];
    let faces = vec![[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]];
    TriangleMesh::new(coords, faces).unwrap()
  }

  /// Regular octahedron with 6 vertices and 8 faces.
  pub fn octahedron() -> TriangleMesh {
    let coords = vec![
      na::Vector3::new(1.0, 0.0, 0.0),
      na::Vector3::new(-1.0, 0.0, 0.0),
      na::Vector3::new(0.0, 1.0, 0.0),
      na::Vector3::new(0.0, -1.0, 0.0),
      na::Vector3::new(0.0, 0.0, 1.0),
      na::Vector3::new(0.0, 0.0, -1.0),
    ];
    let faces = vec![
      [0, 2, 4],
      [2, 1, 4],
      [1, 3, 4],
      [3, 0, 4],
      [2, 0, 5],
      [1, 2, 5],
      [3, 1, 5],
      [0, 3, 5],
    ];
    TriangleMesh::new(coords, faces).unwrap()
  }

  #[test]
  fn rejects_out_of_range_faces() {
    let coords = vec![na::Vector3::zeros(); 3];
    let err = TriangleMesh::new(coords, vec![[0, 1, 3]]).unwrap_err();
    assert!(matches!(err, Error::Input(_)));
  }

  #[test]
  fn rejects_repeated_vertices() {
    let coords = vec![na::Vector3::zeros(); 3];
    assert!(TriangleMesh::new(coords, vec![[0, 1, 1]]).is_err());
  }

  #[test]
  fn submesh_is_compact() {
    let mesh = octahedron();
    let (sub, local2global) = mesh.submesh(&[0, 1]).unwrap();
    assert_eq!(local2global, vec![0, 1, 2, 4]);
    assert_eq!(sub.nvertices(), 4);
    assert_eq!(sub.faces(), &[[0, 2, 3], [2, 1, 3]]);
    for (ilocal, &iglobal) in local2global.iter().enumerate() {
      assert_eq!(sub.coords()[ilocal], mesh.coords()[iglobal]);
    }
  }

  #[test]
  fn submesh_rejects_bad_face_index() {
    assert!(octahedron().submesh(&[8]).is_err());
  }

  #[test]
  fn tetrahedron_face_area() {
    let mesh = tetrahedron();
    // edge length 2*sqrt(2)
    let expected = 3f64.sqrt() / 4.0 * 8.0;
    for iface in 0..mesh.nfaces() {
      assert!((mesh.face_area(iface) - expected).abs() < 1e-12);
    }
  }
}
