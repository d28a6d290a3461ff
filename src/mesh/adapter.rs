//! Record layout consumed by integer-based Laplacian builders.
//!
//! Coordinates and indices are truncated to `i16`. The truncation of
//! coordinates loses precision; callers opt into it explicitly.

use super::{Face, TriangleMesh};
use crate::error::{Error, Result};

pub type IntRecord = [i16; 3];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaplacianInput {
  pub vertices: Vec<IntRecord>,
  pub faces: Vec<IntRecord>,
}

impl LaplacianInput {
  /// Coordinates are truncated toward zero and saturate at the `i16` range.
  /// Face indices above `i16::MAX` are rejected.
  pub fn from_mesh(mesh: &TriangleMesh) -> Result<Self> {
    let vertices = mesh
      .coords()
      .iter()
      .map(|c| [c.x as i16, c.y as i16, c.z as i16])
      .collect();

    let faces = mesh
      .faces()
      .iter()
      .enumerate()
      .map(|(iface, face)| {
        let mut record = [0; 3];
        for (r, &v) in record.iter_mut().zip(face) {
          *r = i16::try_from(v).map_err(|_| {
            Error::input(format!(
              "face {iface} references vertex {v}, which exceeds the 16-bit index limit"
            ))
          })?;
        }
        Ok(record)
      })
      .collect::<Result<_>>()?;

    Ok(Self { vertices, faces })
  }

  pub fn nvertices(&self) -> usize {
    self.vertices.len()
  }
  pub fn nfaces(&self) -> usize {
    self.faces.len()
  }

  /// Rebuilds a real-valued mesh from the truncated records.
  pub fn to_mesh(&self) -> Result<TriangleMesh> {
    let coords = self
      .vertices
      .iter()
      .map(|r| na::Vector3::from(r.map(f64::from)))
      .collect();
    let faces = self
      .faces
      .iter()
      .map(|r| -> Result<Face> {
        let mut face = [0; 3];
        for (f, &i) in face.iter_mut().zip(r) {
          *f = usize::try_from(i)
            .map_err(|_| Error::input(format!("negative vertex index {i} in face record")))?;
        }
        Ok(face)
      })
      .collect::<Result<_>>()?;
    TriangleMesh::new(coords, faces)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn truncates_coordinates() {
    let coords = vec![
      na::Vector3::new(1.9, -1.9, 0.4),
      na::Vector3::new(40000.0, -40000.0, 2.0),
      na::Vector3::new(0.0, 0.0, -0.99),
    ];
    let mesh = TriangleMesh::new(coords, vec![[0, 1, 2]]).unwrap();
    let input = LaplacianInput::from_mesh(&mesh).unwrap();
    assert_eq!(
      input.vertices,
      vec![[1, -1, 0], [i16::MAX, i16::MIN, 2], [0, 0, 0]]
    );
    assert_eq!(input.faces, vec![[0, 1, 2]]);
  }

  #[test]
  fn rejects_wide_indices() {
    let n = i16::MAX as usize + 2;
    let coords = vec![na::Vector3::zeros(); n];
    let mesh = TriangleMesh::new(coords, vec![[0, 1, n - 1]]).unwrap();
    assert!(matches!(
      LaplacianInput::from_mesh(&mesh),
      Err(Error::Input(_))
    ));
  }

  #[test]
  fn round_trips_integer_meshes() {
    let mesh = crate::mesh::test::tetrahedron();
    let input = LaplacianInput::from_mesh(&mesh).unwrap();
    assert_eq!(input.nvertices(), 4);
    assert_eq!(input.nfaces(), 4);
    assert_eq!(input.to_mesh().unwrap(), mesh);
  }
}
