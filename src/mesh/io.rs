use super::{Face, TriangleMesh, VertexIdx};
use crate::error::{Error, Result};

use std::{fmt::Write, path::Path};

/// Loads a mesh from a pair of whitespace separated text tables.
///
/// The `.vert` table has one `x y z` row per vertex. The `.tri` table has one
/// row of three 1-based vertex indices per face, which are decremented here.
/// Indices written as floats (`12.0`) are accepted.
pub fn read_vert_tri(vert_path: impl AsRef<Path>, tri_path: impl AsRef<Path>) -> Result<TriangleMesh> {
  let vert = std::fs::read_to_string(vert_path)?;
  let tri = std::fs::read_to_string(tri_path)?;
  let mesh = parse_vert_tri(&vert, &tri)?;
  tracing::info!(
    nvertices = mesh.nvertices(),
    nfaces = mesh.nfaces(),
    "loaded mesh"
  );
  Ok(mesh)
}

pub fn parse_vert_tri(vert: &str, tri: &str) -> Result<TriangleMesh> {
  let coords = parse_rows(vert)?
    .into_iter()
    .map(|(_, row)| na::Vector3::from(row))
    .collect();

  let faces = parse_rows(tri)?
    .into_iter()
    .map(|(line, row)| {
      let mut face = [0; 3];
      for (f, x) in face.iter_mut().zip(row) {
        *f = one_based_index(x).ok_or_else(|| Error::Parse {
          line,
          message: format!("`{x}` is not a 1-based vertex index"),
        })?;
      }
      Ok(face)
    })
    .collect::<Result<Vec<Face>>>()?;

  TriangleMesh::new(coords, faces)
}

fn one_based_index(x: f64) -> Option<VertexIdx> {
  (x.fract() == 0.0 && x >= 1.0).then(|| x as VertexIdx - 1)
}

/// Non-empty lines, each with exactly three numbers, tagged with their 1-based line.
fn parse_rows(text: &str) -> Result<Vec<(usize, [f64; 3])>> {
  let mut rows = Vec::new();
  for (iline, line) in text.lines().enumerate() {
    let line = line.trim();
    if line.is_empty() {
      continue;
    }
    let values: Vec<f64> = line
      .split_whitespace()
      .map(|x| x.parse::<f64>())
      .collect::<std::result::Result<_, _>>()
      .map_err(|e| Error::Parse {
        line: iline + 1,
        message: e.to_string(),
      })?;
    let row: [f64; 3] = values.try_into().map_err(|v: Vec<f64>| Error::Parse {
      line: iline + 1,
      message: format!("expected 3 values, found {}", v.len()),
    })?;
    rows.push((iline + 1, row));
  }
  Ok(rows)
}

impl TriangleMesh {
  pub fn to_obj_string(&self) -> String {
    let mut string = String::new();
    for v in self.coords() {
      writeln!(string, "v {:.6} {:.6} {:.6}", v.x, v.y, v.z).unwrap();
    }
    for f in self.faces() {
      // .obj uses 1-indexing.
      writeln!(string, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1).unwrap();
    }
    string
  }

  /// Reads `v` and `f` records. Face records may carry `/`-separated
  /// texture and normal indices, which are ignored.
  pub fn from_obj_string(obj_string: &str) -> Result<Self> {
    let mut coords = Vec::new();
    let mut faces = Vec::new();

    for (iline, line) in obj_string.lines().enumerate() {
      let line = line.trim();
      let parse_err = |message: String| Error::Parse {
        line: iline + 1,
        message,
      };

      if let Some(rest) = line.strip_prefix("v ") {
        let c: Vec<f64> = rest
          .split_whitespace()
          .map(|x| x.parse::<f64>())
          .collect::<std::result::Result<_, _>>()
          .map_err(|e| parse_err(e.to_string()))?;
        if c.len() != 3 {
          return Err(parse_err(format!("expected 3 coordinates, found {}", c.len())));
        }
        coords.push(na::Vector3::new(c[0], c[1], c[2]));
      } else if let Some(rest) = line.strip_prefix("f ") {
        let indices: Vec<VertexIdx> = rest
          .split_whitespace()
          .map(|x| x.split('/').next().unwrap_or(x).parse::<VertexIdx>())
          .collect::<std::result::Result<_, _>>()
          .map_err(|e| parse_err(e.to_string()))?;
        if indices.len() != 3 || indices.contains(&0) {
          return Err(parse_err(format!(
            "expected a triangle of 1-based indices, found {indices:?}"
          )));
        }
        // .obj uses 1-indexing.
        faces.push([indices[0] - 1, indices[1] - 1, indices[2] - 1]);
      }
    }

    Self::new(coords, faces)
  }
}
