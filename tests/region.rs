extern crate nalgebra as na;

use specmatch::{
  mesh::{Face, TriangleMesh},
  region::{grow_region, grow_region_faces},
};

use std::collections::HashSet;

fn octahedron() -> TriangleMesh {
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

fn shares_vertex(face: &Face, region: &[Face]) -> bool {
  region.iter().any(|f| f.iter().any(|v| face.contains(v)))
}

#[test]
fn octahedron_region_is_vertex_connected() {
  let mesh = octahedron();
  for seed in 0..32 {
    let rows = grow_region_faces(mesh.faces(), 2, seed).unwrap();
    assert_eq!(rows.len(), 3);
    for i in 1..rows.len() {
      assert!(shares_vertex(&rows[i], &rows[..i]), "seed {seed}: {rows:?}");
    }
  }
}

#[test]
fn same_seed_same_region() {
  let mesh = octahedron();
  for seed in [0, 10, 12345] {
    assert_eq!(
      grow_region(mesh.faces(), 4, seed).unwrap(),
      grow_region(mesh.faces(), 4, seed).unwrap()
    );
  }
}

#[test]
fn disjoint_faces_give_disconnected_region() {
  // No face touches another, so every step after the seed scores zero and
  // falls back to the first remaining face.
  let faces: Vec<Face> = (0..6).map(|i| [3 * i, 3 * i + 1, 3 * i + 2]).collect();
  for seed in 0..16 {
    let region = grow_region(&faces, 2, seed).unwrap();
    let seed_face = region[0];
    assert!((1..4).contains(&seed_face));
    let expected: Vec<_> = (0..6).filter(|&i| i != seed_face).take(2).collect();
    assert_eq!(&region[1..], &expected[..]);

    let vertices: HashSet<_> = region.iter().flat_map(|&i| faces[i]).collect();
    assert_eq!(vertices.len(), 9);
  }
}
