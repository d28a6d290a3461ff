//! Greedy extraction of a connected reference region from a face list.
//!
//! The grower attaches, one face at a time, the remaining face sharing the
//! most vertices with everything accumulated so far. Vertex occurrences are
//! counted with multiplicity: a vertex touched by three accumulated faces
//! contributes three to the score of every candidate containing it.

use crate::{
  error::{Error, Result},
  mesh::{Face, FaceIdx, VertexIdx},
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
  collections::HashMap,
  path::{Path, PathBuf},
};

/// Multiset of vertex ids.
#[derive(Debug, Default, Clone)]
pub struct VertexMembership {
  counts: HashMap<VertexIdx, usize>,
  len: usize,
}

impl VertexMembership {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn from_ids(ids: &[VertexIdx]) -> Self {
    let mut membership = Self::new();
    membership.extend(ids.iter().copied());
    membership
  }

  pub fn insert(&mut self, id: VertexIdx) {
    *self.counts.entry(id).or_insert(0) += 1;
    self.len += 1;
  }

  /// Number of times `id` occurs in the collection.
  pub fn count(&self, id: VertexIdx) -> usize {
    self.counts.get(&id).copied().unwrap_or(0)
  }

  /// Total number of ids, duplicates included.
  pub fn len(&self) -> usize {
    self.len
  }
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Sum over the face's corners of their counts.
  pub fn face_score(&self, face: &Face) -> usize {
    face.iter().map(|&v| self.count(v)).sum()
  }
}

impl Extend<VertexIdx> for VertexMembership {
  fn extend<I: IntoIterator<Item = VertexIdx>>(&mut self, iter: I) {
    iter.into_iter().for_each(|id| self.insert(id));
  }
}

/// Membership-count matrix of a face table.
///
/// Entry `(i, j)` is the number of entries of `ids` equal to `table[i][j]`.
pub fn membership_counts(table: &[Face], ids: &[VertexIdx]) -> Vec<[usize; 3]> {
  let membership = VertexMembership::from_ids(ids);
  table
    .iter()
    .map(|face| face.map(|v| membership.count(v)))
    .collect()
}

/// Greedily grows a region of `target_face_count + 1` faces.
///
/// The seed face is drawn uniformly from `[1, nfaces - 3]` with a generator
/// seeded by `seed`, so the first and the last two faces are never seeds.
/// Every following step takes the first remaining face (in original face
/// order) with the highest [`VertexMembership::face_score`].
///
/// If no remaining face touches the region the first remaining face is taken
/// anyway, and the result is disconnected.
pub fn grow_region(faces: &[Face], target_face_count: usize, seed: u64) -> Result<Vec<FaceIdx>> {
  let nfaces = faces.len();
  if nfaces < 4 {
    return Err(Error::input(format!(
      "region growing needs at least 4 faces, the mesh has {nfaces}"
    )));
  }
  if target_face_count >= nfaces - 2 {
    return Err(Error::input(format!(
      "target face count {target_face_count} must be below {} (face count minus 2)",
      nfaces - 2
    )));
  }

  let mut rng = StdRng::seed_from_u64(seed);
  let seed_face = rng.gen_range(1..nfaces - 2);
  tracing::debug!(seed, seed_face, target_face_count, "growing region");

  let mut remaining: Vec<FaceIdx> = (0..nfaces).filter(|&i| i != seed_face).collect();
  let mut region = Vec::with_capacity(target_face_count + 1);
  let mut membership = VertexMembership::new();

  region.push(seed_face);
  membership.extend(faces[seed_face]);

  for step in 0..target_face_count {
    let mut best = 0;
    let mut best_score = 0;
    for (pos, &iface) in remaining.iter().enumerate() {
      let score = membership.face_score(&faces[iface]);
      if score > best_score {
        best = pos;
        best_score = score;
      }
    }
    if best_score == 0 {
      tracing::warn!(
        step,
        face = remaining[best],
        "no remaining face touches the region; attaching a disconnected face"
      );
    }

    let iface = remaining.remove(best);
    region.push(iface);
    membership.extend(faces[iface]);
  }

  Ok(region)
}

/// Face rows of the grown region, gathered from `faces`.
pub fn grow_region_faces(faces: &[Face], target_face_count: usize, seed: u64) -> Result<Vec<Face>> {
  let region = grow_region(faces, target_face_count, seed)?;
  Ok(region.into_iter().map(|i| faces[i]).collect())
}

/// On-disk store of grown regions, keyed by target face count and seed.
#[derive(Debug, Clone)]
pub struct RegionCache {
  dir: PathBuf,
}

impl RegionCache {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn dir(&self) -> &Path {
    &self.dir
  }

  pub fn path(&self, target_face_count: usize, seed: u64) -> PathBuf {
    self
      .dir
      .join(format!("region_{target_face_count}_{seed}.tri"))
  }

  /// Returns `None` if nothing is cached for this key.
  pub fn load(&self, target_face_count: usize, seed: u64) -> Result<Option<Vec<Face>>> {
    let path = self.path(target_face_count, seed);
    let text = match std::fs::read_to_string(&path) {
      Ok(text) => text,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(e.into()),
    };

    let mut rows = Vec::new();
    for (iline, line) in text.lines().enumerate() {
      if line.trim().is_empty() {
        continue;
      }
      let row: Vec<VertexIdx> = line
        .split_whitespace()
        .map(|x| x.parse::<VertexIdx>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::Parse {
          line: iline + 1,
          message: e.to_string(),
        })?;
      let row: Face = row.try_into().map_err(|_| Error::Parse {
        line: iline + 1,
        message: "expected 3 vertex indices".to_string(),
      })?;
      rows.push(row);
    }

    if rows.len() != target_face_count + 1 {
      return Err(Error::Parse {
        line: rows.len(),
        message: format!(
          "cached region {} has {} faces, expected {}",
          path.display(),
          rows.len(),
          target_face_count + 1
        ),
      });
    }
    tracing::debug!(path = %path.display(), "loaded cached region");
    Ok(Some(rows))
  }

  pub fn store(&self, target_face_count: usize, seed: u64, rows: &[Face]) -> Result<()> {
    std::fs::create_dir_all(&self.dir)?;
    let text: String = rows
      .iter()
      .map(|f| format!("{} {} {}\n", f[0], f[1], f[2]))
      .collect();
    std::fs::write(self.path(target_face_count, seed), text)?;
    Ok(())
  }
}

/// Like [`grow_region_faces`], but reuses and fills `cache` when given.
pub fn grow_region_cached(
  cache: Option<&RegionCache>,
  faces: &[Face],
  target_face_count: usize,
  seed: u64,
) -> Result<Vec<Face>> {
  let Some(cache) = cache else {
    return grow_region_faces(faces, target_face_count, seed);
  };
  if let Some(rows) = cache.load(target_face_count, seed)? {
    return Ok(rows);
  }
  let rows = grow_region_faces(faces, target_face_count, seed)?;
  cache.store(target_face_count, seed, &rows)?;
  Ok(rows)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::mesh::test::octahedron;

  #[test]
  fn membership_counts_multiplicity() {
    let table = [[0, 1, 2], [2, 3, 4], [5, 6, 7]];
    let ids = [2, 2, 3, 0, 9];
    let counts = membership_counts(&table, &ids);
    assert_eq!(counts, vec![[1, 0, 2], [2, 1, 0], [0, 0, 0]]);
  }

  #[test]
  fn membership_counts_full_face() {
    let table = [[4, 7, 9], [1, 2, 3]];
    let counts = membership_counts(&table, &[9, 4, 7]);
    assert_eq!(counts[0].iter().sum::<usize>(), 3);
    assert_eq!(counts[1].iter().sum::<usize>(), 0);
  }

  #[test]
  fn grows_requested_size() {
    let faces = octahedron().faces().to_vec();
    for target in 0..faces.len() - 2 {
      let region = grow_region(&faces, target, 7).unwrap();
      assert_eq!(region.len(), target + 1);
      let mut sorted = region.clone();
      sorted.sort_unstable();
      sorted.dedup();
      assert_eq!(sorted.len(), region.len());
    }
  }

  #[test]
  fn seed_face_excludes_ends() {
    let faces = octahedron().faces().to_vec();
    for seed in 0..64 {
      let region = grow_region(&faces, 0, seed).unwrap();
      assert!((1..faces.len() - 2).contains(&region[0]));
    }
  }

  #[test]
  fn prefers_best_connected_face() {
    // A fan of triangles around vertex 0 plus a far away triangle.
    // Faces 1..=4 all share vertex 0 with each other.
    let faces = [
      [10, 11, 12],
      [0, 1, 2],
      [0, 2, 3],
      [0, 3, 4],
      [0, 4, 5],
      [20, 21, 22],
      [30, 31, 32],
    ];
    for seed in 0..16 {
      let region = grow_region(&faces, 2, seed).unwrap();
      let seed_face = region[0];
      if (1..=4).contains(&seed_face) {
        for &iface in &region[1..] {
          assert!((1..=4).contains(&iface), "{region:?}");
        }
      }
    }
  }

  #[test]
  fn tie_break_is_first_in_face_order() {
    // Every face shares exactly vertex 0 with any other face.
    let faces = [
      [0, 1, 2],
      [0, 3, 4],
      [0, 5, 6],
      [0, 7, 8],
      [0, 9, 10],
      [0, 11, 12],
    ];
    let region = grow_region(&faces, 3, 3).unwrap();
    let seed_face = region[0];
    let expected: Vec<_> = (0..faces.len()).filter(|&i| i != seed_face).take(3).collect();
    assert_eq!(&region[1..], &expected[..]);
  }

  #[test]
  fn rejects_oversized_target() {
    let faces = octahedron().faces().to_vec();
    assert!(matches!(grow_region(&faces, 6, 0), Err(Error::Input(_))));
    assert!(matches!(grow_region(&faces[..3], 0, 0), Err(Error::Input(_))));
  }

  #[test]
  fn cache_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let cache = RegionCache::new(dir.path().join("regions"));
    let faces = octahedron().faces().to_vec();

    assert!(cache.load(3, 5).unwrap().is_none());
    let grown = grow_region_cached(Some(&cache), &faces, 3, 5).unwrap();
    assert!(cache.path(3, 5).exists());
    assert_eq!(cache.load(3, 5).unwrap(), Some(grown.clone()));

    // A cached entry wins over recomputation.
    let fake = vec![[0, 1, 2]; 4];
    cache.store(3, 5, &fake).unwrap();
    assert_eq!(grow_region_cached(Some(&cache), &faces, 3, 5).unwrap(), fake);
  }

  #[test]
  fn cache_rejects_wrong_size() {
    let dir = tempfile::tempdir().unwrap();
    let cache = RegionCache::new(dir.path());
    cache.store(3, 1, &[[0, 1, 2]]).unwrap();
    assert!(matches!(cache.load(3, 1), Err(Error::Parse { .. })));
  }
}
