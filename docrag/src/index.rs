//! Nearest-neighbour search over Euclidean distance.
//!
//! [`FlatL2Index`] scans every row. Results are exact, so ranking is fully
//! reproducible: ascending distance, ties broken by ascending row id.
//!
//! Binary layout written by [`FlatL2Index::persist`]:
//! `[magic:4 "DRVI"][version:u16][dimension:u32][count:u32][f32 * dimension * count]`,
//! all little-endian. Vectors are stored at full precision so a loaded
//! index ranks identically to the one that was written.

use std::cmp::Ordering;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

const MAGIC: &[u8; 4] = b"DRVI";
const VERSION: u16 = 1;

/// A row id and its distance to a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f32,
}

impl Neighbor {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.distance.total_cmp(&other.distance).then(self.row.cmp(&other.row))
    }
}

/// A read-only searchable set of equal-length vectors addressed by row.
pub trait VectorIndex: Send + Sync {
    /// Length of every stored vector.
    fn dimension(&self) -> usize;

    /// Number of stored rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the `min(k, len)` rows closest to `query`.
    ///
    /// Results are non-decreasing in distance; equal distances are ordered
    /// by ascending row id.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `query.len() != dimension()`.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>>;
}

/// Exhaustive L2 index over row-major `f32` storage.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    /// An index with no rows.
    pub fn empty(dimension: usize) -> Self {
        Self { dimension, data: Vec::new() }
    }

    /// Build an index over `vectors`; row `i` is `vectors[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IndexBuild`] if `vectors` is empty, if the first
    /// vector is zero-length, if lengths differ, or if any component is
    /// not finite.
    pub fn build<V: AsRef<[f32]>>(vectors: &[V]) -> Result<Self> {
        let first = vectors
            .first()
            .ok_or_else(|| RagError::IndexBuild("no vectors to index".to_string()))?;
        let dimension = first.as_ref().len();
        if dimension == 0 {
            return Err(RagError::IndexBuild("vectors must not be zero-length".to_string()));
        }

        let mut data = Vec::with_capacity(dimension * vectors.len());
        for (row, vector) in vectors.iter().enumerate() {
            let vector = vector.as_ref();
            if vector.len() != dimension {
                return Err(RagError::IndexBuild(format!(
                    "vector {row} has {} components, expected {dimension}",
                    vector.len()
                )));
            }
            if !vector.iter().all(|x| x.is_finite()) {
                return Err(RagError::IndexBuild(format!("vector {row} has non-finite components")));
            }
            data.extend_from_slice(vector);
        }
        Ok(Self { dimension, data })
    }

    /// The stored vector at `row`.
    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        let start = row.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension.max(1))
    }

    /// Serialize the index to `writer`.
    pub fn persist<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u32).to_le_bytes())?;
        let mut buf = Vec::with_capacity(self.data.len() * 4);
        for x in &self.data {
            buf.extend_from_slice(&x.to_le_bytes());
        }
        writer.write_all(&buf)?;
        Ok(())
    }

    /// Read an index previously written by [`persist`](Self::persist).
    ///
    /// The reader must contain nothing after the index.
    pub fn load<R: Read>(reader: &mut R) -> Result<Self> {
        let mut header = [0u8; 14];
        reader.read_exact(&mut header)?;
        if &header[0..4] != MAGIC {
            return Err(format_error("bad magic"));
        }
        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(format_error(&format!("unsupported version {version}")));
        }
        let dimension = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
        let count = u32::from_le_bytes([header[10], header[11], header[12], header[13]]) as usize;
        if dimension == 0 {
            return Err(format_error("zero dimension"));
        }

        let expected = dimension
            .checked_mul(count)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| format_error("header overflows"))?;
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        if bytes.len() != expected {
            return Err(format_error(&format!(
                "expected {expected} bytes of vector data, found {}",
                bytes.len()
            )));
        }

        let data = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        Ok(Self { dimension, data })
    }
}

fn format_error(message: &str) -> RagError {
    RagError::Persistence { path: "vector index".to_string(), message: message.to_string() }
}

fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
}

impl VectorIndex for FlatL2Index {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        if self.dimension == 0 { 0 } else { self.data.len() / self.dimension }
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let k = k.min(self.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<Neighbor> = self
            .rows()
            .enumerate()
            .map(|(row, vector)| Neighbor { row, distance: l2_distance(vector, query) })
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, Neighbor::rank_cmp);
            scored.truncate(k);
        }
        scored.sort_unstable_by(Neighbor::rank_cmp);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_rows() -> FlatL2Index {
        FlatL2Index::build(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![0.0, 2.0]]).unwrap()
    }

    #[test]
    fn empty_input_is_a_build_error() {
        let err = FlatL2Index::build::<Vec<f32>>(&[]).unwrap_err();
        assert!(matches!(err, RagError::IndexBuild(_)));
    }

    #[test]
    fn inconsistent_dimensions_are_a_build_error() {
        let err = FlatL2Index::build(&[vec![1.0, 2.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, RagError::IndexBuild(_)));
    }

    #[test]
    fn non_finite_components_are_a_build_error() {
        assert!(FlatL2Index::build(&[vec![f32::NAN, 0.0]]).is_err());
    }

    #[test]
    fn exact_match_ranks_first_with_zero_distance() {
        let index = three_rows();
        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0], Neighbor { row: 1, distance: 0.0 });
        assert_eq!(hits.iter().map(|h| h.row).collect::<Vec<_>>(), vec![1, 0, 2]);
        assert_eq!(hits[2].distance, 5.0f32.sqrt());
    }

    #[test]
    fn ties_break_by_row_id() {
        let index =
            FlatL2Index::build(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0], vec![5.0, 5.0]])
                .unwrap();
        let hits = index.search(&[0.0, 0.0], 3).unwrap();
        assert_eq!(hits.iter().map(|h| h.row).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn k_is_capped_by_len() {
        let index = three_rows();
        assert_eq!(index.search(&[0.0, 0.0], 10).unwrap().len(), 3);
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn wrong_query_length_is_rejected() {
        let err = three_rows().search(&[0.0], 1).unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn persist_then_load_is_identical() {
        let index = three_rows();
        let mut bytes = Vec::new();
        index.persist(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 14 + 3 * 2 * 4);
        let loaded = FlatL2Index::load(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded, index);
    }

    #[test]
    fn empty_index_round_trips() {
        let index = FlatL2Index::empty(8);
        let mut bytes = Vec::new();
        index.persist(&mut bytes).unwrap();
        let loaded = FlatL2Index::load(&mut bytes.as_slice()).unwrap();
        assert!(loaded.is_empty());
        assert_eq!(loaded.dimension(), 8);
    }

    #[test]
    fn truncated_or_corrupt_data_is_rejected() {
        let mut bytes = Vec::new();
        three_rows().persist(&mut bytes).unwrap();

        let truncated = &bytes[..bytes.len() - 3];
        assert!(FlatL2Index::load(&mut &truncated[..]).is_err());

        let mut corrupt = bytes.clone();
        corrupt[0] = b'X';
        assert!(FlatL2Index::load(&mut corrupt.as_slice()).is_err());
    }
}
