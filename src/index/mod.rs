//! Exact inner-product vector index.
//!
//! A flat index over L2-normalized vectors, where inner product equals
//! cosine similarity. Sized for tens of thousands of passages; search is
//! an exact scan, not approximate.

pub mod store;

pub use store::{content_hash, Passage, PassageStore};

use crate::error::{RegQaError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::debug;

/// File magic for the persisted index blob.
const INDEX_MAGIC: &[u8; 4] = b"RQIX";
const INDEX_VERSION: u32 = 1;
/// magic + version + dimension + row count.
const INDEX_HEADER_BYTES: u64 = 4 + 4 + 4 + 8;

/// Descriptive record persisted alongside the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexMetadata {
    pub total_vectors: usize,
    pub vector_dimension: usize,
    pub index_type: String,
    pub created_at: String,
    pub document_count: usize,
}

impl IndexMetadata {
    pub fn new(total_vectors: usize, vector_dimension: usize, document_count: usize) -> Self {
        Self {
            total_vectors,
            vector_dimension,
            index_type: "flat_ip".to_string(),
            created_at: Utc::now().to_rfc3339(),
            document_count,
        }
    }
}

/// Flat inner-product index. Row order is insertion order and must mirror
/// the passage store at all times.
pub struct FlatIndex {
    dimension: usize,
    /// Row-major storage, `row_count * dimension` values.
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(RegQaError::Index("dimension must be positive".to_string()));
        }
        Ok(Self {
            dimension,
            data: Vec::new(),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn row_count(&self) -> usize {
        self.data.len() / self.dimension
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append vectors. Order is significant: row `i` corresponds to the
    /// `i`-th passage inserted into the store.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(RegQaError::Index(format!(
                    "vector dimension {} does not match index dimension {}",
                    vector.len(),
                    self.dimension
                )));
            }
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Return up to `k` rows with the highest inner-product score,
    /// descending; ties broken by lower row index.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.is_empty() {
            return Err(RegQaError::IndexUnavailable);
        }
        if query.len() != self.dimension {
            return Err(RegQaError::Index(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }
        if k == 0 {
            return Err(RegQaError::InvalidInput("k must be >= 1".to_string()));
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| {
                let score: f32 = vector.iter().zip(query.iter()).map(|(a, b)| a * b).sum();
                (row, score)
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Serialize the index to a little-endian binary blob.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(INDEX_MAGIC)?;
        writer.write_all(&INDEX_VERSION.to_le_bytes())?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.row_count() as u64).to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()?;
        debug!(
            "Saved index: {} rows, dimension {}",
            self.row_count(),
            self.dimension
        );
        Ok(())
    }

    /// Load an index previously written by [`FlatIndex::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != INDEX_MAGIC {
            return Err(RegQaError::CorruptPersistedState(
                "bad index file magic".to_string(),
            ));
        }

        let version = read_u32(&mut reader)?;
        if version != INDEX_VERSION {
            return Err(RegQaError::CorruptPersistedState(format!(
                "unsupported index version {}",
                version
            )));
        }

        let dimension = read_u32(&mut reader)? as usize;
        if dimension == 0 {
            return Err(RegQaError::CorruptPersistedState(
                "zero dimension in index file".to_string(),
            ));
        }
        let rows = read_u64(&mut reader)? as usize;

        // Validate the header against the file length before allocating;
        // a corrupt row count must not trigger a giant allocation.
        let expected_payload = (rows as u64)
            .checked_mul(dimension as u64)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| {
                RegQaError::CorruptPersistedState("index header overflows".to_string())
            })?;
        let actual_payload = std::fs::metadata(path)?
            .len()
            .saturating_sub(INDEX_HEADER_BYTES);
        if expected_payload != actual_payload {
            return Err(RegQaError::CorruptPersistedState(format!(
                "index payload is {} bytes, header implies {}",
                actual_payload, expected_payload
            )));
        }

        let mut data = vec![0f32; rows * dimension];
        let mut buf = [0u8; 4];
        for value in data.iter_mut() {
            reader.read_exact(&mut buf).map_err(|_| {
                RegQaError::CorruptPersistedState("truncated index file".to_string())
            })?;
            *value = f32::from_le_bytes(buf);
        }

        debug!("Loaded index: {} rows, dimension {}", rows, dimension);
        Ok(Self { dimension, data })
    }
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|_| RegQaError::CorruptPersistedState("truncated index header".to_string()))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(reader: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; 8];
    reader
        .read_exact(&mut buf)
        .map_err(|_| RegQaError::CorruptPersistedState("truncated index header".to_string()))?;
    Ok(u64::from_le_bytes(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::l2_normalize;

    fn unit(mut v: Vec<f32>) -> Vec<f32> {
        l2_normalize(&mut v);
        v
    }

    #[test]
    fn search_orders_by_score_then_row() {
        let mut index = FlatIndex::new(2).unwrap();
        index
            .add(&[
                unit(vec![1.0, 0.0]),
                unit(vec![0.0, 1.0]),
                unit(vec![1.0, 0.0]),
            ])
            .unwrap();

        let results = index.search(&unit(vec![1.0, 0.0]), 3).unwrap();
        assert_eq!(results.len(), 3);
        // Equal scores resolve to the earlier row.
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 2);
        assert_eq!(results[2].0, 1);
        assert!(results[0].1 > results[2].1 - 1e-6);
    }

    #[test]
    fn search_on_empty_index_is_an_error() {
        let index = FlatIndex::new(4).unwrap();
        assert!(matches!(
            index.search(&[0.0; 4], 5),
            Err(RegQaError::IndexUnavailable)
        ));
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let mut index = FlatIndex::new(3).unwrap();
        assert!(index.add(&[vec![1.0, 2.0]]).is_err());

        index.add(&[vec![1.0, 0.0, 0.0]]).unwrap();
        assert!(index.search(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn k_larger_than_rows_returns_all() {
        let mut index = FlatIndex::new(2).unwrap();
        index
            .add(&[unit(vec![1.0, 0.0]), unit(vec![0.5, 0.5])])
            .unwrap();
        let results = index.search(&unit(vec![1.0, 1.0]), 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn save_load_round_trip_reproduces_search() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");

        let mut index = FlatIndex::new(8).unwrap();
        let vectors: Vec<Vec<f32>> = (0..5)
            .map(|i| {
                let mut v = vec![0.1f32; 8];
                v[i] = 1.0;
                l2_normalize(&mut v);
                v
            })
            .collect();
        index.add(&vectors).unwrap();
        index.save(&path).unwrap();

        let loaded = FlatIndex::load(&path).unwrap();
        assert_eq!(loaded.row_count(), 5);
        assert_eq!(loaded.dimension(), 8);

        let query = unit(vec![1.0, 0.2, 0.0, 0.0, 0.1, 0.0, 0.0, 0.0]);
        let before = index.search(&query, 3).unwrap();
        let after = loaded.search(&query, 3).unwrap();
        assert_eq!(before.len(), after.len());
        for (b, a) in before.iter().zip(after.iter()) {
            assert_eq!(b.0, a.0);
            assert!((b.1 - a.1).abs() < 1e-5);
        }
    }

    #[test]
    fn truncated_blob_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");

        let mut index = FlatIndex::new(4).unwrap();
        index.add(&[unit(vec![1.0, 0.0, 0.0, 0.0])]).unwrap();
        index.save(&path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();
        assert!(matches!(
            FlatIndex::load(&path),
            Err(RegQaError::CorruptPersistedState(_))
        ));
    }

    #[test]
    fn absurd_header_row_count_rejected_before_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");

        // Valid magic and version, tiny payload, fabricated huge row count.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_VERSION.to_le_bytes());
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, &bytes).unwrap();

        assert!(matches!(
            FlatIndex::load(&path),
            Err(RegQaError::CorruptPersistedState(_))
        ));

        // A merely inflated count is also caught by the length check.
        bytes.truncate(12);
        bytes.extend_from_slice(&1_000_000u64.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        std::fs::write(&path, &bytes).unwrap();
        assert!(matches!(
            FlatIndex::load(&path),
            Err(RegQaError::CorruptPersistedState(_))
        ));
    }
}
