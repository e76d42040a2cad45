// Vector index module
// Exact nearest-neighbour search over an append-only set of embeddings

pub mod snapshot;


use std::cmp::Ordering;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::staging::StagedFile;
use crate::{MemoryError, Result};

/// Distance metric used by an index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Squared Euclidean distance
    L2,
}

impl Metric {
    #[inline]
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::L2 => squared_l2(a, b),
        }
    }
}

/// A single nearest-neighbour result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub distance: f32,
    pub position: usize,
}

/// In-memory flat index. Vectors are stored contiguously in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    metric: Metric,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Create an empty L2 index for vectors of `dimension` components
    #[inline]
    pub fn build(dimension: usize) -> Result<Self> {
        Self::with_metric(dimension, Metric::L2)
    }

    #[inline]
    pub fn with_metric(dimension: usize, metric: Metric) -> Result<Self> {
        if dimension == 0 {
            return Err(MemoryError::InvalidDimension(dimension));
        }

        Ok(Self {
            dimension,
            metric,
            data: Vec::new(),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn metric(&self) -> Metric {
        self.metric
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn insert(&mut self, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector)?;
        self.data.extend_from_slice(vector);
        Ok(())
    }

    /// Append a batch of vectors. Nothing is inserted unless every vector
    /// has the configured dimension.
    #[inline]
    pub fn insert_all<V: AsRef<[f32]>>(&mut self, vectors: &[V]) -> Result<()> {
        for vector in vectors {
            self.check_dimension(vector.as_ref())?;
        }

        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector.as_ref());
        }

        debug!(
            "Inserted {} vectors, index now holds {}",
            vectors.len(),
            self.len()
        );
        Ok(())
    }

    /// Return up to `k` hits ordered by ascending distance, ties broken by
    /// lower insertion position.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.check_dimension(query)?;

        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(position, vector)| SearchHit {
                distance: self.metric.distance(query, vector),
                position,
            })
            .collect();

        hits.sort_by(compare_hits);
        hits.truncate(k);
        Ok(hits)
    }

    /// Vector stored at `position`
    #[inline]
    pub fn reconstruct(&self, position: usize) -> Result<&[f32]> {
        let len = self.len();
        if position >= len {
            return Err(MemoryError::OutOfRange { position, len });
        }

        let start = position * self.dimension;
        Ok(&self.data[start..start + self.dimension])
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dimension)
    }

    /// Write a standalone snapshot, not bound to any ledger
    #[inline]
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = snapshot::encode(self, &snapshot::UNBOUND)?;
        StagedFile::write(path, &bytes)?.commit()?;

        info!(
            "Saved index snapshot with {} vectors ({} dimensions) to {}",
            self.len(),
            self.dimension,
            path.display()
        );
        Ok(())
    }

    #[inline]
    pub fn load(path: &Path) -> Result<Self> {
        Ok(snapshot::read_snapshot(path)?.index)
    }

    pub(crate) fn raw_values(&self) -> &[f32] {
        &self.data
    }

    pub(crate) fn from_raw_parts(dimension: usize, metric: Metric, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 {
            return Err(MemoryError::InvalidDimension(dimension));
        }
        if data.len() % dimension != 0 {
            return Err(MemoryError::Snapshot(format!(
                "{} values cannot be split into vectors of dimension {}",
                data.len(),
                dimension
            )));
        }

        Ok(Self {
            dimension,
            metric,
            data,
        })
    }

    fn check_dimension(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Summary statistics of a single vector
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStats {
    pub mean: f32,
    pub std_dev: f32,
    pub min: f32,
    pub max: f32,
    pub head: Vec<f32>,
}

impl VectorStats {
    #[inline]
    pub fn of(vector: &[f32]) -> Option<Self> {
        if vector.is_empty() {
            return None;
        }

        let n = vector.len() as f64;
        let mean = vector.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
        let variance = vector
            .iter()
            .map(|&v| (f64::from(v) - mean).powi(2))
            .sum::<f64>()
            / n;

        let min = vector.iter().copied().fold(f32::INFINITY, f32::min);
        let max = vector.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        Some(Self {
            mean: mean as f32,
            std_dev: variance.sqrt() as f32,
            min,
            max,
            head: vector.iter().take(5).copied().collect(),
        })
    }
}

/// Squared Euclidean distance between two equally sized vectors
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.position.cmp(&b.position))
}
