use serde::{Deserialize, Serialize};

use crate::{RagError, Result};

/// Exact nearest-neighbor index over L2-normalized vectors.
///
/// Scores are inner products, which equal cosine similarity once both sides
/// are normalized. Vectors are stored flattened in insertion order; position
/// `i` here corresponds to position `i` in the store's metadata log. The
/// index has no in-place delete, so removal means rebuilding from the
/// surviving records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    #[inline]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of vectors currently stored.
    #[inline]
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append vectors in order. Every vector must match the index dimension.
    #[inline]
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        for vector in vectors {
            if vector.len() != self.dimension {
                return Err(RagError::Store(format!(
                    "Vector dimension mismatch: index has {}, got {}",
                    self.dimension,
                    vector.len()
                )));
            }
        }
        for vector in vectors {
            self.vectors.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Return up to `k` (position, score) pairs sorted by descending inner
    /// product. Ties keep insertion order (stable sort).
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(RagError::Store(format!(
                "Query dimension mismatch: index has {}, got {}",
                self.dimension,
                query.len()
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(i, row)| {
                let score = row.iter().zip(query).map(|(a, b)| a * b).sum::<f32>();
                (i, score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Normalize a vector to unit L2 length in place. Zero vectors are left
/// untouched.
#[inline]
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

/// Normalize a batch of vectors in place.
#[inline]
pub fn normalize_l2_batch(vectors: &mut [Vec<f32>]) {
    for vector in vectors {
        normalize_l2(vector);
    }
}
