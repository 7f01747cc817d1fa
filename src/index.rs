//! In-memory vector index with exact cosine search
//!
//! Built once per run from every embedded chunk. Queries score every entry,
//! so results are exact: no approximate-neighbour structure is involved.

use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;
use crate::errors::{QaError, Result};

/// A chunk paired with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddedChunk {
    pub fn dim(&self) -> usize {
        self.vector.len()
    }
}

/// Query hit with its cosine similarity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Exact nearest-neighbour index over embedded chunks
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<EmbeddedChunk>,
    dim: usize,
}

impl VectorIndex {
    /// Build the index. Fails on zero chunks or mixed dimensions.
    pub fn build(entries: Vec<EmbeddedChunk>) -> Result<Self> {
        let dim = entries.first().ok_or(QaError::EmptyIndex)?.dim();

        if dim == 0 {
            return Err(QaError::EmbeddingService(
                "embedding backend returned an empty vector".to_string(),
            ));
        }

        if let Some(bad) = entries.iter().find(|e| e.dim() != dim) {
            return Err(QaError::DimensionMismatch {
                expected: dim,
                actual: bad.dim(),
            });
        }

        Ok(Self { entries, dim })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn entries(&self) -> &[EmbeddedChunk] {
        &self.entries
    }

    /// Top `k` chunks by descending cosine similarity.
    /// Equal scores keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if vector.len() != self.dim {
            return Err(QaError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine_similarity(vector, &entry.vector)))
            .collect();

        // sort_by is stable, so ties stay in chunk order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect())
    }
}

/// Cosine similarity; zero-norm or non-finite input scores 0.0
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let score = dot / (norm_a * norm_b);
    if score.is_finite() {
        // -0.0 would sort below an equal +0.0 under total_cmp
        score + 0.0
    } else {
        0.0
    }
}
