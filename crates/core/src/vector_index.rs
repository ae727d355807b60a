use crate::error::IndexError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub text: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub position: usize,
    pub text: String,
    pub distance: f32,
}

/// Exact nearest-neighbor index over the chunks of one document.
///
/// Immutable once built; a re-upload builds and stores a new index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    embedding_model: String,
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn build(
        embedding_model: impl Into<String>,
        pairs: impl IntoIterator<Item = (Vec<f32>, String)>,
    ) -> Result<Self, IndexError> {
        let entries = pairs
            .into_iter()
            .map(|(vector, text)| IndexEntry { text, vector })
            .collect::<Vec<_>>();

        let dimension = entries.first().map(|entry| entry.vector.len()).ok_or(IndexError::Empty)?;
        if dimension == 0 {
            return Err(IndexError::InconsistentDimension {
                position: 0,
                expected: 1,
                found: 0,
            });
        }

        if let Some((position, entry)) = entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.vector.len() != dimension)
        {
            return Err(IndexError::InconsistentDimension {
                position,
                expected: dimension,
                found: entry.vector.len(),
            });
        }

        Ok(Self {
            embedding_model: embedding_model.into(),
            dimension,
            entries,
        })
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Checks invariants that `build` guarantees; used after deserialization.
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.entries.is_empty() {
            return Err(IndexError::Empty);
        }
        match self
            .entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.vector.len() != self.dimension)
        {
            Some((position, entry)) => Err(IndexError::InconsistentDimension {
                position,
                expected: self.dimension,
                found: entry.vector.len(),
            }),
            None => Ok(()),
        }
    }

    /// Returns the `min(k, len)` entries closest to `query` by L2 distance,
    /// nearest first; equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                index: self.dimension,
                query: query.len(),
            });
        }

        let mut scored = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, l2_distance(&entry.vector, query)))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| left.1.total_cmp(&right.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| SearchHit {
                position,
                text: self.entries[position].text.clone(),
                distance,
            })
            .collect())
    }
}

pub fn l2_distance(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right.iter())
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum::<f32>()
        .sqrt()
}
