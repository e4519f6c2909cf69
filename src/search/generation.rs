//! One immutable snapshot of the vector index.
//!
//! A [`Generation`] owns the vector matrix (row = slot) and the parallel list of
//! record ids. Both are fixed at construction; nothing mutates a generation after
//! it is published.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView1};
use serde::Serialize;

use crate::error::{SearchError, SearchResult};

/// A scored candidate from a nearest-neighbor scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub slot: usize,
    pub record_id: i64,
    /// Squared Euclidean distance to the query vector.
    pub distance: f32,
}

#[derive(Debug)]
pub struct Generation {
    number: u64,
    vectors: Array2<f32>,
    record_ids: Vec<i64>,
    built_at: Option<DateTime<Utc>>,
}

impl Generation {
    /// The generation an index starts with: number 0, no entries, never built.
    pub fn empty(dimensions: usize) -> Self {
        Self {
            number: 0,
            vectors: Array2::zeros((0, dimensions)),
            record_ids: Vec::new(),
            built_at: None,
        }
    }

    /// Assemble a generation from vectors in slot order.
    ///
    /// `record_ids[i]` owns `vectors[i]`. Fails if the lists differ in length or
    /// any vector is not `dimensions` long.
    pub fn build(
        number: u64,
        dimensions: usize,
        record_ids: Vec<i64>,
        vectors: Vec<Vec<f32>>,
    ) -> SearchResult<Self> {
        if record_ids.len() != vectors.len() {
            return Err(SearchError::Embedding(anyhow::anyhow!(
                "embedder returned {} vectors for {} records",
                vectors.len(),
                record_ids.len()
            )));
        }

        let mut flat = Vec::with_capacity(vectors.len() * dimensions);
        for vector in &vectors {
            if vector.len() != dimensions {
                return Err(SearchError::DimensionMismatch {
                    expected: dimensions,
                    actual: vector.len(),
                });
            }
            flat.extend_from_slice(vector);
        }

        let vectors = Array2::from_shape_vec((record_ids.len(), dimensions), flat)
            .map_err(|e| SearchError::Embedding(anyhow::anyhow!("bad vector matrix shape: {e}")))?;

        Ok(Self {
            number,
            vectors,
            record_ids,
            built_at: Some(Utc::now()),
        })
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn len(&self) -> usize {
        self.record_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record_ids.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }

    pub fn record_ids(&self) -> &[i64] {
        &self.record_ids
    }

    pub fn vector(&self, slot: usize) -> Option<ArrayView1<'_, f32>> {
        (slot < self.len()).then(|| self.vectors.row(slot))
    }

    /// The `top_k` entries closest to `query`, nearest first.
    ///
    /// Exhaustive scan. Ties on distance go to the lower slot. An empty generation
    /// or `top_k == 0` yields an empty list; `top_k` beyond the entry count yields
    /// every entry.
    pub fn nearest(&self, query: &[f32], top_k: usize) -> SearchResult<Vec<Neighbor>> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimensions() {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimensions(),
                actual: query.len(),
            });
        }

        let mut scored: Vec<Neighbor> = self
            .vectors
            .rows()
            .into_iter()
            .zip(&self.record_ids)
            .enumerate()
            .map(|(slot, (row, &record_id))| Neighbor {
                slot,
                record_id,
                distance: squared_l2(row, query),
            })
            .collect();

        let k = top_k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank_order);
            scored.truncate(k);
        }
        scored.sort_by(rank_order);
        Ok(scored)
    }
}

/// Total order used for ranking: distance, then slot.
///
/// `total_cmp` keeps the order total even if a NaN sneaks in (it sorts last).
fn rank_order(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.slot.cmp(&b.slot))
}

/// Sum of squared per-dimension differences, accumulated in dimension order.
pub fn squared_l2(row: ArrayView1<'_, f32>, query: &[f32]) -> f32 {
    row.iter().zip(query).fold(0.0f32, |acc, (a, b)| {
        let d = a - b;
        acc + d * d
    })
}
