//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingProvider`] trait and two implementations:
//! - [`local::LocalEmbeddingProvider`]: all-MiniLM-L6-v2 via ONNX Runtime
//!   (384 dimensions, L2-normalized).
//! - [`hashing::HashingEmbeddingProvider`]: FNV-1a feature hashing into the same
//!   384 dimensions. Needs no model files.
//!
//! The provider is created via [`create_provider`] from configuration.

pub mod hashing;
pub mod local;

use anyhow::Result;

use crate::error::{SearchError, SearchResult};

/// Number of dimensions in the embedding vectors (all-MiniLM-L6-v2).
pub const EMBEDDING_DIM: usize = 384;

/// Trait for embedding text into vectors.
///
/// Implementations must be deterministic: the same text always yields the same
/// vector for a given model. All methods are synchronous; callers in async
/// contexts should use `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text string into a vector. The empty string is valid input.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of text strings, preserving input order.
    ///
    /// Must be observably equivalent to calling [`embed`](Self::embed) on each
    /// element. Implementations may override for batched inference.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Return the number of dimensions this provider produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Create an embedding provider from config.
///
/// Any load failure is reported as [`SearchError::ModelUnavailable`]; the caller
/// decides whether that is fatal (CLI search) or only disables search (server).
pub fn create_provider(
    config: &crate::config::EmbeddingConfig,
) -> SearchResult<Box<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = local::LocalEmbeddingProvider::new(config)
                .map_err(|e| SearchError::ModelUnavailable(format!("{e:#}")))?;
            Ok(Box::new(provider))
        }
        "hashing" => Ok(Box::new(hashing::HashingEmbeddingProvider::default())),
        other => Err(SearchError::ModelUnavailable(format!(
            "unknown embedding provider: {other}. Supported: local, hashing"
        ))),
    }
}

/// L2-normalize a vector. Returns the input unchanged if its norm is zero.
pub(crate) fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}
