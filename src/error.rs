//! Error type for the semantic search subsystem.
//!
//! Record-store code uses `anyhow` throughout; only the search path needs a typed
//! error, because callers distinguish client mistakes, an unavailable model, and
//! cancellation.

use thiserror::Error;

/// Result alias for search operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The embedding model could not be loaded. Search stays down; CRUD is unaffected.
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// Rejected before the embedder was invoked.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("rebuild cancelled")]
    Cancelled,

    #[error("record store error: {0:#}")]
    Store(anyhow::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SearchError {
    /// `true` for errors caused by caller input rather than server state.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidQuery(_))
    }
}
