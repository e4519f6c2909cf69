//! The process-wide vector index.
//!
//! Readers load the current [`Generation`] through an [`ArcSwap`] and keep that
//! `Arc` for the rest of their call, so a query sees exactly one generation even
//! if a rebuild publishes a new one mid-scan. A rebuild embeds everything into a
//! fresh generation off to the side and publishes it with a single `store`.
//! Until that store happens the previous generation stays current, which is also
//! what callers observe when a rebuild fails or is cancelled.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::generation::{Generation, Neighbor};
use crate::embedding::EmbeddingProvider;
use crate::error::{SearchError, SearchResult};

/// One record to index: its id and its projection text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub record_id: i64,
    pub projection: String,
}

impl IndexEntry {
    pub fn new(record_id: i64, projection: impl Into<String>) -> Self {
        Self {
            record_id,
            projection: projection.into(),
        }
    }
}

/// Outcome of a successful rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct RebuildReport {
    pub generation: u64,
    pub entries: usize,
    pub elapsed_ms: u64,
}

/// Snapshot of the current generation's metadata.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub generation: u64,
    pub entries: usize,
    pub dimensions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
}

/// Neighbors together with the generation they were scored against.
#[derive(Debug, Clone)]
pub struct ScoredQuery {
    pub generation: u64,
    pub neighbors: Vec<Neighbor>,
}

pub struct VectorIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    current: ArcSwap<Generation>,
    /// Serializes rebuilds. Readers never touch it.
    rebuild_lock: Mutex<()>,
    batch_size: usize,
}

impl VectorIndex {
    /// Create an index in the empty state. `batch_size` is clamped to at least 1.
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        let empty = Generation::empty(embedder.dimensions());
        Self {
            embedder,
            current: ArcSwap::from_pointee(empty),
            rebuild_lock: Mutex::new(()),
            batch_size: batch_size.max(1),
        }
    }

    /// Pin the current generation.
    pub fn current(&self) -> Arc<Generation> {
        self.current.load_full()
    }

    pub fn status(&self) -> IndexStatus {
        let generation = self.current.load();
        IndexStatus {
            generation: generation.number(),
            entries: generation.len(),
            dimensions: generation.dimensions(),
            built_at: generation.built_at(),
        }
    }

    /// Replace the current generation with one built from `entries`.
    ///
    /// Projections are embedded in batches on the blocking pool, in input order,
    /// so slot `i` belongs to `entries[i]`. Duplicate record ids are kept as
    /// separate slots. An empty `entries` publishes an empty generation.
    ///
    /// `cancel` is checked before every batch and once more before publishing.
    /// On cancellation or any embedding failure the partial work is dropped and
    /// the previous generation stays current. Dropping the returned future has
    /// the same effect.
    pub async fn rebuild(
        &self,
        entries: Vec<IndexEntry>,
        cancel: &CancellationToken,
    ) -> SearchResult<RebuildReport> {
        let _writer = self.rebuild_lock.lock().await;
        self.build_and_publish(entries, cancel, Instant::now()).await
    }

    /// Like [`rebuild`](Self::rebuild), but the entries come from `load`, which
    /// runs on the blocking pool after the writer lock is taken. Snapshots are
    /// therefore published in the order they were read: a rebuild that loaded
    /// older data can never land after one that loaded newer data.
    pub async fn rebuild_with<F>(
        &self,
        cancel: &CancellationToken,
        load: F,
    ) -> SearchResult<RebuildReport>
    where
        F: FnOnce() -> anyhow::Result<Vec<IndexEntry>> + Send + 'static,
    {
        let _writer = self.rebuild_lock.lock().await;
        let started = Instant::now();

        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }
        let entries = tokio::task::spawn_blocking(load)
            .await?
            .map_err(SearchError::Store)?;

        self.build_and_publish(entries, cancel, started).await
    }

    /// Embed `entries` and swap in the result. Callers hold `rebuild_lock`.
    async fn build_and_publish(
        &self,
        entries: Vec<IndexEntry>,
        cancel: &CancellationToken,
        started: Instant,
    ) -> SearchResult<RebuildReport> {
        let (record_ids, projections): (Vec<i64>, Vec<String>) = entries
            .into_iter()
            .map(|entry| (entry.record_id, entry.projection))
            .unzip();

        tracing::debug!(
            entries = record_ids.len(),
            batch_size = self.batch_size,
            "index rebuild started"
        );

        let mut vectors = Vec::with_capacity(projections.len());
        for chunk in projections.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                tracing::warn!(embedded = vectors.len(), "index rebuild cancelled");
                return Err(SearchError::Cancelled);
            }

            let texts = chunk.to_vec();
            let embedder = Arc::clone(&self.embedder);
            let batch = tokio::task::spawn_blocking(move || {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                embedder.embed_batch(&refs)
            })
            .await?
            .map_err(|e| {
                tracing::error!(error = %e, embedded = vectors.len(), "index rebuild failed");
                SearchError::Embedding(e)
            })?;

            if batch.len() != chunk.len() {
                return Err(SearchError::Embedding(anyhow::anyhow!(
                    "embedder returned {} vectors for a batch of {}",
                    batch.len(),
                    chunk.len()
                )));
            }
            vectors.extend(batch);
        }

        if cancel.is_cancelled() {
            tracing::warn!(embedded = vectors.len(), "index rebuild cancelled before publish");
            return Err(SearchError::Cancelled);
        }

        let number = self.current.load().number() + 1;
        let generation = Generation::build(number, self.embedder.dimensions(), record_ids, vectors)?;
        let entries = generation.len();
        self.current.store(Arc::new(generation));

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(generation = number, entries, elapsed_ms, "index rebuilt");

        Ok(RebuildReport {
            generation: number,
            entries,
            elapsed_ms,
        })
    }

    /// Record ids of the `top_k` entries nearest to `text`, nearest first.
    pub async fn query(&self, text: &str, top_k: usize) -> SearchResult<Vec<i64>> {
        let scored = self.query_scored(text, top_k).await?;
        Ok(scored.neighbors.into_iter().map(|n| n.record_id).collect())
    }

    /// Like [`query`](Self::query) but keeps slots, distances and the generation number.
    ///
    /// Input is validated before the embedder runs. An empty generation answers
    /// with no neighbors without embedding anything.
    pub async fn query_scored(&self, text: &str, top_k: usize) -> SearchResult<ScoredQuery> {
        validate_query(text, top_k)?;

        let generation = self.current();
        if generation.is_empty() {
            return Ok(ScoredQuery {
                generation: generation.number(),
                neighbors: Vec::new(),
            });
        }

        let embedder = Arc::clone(&self.embedder);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || -> SearchResult<ScoredQuery> {
            let vector = embedder.embed(&text).map_err(SearchError::Embedding)?;
            let neighbors = generation.nearest(&vector, top_k)?;
            Ok(ScoredQuery {
                generation: generation.number(),
                neighbors,
            })
        })
        .await?
    }
}

/// Reject blank query text and `top_k == 0`.
pub fn validate_query(text: &str, top_k: usize) -> SearchResult<()> {
    if text.trim().is_empty() {
        return Err(SearchError::InvalidQuery("query must not be empty".into()));
    }
    if top_k < 1 {
        return Err(SearchError::InvalidQuery("top_k must be at least 1".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::hashing::HashingEmbeddingProvider;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hashing embedder that counts how many texts it has embedded.
    struct CountingEmbedder {
        inner: HashingEmbeddingProvider,
        calls: AtomicUsize,
    }

    impl EmbeddingProvider for CountingEmbedder {
        fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }
    }

    fn hashing_index() -> VectorIndex {
        VectorIndex::new(Arc::new(HashingEmbeddingProvider::default()), 2)
    }

    fn people() -> Vec<IndexEntry> {
        vec![
            IndexEntry::new(1, "Alice Springfield"),
            IndexEntry::new(2, "Bob Capital City"),
        ]
    }

    #[tokio::test]
    async fn new_index_is_empty() {
        let index = hashing_index();
        let status = index.status();
        assert_eq!(status.generation, 0);
        assert_eq!(status.entries, 0);
        assert!(status.built_at.is_none());
        assert!(index.query("anyone", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rebuild_publishes_new_generation() {
        let index = hashing_index();
        let cancel = CancellationToken::new();

        let first = index.rebuild(people(), &cancel).await.unwrap();
        assert_eq!(first.generation, 1);
        assert_eq!(first.entries, 2);

        let second = index.rebuild(people(), &cancel).await.unwrap();
        assert_eq!(second.generation, 2);
        assert_eq!(index.status().generation, 2);
    }

    #[tokio::test]
    async fn rebuild_with_nothing_empties_the_index() {
        let index = hashing_index();
        let cancel = CancellationToken::new();
        index.rebuild(people(), &cancel).await.unwrap();
        assert!(!index.query("Alice", 5).await.unwrap().is_empty());

        let report = index.rebuild(Vec::new(), &cancel).await.unwrap();
        assert_eq!(report.entries, 0);
        assert!(index.query("Alice", 5).await.unwrap().is_empty());
        assert!(index.query("Bob", 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn alice_and_bob() {
        let index = hashing_index();
        index
            .rebuild(people(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(index.query("Alice", 1).await.unwrap(), vec![1]);
        assert_eq!(index.query("Bob", 2).await.unwrap(), vec![2, 1]);
    }

    #[tokio::test]
    async fn invalid_queries_never_reach_the_embedder() {
        let embedder = Arc::new(CountingEmbedder {
            inner: HashingEmbeddingProvider::default(),
            calls: AtomicUsize::new(0),
        });
        let index = VectorIndex::new(embedder.clone(), 8);
        index
            .rebuild(people(), &CancellationToken::new())
            .await
            .unwrap();
        let after_rebuild = embedder.calls.load(Ordering::SeqCst);

        for (text, k) in [("", 3), ("   \t", 3), ("Alice", 0)] {
            let err = index.query(text, k).await.unwrap_err();
            assert!(matches!(err, SearchError::InvalidQuery(_)), "{text:?}/{k}");
        }
        assert_eq!(embedder.calls.load(Ordering::SeqCst), after_rebuild);
    }

    #[tokio::test]
    async fn cancelled_rebuild_keeps_previous_generation() {
        let index = hashing_index();
        index
            .rebuild(people(), &CancellationToken::new())
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = index
            .rebuild(vec![IndexEntry::new(9, "Zed Nowhere")], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Cancelled));

        let status = index.status();
        assert_eq!(status.generation, 1);
        assert_eq!(status.entries, 2);
        assert_eq!(index.query("Alice", 1).await.unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn cancelled_empty_rebuild_keeps_previous_generation() {
        let index = hashing_index();
        index
            .rebuild(people(), &CancellationToken::new())
            .await
            .unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(index.rebuild(Vec::new(), &cancel).await.is_err());
        assert_eq!(index.status().entries, 2);
    }

    #[test]
    fn validate_query_rules() {
        assert!(validate_query("x", 1).is_ok());
        assert!(validate_query(" x ", 100).is_ok());
        assert!(validate_query("", 1).is_err());
        assert!(validate_query("x", 0).is_err());
    }
}
