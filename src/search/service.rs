//! Boundary between the vector index and the record store.
//!
//! [`SearchService`] pulls records out of SQLite to rebuild the index and turns
//! ranked ids back into employees. It is also where a missing embedding model is
//! absorbed: the service still exists, it just answers every search call with
//! [`SearchError::ModelUnavailable`].

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::index::{IndexEntry, IndexStatus, RebuildReport, VectorIndex};
use crate::config::SearchConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{SearchError, SearchResult};
use crate::records::{store, Employee};

/// A hydrated search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub employee: Employee,
    pub distance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub generation: u64,
    /// Ranked ids as returned by the index, including any that no longer exist.
    pub ids: Vec<i64>,
    pub results: Vec<SearchHit>,
    /// Ids dropped because their record was deleted after the last rebuild.
    pub stale_dropped: usize,
}

pub struct SearchService {
    index: Result<Arc<VectorIndex>, String>,
    db: Arc<Mutex<Connection>>,
    config: SearchConfig,
}

impl SearchService {
    /// Build the service from the outcome of [`crate::embedding::create_provider`].
    pub fn new(
        embedder: SearchResult<Arc<dyn EmbeddingProvider>>,
        db: Arc<Mutex<Connection>>,
        config: SearchConfig,
    ) -> Self {
        let index = match embedder {
            Ok(embedder) => Ok(Arc::new(VectorIndex::new(
                embedder,
                config.rebuild_batch_size,
            ))),
            Err(e) => {
                tracing::warn!(error = %e, "semantic search disabled");
                Err(match e {
                    SearchError::ModelUnavailable(reason) => reason,
                    other => other.to_string(),
                })
            }
        };
        Self { index, db, config }
    }

    pub fn with_embedder(
        embedder: Arc<dyn EmbeddingProvider>,
        db: Arc<Mutex<Connection>>,
        config: SearchConfig,
    ) -> Self {
        Self::new(Ok(embedder), db, config)
    }

    pub fn is_available(&self) -> bool {
        self.index.is_ok()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn index(&self) -> SearchResult<&Arc<VectorIndex>> {
        self.index
            .as_ref()
            .map_err(|reason| SearchError::ModelUnavailable(reason.clone()))
    }

    pub fn status(&self) -> SearchResult<IndexStatus> {
        Ok(self.index()?.status())
    }

    /// Read every employee and rebuild the index from their projections.
    ///
    /// The read happens under the index's writer lock, so overlapping rebuilds
    /// publish snapshots in the order they were taken.
    pub async fn rebuild_from_store(
        &self,
        cancel: &CancellationToken,
    ) -> SearchResult<RebuildReport> {
        let index = self.index()?;

        let db = Arc::clone(&self.db);
        index
            .rebuild_with(cancel, move || {
                let conn = db
                    .lock()
                    .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
                load_index_entries(&conn)
            })
            .await
    }

    /// Ranked record ids for `query`. `top_k` defaults to the configured value.
    pub async fn search(&self, query: &str, top_k: Option<usize>) -> SearchResult<Vec<i64>> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        self.index()?.query(query, top_k).await
    }

    /// [`search`](Self::search) followed by hydration from the record store.
    ///
    /// Hits keep their rank order. Ids whose record has been deleted since the
    /// last rebuild are skipped and counted in `stale_dropped`.
    pub async fn search_records(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> SearchResult<SearchResponse> {
        let top_k = top_k.unwrap_or(self.config.default_top_k);
        let scored = self.index()?.query_scored(query, top_k).await?;
        let ids: Vec<i64> = scored.neighbors.iter().map(|n| n.record_id).collect();

        let db = Arc::clone(&self.db);
        let lookup = ids.clone();
        let records = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            store::fetch_employees_by_ids(&conn, &lookup)
        })
        .await?
        .map_err(SearchError::Store)?;

        let results: Vec<SearchHit> = scored
            .neighbors
            .iter()
            .filter_map(|neighbor| {
                records.get(&neighbor.record_id).map(|employee| SearchHit {
                    employee: employee.clone(),
                    distance: neighbor.distance,
                })
            })
            .collect();

        let stale_dropped = ids.len() - results.len();
        if stale_dropped > 0 {
            tracing::debug!(stale_dropped, generation = scored.generation, "dropped stale search hits");
        }

        Ok(SearchResponse {
            query: query.to_string(),
            generation: scored.generation,
            ids,
            results,
            stale_dropped,
        })
    }
}

/// Every employee as an [`IndexEntry`], in primary-key order.
pub fn load_index_entries(conn: &Connection) -> anyhow::Result<Vec<IndexEntry>> {
    let employees = store::list_employees(conn).context("failed to read employees for indexing")?;
    Ok(employees
        .iter()
        .map(|e| IndexEntry::new(e.id, e.projection()))
        .collect())
}

/// Turn an optional signed `top_k` from a request into a count.
pub fn resolve_top_k(requested: Option<i64>, default: usize) -> SearchResult<usize> {
    match requested {
        None => Ok(default),
        Some(k) if k < 1 => Err(SearchError::InvalidQuery(format!(
            "top_k must be at least 1, got {k}"
        ))),
        Some(k) => Ok(usize::try_from(k).unwrap_or(usize::MAX)),
    }
}

/// Rebuild every `every` until `shutdown` fires. The first rebuild happens one
/// full interval after the call.
pub fn spawn_periodic_rebuild(
    service: Arc<SearchService>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match service.rebuild_from_store(&shutdown).await {
                        Ok(report) => tracing::debug!(generation = report.generation, "periodic rebuild done"),
                        Err(SearchError::Cancelled) => break,
                        Err(e) => tracing::warn!(error = %e, "periodic rebuild failed"),
                    }
                }
            }
        }
        tracing::debug!("periodic rebuild task stopped");
    })
}
