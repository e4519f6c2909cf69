//! Semantic search endpoints.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use super::error::ApiError;
use super::AppState;
use crate::search::service::resolve_top_k;
use crate::search::{IndexStatus, RebuildReport, SearchResponse};

#[derive(Debug, Deserialize)]
pub struct SemanticSearchParams {
    #[serde(default)]
    pub query: String,
    pub top_k: Option<i64>,
}

pub async fn semantic_search(
    State(state): State<AppState>,
    params: Result<Query<SemanticSearchParams>, QueryRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(params) = params?;
    let top_k = resolve_top_k(params.top_k, state.search.config().default_top_k)?;
    let response = state
        .with_timeout(async {
            Ok::<_, ApiError>(state.search.search_records(&params.query, Some(top_k)).await?)
        })
        .await?;
    tracing::info!(
        query_len = params.query.len(),
        top_k,
        hits = response.results.len(),
        generation = response.generation,
        "semantic search"
    );
    Ok(Json(response))
}

/// Rebuild from the current store contents. A timeout or server shutdown aborts
/// the rebuild and leaves the previous generation in place.
pub async fn rebuild_index(State(state): State<AppState>) -> Result<Json<RebuildReport>, ApiError> {
    let cancel = state.shutdown.child_token();
    let report = state
        .with_timeout(async { Ok::<_, ApiError>(state.search.rebuild_from_store(&cancel).await?) })
        .await?;
    Ok(Json(report))
}

pub async fn index_status(State(state): State<AppState>) -> Result<Json<IndexStatus>, ApiError> {
    Ok(Json(state.search.status()?))
}
