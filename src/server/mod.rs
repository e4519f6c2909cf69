//! HTTP server.
//!
//! [`router`] wires the employee CRUD endpoints and the semantic search endpoints
//! onto a shared [`AppState`]; [`serve`] opens the database, builds the embedder,
//! and runs the router until Ctrl-C.

pub mod employees;
pub mod error;
pub mod search;

use std::future::Future;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use rusqlite::Connection;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::RosterConfig;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::error::SearchResult;
use crate::search::service::spawn_periodic_rebuild;
use crate::search::SearchService;
use error::ApiError;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub search: Arc<SearchService>,
    pub config: Arc<RosterConfig>,
    /// Cancelled when the server begins shutting down.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// `embedder` is the outcome of loading the model. A failure only disables the
    /// semantic search endpoints.
    pub fn new(
        conn: Connection,
        embedder: SearchResult<Arc<dyn EmbeddingProvider>>,
        config: RosterConfig,
    ) -> Self {
        let db = Arc::new(Mutex::new(conn));
        let search = Arc::new(SearchService::new(
            embedder,
            Arc::clone(&db),
            config.search.clone(),
        ));
        Self {
            db,
            search,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }

    /// Run `f` against the database on the blocking pool.
    pub async fn with_db<F, T>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Connection) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(&self.db);
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            f(&mut conn)
        })
        .await?;
        Ok(result?)
    }

    /// Bound `fut` by the configured request timeout. On expiry the future is
    /// dropped, which abandons any rebuild or query it was driving.
    pub async fn with_timeout<F, T>(&self, fut: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        let limit = self.config.server.request_timeout();
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout(limit)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(root))
        .route(
            "/employees",
            get(employees::list_employees).post(employees::create_employee),
        )
        .route("/employees/search", get(employees::search_by_name))
        .route(
            "/employees/{id}",
            get(employees::get_employee)
                .put(employees::update_employee)
                .delete(employees::delete_employee),
        )
        .route("/employees/{id}/audit", get(employees::employee_audit))
        .route("/stats/employees", get(employees::employee_count))
        .route("/semantic-search", get(search::semantic_search))
        .route("/semantic-search/rebuild", post(search::rebuild_index))
        .route("/semantic-search/status", get(search::index_status))
        .layer(TraceLayer::new_for_http());

    if state.config.server.cors_permissive {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    app.with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "roster",
        "version": env!("CARGO_PKG_VERSION"),
        "semantic_search": state.search.is_available(),
    }))
}

/// Open the database and build the embedder. Model failures are logged and
/// carried into the state rather than aborting startup.
fn setup_shared_state(config: RosterConfig) -> Result<AppState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path)?;
    tracing::info!(db = %db_path.display(), "database ready");

    let embedder: SearchResult<Arc<dyn EmbeddingProvider>> =
        embedding::create_provider(&config.embedding).map(Arc::from);
    if embedder.is_ok() {
        tracing::info!(provider = %config.embedding.provider, "embedding provider ready");
    }

    Ok(AppState::new(conn, embedder, config))
}

/// Run the HTTP server until Ctrl-C.
pub async fn serve(config: RosterConfig) -> Result<()> {
    let bind_addr = config.server.bind_addr();
    let state = setup_shared_state(config)?;

    if state.search.is_available() && state.search.config().rebuild_on_start {
        let search = Arc::clone(&state.search);
        let cancel = state.shutdown.child_token();
        tokio::spawn(async move {
            match search.rebuild_from_store(&cancel).await {
                Ok(report) => tracing::info!(
                    generation = report.generation,
                    entries = report.entries,
                    elapsed_ms = report.elapsed_ms,
                    "initial index build complete"
                ),
                Err(e) => tracing::warn!(error = %e, "initial index build failed"),
            }
        });
    }

    let periodic = match state.search.config().rebuild_interval() {
        Some(every) if state.search.is_available() => Some(spawn_periodic_rebuild(
            Arc::clone(&state.search),
            every,
            state.shutdown.clone(),
        )),
        _ => None,
    };

    let shutdown = state.shutdown.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "roster listening at http://{bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(handle) = periodic {
        let _ = handle.await;
    }
    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                shutdown.cancelled().await;
                return;
            }
            tracing::info!("shutting down");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.cancel();
}
