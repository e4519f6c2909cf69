use anyhow::Result;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use roster::config::RosterConfig;
use roster::search::SearchService;

/// Build an index from the database, run one query and print the hits.
pub async fn search(config: &RosterConfig, query: &str, top_k: Option<usize>) -> Result<()> {
    let db_path = config.resolved_db_path();
    let conn = roster::db::open_database(&db_path)?;

    let provider = roster::embedding::create_provider(&config.embedding)?;
    let service = SearchService::with_embedder(
        Arc::from(provider),
        Arc::new(Mutex::new(conn)),
        config.search.clone(),
    );

    let report = service.rebuild_from_store(&CancellationToken::new()).await?;
    tracing::debug!(entries = report.entries, elapsed_ms = report.elapsed_ms, "index built");

    let response = service.search_records(query, top_k).await?;
    if response.results.is_empty() {
        println!("No matching employees ({} indexed).", report.entries);
        return Ok(());
    }

    println!("{} result(s) for \"{}\"\n", response.results.len(), response.query);
    for (i, hit) in response.results.iter().enumerate() {
        let e = &hit.employee;
        println!("  {}. #{} {} (distance: {:.4})", i + 1, e.id, e.name, hit.distance);
        println!("     {} | {}", e.address, e.contact_number);
    }

    Ok(())
}
