//! CLI `doctor` command: database and embedding model diagnostics.

use anyhow::{Context, Result};

use roster::config::RosterConfig;
use roster::db;

pub fn doctor(config: &RosterConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    println!("Roster Health Report");
    println!("====================");
    println!();

    if db_path.exists() {
        let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
        let conn =
            db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
        let report = db::check_database_health(&conn).context("failed to run health check")?;

        println!("Database:          {}", db_path.display());
        println!("File size:         {}", format_bytes(file_size));
        println!("Schema version:    {}", report.schema_version);
        println!("Employees:         {}", report.employee_count);
        println!("Audit log:         {}", report.audit_count);
        if report.integrity_ok {
            println!("Integrity check:   PASSED");
        } else {
            println!("Integrity check:   FAILED ({})", report.integrity_details);
            println!("  Restore from a backup: cp backup.db {}", db_path.display());
        }
    } else {
        println!("Database:          not found at {}", db_path.display());
        println!("  It is created on the first `roster serve`.");
    }

    println!();
    println!("Embedding provider: {}", config.embedding.provider);
    if config.embedding.provider == "local" {
        let (model_path, tokenizer_path) = super::model_files(&config.embedding);
        println!("  Model:           {}", presence(&model_path));
        println!("  Tokenizer:       {}", presence(&tokenizer_path));
    }
    match roster::embedding::create_provider(&config.embedding) {
        Ok(provider) => println!("  Status:          OK ({} dimensions)", provider.dimensions()),
        Err(e) => {
            println!("  Status:          UNAVAILABLE ({e})");
            println!("  Semantic search is disabled; employee CRUD still works.");
        }
    }

    Ok(())
}

fn presence(path: &std::path::Path) -> String {
    if path.exists() {
        format!("found at {}", path.display())
    } else {
        format!("missing ({})", path.display())
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
