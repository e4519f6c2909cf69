mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use roster::config::RosterConfig;

#[derive(Parser)]
#[command(name = "roster", version, about = "Employee records service with semantic search")]
struct Cli {
    /// Config file (defaults to ~/.roster/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
    /// Build an index from the database and run one semantic query
    Search {
        query: String,
        /// Number of results (defaults to search.default_top_k)
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Check database and embedding model health
    Doctor,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to the configured cache directory
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RosterConfig::load_from(path)?,
        None => RosterConfig::load()?,
    };

    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => roster::server::serve(config).await?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
        },
        Command::Search { query, top_k } => cli::search::search(&config, &query, top_k).await?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
