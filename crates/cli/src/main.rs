//! Career Mentor CLI
//!
//! Main entry point for the mentor command-line tool.
//! Searches, extends and inspects the career knowledge store.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AddCommand, ResetCommand, SearchCommand, StatsCommand};
use mentor_core::{config::AppConfig, logging, AppResult};
use mentor_knowledge::{create_provider, EmbeddingProvider, KnowledgeEngine};
use std::path::PathBuf;
use std::sync::Arc;

/// Career Mentor CLI - semantic career knowledge retrieval
#[derive(Parser, Debug)]
#[command(name = "mentor")]
#[command(about = "Semantic career knowledge retrieval", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "MENTOR_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "MENTOR_CONFIG")]
    config: Option<PathBuf>,

    /// Knowledge store directory
    #[arg(long, global = true, env = "MENTOR_STORE_PATH")]
    store: Option<PathBuf>,

    /// Embedding provider (trigram, ollama)
    #[arg(short, long, global = true, env = "MENTOR_EMBEDDING_PROVIDER")]
    embedding_provider: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search career knowledge
    Search(SearchCommand),

    /// Add a piece of career knowledge
    Add(AddCommand),

    /// Show knowledge store statistics
    Stats(StatsCommand),

    /// Delete all stored knowledge
    Reset(ResetCommand),
}

/// Build the configured embedder; an embedder that cannot start leaves the
/// engine to run degraded.
async fn open_engine(config: &AppConfig) -> AppResult<KnowledgeEngine> {
    let embedder: Option<Arc<dyn EmbeddingProvider>> =
        match create_provider(&config.embedding_config()).await {
            Ok(provider) => Some(provider),
            Err(e) => {
                tracing::warn!("Embedding provider unavailable: {}", e);
                None
            }
        };

    KnowledgeEngine::open(config.knowledge_config(), embedder).await
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load base configuration from environment and config file
    let config = AppConfig::load_with(cli.workspace, cli.config)?;

    // Apply CLI overrides
    let config = config.with_overrides(
        cli.store,
        cli.embedding_provider,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );
    config.validate()?;

    // Initialize logging with final configuration
    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Career mentor CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Embedding provider: {}", config.embedding.provider);

    let command_name = match &cli.command {
        Commands::Search(_) => "search",
        Commands::Add(_) => "add",
        Commands::Stats(_) => "stats",
        Commands::Reset(_) => "reset",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let engine = open_engine(&config).await?;

    // Route to command handlers
    let result = match cli.command {
        Commands::Search(cmd) => cmd.execute(&engine).await,
        Commands::Add(cmd) => cmd.execute(&engine).await,
        Commands::Stats(cmd) => cmd.execute(&engine),
        Commands::Reset(cmd) => cmd.execute(&engine),
    };

    // Pending persistence is flushed even when the command failed
    let shutdown = engine.shutdown();

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result.and(shutdown)
}
