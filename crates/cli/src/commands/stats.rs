//! Stats command handler.

use clap::Args;
use mentor_core::AppResult;
use mentor_knowledge::KnowledgeEngine;

/// Show knowledge store statistics
#[derive(Args, Debug)]
pub struct StatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatsCommand {
    pub fn execute(&self, engine: &KnowledgeEngine) -> AppResult<()> {
        tracing::info!("Executing stats command");

        let stats = engine.stats();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
            return Ok(());
        }

        println!("Status: {}", stats.status);
        println!("  Documents: {}", stats.count);
        println!("  Dimensions: {}", stats.dimensions);
        println!("  Store: {}", stats.store_path.display());
        if let Some(embedder) = &stats.embedder {
            println!("  Embedder: {}", embedder);
        }
        if let Some(reason) = &stats.degraded_reason {
            println!("  Degraded: {}", reason);
        }

        Ok(())
    }
}
