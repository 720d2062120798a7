//! Reset command handler.

use clap::Args;
use mentor_core::{AppError, AppResult};
use mentor_knowledge::KnowledgeEngine;

/// Delete all stored knowledge
#[derive(Args, Debug)]
pub struct ResetCommand {
    /// Confirm the reset
    #[arg(short, long)]
    pub yes: bool,
}

impl ResetCommand {
    pub fn execute(&self, engine: &KnowledgeEngine) -> AppResult<()> {
        if !self.yes {
            return Err(AppError::Config(
                "Refusing to delete all knowledge without --yes".to_string(),
            ));
        }

        tracing::info!("Executing reset command");
        let count = engine.stats().count;
        engine.reset()?;
        println!("Removed {} documents", count);

        Ok(())
    }
}
