//! Add command handler.

use clap::Args;
use mentor_core::AppResult;
use mentor_knowledge::KnowledgeEngine;

/// Add a piece of career knowledge
#[derive(Args, Debug)]
pub struct AddCommand {
    /// Knowledge text
    pub content: String,

    /// Job role the knowledge applies to
    #[arg(short = 'r', long)]
    pub role: String,

    /// Content type
    #[arg(short = 't', long = "type", default_value = "career_tip")]
    pub content_type: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AddCommand {
    pub async fn execute(&self, engine: &KnowledgeEngine) -> AppResult<()> {
        tracing::info!("Executing add command for role '{}'", self.role);

        let id = engine
            .add_knowledge(&self.content, &self.role, &self.content_type)
            .await?;

        if self.json {
            let output = serde_json::json!({ "id": id });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Added {}", id);
        }

        Ok(())
    }
}
