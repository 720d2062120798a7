//! Search command handler.

use clap::Args;
use mentor_core::AppResult;
use mentor_knowledge::{KnowledgeEngine, SearchOptions};

/// Search career knowledge
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// Query text
    pub query: String,

    /// Restrict results to a job role (e.g. data_scientist)
    #[arg(short = 'r', long)]
    pub role: Option<String>,

    /// Restrict results to a content type (career_tip, resume_example)
    #[arg(short = 't', long = "type")]
    pub content_type: Option<String>,

    /// Number of results (default from config)
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Minimum similarity score
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(&self, engine: &KnowledgeEngine) -> AppResult<()> {
        tracing::info!("Executing search command");

        let options = SearchOptions {
            query: self.query.clone(),
            job_role: self.role.clone(),
            content_type: self.content_type.clone(),
            n_results: self.limit,
            similarity_threshold: self.threshold,
        };

        let response = engine.semantic_search(&options).await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
            return Ok(());
        }

        if response.used_fallback {
            println!("(semantic search unavailable, showing keyword matches)");
        }

        if response.results.is_empty() {
            println!("No matching knowledge found");
        }

        for (rank, hit) in response.results.iter().enumerate() {
            println!(
                "{}. [{:.3}] {} ({} / {})",
                rank + 1,
                hit.score,
                hit.content,
                hit.job_role,
                hit.content_type
            );
        }

        Ok(())
    }
}
