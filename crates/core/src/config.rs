//! Configuration management for the career mentor engine.
//!
//! This module handles loading and merging configuration from multiple sources:
//! - Built-in defaults
//! - Config file (`.mentor/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! Configuration is read once at startup and not mutated afterwards.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Embedding providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["trigram", "ollama"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .mentor/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Knowledge store settings
    pub knowledge: KnowledgeConfig,

    /// Embedder settings
    pub embedding: EmbeddingConfig,
}

/// Record store and search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeConfig {
    /// Directory holding the persisted store. Relative paths are resolved
    /// against the workspace.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    /// Result count used when a search does not specify one
    #[serde(default = "default_results")]
    pub default_results: usize,

    /// Minimum cosine score for semantic results
    #[serde(default)]
    pub similarity_threshold: Option<f32>,

    /// Cosine score above which new knowledge is rejected as a duplicate
    #[serde(default = "default_duplicate_threshold")]
    pub duplicate_threshold: Option<f32>,

    /// Populate an empty store with the built-in career corpus
    #[serde(default = "default_seed_on_init")]
    pub seed_on_init: bool,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".mentor").join("vector_db")
}

fn default_results() -> usize {
    5
}

fn default_duplicate_threshold() -> Option<f32> {
    Some(0.95)
}

fn default_seed_on_init() -> bool {
    true
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            default_results: default_results(),
            similarity_threshold: None,
            duplicate_threshold: default_duplicate_threshold(),
            seed_on_init: default_seed_on_init(),
        }
    }
}

/// Embedder settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddingConfig {
    /// Provider name: "trigram" or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model identifier (provider-specific)
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding vector dimensions
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Base URL for HTTP-backed providers
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Request timeout for HTTP-backed providers
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "trigram".to_string()
}

fn default_model() -> String {
    "trigram-v1".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_timeout_secs() -> u64 {
    30
}

/// Model and dimensions a provider runs with unless configured otherwise.
fn provider_defaults(provider: &str) -> Option<(&'static str, usize)> {
    match provider {
        "trigram" => Some(("trigram-v1", 384)),
        "ollama" => Some(("nomic-embed-text", 768)),
        _ => None,
    }
}

impl EmbeddingConfig {
    /// Switch to `provider`. Model and dimensions follow the new provider's
    /// defaults unless they were changed from the current provider's.
    pub fn set_provider(&mut self, provider: String) {
        let at_defaults =
            provider_defaults(&self.provider) == Some((self.model.as_str(), self.dimensions));
        if at_defaults {
            if let Some((model, dimensions)) = provider_defaults(&provider) {
                self.model = model.to_string();
                self.dimensions = dimensions;
            }
        }
        self.provider = provider;
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            dimensions: default_dimensions(),
            endpoint: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    workspace: Option<WorkspaceSection>,
    logging: Option<LoggingSection>,
    knowledge: Option<KnowledgeConfig>,
    embedding: Option<EmbeddingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WorkspaceSection {
    path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingSection {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            knowledge: KnowledgeConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, the YAML file and the environment.
    ///
    /// Environment variables:
    /// - `MENTOR_WORKSPACE`: Override workspace path
    /// - `MENTOR_CONFIG`: Path to config file
    /// - `MENTOR_STORE_PATH`: Knowledge store directory
    /// - `MENTOR_EMBEDDING_PROVIDER`: Embedding provider
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use mentor_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Store: {:?}", config.knowledge_config().store_path);
    /// ```
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Load configuration, letting explicit paths win over the environment.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace
            .or_else(|| std::env::var("MENTOR_WORKSPACE").ok().map(PathBuf::from))
        {
            config.workspace = workspace;
        }

        config.config_file =
            config_file.or_else(|| std::env::var("MENTOR_CONFIG").ok().map(PathBuf::from));

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config
            .config_file
            .clone()
            .unwrap_or_else(|| config.mentor_dir().join("config.yaml"));

        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override YAML config
        if let Ok(store_path) = std::env::var("MENTOR_STORE_PATH") {
            config.knowledge.store_path = PathBuf::from(store_path);
        }

        if let Ok(provider) = std::env::var("MENTOR_EMBEDDING_PROVIDER") {
            config.embedding.set_provider(provider);
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(path) = config_file.workspace.and_then(|ws| ws.path) {
            result.workspace = PathBuf::from(path);
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(knowledge) = config_file.knowledge {
            result.knowledge = knowledge;
        }

        if let Some(embedding) = config_file.embedding {
            // Fields left out of the file take the chosen provider's defaults
            let provider = embedding.provider.clone();
            result.embedding = EmbeddingConfig {
                provider: default_provider(),
                ..embedding
            };
            result.embedding.set_provider(provider);
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over environment variables and
    /// the config file.
    pub fn with_overrides(
        mut self,
        store_path: Option<PathBuf>,
        embedding_provider: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(store_path) = store_path {
            self.knowledge.store_path = store_path;
        }

        if let Some(provider) = embedding_provider {
            self.embedding.set_provider(provider);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .mentor directory.
    pub fn mentor_dir(&self) -> PathBuf {
        self.workspace.join(".mentor")
    }

    /// Knowledge settings with the store path resolved against the workspace.
    pub fn knowledge_config(&self) -> KnowledgeConfig {
        let mut knowledge = self.knowledge.clone();
        if knowledge.store_path.is_relative() {
            knowledge.store_path = self.workspace.join(&knowledge.store_path);
        }
        knowledge
    }

    /// Embedder settings with `OLLAMA_URL` applied when no endpoint is set.
    pub fn embedding_config(&self) -> EmbeddingConfig {
        let mut embedding = self.embedding.clone();
        if embedding.endpoint.is_none() {
            embedding.endpoint = std::env::var("OLLAMA_URL").ok();
        }
        embedding
    }

    /// Validate configuration values.
    pub fn validate(&self) -> AppResult<()> {
        let provider = &self.embedding.provider;
        if !KNOWN_PROVIDERS.contains(&provider.as_str()) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        if self.knowledge.default_results == 0 {
            return Err(AppError::Config(
                "Default result count must be greater than zero".to_string(),
            ));
        }

        for (name, threshold) in [
            ("similarityThreshold", self.knowledge.similarity_threshold),
            ("duplicateThreshold", self.knowledge.duplicate_threshold),
        ] {
            if let Some(value) = threshold {
                if !(-1.0..=1.0).contains(&value) {
                    return Err(AppError::Config(format!(
                        "{} must lie in [-1, 1], got {}",
                        name, value
                    )));
                }
            }
        }

        Ok(())
    }
}
