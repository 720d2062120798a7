//! Career Mentor Core Library
//!
//! This crate provides the foundational utilities shared by the knowledge
//! engine and its command-line front end:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, EmbeddingConfig, KnowledgeConfig};
pub use error::{AppError, AppResult};
