//! Embedding capability for the knowledge engine.
//!
//! The engine treats embedding generation as an opaque external capability
//! behind [`EmbeddingProvider`]. Providers either return a full vector of the
//! advertised dimensionality or fail with `EmbeddingUnavailable`.

pub mod provider;
pub mod providers;

pub use mentor_core::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
