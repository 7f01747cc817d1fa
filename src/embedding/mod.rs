//! Embedding providers
//!
//! Maps text to fixed-length vectors:
//! - `OllamaEmbedder`: remote model behind Ollama's HTTP API
//! - `LocalEmbedder`: sentence-transformer run in-process with candle
//! - `embed_chunks`: bounded-concurrency embedding of a whole document

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{EmbeddingBackend, EmbeddingConfig};
use crate::errors::Result;

pub mod batch;
pub mod local;
pub mod ollama;

pub use batch::{embed_chunks, EmbedOptions};
pub use local::LocalEmbedder;
pub use ollama::OllamaEmbedder;

/// Text-to-vector model
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one piece of text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, for logs
    fn model_name(&self) -> &str;
}

/// Construct the configured embedder
pub async fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.backend {
        EmbeddingBackend::Ollama => Ok(Arc::new(OllamaEmbedder::new(
            &config.base_url,
            &config.model,
            config.timeout(),
        )?)),
        EmbeddingBackend::Local => {
            let embedder =
                LocalEmbedder::load(&config.model, config.load_timeout(), config.timeout()).await?;
            Ok(Arc::new(embedder))
        }
    }
}
