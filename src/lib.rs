//! docqa - Document question answering
//!
//! Retrieval-augmented generation over a single document:
//!
//! - **document**: PDF / text loading, one entry per page
//! - **chunking**: overlapping character windows
//! - **embedding**: Ollama or in-process sentence-transformer vectors
//! - **index**: exact cosine top-k search
//! - **prompt** and **llm**: "stuff" prompt sent to watsonx.ai or Ollama
//! - **pipeline**: the staged orchestrator tying it together

pub mod errors;
pub mod config;
pub mod http;
pub mod retry;

pub mod document;
pub mod chunking;
pub mod embedding;
pub mod index;
pub mod llm;
pub mod prompt;
pub mod pipeline;

pub mod cli;

// Re-export commonly used types
pub use config::Config;
pub use errors::{QaError, Result};
pub use pipeline::{Answer, QaPipeline, RunStats};
