//! Error types for docqa
//!
//! Every pipeline stage returns [`QaError`]. Errors are never swallowed:
//! a failure aborts the run and reaches the caller unchanged.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the question-answering pipeline
#[derive(Error, Debug)]
pub enum QaError {
    /// Input document does not exist
    #[error("Document not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Document exists but could not be parsed
    #[error("Failed to parse document: {0}")]
    Parse(String),

    /// Embedding backend failed
    #[error("Embedding service error: {0}")]
    EmbeddingService(String),

    /// Vector index built from zero chunks
    #[error("Cannot build a vector index from zero chunks")]
    EmptyIndex,

    /// Vectors of different lengths met in one index
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Missing or rejected credentials
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Model service rejected the request or is unreachable
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Deadline exceeded
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Invalid configuration or input
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline stage machine misuse
    #[error("Invalid stage transition from {from}: {reason}")]
    InvalidTransition { from: String, reason: String },

    /// Run cancelled before completion
    #[error("Operation cancelled")]
    Cancelled,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, QaError>;

impl QaError {
    /// Transient failures that a retry may cure
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            QaError::EmbeddingService(_) | QaError::ModelUnavailable(_) | QaError::Timeout { .. }
        )
    }

    /// Build a timeout error for the named operation
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        QaError::Timeout {
            operation: operation.into(),
            duration_ms: duration.as_millis() as u64,
        }
    }
}
