//! Configuration management for docqa
//!
//! Provides TOML-based configuration with defaults and validation.
//! Location: ~/.docqa/config.toml, or any file passed with `--config`.
//! Every section is optional; missing keys fall back to defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::embedding::ollama::{DEFAULT_EMBED_MODEL, DEFAULT_OLLAMA_URL};
use crate::errors::{QaError, Result};
use crate::llm::{DecodingMethod, GenerationParams};

/// Complete configuration for a question-answering run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub document: DocumentConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub prompt: PromptConfig,
    pub generation: GenerationConfig,
    pub retry: RetryConfig,
}

/// Document loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    pub load_timeout_secs: u64,
}

/// Sliding-window chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters
    pub window: usize,
    /// Characters shared by consecutive windows
    pub overlap: usize,
    /// Inserted between pages when concatenating
    pub page_separator: String,
}

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// Ollama `/api/embeddings`
    Ollama,
    /// In-process sentence-transformer via candle
    Local,
}

/// Embedding provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model: String,
    pub base_url: String,
    /// Deadline for one embedding request
    pub timeout_secs: u64,
    /// Deadline for downloading and loading a local model
    pub load_timeout_secs: u64,
    /// Upper bound on concurrent embedding requests
    pub max_parallel: usize,
}

/// Retrieval settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

/// Prompt assembly settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Token budget for retrieved context; `None` stuffs every chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_tokens: Option<usize>,
}

/// Which generation backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmBackend {
    Watsonx,
    Ollama,
}

/// Language model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub backend: LlmBackend,
    pub model_id: String,
    /// watsonx.ai endpoint
    pub url: String,
    /// IBM Cloud IAM endpoint for API-key exchange
    pub iam_url: String,
    /// Ollama endpoint, used when `backend = "ollama"`
    pub ollama_url: String,
    pub timeout_secs: u64,
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub decoding: DecodingMethod,
    /// Narrowed to `f32` in `params()`
    pub temperature: f64,
}

/// Retry with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            load_timeout_secs: 60,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            window: 1000,
            overlap: 100,
            page_separator: "\n".to_string(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model: DEFAULT_EMBED_MODEL.to_string(),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: 30,
            load_timeout_secs: 600,
            max_parallel: num_cpus::get().max(1),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackend::Watsonx,
            model_id: "meta-llama/llama-2-70b-chat".to_string(),
            url: "https://us-south.ml.cloud.ibm.com".to_string(),
            iam_url: "https://iam.cloud.ibm.com".to_string(),
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            timeout_secs: 120,
            max_new_tokens: 300,
            min_new_tokens: 100,
            decoding: DecodingMethod::Greedy,
            temperature: 0.7,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl DocumentConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Generation parameters sent with every request
    pub fn params(&self) -> GenerationParams {
        GenerationParams {
            max_new_tokens: self.max_new_tokens,
            min_new_tokens: self.min_new_tokens,
            decoding: self.decoding,
            temperature: self.temperature as f32,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(config_path) => Self::load_from_file(config_path),
            None => Self::load_default(),
        }
    }

    /// Load configuration from specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            QaError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| QaError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from the standard location, or fall back to built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Some(config_path) = Self::default_path() {
            if config_path.exists() {
                return Self::load_from_file(&config_path);
            }
        }

        Ok(Config::default())
    }

    /// `~/.docqa/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".docqa").join("config.toml"))
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.chunking.window == 0 {
            return Err(QaError::Config(
                "chunking.window must be greater than 0".to_string(),
            ));
        }

        if self.chunking.overlap >= self.chunking.window {
            return Err(QaError::Config(format!(
                "chunking.overlap ({}) must be less than chunking.window ({})",
                self.chunking.overlap, self.chunking.window
            )));
        }

        if self.embedding.max_parallel == 0 {
            return Err(QaError::Config(
                "embedding.max_parallel must be greater than 0".to_string(),
            ));
        }

        if self.embedding.model.trim().is_empty() {
            return Err(QaError::Config("embedding.model must not be empty".to_string()));
        }

        if self.retrieval.top_k == 0 {
            return Err(QaError::Config(
                "retrieval.top_k must be greater than 0".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(QaError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(QaError::Config(
                "retry.base_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }

        self.generation.params().validate()
    }

    /// Render as pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| QaError::Config(format!("Failed to serialize config: {}", e)))
    }
}
