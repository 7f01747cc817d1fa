//! Language model clients
//!
//! - `WatsonxClient`: IBM watsonx.ai text generation (IAM API-key auth)
//! - `OllamaGenerator`: local or remote Ollama server

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{GenerationConfig, LlmBackend};
use crate::errors::{QaError, Result};

pub mod ollama;
pub mod watsonx;

pub use ollama::OllamaGenerator;
pub use watsonx::{WatsonxClient, WatsonxCredentials};

/// Token selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodingMethod {
    Greedy,
    Sample,
}

impl DecodingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodingMethod::Greedy => "greedy",
            DecodingMethod::Sample => "sample",
        }
    }
}

/// Parameters sent with every generation request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_new_tokens: u32,
    pub min_new_tokens: u32,
    pub decoding: DecodingMethod,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        GenerationConfig::default().params()
    }
}

impl GenerationParams {
    /// Temperature in [0, 2], at least one token, min ≤ max
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(QaError::Config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        if self.max_new_tokens == 0 {
            return Err(QaError::Config(
                "max_new_tokens must be greater than 0".to_string(),
            ));
        }

        if self.min_new_tokens > self.max_new_tokens {
            return Err(QaError::Config(format!(
                "min_new_tokens ({}) must not exceed max_new_tokens ({})",
                self.min_new_tokens, self.max_new_tokens
            )));
        }

        Ok(())
    }
}

/// Hosted generative model
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for `prompt`
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Model identifier, for logs
    fn model_id(&self) -> &str;
}

/// Construct the configured model client
pub fn from_config(
    config: &GenerationConfig,
    credentials: WatsonxCredentials,
) -> Result<Arc<dyn LanguageModel>> {
    match config.backend {
        LlmBackend::Watsonx => Ok(Arc::new(WatsonxClient::new(
            credentials,
            &config.url,
            &config.iam_url,
            &config.model_id,
            config.timeout(),
        )?)),
        LlmBackend::Ollama => Ok(Arc::new(OllamaGenerator::new(
            &config.ollama_url,
            &config.model_id,
            config.timeout(),
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = GenerationParams::default();
        assert_eq!(params.max_new_tokens, 300);
        assert_eq!(params.min_new_tokens, 100);
        assert_eq!(params.decoding, DecodingMethod::Greedy);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_temperature_bounds() {
        let mut params = GenerationParams::default();
        params.temperature = 0.0;
        assert!(params.validate().is_ok());
        params.temperature = 2.0;
        assert!(params.validate().is_ok());
        params.temperature = -0.1;
        assert!(params.validate().is_err());
        params.temperature = 2.01;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_token_bounds() {
        let mut params = GenerationParams::default();
        params.min_new_tokens = 400;
        assert!(params.validate().is_err());

        params.min_new_tokens = 0;
        params.max_new_tokens = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_decoding_names() {
        assert_eq!(DecodingMethod::Greedy.as_str(), "greedy");
        assert_eq!(
            serde_json::to_string(&DecodingMethod::Sample).unwrap(),
            "\"sample\""
        );
    }
}
