//! Ollama generation client
//!
//! Endpoint: POST /api/generate with `stream: false`; the full completion
//! comes back in one JSON body.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::errors::{QaError, Result};
use crate::http;
use crate::llm::{DecodingMethod, GenerationParams, LanguageModel};

/// Ollama generation client
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body<'a>(&'a self, prompt: &'a str, params: &GenerationParams) -> GenerateRequest<'a> {
        // Ollama has no decoding switch; greedy means zero temperature
        let temperature = match params.decoding {
            DecodingMethod::Greedy => 0.0,
            DecodingMethod::Sample => params.temperature,
        };

        GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                num_predict: params.max_new_tokens,
                temperature,
            },
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        params.validate()?;
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, prompt_chars = prompt.len(), "sending generation request");

        let response = self
            .client
            .post(&url)
            .json(&self.request_body(prompt, params))
            .send()
            .await
            .map_err(|e| http::transport_error(e, "generation", self.timeout, QaError::ModelUnavailable))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = http::error_body(response).await;
            return Err(http::model_status_error(status, &body, "generation", self.timeout));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| QaError::ModelUnavailable(format!("Failed to parse response: {}", e)))?;

        Ok(parsed.response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    num_predict: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> OllamaGenerator {
        OllamaGenerator::new("http://localhost:11434/", "llama2:7b", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_generator_creation() {
        let generator = generator();
        assert_eq!(generator.model_id(), "llama2:7b");
        assert_eq!(generator.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_greedy_forces_zero_temperature() {
        let generator = generator();
        let params = GenerationParams::default();
        let body = serde_json::to_value(generator.request_body("hi", &params)).unwrap();

        assert_eq!(body["stream"], false);
        assert_eq!(body["options"]["num_predict"], 300);
        assert_eq!(body["options"]["temperature"], 0.0);
    }

    #[test]
    fn test_sampling_keeps_temperature() {
        let generator = generator();
        let params = GenerationParams {
            decoding: DecodingMethod::Sample,
            temperature: 1.5,
            ..GenerationParams::default()
        };
        let body = serde_json::to_value(generator.request_body("hi", &params)).unwrap();
        assert_eq!(body["options"]["temperature"], 1.5);
    }

    #[tokio::test]
    async fn test_invalid_params_rejected_before_request() {
        let params = GenerationParams {
            temperature: 3.0,
            ..GenerationParams::default()
        };
        let err = generator().generate("hi", &params).await.unwrap_err();
        assert!(matches!(err, QaError::Config(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let generator =
            OllamaGenerator::new("http://127.0.0.1:9", "llama2:7b", Duration::from_secs(2)).unwrap();
        let err = generator
            .generate("hi", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QaError::ModelUnavailable(_) | QaError::Timeout { .. }
        ));
    }
}
