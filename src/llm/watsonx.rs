//! IBM watsonx.ai text generation client
//!
//! Auth flow:
//! 1. POST {iam_url}/identity/token (form: grant_type, apikey) -> access_token
//! 2. POST {url}/ml/v1/text/generation?version=... with a bearer token
//!
//! The bearer token is fetched once and reused for the client's lifetime.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::errors::{QaError, Result};
use crate::http;
use crate::llm::{GenerationParams, LanguageModel};

/// API version pinned for the generation endpoint
pub const API_VERSION: &str = "2023-05-29";

const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// watsonx.ai credentials, passed by value to the client
#[derive(Clone, Default)]
pub struct WatsonxCredentials {
    pub api_key: String,
    pub project_id: String,
}

impl std::fmt::Debug for WatsonxCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatsonxCredentials")
            .field("api_key", &if self.api_key.is_empty() { "<missing>" } else { "<redacted>" })
            .field("project_id", &self.project_id)
            .finish()
    }
}

impl WatsonxCredentials {
    pub fn new(api_key: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            project_id: project_id.into(),
        }
    }

    /// Read `WATSONX_APIKEY`/`api_key` and `WATSONX_PROJECT_ID`/`project_id`.
    /// Missing values stay empty and fail at client construction.
    pub fn from_env() -> Self {
        let read = |primary: &str, fallback: &str| {
            std::env::var(primary)
                .or_else(|_| std::env::var(fallback))
                .unwrap_or_default()
        };

        Self {
            api_key: read("WATSONX_APIKEY", "api_key"),
            project_id: read("WATSONX_PROJECT_ID", "project_id"),
        }
    }

    fn check(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(QaError::Authentication(
                "watsonx API key is missing (set WATSONX_APIKEY)".to_string(),
            ));
        }
        if self.project_id.trim().is_empty() {
            return Err(QaError::Authentication(
                "watsonx project id is missing (set WATSONX_PROJECT_ID)".to_string(),
            ));
        }
        Ok(())
    }
}

/// watsonx.ai generation client
pub struct WatsonxClient {
    client: Client,
    credentials: WatsonxCredentials,
    url: String,
    iam_url: String,
    model_id: String,
    timeout: Duration,
    token: OnceCell<String>,
}

impl std::fmt::Debug for WatsonxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatsonxClient")
            .field("url", &self.url)
            .field("model_id", &self.model_id)
            .field("credentials", &self.credentials)
            .field("authenticated", &self.token.initialized())
            .finish()
    }
}

impl WatsonxClient {
    /// Fails with `Authentication` when a credential is empty
    pub fn new(
        credentials: WatsonxCredentials,
        url: &str,
        iam_url: &str,
        model_id: &str,
        timeout: Duration,
    ) -> Result<Self> {
        credentials.check()?;

        Ok(Self {
            client: http::build_client(timeout)?,
            credentials,
            url: url.trim_end_matches('/').to_string(),
            iam_url: iam_url.trim_end_matches('/').to_string(),
            model_id: model_id.to_string(),
            timeout,
            token: OnceCell::new(),
        })
    }

    fn generation_endpoint(&self) -> String {
        format!("{}/ml/v1/text/generation?version={}", self.url, API_VERSION)
    }

    fn token_endpoint(&self) -> String {
        format!("{}/identity/token", self.iam_url)
    }

    async fn access_token(&self) -> Result<&str> {
        let token = self
            .token
            .get_or_try_init(|| self.fetch_token())
            .await?;
        Ok(token.as_str())
    }

    async fn fetch_token(&self) -> Result<String> {
        debug!(iam_url = %self.iam_url, "exchanging API key for IAM token");

        let response = self
            .client
            .post(self.token_endpoint())
            .form(&[
                ("grant_type", IAM_GRANT_TYPE),
                ("apikey", self.credentials.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| http::transport_error(e, "IAM token", self.timeout, QaError::ModelUnavailable))?;

        let status = response.status();
        if !status.is_success() {
            let body = http::error_body(response).await;
            return Err(iam_status_error(status, &body, self.timeout));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| QaError::Authentication(format!("Malformed IAM response: {}", e)))?;

        Ok(parsed.access_token)
    }

    fn request_body<'a>(&'a self, prompt: &'a str, params: &GenerationParams) -> GenerationRequest<'a> {
        GenerationRequest {
            model_id: &self.model_id,
            input: prompt,
            project_id: &self.credentials.project_id,
            parameters: Parameters {
                decoding_method: params.decoding.as_str(),
                max_new_tokens: params.max_new_tokens,
                min_new_tokens: params.min_new_tokens,
                temperature: params.temperature,
            },
        }
    }
}

#[async_trait]
impl LanguageModel for WatsonxClient {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        params.validate()?;
        let token = self.access_token().await?;

        debug!(model = %self.model_id, prompt_chars = prompt.len(), "sending generation request");

        let response = self
            .client
            .post(self.generation_endpoint())
            .bearer_auth(token)
            .json(&self.request_body(prompt, params))
            .send()
            .await
            .map_err(|e| http::transport_error(e, "generation", self.timeout, QaError::ModelUnavailable))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = http::error_body(response).await;
            return Err(http::model_status_error(status, &body, "generation", self.timeout));
        }

        let parsed: GenerationResponse = response
            .json()
            .await
            .map_err(|e| QaError::ModelUnavailable(format!("Failed to parse generation response: {}", e)))?;

        parsed.into_text()
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    model_id: &'a str,
    input: &'a str,
    project_id: &'a str,
    parameters: Parameters,
}

#[derive(Debug, Serialize)]
struct Parameters {
    decoding_method: &'static str,
    max_new_tokens: u32,
    min_new_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    results: Vec<GenerationResult>,
}

#[derive(Debug, Deserialize)]
struct GenerationResult {
    generated_text: String,
}

impl GenerationResponse {
    fn into_text(self) -> Result<String> {
        self.results
            .into_iter()
            .next()
            .map(|r| r.generated_text)
            .ok_or_else(|| QaError::ModelUnavailable("generation response had no results".to_string()))
    }
}

/// Map a non-success IAM status; IAM answers 400 for an unknown API key
fn iam_status_error(status: StatusCode, body: &str, timeout: Duration) -> QaError {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            QaError::Authentication(format!("IAM rejected API key: HTTP {}: {}", status, body))
        }
        _ => http::model_status_error(status, body, "IAM token", timeout),
    }
}
