//! Shared HTTP plumbing for the embedding and model clients

use reqwest::{Client, StatusCode};
use std::time::Duration;

use crate::errors::{QaError, Result};

/// Build a client whose every request carries `timeout`
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| QaError::Config(format!("Failed to build HTTP client: {}", e)))
}

/// Map a transport error; timeouts become `Timeout`, the rest go through `other`
pub fn transport_error(
    err: reqwest::Error,
    operation: &str,
    timeout: Duration,
    other: fn(String) -> QaError,
) -> QaError {
    if err.is_timeout() {
        QaError::timeout(operation, timeout)
    } else {
        other(format!("{} request failed: {}", operation, err))
    }
}

/// Map a non-success status from a model-serving endpoint
pub fn model_status_error(status: StatusCode, body: &str, operation: &str, timeout: Duration) -> QaError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            QaError::Authentication(format!("{}: HTTP {}: {}", operation, status, body))
        }
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => {
            QaError::timeout(operation, timeout)
        }
        _ => QaError::ModelUnavailable(format!("{}: HTTP {}: {}", operation, status, body)),
    }
}

/// Read an error body without failing on unreadable payloads
pub async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string())
}
