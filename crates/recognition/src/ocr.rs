//! Client for the remote OCR endpoint.
//!
//! The endpoint takes one JSON request carrying the account credentials,
//! the base64 image and the recognition options, and answers with
//! `{"message": "success", "data": {"text_lines": [...]}}` or a logical
//! failure with some other `message`.

use std::time::Duration;

use inkstone_core::error::CoreError;
use inkstone_core::ocr::{failure_diagnostic, is_success, OcrOptions};
use serde::Serialize;

/// Connection settings for the OCR endpoint.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Full URL requests are POSTed to.
    pub endpoint: String,
    /// Account token. Server-side secret, never taken from clients.
    pub token: String,
    /// Account email paired with the token.
    pub email: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// A successful OCR reply: the body exactly as received, and its parsed form.
#[derive(Debug, Clone)]
pub struct OcrResponse {
    pub body: String,
    pub value: serde_json::Value,
}

/// Errors from the OCR client.
#[derive(Debug, thiserror::Error)]
pub enum OcrClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("OCR request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint returned a non-2xx status code.
    #[error("OCR endpoint returned {status}: {body}")]
    ApiError { status: u16, body: String },

    /// A 2xx response whose body is not JSON.
    #[error("OCR endpoint returned malformed JSON: {0}")]
    Malformed(String),

    /// A well-formed response reporting that recognition failed.
    #[error("OCR {0}")]
    Recognition(String),
}

impl From<OcrClientError> for CoreError {
    fn from(err: OcrClientError) -> Self {
        match &err {
            OcrClientError::Request(e) if e.is_timeout() => CoreError::Timeout(err.to_string()),
            _ => CoreError::OcrService(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct OcrRequest<'a> {
    token: &'a str,
    email: &'a str,
    image: &'a str,
    #[serde(flatten)]
    options: &'a OcrOptions,
}

/// HTTP client for the OCR endpoint.
#[derive(Debug, Clone)]
pub struct OcrClient {
    client: reqwest::Client,
    config: OcrConfig,
}

impl OcrClient {
    pub fn new(config: OcrConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: OcrConfig) -> Self {
        Self { client, config }
    }

    /// Run recognition on a base64 encoded image (no `data:` prefix).
    ///
    /// Returns the response body as received alongside its parsed value, so
    /// the caller can persist it verbatim before deriving anything from it.
    /// Only responses whose `message` is `"success"` are returned.
    pub async fn recognize(
        &self,
        image_base64: &str,
        options: &OcrOptions,
    ) -> Result<OcrResponse, OcrClientError> {
        let body = OcrRequest {
            token: &self.config.token,
            email: &self.config.email,
            image: image_base64,
            options,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrClientError::ApiError {
                status: status.as_u16(),
                body: crate::error_body(response).await,
            });
        }

        let text = response.text().await?;
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| OcrClientError::Malformed(e.to_string()))?;

        if !is_success(&value) {
            let diagnostic = failure_diagnostic(&value);
            tracing::warn!(diagnostic = %diagnostic, "OCR endpoint reported failure");
            return Err(OcrClientError::Recognition(diagnostic));
        }

        Ok(OcrResponse { body: text, value })
    }
}
