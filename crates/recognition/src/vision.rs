//! Client for an OpenAI-compatible vision chat completion endpoint.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use inkstone_core::error::CoreError;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://ark.cn-beijing.volces.com/api/v3";

/// Default vision model.
pub const DEFAULT_MODEL: &str = "doubao-1.5-vision-pro-32k-250115";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Connection settings for the vision model.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub api_key: String,
    /// Base URL; requests go to `{base_url}/chat/completions`.
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
}

/// Errors from the vision client.
#[derive(Debug, thiserror::Error)]
pub enum VisionClientError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Vision request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint returned a non-2xx status code.
    #[error("Vision endpoint returned {status}: {body}")]
    ApiError { status: u16, body: String },

    /// A 2xx response that is not a chat completion.
    #[error("Vision endpoint returned a malformed completion: {0}")]
    Malformed(String),
}

impl From<VisionClientError> for CoreError {
    fn from(err: VisionClientError) -> Self {
        match &err {
            VisionClientError::Request(e) if e.is_timeout() => CoreError::Timeout(err.to_string()),
            _ => CoreError::VisionService(err.to_string()),
        }
    }
}

/// HTTP client for the vision model.
#[derive(Debug, Clone)]
pub struct VisionClient {
    client: reqwest::Client,
    config: VisionConfig,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Self {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: VisionConfig) -> Self {
        Self { client, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Send one image with an instruction and return the reply text.
    ///
    /// The image travels inline as a `data:` URL next to the prompt in a
    /// single user message.
    pub async fn describe(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> Result<String, VisionClientError> {
        let data_url = format!("data:{mime_type};base64,{}", STANDARD.encode(image));
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": data_url } }
                ]
            }],
            "temperature": self.config.temperature,
        });

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        tracing::debug!(model = %self.config.model, bytes = image.len(), "Sending crop to vision model");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(VisionClientError::ApiError {
                status: status.as_u16(),
                body: crate::error_body(response).await,
            });
        }

        let text = response.text().await?;
        let completion: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| VisionClientError::Malformed(e.to_string()))?;

        completion["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                VisionClientError::Malformed("missing choices[0].message.content".to_string())
            })
    }
}
