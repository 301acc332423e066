//! Ollama provider implementation.
//!
//! Talks to the native `/api/chat` endpoint (not the OpenAI shim) so the
//! Ollama-specific sampling options (`repeat_penalty`, `num_ctx`,
//! `num_predict`) can be sent. Requests are non-streaming.

use async_trait::async_trait;
use second_core::error::ProviderError;
use second_core::health::HealthProbe;
use second_core::message::Message;
use second_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Reply text used when the backend answers without a message body.
pub const EMPTY_REPLY: &str = "No response.";

/// An Ollama chat backend.
pub struct OllamaProvider {
    base_url: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider. `timeout` bounds each HTTP request; callers may
    /// wrap calls in a shorter timeout of their own.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Build from the `[ollama]` config section.
    pub fn from_config(config: &second_config::OllamaConfig) -> Result<Self, ProviderError> {
        Self::new(&config.url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Convert our Message types to the Ollama wire format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role().as_str().to_string(),
                content: m.content().to_string(),
            })
            .collect()
    }

    fn to_api_options(options: &DecodingOptions) -> ApiOptions {
        ApiOptions {
            temperature: options.temperature,
            repeat_penalty: options.repeat_penalty,
            num_predict: options.max_tokens,
            num_ctx: options.context_window,
        }
    }

    fn body(request: &ProviderRequest) -> ChatRequest {
        ChatRequest {
            model: request.model.clone(),
            messages: Self::to_api_messages(&request.messages),
            stream: false,
            options: Self::to_api_options(&request.options),
        }
    }

    fn map_send_error(e: reqwest::Error) -> ProviderError {
        ProviderError::from_transport(e.is_timeout(), e.is_connect(), e.to_string())
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = Self::body(&request);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_send_error)?;

        let status = response.status().as_u16();

        if status == 404 {
            return Err(ProviderError::ModelNotFound(request.model));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Ollama returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        // A timeout can also fire while the body is still arriving.
        let api_response: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout(e.to_string())
            } else {
                ProviderError::InvalidResponse(format!("Failed to parse response: {e}"))
            }
        })?;

        let content = api_response
            .message
            .map(|m| m.content)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string());

        Ok(ProviderResponse {
            content,
            model: api_response.model.unwrap_or(request.model),
        })
    }
}

#[async_trait]
impl HealthProbe for OllamaProvider {
    fn probe_name(&self) -> &str {
        "ollama"
    }

    async fn is_up(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Ollama health probe failed");
                false
            }
        }
    }
}

// --- Ollama API types (internal) ---

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ApiMessage>,
    stream: bool,
    options: ApiOptions,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Serialize)]
struct ApiOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_penalty: Option<f32>,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ApiMessage>,
}
