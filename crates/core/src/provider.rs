//! Provider trait: the abstraction over the language-model backend.
//!
//! A Provider takes an ordered list of role-tagged messages plus decoding
//! options and returns the generated text. The call is atomic
//! request/response; there is no streaming contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::Message;

/// Sampling and sizing knobs sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodingOptions {
    /// Temperature (0.0 = deterministic)
    pub temperature: f32,

    /// Penalty applied to repeated tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: u32,

    /// Context window the backend should allocate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_window: Option<u32>,
}

impl Default for DecodingOptions {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            repeat_penalty: Some(1.1),
            max_tokens: 512,
            context_window: Some(2560),
        }
    }
}

impl DecodingOptions {
    /// Options for a short, deterministic classification call.
    pub fn deterministic(max_tokens: u32) -> Self {
        Self {
            temperature: 0.0,
            repeat_penalty: None,
            max_tokens,
            context_window: None,
        }
    }
}

/// A single request to the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "qwen3:14b")
    pub model: String,

    /// The conversation messages, in order
    pub messages: Vec<Message>,

    /// Decoding configuration
    pub options: DecodingOptions,
}

/// A complete response from the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text, unmodified
    pub content: String,

    /// Which model actually responded
    pub model: String,
}

/// The core Provider trait.
///
/// The pipeline calls `complete()` without knowing which backend is
/// behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "ollama").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;
}
