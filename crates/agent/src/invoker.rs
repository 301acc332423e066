//! Inference invoker: one bounded call to the language-model backend.
//!
//! Failures come back as an [`InferenceError`] whose `Display` text is what
//! the user sees. Nothing is retried; the user resends.

use second_core::error::ProviderError;
use second_core::message::Message;
use second_core::provider::{DecodingOptions, Provider, ProviderRequest};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Why an inference call produced no reply.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Cannot reach the language model. Is Ollama running?")]
    Unreachable,

    #[error("Ollama timed out. Model may be loading or busy.")]
    TimedOut,

    #[error("Ollama error: {0}")]
    Backend(String),
}

impl From<ProviderError> for InferenceError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Timeout(_) => Self::TimedOut,
            ProviderError::Connect(_) => Self::Unreachable,
            other => Self::Backend(other.to_string()),
        }
    }
}

pub struct InferenceInvoker {
    provider: Arc<dyn Provider>,
    model: String,
    options: DecodingOptions,
    timeout: Duration,
}

impl InferenceInvoker {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            model: model.into(),
            options: DecodingOptions::default(),
            timeout,
        }
    }

    /// Model, decoding options and timeout from the `[ollama]` section.
    pub fn from_config(provider: Arc<dyn Provider>, config: &second_config::AppConfig) -> Self {
        let ollama = &config.ollama;
        Self {
            provider,
            model: ollama.model.clone(),
            options: DecodingOptions {
                temperature: ollama.temperature,
                repeat_penalty: Some(ollama.repeat_penalty),
                max_tokens: ollama.num_predict,
                context_window: Some(ollama.num_ctx),
            },
            timeout: Duration::from_secs(ollama.timeout_secs),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Send the prompt; the generated text comes back unmodified.
    pub async fn invoke(&self, messages: Vec<Message>) -> Result<String, InferenceError> {
        let request = ProviderRequest {
            model: self.model.clone(),
            messages,
            options: self.options.clone(),
        };
        debug!(model = %self.model, entries = request.messages.len(), "Invoking backend");

        let outcome = tokio::time::timeout(self.timeout, self.provider.complete(request)).await;
        let result = match outcome {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(e)) => Err(InferenceError::from(e)),
            Err(_) => Err(InferenceError::TimedOut),
        };

        if let Err(e) = &result {
            error!(provider = self.provider.name(), error = %e, "Inference failed");
        }
        result
    }
}
