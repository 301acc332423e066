//! Error types for the Second domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external boundary has its own error enum; nothing from a dependency
//! crosses more than one component before being turned into a typed outcome.

use thiserror::Error;

/// Failures talking to the language-model backend.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Connection refused, DNS failure, reset: the backend never answered.
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response shape: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Classify a `reqwest`-style failure description into the variant the
    /// reply layer distinguishes: timeouts, refused connections, the rest.
    pub fn from_transport(is_timeout: bool, is_connect: bool, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if is_timeout {
            Self::Timeout(detail)
        } else if is_connect {
            Self::Connect(detail)
        } else {
            Self::Network(detail)
        }
    }
}

/// Failures in the chat transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Message delivery failed to {channel}: {reason}")]
    DeliveryFailed { channel: String, reason: String },

    #[error("Channel connection lost: {0}")]
    ConnectionLost(String),

    #[error("Invalid update payload: {0}")]
    InvalidPayload(String),
}

/// Failures in knowledge sources and the memory store.
#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("{service} unreachable: {reason}")]
    Unreachable { service: String, reason: String },

    #[error("{service} timed out")]
    Timeout { service: String },

    #[error("{service} returned status {status}")]
    Status { service: String, status: u16 },

    #[error("{service} returned an unreadable body: {reason}")]
    Decode { service: String, reason: String },
}
