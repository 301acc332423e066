//! # Second Core
//!
//! Domain types, traits, and error definitions for the Second assistant.
//! This crate has **no I/O**: it defines the domain model that the
//! backends, the transport and the message pipeline implement against.
//!
//! ## Design Philosophy
//!
//! Every external collaborator is a trait here. Implementations live in
//! their respective crates:
//! - `Provider`: the language-model backend (`second-providers`)
//! - `Channel`: the chat transport (`second-channels`)
//! - `KnowledgeSource` / `MemoryStore`: retrieval and storage (`second-memory`)
//! - `HealthProbe`: liveness checks for diagnostics
//!
//! The pipeline in `second-agent` only ever sees these traits, which keeps
//! it testable with scripted stand-ins.

pub mod channel;
pub mod error;
pub mod health;
pub mod knowledge;
pub mod message;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use channel::{Channel, ChannelId, ChannelMessage};
pub use error::{ChannelError, MemoryError, ProviderError};
pub use health::HealthProbe;
pub use knowledge::{Exchange, KnowledgeSource, MemoryEvent, MemoryStore, RetrievalResult};
pub use message::{ConversationId, Message, Role};
pub use provider::{DecodingOptions, Provider, ProviderRequest, ProviderResponse};
