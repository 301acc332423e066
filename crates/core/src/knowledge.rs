//! Knowledge-source and memory-store traits.
//!
//! A knowledge source answers a query with scored text snippets. The memory
//! store accepts events for long-term storage. Both are external services;
//! these traits are the only thing the pipeline knows about them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::error::MemoryError;
use crate::message::ConversationId;

/// One scored snippet returned by a knowledge source.
///
/// Produced per query, consumed by prompt assembly, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    /// Name of the source that produced it (e.g. "watcher")
    pub source: String,

    /// Line tag shown to the model (e.g. "[Memory]", "[Docs]")
    pub label: String,

    /// The snippet text
    pub content: String,

    /// Relevance in [0, 1]
    pub score: f32,
}

/// A searchable knowledge service.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// The source name (e.g., "watcher", "lor").
    fn name(&self) -> &str;

    /// Merge rank; lower values are placed first in the prompt.
    fn priority(&self) -> u8;

    /// Search for snippets relevant to `query`, best first.
    async fn search(&self, query: &str) -> std::result::Result<Vec<RetrievalResult>, MemoryError>;
}

/// A write request to the memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEvent {
    /// Where the event came from (e.g. "telegram")
    pub source: String,

    /// Kind of event (e.g. "conversation", "note")
    pub event_type: String,

    /// The text to remember
    pub content: String,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Long-term storage for exchanges and explicit notes.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The store name (e.g., "watcher").
    fn name(&self) -> &str;

    /// Store one event.
    async fn write(&self, event: MemoryEvent) -> std::result::Result<(), MemoryError>;
}

/// A completed user/assistant exchange, handed to background persistence
/// right after the reply is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub conversation_id: ConversationId,
    pub message_id: String,
    pub user_text: String,
    pub assistant_text: String,
    /// Retrieval summary, e.g. "watcher:2, lor:1"
    pub context_sources: String,
    pub timestamp: DateTime<Utc>,
}

/// Metadata copies of the exchange text are capped at this many characters.
const METADATA_TEXT_CAP: usize = 500;

impl Exchange {
    /// Render as a `conversation` event for the memory store.
    pub fn to_event(&self, source: &str) -> MemoryEvent {
        let mut metadata = serde_json::Map::new();
        metadata.insert("user_message".into(), cap(&self.user_text).into());
        metadata.insert("assistant_response".into(), cap(&self.assistant_text).into());
        metadata.insert("context_sources".into(), self.context_sources.clone().into());
        metadata.insert("chat_id".into(), self.conversation_id.to_string().into());
        metadata.insert("message_id".into(), self.message_id.clone().into());
        metadata.insert("timestamp".into(), self.timestamp.to_rfc3339().into());
        metadata.insert("decay_policy".into(), "standard".into());

        MemoryEvent {
            source: source.to_string(),
            event_type: "conversation".into(),
            content: format!("Q: {}\nA: {}", self.user_text, self.assistant_text),
            metadata,
        }
    }
}

fn cap(text: &str) -> String {
    text.chars().take(METADATA_TEXT_CAP).collect()
}
