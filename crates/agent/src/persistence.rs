//! Background persistence of completed exchanges.
//!
//! `dispatch` returns immediately; the write runs as a tracked task. Every
//! failure is logged with the chat and message ids and then dropped. The
//! reply path never waits on storage.

use second_core::error::MemoryError;
use second_core::knowledge::{Exchange, MemoryEvent, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

pub struct PersistenceDispatcher {
    store: Arc<dyn MemoryStore>,
    /// `source` field of every event written
    source_tag: String,
    in_flight: TaskTracker,
}

impl PersistenceDispatcher {
    pub fn new(store: Arc<dyn MemoryStore>, source_tag: impl Into<String>) -> Self {
        Self {
            store,
            source_tag: source_tag.into(),
            in_flight: TaskTracker::new(),
        }
    }

    /// Schedule the write of a completed exchange and return at once.
    pub fn dispatch(&self, exchange: Exchange) {
        let store = Arc::clone(&self.store);
        let event = exchange.to_event(&self.source_tag);

        self.in_flight.spawn(async move {
            match store.write(event).await {
                Ok(()) => info!(
                    chat_id = %exchange.conversation_id,
                    sources = %exchange.context_sources,
                    "Stored conversation"
                ),
                Err(e) => error!(
                    chat_id = %exchange.conversation_id,
                    message_id = %exchange.message_id,
                    store = store.name(),
                    error = %e,
                    "Background persistence failed"
                ),
            }
        });
    }

    /// Store an explicit note and wait for the outcome.
    pub async fn store_note(&self, text: &str) -> Result<(), MemoryError> {
        let event = note_event(&self.source_tag, text);
        self.store.write(event).await.inspect_err(|e| {
            error!(store = self.store.name(), error = %e, "Failed to store note");
        })
    }

    /// Writes scheduled but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Close the tracker and wait for in-flight writes, up to `timeout`.
    /// Returns whether everything finished.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.in_flight.close();
        let pending = self.in_flight.len();
        if pending > 0 {
            info!(pending, "Waiting for background writes");
        }
        let drained = tokio::time::timeout(timeout, self.in_flight.wait())
            .await
            .is_ok();
        if !drained {
            warn!(
                pending = self.in_flight.len(),
                "Background writes still running at shutdown"
            );
        }
        drained
    }
}

/// The event written for `/remember` and for statements.
pub fn note_event(source_tag: &str, text: &str) -> MemoryEvent {
    let mut metadata = serde_json::Map::new();
    metadata.insert("via".into(), source_tag.into());
    MemoryEvent {
        source: source_tag.to_string(),
        event_type: "note".into(),
        content: text.to_string(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::RecordingStore;
    use chrono::Utc;
    use second_core::message::ConversationId;

    fn exchange() -> Exchange {
        Exchange {
            conversation_id: ConversationId::from("42"),
            message_id: "7".into(),
            user_text: "When is the pour?".into(),
            assistant_text: "Friday.".into(),
            context_sources: "watcher:1".into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_does_not_wait_for_the_write() {
        let store = Arc::new(RecordingStore::new().with_delay(Duration::from_secs(30)));
        let dispatcher = PersistenceDispatcher::new(store.clone(), "telegram");

        dispatcher.dispatch(exchange());
        assert_eq!(dispatcher.in_flight(), 1);
        assert!(store.events().is_empty());

        assert!(dispatcher.drain(Duration::from_secs(60)).await);
        assert_eq!(dispatcher.in_flight(), 0);
        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "conversation");
        assert_eq!(events[0].source, "telegram");
        assert_eq!(events[0].content, "Q: When is the pour?\nA: Friday.");
    }

    #[tokio::test]
    async fn failed_write_is_swallowed_and_untracked() {
        let store = Arc::new(RecordingStore::failing());
        let dispatcher = PersistenceDispatcher::new(store.clone(), "telegram");

        dispatcher.dispatch(exchange());
        assert!(dispatcher.drain(Duration::from_secs(5)).await);
        assert_eq!(dispatcher.in_flight(), 0);
        assert_eq!(store.attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_after_timeout() {
        let store = Arc::new(RecordingStore::new().with_delay(Duration::from_secs(600)));
        let dispatcher = PersistenceDispatcher::new(store, "telegram");
        dispatcher.dispatch(exchange());
        assert!(!dispatcher.drain(Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn notes_are_written_synchronously() {
        let store = Arc::new(RecordingStore::new());
        let dispatcher = PersistenceDispatcher::new(store.clone(), "telegram");
        dispatcher.store_note("Rebar arrives Thursday").await.unwrap();

        let events = store.events();
        assert_eq!(events[0].event_type, "note");
        assert_eq!(events[0].metadata["via"], "telegram");
        assert_eq!(events[0].content, "Rebar arrives Thursday");
    }

    #[tokio::test]
    async fn failed_note_is_reported() {
        let dispatcher = PersistenceDispatcher::new(Arc::new(RecordingStore::failing()), "telegram");
        assert!(dispatcher.store_note("x").await.is_err());
    }
}
