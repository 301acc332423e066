//! Conversation history ring: bounded, per-chat, in-process.
//!
//! History is deliberately ephemeral: it lives only as long as the process
//! and starts empty on every restart. Each chat gets its own ring, created
//! lazily on first append; the oldest turn is evicted once the cap is hit.

use second_core::message::{ConversationId, Message};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-conversation turn buffer. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConversationHistory {
    max_turns: usize,
    rings: Arc<RwLock<HashMap<ConversationId, VecDeque<Message>>>>,
}

impl ConversationHistory {
    /// `max_turns` counts single entries (a user/assistant exchange is two).
    /// A cap of zero is treated as one.
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns: max_turns.max(1),
            rings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Add one turn, evicting the oldest on overflow.
    pub async fn append(&self, id: &ConversationId, turn: Message) {
        let mut rings = self.rings.write().await;
        let ring = rings.entry(id.clone()).or_default();
        Self::push_bounded(ring, turn, self.max_turns);
    }

    /// Add a user turn and its reply under a single lock, so readers never
    /// see the question without the answer.
    pub async fn record_exchange(
        &self,
        id: &ConversationId,
        user_text: impl Into<String>,
        assistant_text: impl Into<String>,
    ) {
        let mut rings = self.rings.write().await;
        let ring = rings.entry(id.clone()).or_default();
        Self::push_bounded(ring, Message::user(user_text), self.max_turns);
        Self::push_bounded(ring, Message::assistant(assistant_text), self.max_turns);
    }

    /// Current turns, oldest first. Unknown conversations are empty.
    pub async fn get(&self, id: &ConversationId) -> Vec<Message> {
        self.rings
            .read()
            .await
            .get(id)
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of turns held for a conversation.
    pub async fn len(&self, id: &ConversationId) -> usize {
        self.rings.read().await.get(id).map_or(0, VecDeque::len)
    }

    /// Reset a conversation. Returns whether anything was there.
    pub async fn clear(&self, id: &ConversationId) -> bool {
        self.rings
            .write()
            .await
            .remove(id)
            .is_some_and(|ring| !ring.is_empty())
    }

    fn push_bounded(ring: &mut VecDeque<Message>, turn: Message, cap: usize) {
        ring.push_back(turn);
        while ring.len() > cap {
            ring.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use second_core::message::Role;

    fn chat(id: &str) -> ConversationId {
        ConversationId::from(id)
    }

    #[tokio::test]
    async fn unknown_conversation_is_empty() {
        let history = ConversationHistory::new(4);
        assert!(history.get(&chat("nobody")).await.is_empty());
        assert_eq!(history.len(&chat("nobody")).await, 0);
    }

    #[tokio::test]
    async fn overflow_evicts_oldest_first() {
        let history = ConversationHistory::new(3);
        let id = chat("a");
        for i in 0..4 {
            history.append(&id, Message::user(format!("turn {i}"))).await;
        }

        let turns = history.get(&id).await;
        let texts: Vec<&str> = turns.iter().map(|m| m.content()).collect();
        assert_eq!(texts, vec!["turn 1", "turn 2", "turn 3"]);
    }

    #[tokio::test]
    async fn long_run_keeps_last_n_in_order() {
        let history = ConversationHistory::new(10);
        let id = chat("a");
        for i in 0..57 {
            history.append(&id, Message::user(i.to_string())).await;
        }
        let texts: Vec<String> = history
            .get(&id)
            .await
            .iter()
            .map(|m| m.content().to_string())
            .collect();
        let expected: Vec<String> = (47..57).map(|i| i.to_string()).collect();
        assert_eq!(texts, expected);
    }

    #[tokio::test]
    async fn exchange_is_recorded_as_two_turns() {
        let history = ConversationHistory::new(10);
        let id = chat("a");
        history.record_exchange(&id, "q", "a").await;

        let turns = history.get(&id).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role(), Role::User);
        assert_eq!(turns[1].role(), Role::Assistant);
    }

    #[tokio::test]
    async fn clear_then_get_is_empty() {
        let history = ConversationHistory::new(10);
        let id = chat("a");
        history.record_exchange(&id, "q", "a").await;

        assert!(history.clear(&id).await);
        assert!(history.get(&id).await.is_empty());
        // clearing again reports nothing to clear
        assert!(!history.clear(&id).await);
        assert!(history.get(&id).await.is_empty());
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let history = ConversationHistory::new(10);
        history.append(&chat("a"), Message::user("for a")).await;
        history.append(&chat("b"), Message::user("for b")).await;
        history.clear(&chat("a")).await;

        assert!(history.get(&chat("a")).await.is_empty());
        assert_eq!(history.get(&chat("b")).await[0].content(), "for b");
    }

    #[tokio::test]
    async fn clones_share_state() {
        let history = ConversationHistory::new(10);
        let other = history.clone();
        history.append(&chat("a"), Message::user("hi")).await;
        assert_eq!(other.len(&chat("a")).await, 1);
    }
}
