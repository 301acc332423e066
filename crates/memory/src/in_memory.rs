//! In-memory stand-ins for the Watcher and LOR services, used by tests.

use async_trait::async_trait;
use second_core::error::MemoryError;
use second_core::health::HealthProbe;
use second_core::knowledge::{KnowledgeSource, MemoryEvent, MemoryStore, RetrievalResult};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A keyword-matching knowledge source over a fixed set of snippets.
///
/// Score is the fraction of query words found in the snippet, so it stays
/// in [0, 1] like the real services.
pub struct InMemoryKnowledge {
    name: String,
    label: String,
    priority: u8,
    snippets: Arc<RwLock<Vec<String>>>,
}

impl InMemoryKnowledge {
    pub fn new(name: impl Into<String>, label: impl Into<String>, priority: u8) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            priority,
            snippets: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn add(&self, snippet: impl Into<String>) {
        self.snippets.write().await.push(snippet.into());
    }

    fn score(snippet: &str, query: &str) -> f32 {
        let words: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
            .map(str::to_lowercase)
            .collect();
        if words.is_empty() {
            return 0.0;
        }
        let haystack = snippet.to_lowercase();
        let hits = words.iter().filter(|w| haystack.contains(w.as_str())).count();
        hits as f32 / words.len() as f32
    }
}

#[async_trait]
impl KnowledgeSource for InMemoryKnowledge {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    async fn search(&self, query: &str) -> Result<Vec<RetrievalResult>, MemoryError> {
        let snippets = self.snippets.read().await;
        let mut results: Vec<RetrievalResult> = snippets
            .iter()
            .map(|s| RetrievalResult {
                source: self.name.clone(),
                label: self.label.clone(),
                content: s.clone(),
                score: Self::score(s, query),
            })
            .filter(|r| r.score > 0.0)
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }
}

/// A memory store that keeps every event in a Vec.
#[derive(Default)]
pub struct InMemoryStore {
    events: Arc<RwLock<Vec<MemoryEvent>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything written so far.
    pub async fn events(&self) -> Vec<MemoryEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn write(&self, event: MemoryEvent) -> Result<(), MemoryError> {
        self.events.write().await.push(event);
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for InMemoryStore {
    fn probe_name(&self) -> &str {
        "in_memory"
    }

    async fn is_up(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_scores_by_word_overlap() {
        let kb = InMemoryKnowledge::new("notes", "[Notes]", 0);
        kb.add("The concrete pour is Friday at 8am").await;
        kb.add("Rebar delivery moved to Thursday").await;
        kb.add("Unrelated lunch order").await;

        let results = kb.search("when is the concrete pour").await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("pour"));
        assert!(results[0].score > 0.0 && results[0].score <= 1.0);
        assert_eq!(results[0].label, "[Notes]");
    }

    #[tokio::test]
    async fn store_records_events() {
        let store = InMemoryStore::new();
        store
            .write(MemoryEvent {
                source: "telegram".into(),
                event_type: "note".into(),
                content: "The pour is Friday".into(),
                metadata: serde_json::Map::new(),
            })
            .await
            .unwrap();

        let events = store.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "note");
    }
}
