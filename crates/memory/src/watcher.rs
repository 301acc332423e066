//! Watcher client: episodic memory.
//!
//! Watcher is both a knowledge source (`POST /query/search`) and the memory
//! store (`POST /events`). Search results rank first in prompts: personal,
//! recent context outranks general knowledge.

use async_trait::async_trait;
use second_core::error::MemoryError;
use second_core::health::HealthProbe;
use second_core::knowledge::{KnowledgeSource, MemoryEvent, MemoryStore, RetrievalResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::http::ServiceClient;

/// Line tag for Watcher snippets.
pub const MEMORY_LABEL: &str = "[Memory]";

/// Merge rank of Watcher results (lower goes first).
pub const WATCHER_PRIORITY: u8 = 0;

pub struct WatcherClient {
    http: ServiceClient,
    search_limit: usize,
    search_timeout: Duration,
    store_timeout: Duration,
    probe_timeout: Duration,
}

impl WatcherClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: ServiceClient::new("watcher", base_url),
            search_limit: 5,
            search_timeout: Duration::from_secs(5),
            store_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
        }
    }

    /// Build from config sections.
    pub fn from_config(config: &second_config::AppConfig) -> Self {
        Self {
            http: ServiceClient::new("watcher", &config.watcher.url),
            search_limit: config.watcher.search_limit,
            search_timeout: Duration::from_secs(config.retrieval.timeout_secs),
            store_timeout: Duration::from_secs(config.watcher.store_timeout_secs),
            probe_timeout: Duration::from_secs(config.health.timeout_secs),
        }
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn to_results(hits: Vec<SearchHit>) -> Vec<RetrievalResult> {
        hits.into_iter()
            .filter(|h| !h.content.trim().is_empty())
            .map(|h| RetrievalResult {
                source: "watcher".into(),
                label: MEMORY_LABEL.into(),
                content: h.content,
                score: h.score,
            })
            .collect()
    }
}

#[async_trait]
impl KnowledgeSource for WatcherClient {
    fn name(&self) -> &str {
        "watcher"
    }

    fn priority(&self) -> u8 {
        WATCHER_PRIORITY
    }

    async fn search(&self, query: &str) -> Result<Vec<RetrievalResult>, MemoryError> {
        let body = serde_json::json!({ "query": query, "limit": self.search_limit });
        let hits: Vec<SearchHit> = self
            .http
            .post_json("/query/search", &body, self.search_timeout)
            .await?;
        debug!(hits = hits.len(), "Watcher search returned");
        Ok(Self::to_results(hits))
    }
}

#[async_trait]
impl MemoryStore for WatcherClient {
    fn name(&self) -> &str {
        "watcher"
    }

    async fn write(&self, event: MemoryEvent) -> Result<(), MemoryError> {
        let body = serde_json::to_value(&event).map_err(|e| MemoryError::Decode {
            service: "watcher".into(),
            reason: e.to_string(),
        })?;
        self.http.post("/events", &body, self.store_timeout).await?;
        Ok(())
    }
}

#[async_trait]
impl HealthProbe for WatcherClient {
    fn probe_name(&self) -> &str {
        "watcher"
    }

    async fn is_up(&self) -> bool {
        self.http.get_ok("/health", self.probe_timeout).await
    }
}

/// One element of the `/query/search` reply array.
#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f32,
}
