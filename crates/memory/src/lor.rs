//! LOR client: the reference knowledge base (books and docs).

use async_trait::async_trait;
use second_core::error::MemoryError;
use second_core::health::HealthProbe;
use second_core::knowledge::{KnowledgeSource, RetrievalResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::http::ServiceClient;

pub const BOOKS_LABEL: &str = "[Books]";
pub const DOCS_LABEL: &str = "[Docs]";

/// Merge rank of LOR results; after Watcher.
pub const LOR_PRIORITY: u8 = 1;

pub struct LorClient {
    http: ServiceClient,
    top_k: usize,
    search_timeout: Duration,
    probe_timeout: Duration,
}

impl LorClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: ServiceClient::new("lor", base_url),
            top_k: 3,
            search_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &second_config::AppConfig) -> Self {
        Self {
            http: ServiceClient::new("lor", &config.lor.url),
            top_k: config.lor.top_k,
            search_timeout: Duration::from_secs(config.retrieval.timeout_secs),
            probe_timeout: Duration::from_secs(config.health.timeout_secs),
        }
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    fn to_results(reply: SearchReply) -> Vec<RetrievalResult> {
        reply
            .results
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .map(|c| RetrievalResult {
                source: "lor".into(),
                label: match c.collection.as_deref() {
                    Some("books") => BOOKS_LABEL.into(),
                    _ => DOCS_LABEL.into(),
                },
                content: c.text,
                score: c.score,
            })
            .collect()
    }
}

#[async_trait]
impl KnowledgeSource for LorClient {
    fn name(&self) -> &str {
        "lor"
    }

    fn priority(&self) -> u8 {
        LOR_PRIORITY
    }

    async fn search(&self, query: &str) -> Result<Vec<RetrievalResult>, MemoryError> {
        let body = serde_json::json!({ "query": query, "top_k": self.top_k });
        let reply: SearchReply = self
            .http
            .post_json("/api/search", &body, self.search_timeout)
            .await?;
        debug!(hits = reply.results.len(), "LOR search returned");
        Ok(Self::to_results(reply))
    }
}

#[async_trait]
impl HealthProbe for LorClient {
    fn probe_name(&self) -> &str {
        "lor"
    }

    async fn is_up(&self) -> bool {
        self.http.get_ok("/health", self.probe_timeout).await
    }
}

#[derive(Debug, Deserialize)]
struct SearchReply {
    /// Missing `results` reads as an empty answer.
    #[serde(default)]
    results: Vec<Chunk>,
}

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    text: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    collection: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_picks_label() {
        let data = r#"{"results": [
            {"text": "Concrete cures in 28 days.", "score": 0.7, "collection": "books"},
            {"text": "Slab spec v2", "score": 0.5, "collection": "specs"},
            {"text": "Untagged passage", "score": 0.45}
        ]}"#;
        let reply: SearchReply = serde_json::from_str(data).unwrap();
        let results = LorClient::to_results(reply);

        let labels: Vec<&str> = results.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["[Books]", "[Docs]", "[Docs]"]);
        assert!(results.iter().all(|r| r.source == "lor"));
    }

    #[test]
    fn missing_results_field_is_empty() {
        let reply: SearchReply = serde_json::from_str(r#"{"status": "ok"}"#).unwrap();
        assert!(LorClient::to_results(reply).is_empty());
    }
}
