//! Parallel context retrieval.
//!
//! One lookup per configured knowledge source, all in flight at once, each
//! under its own timeout. A failed or slow source contributes nothing and
//! never fails the retrieval as a whole; an empty bundle is a valid result.

use futures::future::join_all;
use second_core::knowledge::KnowledgeSource;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::budget::fit_items;
use super::relevance::{Candidate, filter_and_rank};

/// A knowledge source plus the sizing rules for its snippets.
#[derive(Clone)]
pub struct SourceSlot {
    source: Arc<dyn KnowledgeSource>,
    /// Per-snippet cap, applied before budgeting
    item_chars: usize,
    /// Total characters this source may place in one prompt
    budget_chars: usize,
}

impl SourceSlot {
    pub fn new(source: Arc<dyn KnowledgeSource>, item_chars: usize, budget_chars: usize) -> Self {
        Self {
            source,
            item_chars,
            budget_chars,
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }
}

/// The lines one source contributed, each prefixed with its label.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextSection {
    pub source: String,
    pub lines: Vec<String>,
}

/// Everything retrieval produced for one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextBundle {
    /// Contributing sources in priority order; never holds an empty section
    pub sections: Vec<ContextSection>,
    /// Every configured source failed (not merely returned nothing)
    pub all_failed: bool,
}

impl ContextBundle {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// `watcher:2, lor:1`, or `none` when nothing was retrieved.
    pub fn summary(&self) -> String {
        if self.sections.is_empty() {
            return "none".into();
        }
        self.sections
            .iter()
            .map(|s| format!("{}:{}", s.source, s.lines.len()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// The labeled block placed in front of the user's text.
    pub fn render(&self) -> String {
        self.sections
            .iter()
            .flat_map(|s| s.lines.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Fans a query out to every knowledge source and merges what comes back.
pub struct ParallelRetriever {
    slots: Vec<SourceSlot>,
    timeout: Duration,
    min_relevance: f32,
}

impl ParallelRetriever {
    pub fn new(timeout: Duration, min_relevance: f32) -> Self {
        Self {
            slots: Vec::new(),
            timeout,
            min_relevance,
        }
    }

    /// Timeout and threshold from config; sources are added separately.
    pub fn from_config(config: &second_config::AppConfig) -> Self {
        Self::new(
            Duration::from_secs(config.retrieval.timeout_secs),
            config.retrieval.min_relevance,
        )
    }

    pub fn with_source(mut self, slot: SourceSlot) -> Self {
        self.slots.push(slot);
        self
    }

    pub async fn retrieve(&self, query: &str) -> ContextBundle {
        if self.slots.is_empty() {
            return ContextBundle::empty();
        }

        let lookups = self.slots.iter().map(|slot| async move {
            match tokio::time::timeout(self.timeout, slot.source.search(query)).await {
                Ok(Ok(results)) => Some(results),
                Ok(Err(e)) => {
                    warn!(source = slot.name(), error = %e, "Knowledge source failed");
                    None
                }
                Err(_) => {
                    warn!(
                        source = slot.name(),
                        timeout_secs = self.timeout.as_secs(),
                        "Knowledge source timed out"
                    );
                    None
                }
            }
        });
        let outcomes = join_all(lookups).await;
        let all_failed = outcomes.iter().all(Option::is_none);

        let mut candidates = Vec::new();
        for (slot, outcome) in self.slots.iter().zip(outcomes) {
            let priority = slot.source.priority();
            for mut result in outcome.unwrap_or_default() {
                result.source = slot.name().to_string();
                candidates.push(Candidate { priority, result });
            }
        }
        let ranked = filter_and_rank(candidates, self.min_relevance);

        // Ranked order is already priority-major, so sections come out in
        // priority order too.
        let mut sections: Vec<ContextSection> = Vec::new();
        for slot in self.slots_by_priority() {
            let mine: Vec<&Candidate> = ranked
                .iter()
                .filter(|c| c.result.source == slot.name())
                .collect();
            if mine.is_empty() {
                continue;
            }

            let fitted = fit_items(
                mine.iter().map(|c| c.result.content.as_str()),
                slot.item_chars,
                slot.budget_chars,
            );
            let lines: Vec<String> = fitted
                .into_iter()
                .zip(&mine)
                .map(|(text, c)| format!("{} {}", c.result.label, text))
                .collect();
            if !lines.is_empty() {
                sections.push(ContextSection {
                    source: slot.name().to_string(),
                    lines,
                });
            }
        }

        let bundle = ContextBundle {
            sections,
            all_failed,
        };
        debug!(
            summary = %bundle.summary(),
            all_failed = bundle.all_failed,
            "Retrieval finished"
        );
        bundle
    }

    fn slots_by_priority(&self) -> Vec<&SourceSlot> {
        let mut slots: Vec<&SourceSlot> = self.slots.iter().collect();
        slots.sort_by_key(|s| s.source.priority());
        slots
    }
}
