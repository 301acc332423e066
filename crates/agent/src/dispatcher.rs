//! Intent-routed dispatch.
//!
//! One classification call splits free text into two paths with independent
//! failure handling: questions go through the chat pipeline, statements are
//! written to the memory store.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::classifier::{Intent, IntentClassifier};
use crate::persistence::PersistenceDispatcher;
use crate::pipeline::{ChatPipeline, Inbound, Responder};

pub const STORED_REPLY: &str = "Noted. Stored in memory.";
pub const STORE_FAILED_REPLY: &str = "Failed to store. Is Watcher running?";

pub struct IntentDispatcher {
    classifier: IntentClassifier,
    pipeline: Arc<ChatPipeline>,
    persistence: Arc<PersistenceDispatcher>,
}

impl IntentDispatcher {
    pub fn new(
        classifier: IntentClassifier,
        pipeline: Arc<ChatPipeline>,
        persistence: Arc<PersistenceDispatcher>,
    ) -> Self {
        Self {
            classifier,
            pipeline,
            persistence,
        }
    }
}

#[async_trait]
impl Responder for IntentDispatcher {
    async fn respond(&self, inbound: &Inbound) -> String {
        let classification = self.classifier.classify(&inbound.text).await;
        let intent = classification.intent();
        info!(
            chat_id = %inbound.conversation_id,
            intent = intent.as_str(),
            fallback = classification.is_fallback(),
            "Routing message"
        );

        match intent {
            Intent::Question => self.pipeline.respond(inbound).await,
            Intent::Statement => match self.persistence.store_note(&inbound.text).await {
                Ok(()) => STORED_REPLY.into(),
                Err(_) => STORE_FAILED_REPLY.into(),
            },
        }
    }
}
