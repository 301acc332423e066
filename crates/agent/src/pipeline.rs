//! The retrieval-augmented chat pipeline.
//!
//! retrieve → assemble → invoke → record history → persist (detached).
//!
//! History is read before the backend is called and written only after a
//! reply exists, so a failed call leaves the conversation untouched.

use async_trait::async_trait;
use chrono::Utc;
use second_core::knowledge::Exchange;
use second_core::message::ConversationId;
use second_memory::ConversationHistory;
use std::sync::Arc;
use tracing::info;

use crate::context::{ParallelRetriever, PromptBuilder};
use crate::invoker::{InferenceError, InferenceInvoker};
use crate::persistence::PersistenceDispatcher;

/// One free-text message to answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub conversation_id: ConversationId,
    pub message_id: String,
    pub text: String,
}

impl Inbound {
    pub fn new(conversation_id: &str, message_id: &str, text: impl Into<String>) -> Self {
        Self {
            conversation_id: ConversationId::from(conversation_id),
            message_id: message_id.to_string(),
            text: text.into(),
        }
    }
}

/// A successful answer and where its context came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub text: String,
    pub context_sources: String,
}

/// Turns a free-text message into the text to send back.
///
/// Implementations never fail: every error becomes a user-facing reply.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, inbound: &Inbound) -> String;
}

pub struct ChatPipeline {
    retriever: ParallelRetriever,
    prompts: PromptBuilder,
    invoker: InferenceInvoker,
    history: ConversationHistory,
    persistence: Arc<PersistenceDispatcher>,
}

impl ChatPipeline {
    pub fn new(
        retriever: ParallelRetriever,
        prompts: PromptBuilder,
        invoker: InferenceInvoker,
        history: ConversationHistory,
        persistence: Arc<PersistenceDispatcher>,
    ) -> Self {
        Self {
            retriever,
            prompts,
            invoker,
            history,
            persistence,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn invoker(&self) -> &InferenceInvoker {
        &self.invoker
    }

    pub async fn handle(&self, inbound: &Inbound) -> Result<ChatReply, InferenceError> {
        let context = self.retriever.retrieve(&inbound.text).await;
        let context_sources = context.summary();
        info!(
            chat_id = %inbound.conversation_id,
            sources = %context_sources,
            "Context retrieved"
        );

        let history = self.history.get(&inbound.conversation_id).await;
        let prompt = self.prompts.build(&context, &history, &inbound.text);

        let text = self.invoker.invoke(prompt.into_messages()).await?;
        info!(chat_id = %inbound.conversation_id, chars = text.len(), "Reply ready");

        self.history
            .record_exchange(&inbound.conversation_id, inbound.text.clone(), text.clone())
            .await;

        self.persistence.dispatch(Exchange {
            conversation_id: inbound.conversation_id.clone(),
            message_id: inbound.message_id.clone(),
            user_text: inbound.text.clone(),
            assistant_text: text.clone(),
            context_sources: context_sources.clone(),
            timestamp: Utc::now(),
        });

        Ok(ChatReply {
            text,
            context_sources,
        })
    }
}

#[async_trait]
impl Responder for ChatPipeline {
    async fn respond(&self, inbound: &Inbound) -> String {
        match self.handle(inbound).await {
            Ok(reply) => reply.text,
            Err(e) => format!("Error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SourceSlot;
    use crate::context::prompt::{CONTEXT_HEADER, SOURCES_UNAVAILABLE_NOTE};
    use crate::test_helpers::{RecordingStore, ScriptedProvider, ScriptedSource};
    use second_core::error::ProviderError;
    use second_core::message::Role;
    use std::time::Duration;

    struct Fixture {
        provider: Arc<ScriptedProvider>,
        store: Arc<RecordingStore>,
        persistence: Arc<PersistenceDispatcher>,
        pipeline: ChatPipeline,
    }

    fn fixture(provider: ScriptedProvider, watcher: ScriptedSource, lor: ScriptedSource) -> Fixture {
        let provider = Arc::new(provider);
        let store = Arc::new(RecordingStore::new());
        let persistence = Arc::new(PersistenceDispatcher::new(store.clone(), "telegram"));
        let retriever = ParallelRetriever::new(Duration::from_secs(5), 0.4)
            .with_source(SourceSlot::new(Arc::new(watcher), 300, 1400))
            .with_source(SourceSlot::new(Arc::new(lor), 400, 1000));
        let pipeline = ChatPipeline::new(
            retriever,
            PromptBuilder::new("You are Second.", 2400),
            InferenceInvoker::new(provider.clone(), "m", Duration::from_secs(120)),
            ConversationHistory::new(10),
            persistence.clone(),
        );
        Fixture {
            provider,
            store,
            persistence,
            pipeline,
        }
    }

    fn watcher() -> ScriptedSource {
        ScriptedSource::new("watcher", 0, "[Memory]")
    }

    fn lor() -> ScriptedSource {
        ScriptedSource::new("lor", 1, "[Docs]")
    }

    #[tokio::test]
    async fn answers_with_context_and_records_everything() {
        let f = fixture(
            ScriptedProvider::replies(&["Friday at 8am."]),
            watcher().with_results(&[("Pour scheduled Friday 8am.", 0.8)]),
            lor(),
        );
        let inbound = Inbound::new("100", "5", "When is the pour?");

        let reply = f.pipeline.handle(&inbound).await.unwrap();
        assert_eq!(reply.text, "Friday at 8am.");
        assert_eq!(reply.context_sources, "watcher:1");

        let request = f.provider.last_request().unwrap();
        let last = request.messages.last().unwrap();
        assert!(last.content().starts_with(CONTEXT_HEADER));
        assert!(last.content().ends_with("When is the pour?"));

        let history = f.pipeline.history().get(&inbound.conversation_id).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content(), "Friday at 8am.");

        assert!(f.persistence.drain(Duration::from_secs(5)).await);
        let events = f.store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata["context_sources"], "watcher:1");
        assert_eq!(events[0].metadata["message_id"], "5");
    }

    #[tokio::test]
    async fn all_sources_down_still_calls_inference() {
        let f = fixture(
            ScriptedProvider::replies(&["From memory of this chat only."]),
            watcher().failing(),
            lor().failing(),
        );

        let reply = f.pipeline.handle(&Inbound::new("1", "1", "hello")).await.unwrap();
        assert_eq!(reply.context_sources, "none");
        assert_eq!(f.provider.call_count(), 1);

        let request = f.provider.last_request().unwrap();
        assert!(request.messages.last().unwrap().content().contains(SOURCES_UNAVAILABLE_NOTE));
    }

    #[tokio::test]
    async fn timeout_leaves_history_untouched() {
        let f = fixture(
            ScriptedProvider::failing(ProviderError::Timeout("120s".into())),
            watcher(),
            lor(),
        );
        let inbound = Inbound::new("7", "1", "Are you there?");

        let err = f.pipeline.handle(&inbound).await.unwrap_err();
        assert_eq!(err, InferenceError::TimedOut);
        assert!(f.pipeline.history().get(&inbound.conversation_id).await.is_empty());

        assert!(f.persistence.drain(Duration::from_secs(1)).await);
        assert!(f.store.events().is_empty());

        assert_eq!(
            f.pipeline.respond(&inbound).await,
            "Error: Ollama timed out. Model may be loading or busy."
        );
    }

    #[tokio::test]
    async fn second_turn_sees_first_in_history() {
        let f = fixture(ScriptedProvider::replies(&["one", "two"]), watcher(), lor());
        f.pipeline.handle(&Inbound::new("9", "1", "first")).await.unwrap();
        f.pipeline.handle(&Inbound::new("9", "2", "second")).await.unwrap();

        let request = f.provider.last_request().unwrap();
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(request.messages[1].content(), "first");
        assert_eq!(request.messages[3].content(), "second");
    }

    #[tokio::test]
    async fn conversations_do_not_leak() {
        let f = fixture(ScriptedProvider::replies(&["a", "b"]), watcher(), lor());
        f.pipeline.handle(&Inbound::new("alice", "1", "secret plan")).await.unwrap();
        f.pipeline.handle(&Inbound::new("bob", "1", "hi")).await.unwrap();

        let request = f.provider.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert!(request.messages.iter().all(|m| m.content() != "secret plan"));
    }
}
