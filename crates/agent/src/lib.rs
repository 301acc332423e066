//! The message pipeline: the heart of Second.
//!
//! Two routing policies share one skeleton:
//!
//! - **RAG** ([`ChatPipeline`]): retrieve from every knowledge source in
//!   parallel → filter and budget → assemble the prompt with bounded
//!   history → invoke the backend → record history → persist in the
//!   background.
//! - **Dispatch** ([`IntentDispatcher`]): classify first; questions take the
//!   RAG path, statements go straight to the memory store.
//!
//! [`Bot`] puts either one behind a chat transport and adds the command
//! surface, the typing indicator and the allow-list check.

pub mod bot;
pub mod classifier;
pub mod context;
pub mod dispatcher;
pub mod health;
pub mod invoker;
pub mod persistence;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use bot::{Bot, BotSettings, Command};
pub use classifier::{Classification, Intent, IntentClassifier};
pub use context::{
    AssembledPrompt, ContextBundle, ContextSection, ParallelRetriever, PromptBuilder, SourceSlot,
};
pub use dispatcher::IntentDispatcher;
pub use health::{Composite, HealthAggregator, HealthStatus, ServiceState};
pub use invoker::{InferenceError, InferenceInvoker};
pub use persistence::PersistenceDispatcher;
pub use pipeline::{ChatPipeline, ChatReply, Inbound, Responder};
