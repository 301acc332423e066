//! Knowledge sources, memory store and conversation history for Second.
//!
//! - **Watcher**: episodic memory: searchable, and the store for exchanges
//! - **LOR**: reference knowledge base (books and docs), search only
//! - **History**: bounded, in-process, per-chat turn buffer
//! - **In-memory**: keyword source and recording store, as test stand-ins

mod http;
pub mod history;
pub mod in_memory;
pub mod lor;
pub mod watcher;

pub use history::ConversationHistory;
pub use in_memory::{InMemoryKnowledge, InMemoryStore};
pub use lor::LorClient;
pub use watcher::WatcherClient;
