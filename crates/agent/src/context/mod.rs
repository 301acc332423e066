//! Context gathering and prompt assembly.
//!
//! | Step | Module | Bounded by |
//! |------|--------|------------|
//! | Fan-out lookup | `retriever` | per-source timeout |
//! | Threshold + rank | `relevance` | minimum relevance score |
//! | Sizing | `budget` | per-item cap, per-source character budget |
//! | Assembly | `prompt` | history character budget |

pub mod budget;
pub mod prompt;
pub mod relevance;
pub mod retriever;

pub use budget::{fit_items, truncate_at_boundary};
pub use prompt::{AssembledPrompt, PromptBuilder};
pub use relevance::{Candidate, filter_and_rank};
pub use retriever::{ContextBundle, ContextSection, ParallelRetriever, SourceSlot};
