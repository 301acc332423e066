//! Prompt assembly.
//!
//! Entry order is fixed: one system entry, then history in chronological
//! order, then one user entry. Retrieved context and the grounding
//! instruction are prepended inside that final entry; the user's own text
//! always comes last, verbatim. Only history and retrieved context are ever
//! shortened, never the live input.

use second_core::message::{Message, Role};

use super::retriever::ContextBundle;

pub const CONTEXT_HEADER: &str = "--- Relevant Context ---";

pub const GROUNDING_INSTRUCTION: &str = "Use the above context to inform your response. \
     If the context doesn't cover the question, say so — don't fabricate.";

pub const SOURCES_UNAVAILABLE_NOTE: &str =
    "(Knowledge base temporarily unavailable — responding from conversation only)";

/// The ordered entries sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPrompt {
    pub messages: Vec<Message>,
}

impl AssembledPrompt {
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Characters across all entries.
    pub fn char_len(&self) -> usize {
        self.messages.iter().map(Message::char_len).sum()
    }

    /// History entries carried (everything between system and final user).
    pub fn history_len(&self) -> usize {
        self.messages.len().saturating_sub(2)
    }

    /// The final user entry.
    pub fn final_entry(&self) -> Option<&Message> {
        self.messages.last()
    }
}

pub struct PromptBuilder {
    system_prompt: String,
    history_budget_chars: usize,
}

impl PromptBuilder {
    pub fn new(system_prompt: impl Into<String>, history_budget_chars: usize) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history_budget_chars,
        }
    }

    pub fn from_config(config: &second_config::AppConfig) -> Self {
        Self::new(
            config.identity.system_prompt.clone(),
            config.history.budget_chars,
        )
    }

    pub fn build(&self, context: &ContextBundle, history: &[Message], user_text: &str) -> AssembledPrompt {
        let trimmed = self.fit_history(history);

        let mut messages = Vec::with_capacity(trimmed.len() + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(trimmed.iter().map(|&m| m.clone()));
        messages.push(Message::user(Self::final_user_text(context, user_text)));

        AssembledPrompt { messages }
    }

    /// Complete user/assistant pairs, newest first, while they fit the
    /// history budget. A user turn never appears without its reply, and a
    /// leading unpaired turn is left out.
    fn fit_history<'a>(&self, history: &'a [Message]) -> Vec<&'a Message> {
        let mut kept: Vec<&Message> = Vec::new();
        let mut used = 0;

        for pair in history.rchunks_exact(2) {
            let (question, answer) = (&pair[0], &pair[1]);
            if question.role() != Role::User || answer.role() != Role::Assistant {
                break;
            }
            let pair_chars = question.char_len() + answer.char_len();
            if used + pair_chars > self.history_budget_chars {
                break;
            }
            used += pair_chars;
            kept.push(answer);
            kept.push(question);
        }

        kept.reverse();
        kept
    }

    fn final_user_text(context: &ContextBundle, user_text: &str) -> String {
        let mut parts: Vec<String> = Vec::new();

        if !context.is_empty() {
            parts.push(CONTEXT_HEADER.into());
            parts.push(context.render());
            parts.push(String::new());
            parts.push(GROUNDING_INSTRUCTION.into());
            parts.push(String::new());
        }

        if context.all_failed {
            parts.push(SOURCES_UNAVAILABLE_NOTE.into());
            parts.push(String::new());
        }

        if parts.is_empty() {
            return user_text.to_string();
        }
        parts.push(user_text.to_string());
        parts.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::retriever::ContextSection;

    fn builder() -> PromptBuilder {
        PromptBuilder::new("You are Second.", 2400)
    }

    fn bundle(lines: &[&str]) -> ContextBundle {
        ContextBundle {
            sections: vec![ContextSection {
                source: "watcher".into(),
                lines: lines.iter().map(|l| l.to_string()).collect(),
            }],
            all_failed: false,
        }
    }

    fn exchange(q: &str, a: &str) -> Vec<Message> {
        vec![Message::user(q), Message::assistant(a)]
    }

    #[test]
    fn empty_context_sends_text_unmodified() {
        let prompt = builder().build(&ContextBundle::empty(), &[], "What's up?");
        assert_eq!(prompt.messages.len(), 2);
        assert_eq!(prompt.messages[0].role(), Role::System);
        assert_eq!(prompt.messages[0].content(), "You are Second.");
        assert_eq!(prompt.messages[1].content(), "What's up?");
    }

    #[test]
    fn context_is_prepended_with_grounding_instruction() {
        let prompt = builder().build(&bundle(&["[Memory] Pour is Friday."]), &[], "When is the pour?");
        let last = prompt.final_entry().unwrap();
        assert_eq!(last.role(), Role::User);
        assert!(last.content().starts_with(CONTEXT_HEADER));
        assert!(last.content().contains("[Memory] Pour is Friday."));
        assert!(last.content().contains(GROUNDING_INSTRUCTION));
        assert!(last.content().ends_with("\nWhen is the pour?"));
    }

    #[test]
    fn failed_sources_add_the_note() {
        let context = ContextBundle {
            sections: vec![],
            all_failed: true,
        };
        let prompt = builder().build(&context, &[], "hi");
        let last = prompt.final_entry().unwrap().content();
        assert!(last.contains(SOURCES_UNAVAILABLE_NOTE));
        assert!(!last.contains(CONTEXT_HEADER));
        assert!(last.ends_with("hi"));
    }

    #[test]
    fn history_is_chronological_between_system_and_user() {
        let mut history = exchange("q1", "a1");
        history.extend(exchange("q2", "a2"));
        let prompt = builder().build(&ContextBundle::empty(), &history, "q3");

        let texts: Vec<&str> = prompt.messages.iter().map(|m| m.content()).collect();
        assert_eq!(texts, vec!["You are Second.", "q1", "a1", "q2", "a2", "q3"]);
        assert_eq!(prompt.history_len(), 4);
    }

    #[test]
    fn history_budget_drops_oldest_pairs_whole() {
        let mut history = exchange(&"o".repeat(600), &"o".repeat(600));
        history.extend(exchange(&"m".repeat(500), &"m".repeat(500)));
        history.extend(exchange(&"n".repeat(400), &"n".repeat(400)));
        let prompt = builder().build(&ContextBundle::empty(), &history, "now");

        // newest two pairs are 1800 chars, adding the oldest would be 3000
        assert_eq!(prompt.history_len(), 4);
        assert!(prompt.messages[1].content().starts_with('m'));
        assert_eq!(prompt.messages[1].role(), Role::User);
        assert_eq!(prompt.messages[2].role(), Role::Assistant);
    }

    #[test]
    fn leading_orphan_turn_is_skipped() {
        let mut history = vec![Message::assistant("orphaned reply")];
        history.extend(exchange("q", "a"));
        let prompt = builder().build(&ContextBundle::empty(), &history, "next");
        let texts: Vec<&str> = prompt.messages.iter().map(|m| m.content()).collect();
        assert_eq!(texts, vec!["You are Second.", "q", "a", "next"]);
    }

    #[test]
    fn user_text_is_never_truncated() {
        let huge = "z".repeat(20_000);
        let mut history = exchange(&"h".repeat(3000), "a");
        history.extend(exchange("q", "a"));
        let prompt = PromptBuilder::new("sys", 100).build(&bundle(&["[Docs] x"]), &history, &huge);
        assert!(prompt.final_entry().unwrap().content().ends_with(&huge));
    }
}
