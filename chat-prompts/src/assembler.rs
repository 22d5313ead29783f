//! Deterministic prompt assembly.

use std::fmt::Write;

use chat_primitives::MessageRole;

use crate::message::PromptMessage;
use crate::system::DEFAULT_SYSTEM_PROMPT;

/// The assembler's view of one retrieved chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextSource {
    file_name: String,
    text: String,
}

impl ContextSource {
    /// Creates a context source entry.
    #[must_use]
    pub fn new(file_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            text: text.into(),
        }
    }

    /// Returns the originating file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the chunk text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Builds the model-ready message list for a grounded turn.
///
/// The structure is fixed: one system entry (base instructions, then an
/// embedded summary block if non-empty, then a numbered context block if any
/// sources were retrieved), followed by the recent messages in chronological
/// order, followed by the current question as the final user entry. Source
/// numbering matches the input order exactly — downstream citation text
/// refers to these indices.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    system_prompt: String,
}

impl PromptAssembler {
    /// Creates an assembler using the default grounding instructions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_owned(),
        }
    }

    /// Overrides the base system instructions.
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// Returns the configured base system instructions.
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Assembles the ordered message list for one turn.
    #[must_use]
    pub fn assemble(
        &self,
        summary: &str,
        sources: &[ContextSource],
        recent: &[PromptMessage],
        question: &str,
    ) -> Vec<PromptMessage> {
        let mut system = self.system_prompt.clone();

        if !summary.is_empty() {
            let _ = write!(
                system,
                "\n\n<conversation_summary>\n{summary}\n</conversation_summary>"
            );
        }

        if !sources.is_empty() {
            let context_block = sources
                .iter()
                .enumerate()
                .map(|(i, source)| {
                    format!("[Source {}: {}]\n{}", i + 1, source.file_name(), source.text())
                })
                .collect::<Vec<_>>()
                .join("\n\n");
            let _ = write!(
                system,
                "\n\n<retrieved_context>\n{context_block}\n</retrieved_context>"
            );
        }

        let mut messages = Vec::with_capacity(recent.len() + 2);
        messages.push(PromptMessage::new(MessageRole::System, system));
        messages.extend(recent.iter().cloned());
        messages.push(PromptMessage::new(MessageRole::User, question));
        messages
    }
}

impl Default for PromptAssembler {
    fn default() -> Self {
        Self::new()
    }
}
