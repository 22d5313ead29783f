//! Fixed prompt templates for query rewriting and summarization.

use crate::message::PromptMessage;

/// Formats messages as a `role: content` transcript, one message per line.
#[must_use]
pub fn transcript(messages: &[PromptMessage]) -> String {
    messages
        .iter()
        .map(|message| format!("{}: {}", message.role(), message.content()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Builds the prompt that rewrites a follow-up message into a standalone
/// search query.
#[must_use]
pub fn rewrite_prompt(recent_transcript: &str, question: &str) -> String {
    format!(
        "Given this conversation:\n{recent_transcript}\n\nThe user just asked: \
         \"{question}\"\n\nRewrite as a standalone search query. Return ONLY the query."
    )
}

/// Builds the summarization prompt. With an existing summary the new messages
/// are folded into it; otherwise a fresh summary is requested.
#[must_use]
pub fn summary_prompt(existing_summary: &str, new_transcript: &str) -> String {
    if existing_summary.is_empty() {
        format!(
            "Summarize the following conversation. Focus on key facts, decisions, \
             preferences, and important Q&A.\nKeep it concise (under 300 words).\n\n\
             {new_transcript}\n\nReturn ONLY the summary."
        )
    } else {
        format!(
            "Here is a summary of the conversation so far:\n{existing_summary}\n\n\
             Here are the new messages since that summary:\n{new_transcript}\n\n\
             Update the summary to include the key information from these new messages.\n\
             Keep it concise (under 300 words). Focus on:\n\
             - Key facts, decisions, and agreements\n\
             - User preferences and requirements mentioned\n\
             - Important questions asked and answers given\n\
             - Any action items or follow-ups\n\n\
             Return ONLY the updated summary."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_primitives::MessageRole;

    #[test]
    fn transcript_preserves_order_and_roles() {
        let messages = vec![
            PromptMessage::new(MessageRole::User, "hi"),
            PromptMessage::new(MessageRole::Assistant, "hello"),
        ];
        assert_eq!(transcript(&messages), "user: hi\nassistant: hello");
    }

    #[test]
    fn rewrite_prompt_embeds_question() {
        let prompt = rewrite_prompt("user: what about returns?", "and for electronics?");
        assert!(prompt.contains("\"and for electronics?\""));
        assert!(prompt.contains("standalone search query"));
    }

    #[test]
    fn summary_prompt_branches_on_existing_summary() {
        let fresh = summary_prompt("", "user: hi");
        assert!(fresh.starts_with("Summarize the following conversation."));

        let folded = summary_prompt("They discussed refunds.", "user: hi");
        assert!(folded.contains("summary of the conversation so far"));
        assert!(folded.contains("They discussed refunds."));
    }
}
