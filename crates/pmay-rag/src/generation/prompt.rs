//! Prompt templates for grounded PMAY answers

use crate::providers::ChatMessage;

/// Behavioural prompt sent as the system message of every generation
pub const SYSTEM_PROMPT: &str = include_str!("system_prompt.md");

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// User message carrying the reranked context and the question
    pub fn user_message(context: &str, query: &str) -> String {
        format!("Context: {}\n\nQuestion: {}", context, query)
    }

    /// Messages of one chat request: system prompt, then context + question
    pub fn build_messages(context: &str, query: &str, system_prompt: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(Self::user_message(context, query)),
        ]
    }
}
