//! Canned replies for greetings and questions about the bot itself

use std::collections::HashMap;

const GREETINGS: &[(&str, &str)] = &[
    (
        "hi",
        "Hello! I'm the PMAY MoHUA chatbot. I can assist you with information related to the Pradhan Mantri Awas Yojana (PMAY) and urban affairs. How can I help you today?",
    ),
    (
        "hello",
        "Hi there! I'm the PMAY MoHUA chatbot, designed to help you with queries about the Pradhan Mantri Awas Yojana. What information are you looking for today?",
    ),
    (
        "hey",
        "Hey! I'm here to provide you with accurate information on the PMAY scheme. Feel free to ask me anything about eligibility, the application process, or related topics!",
    ),
    (
        "introduce yourself",
        "I am the PMAY MoHUA chatbot, created by the Ministry of Housing and Urban Affairs (MoHUA) to assist citizens with the Pradhan Mantri Awas Yojana (PMAY) scheme. I can help you understand your eligibility, guide you through the application process, answer questions about housing and urban development, and share official links and resources.",
    ),
    (
        "who are you",
        "I am the PMAY Chatbot, created by the Ministry of Housing and Urban Affairs (MoHUA) to assist users with queries related to the Pradhan Mantri Awas Yojana (PMAY) scheme. My goal is to provide accurate and helpful information based on official context.",
    ),
    (
        "what are you",
        "I am the PMAY Chatbot, designed to help you with queries regarding housing and urban development, specifically related to the PMAY scheme. I can assist you with information about the application process, eligibility, and more.",
    ),
];

/// Exact-match lookup of greeting replies
///
/// Keys are compared after trimming and lowercasing the message; "hi there"
/// is not a greeting, "  HI " is.
#[derive(Debug, Clone)]
pub struct GreetingResponder {
    replies: HashMap<String, String>,
}

impl Default for GreetingResponder {
    fn default() -> Self {
        Self::from_pairs(GREETINGS.iter().copied())
    }
}

impl GreetingResponder {
    /// Build from (key, reply) pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            replies: pairs
                .into_iter()
                .map(|(key, reply)| (normalize(key), reply.to_string()))
                .collect(),
        }
    }

    /// Canned reply for `message`, if it is a greeting
    pub fn reply(&self, message: &str) -> Option<&str> {
        self.replies.get(&normalize(message)).map(String::as_str)
    }

    /// Number of known greetings
    pub fn len(&self) -> usize {
        self.replies.len()
    }

    /// Whether no greetings are known
    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_greetings_known() {
        let responder = GreetingResponder::default();
        assert_eq!(responder.len(), 6);
        for key in ["hi", "hello", "hey", "introduce yourself", "who are you", "what are you"] {
            assert!(responder.reply(key).is_some(), "missing greeting {key}");
        }
    }

    #[test]
    fn test_match_ignores_case_and_padding() {
        let responder = GreetingResponder::default();
        assert_eq!(responder.reply("  HeLLo \n"), responder.reply("hello"));
        assert!(responder.reply("Who Are You").unwrap().starts_with("I am the PMAY Chatbot"));
    }

    #[test]
    fn test_partial_match_is_not_a_greeting() {
        let responder = GreetingResponder::default();
        assert!(responder.reply("hi, what is PMAY?").is_none());
        assert!(responder.reply("").is_none());
    }
}
