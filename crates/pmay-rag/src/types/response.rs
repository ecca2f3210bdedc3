//! Response types: streamed chat events and upload results

use serde::{Deserialize, Serialize};

use super::document::Metadata;

/// Marker appended to truncated previews
pub const ELLIPSIS: &str = "...";

/// One event on the chat stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// A piece of answer text (canned reply, apology or generated fragment)
    Text { content: String },
    /// Passages the answer was grounded on
    Sources { sources: Vec<SourceRef> },
}

impl StreamEvent {
    /// Text event
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text {
            content: content.into(),
        }
    }

    /// Text carried by this event, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { content } => Some(content),
            Self::Sources { .. } => None,
        }
    }
}

/// Citation of a retrieved passage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Passage preview
    pub text: String,
    /// Cross-encoder relevance score
    pub score: f32,
    /// Passage metadata
    pub metadata: Metadata,
}

impl SourceRef {
    /// Build a source reference, truncating the passage preview
    pub fn new(text: &str, score: f32, metadata: Metadata, max_chars: usize) -> Self {
        Self {
            text: truncate_preview(text, max_chars),
            score,
            metadata,
        }
    }
}

/// Keep the first `max_chars` characters, marking truncation with an ellipsis
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_end, _)) => format!("{}{}", &text[..byte_end], ELLIPSIS),
        None => text.to_string(),
    }
}

/// Body returned by `POST /upload`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Human-readable status
    pub message: String,
    /// Number of chunks added to the index
    pub chunks_added: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_event_wire_format() {
        let value = serde_json::to_value(StreamEvent::text("Hello")).unwrap();
        assert_eq!(value, json!({"type": "text", "content": "Hello"}));
    }

    #[test]
    fn test_sources_event_wire_format() {
        let mut metadata = Metadata::new();
        metadata.insert("source".into(), json!("pmay.pdf"));
        let event = StreamEvent::Sources {
            sources: vec![SourceRef::new("EWS income limit", 0.75, metadata, 200)],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "sources");
        assert_eq!(value["sources"][0]["text"], "EWS income limit");
        assert_eq!(value["sources"][0]["metadata"]["source"], "pmay.pdf");
    }

    #[test]
    fn test_truncate_preview() {
        assert_eq!(truncate_preview("short", 200), "short");
        let long = "a".repeat(250);
        let preview = truncate_preview(&long, 200);
        assert_eq!(preview.chars().count(), 203);
        assert!(preview.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_truncate_preview_respects_char_boundaries() {
        let text = "आवास योजना".repeat(40);
        let preview = truncate_preview(&text, 200);
        assert_eq!(preview.chars().count(), 200 + ELLIPSIS.len());
    }
}
