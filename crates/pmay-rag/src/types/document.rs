//! Chunk type produced by ingestion and stored in the index

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Arbitrary key-value metadata attached to a chunk
pub type Metadata = serde_json::Map<String, Value>;

/// A segment of an ingested document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text
    pub text: String,
    /// Source metadata (filename, page, ...)
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Create a chunk without metadata
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Identifier of the `index`-th chunk of a document
    pub fn id_for(id_prefix: &str, index: usize) -> String {
        format!("doc_{}_{}", id_prefix, index)
    }

    /// Whether the chunk carries any non-whitespace text
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}
