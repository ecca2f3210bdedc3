//! Request and index query types

use serde::{Deserialize, Serialize};

use super::document::Metadata;
use crate::error::{Error, Result};

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,
}

impl ChatRequest {
    /// Create a new request
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Reject messages with no content
    pub fn validate(&self) -> Result<()> {
        if self.message.trim().is_empty() {
            return Err(Error::Validation("message must not be blank".to_string()));
        }
        Ok(())
    }
}

/// Nearest-neighbour result in index order
///
/// `documents`, `metadatas` and `scores` are parallel; position `i` in each
/// refers to the same chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Chunk texts
    pub documents: Vec<String>,
    /// Chunk metadata
    pub metadatas: Vec<Metadata>,
    /// Cosine similarity reported by the index
    pub scores: Vec<f32>,
}

impl QueryResult {
    /// Result with no documents
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of documents
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether no documents were returned
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Append one entry, skipping blank text so positions stay aligned
    pub fn push(&mut self, document: String, metadata: Metadata, score: f32) {
        if document.trim().is_empty() {
            return;
        }
        self.documents.push(document);
        self.metadatas.push(metadata);
        self.scores.push(score);
    }
}
