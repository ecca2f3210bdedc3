//! Vector store provider trait for storing and searching embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Chunk, Metadata};

/// A chunk together with its id and embedding, as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Chunk id (`doc_{name}_{index}`)
    pub id: String,
    /// Chunk text
    pub text: String,
    /// Chunk metadata
    pub metadata: Metadata,
    /// Embedding of `text`
    pub embedding: Vec<f32>,
}

impl StoredChunk {
    /// Drop the embedding and return the chunk
    pub fn to_chunk(&self) -> Chunk {
        Chunk {
            text: self.text.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Search result from vector store
#[derive(Debug, Clone)]
pub struct VectorSearchResult {
    /// Id of the matched chunk
    pub id: String,
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity (-1.0 to 1.0, higher is more similar)
    pub similarity: f32,
}

/// Trait for vector storage and similarity search
///
/// Implementations:
/// - `LocalVectorStore`: redb-backed store with exact cosine search
#[async_trait]
pub trait VectorStoreProvider: Send + Sync {
    /// Insert or replace chunks; returns the number written
    async fn insert_chunks(&self, chunks: Vec<StoredChunk>) -> Result<usize>;

    /// Search for the `top_k` most similar chunks, most similar first
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>>;

    /// Get total number of vectors stored
    async fn len(&self) -> Result<usize>;

    /// Check if store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Check if the provider is healthy
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
