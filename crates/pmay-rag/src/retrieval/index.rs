//! Embedding index: chunk text in, nearest neighbours out

use std::sync::Arc;

use crate::error::Result;
use crate::providers::{EmbeddingProvider, StoredChunk, VectorStoreProvider};
use crate::types::{Chunk, QueryResult};

/// Nearest-neighbour index over embedded chunks
///
/// Embeds text with an [`EmbeddingProvider`] and stores or searches the
/// vectors through a [`VectorStoreProvider`].
#[derive(Clone)]
pub struct ChunkIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStoreProvider>,
}

impl ChunkIndex {
    /// Create an index from its providers
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStoreProvider>) -> Self {
        Self { embedder, store }
    }

    /// Up to `limit` chunks closest to `text`, most similar first
    ///
    /// Backend failures are logged and reported as an empty result.
    pub async fn query(&self, text: &str, limit: usize) -> QueryResult {
        match self.try_query(text, limit).await {
            Ok(result) => {
                tracing::debug!("Index returned {} documents", result.len());
                result
            }
            Err(e) => {
                tracing::warn!("Index query failed, continuing without context: {}", e);
                QueryResult::empty()
            }
        }
    }

    async fn try_query(&self, text: &str, limit: usize) -> Result<QueryResult> {
        if limit == 0 || self.store.is_empty().await? {
            return Ok(QueryResult::empty());
        }

        let embedding = self.embedder.embed(text).await?;
        let hits = self.store.search(&embedding, limit).await?;

        let mut result = QueryResult::empty();
        for hit in hits {
            result.push(hit.chunk.text, hit.chunk.metadata, hit.similarity);
        }
        Ok(result)
    }

    /// Embed and store `chunks` under ids `doc_{id_prefix}_{i}`
    ///
    /// Blank chunks are skipped; ids follow input positions. Returns the
    /// number of chunks written.
    pub async fn add(&self, chunks: Vec<Chunk>, id_prefix: &str) -> Result<usize> {
        let (ids, chunks): (Vec<String>, Vec<Chunk>) = chunks
            .into_iter()
            .enumerate()
            .filter(|(_, chunk)| chunk.has_text())
            .map(|(i, chunk)| (Chunk::id_for(id_prefix, i), chunk))
            .unzip();

        if chunks.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;

        let records: Vec<StoredChunk> = ids
            .into_iter()
            .zip(chunks)
            .zip(embeddings)
            .map(|((id, chunk), embedding)| StoredChunk {
                id,
                text: chunk.text,
                metadata: chunk.metadata,
                embedding,
            })
            .collect();

        let written = self.store.insert_chunks(records).await?;
        tracing::info!(
            "Indexed {} chunks for '{}' via {} / {}",
            written,
            id_prefix,
            self.embedder.name(),
            self.store.name()
        );
        Ok(written)
    }

    /// Number of stored chunks
    pub async fn len(&self) -> Result<usize> {
        self.store.len().await
    }

    /// Whether both providers respond
    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.embedder.health_check().await? && self.store.health_check().await?)
    }
}
