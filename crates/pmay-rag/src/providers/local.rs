//! Local vector store: redb-persisted chunks, exact cosine search in memory
//!
//! Every chunk record (text, metadata, embedding) is written to a redb table
//! named after the collection and mirrored in a `DashMap` that serves
//! searches. The mirror is rebuilt from disk on open.

use async_trait::async_trait;
use dashmap::DashMap;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

use crate::config::VectorDbConfig;
use crate::error::{Error, Result};

use super::vector_store::{StoredChunk, VectorSearchResult, VectorStoreProvider};

/// Local vector store
pub struct LocalVectorStore {
    /// On-disk records
    db: Arc<Database>,
    /// Table name
    collection: String,
    /// In-memory mirror keyed by chunk id
    chunks: Arc<DashMap<String, StoredChunk>>,
}

fn table(collection: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(collection)
}

fn db_err(e: impl std::fmt::Display) -> Error {
    Error::vector_db(e.to_string())
}

impl LocalVectorStore {
    /// Open (or create) the store at `path`
    pub fn open(path: &Path, collection: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path).map_err(db_err)?;

        // Create the table up front so read transactions can always open it
        let txn = db.begin_write().map_err(db_err)?;
        txn.open_table(table(collection)).map_err(db_err)?;
        txn.commit().map_err(db_err)?;

        let chunks = DashMap::new();
        {
            let txn = db.begin_read().map_err(db_err)?;
            let records = txn.open_table(table(collection)).map_err(db_err)?;
            for entry in records.iter().map_err(db_err)? {
                let (key, value) = entry.map_err(db_err)?;
                match serde_json::from_slice::<StoredChunk>(value.value()) {
                    Ok(chunk) => {
                        chunks.insert(chunk.id.clone(), chunk);
                    }
                    Err(e) => tracing::warn!("Skipping unreadable chunk {}: {}", key.value(), e),
                }
            }
        }

        tracing::info!(
            "Opened vector store {} (collection '{}', {} chunks)",
            path.display(),
            collection,
            chunks.len()
        );

        Ok(Self {
            db: Arc::new(db),
            collection: collection.to_string(),
            chunks: Arc::new(chunks),
        })
    }

    /// Create from config
    pub fn from_config(config: &VectorDbConfig) -> Result<Self> {
        Self::open(&config.storage_path, &config.collection)
    }

    fn write_records(db: &Database, collection: &str, chunks: &[StoredChunk]) -> Result<()> {
        let txn = db.begin_write().map_err(db_err)?;
        {
            let mut records = txn.open_table(table(collection)).map_err(db_err)?;
            for chunk in chunks {
                let bytes = serde_json::to_vec(chunk)?;
                records
                    .insert(chunk.id.as_str(), bytes.as_slice())
                    .map_err(db_err)?;
            }
        }
        txn.commit().map_err(db_err)?;
        Ok(())
    }
}

#[async_trait]
impl VectorStoreProvider for LocalVectorStore {
    async fn insert_chunks(&self, chunks: Vec<StoredChunk>) -> Result<usize> {
        let db = self.db.clone();
        let collection = self.collection.clone();
        let mirror = self.chunks.clone();

        tokio::task::spawn_blocking(move || {
            Self::write_records(&db, &collection, &chunks)?;
            let count = chunks.len();
            for chunk in chunks {
                mirror.insert(chunk.id.clone(), chunk);
            }
            Ok(count)
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<VectorSearchResult>> {
        if query_embedding.is_empty() {
            return Err(Error::vector_db("Query embedding is empty"));
        }

        let mirror = self.chunks.clone();
        let query = query_embedding.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut scored: Vec<(String, f32)> = mirror
                .iter()
                .filter(|entry| entry.embedding.len() == query.len())
                .map(|entry| (entry.key().clone(), cosine_similarity(&query, &entry.embedding)))
                .collect();

            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(top_k);

            Ok(scored
                .into_iter()
                .filter_map(|(id, similarity)| {
                    let chunk = mirror.get(&id)?.to_chunk();
                    Some(VectorSearchResult { id, chunk, similarity })
                })
                .collect())
        })
        .await
        .map_err(|e| Error::Internal(format!("Task join error: {}", e)))?
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.chunks.len())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "local-redb"
    }
}

/// Compute cosine similarity between two embeddings
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
