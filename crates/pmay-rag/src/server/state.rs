//! Application state for the chat server

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::chat::ChatPipeline;
use crate::config::RagConfig;
use crate::error::Result;
use crate::generation::OllamaClient;
use crate::ingestion::IngestPipeline;
use crate::providers::{LocalVectorStore, OllamaEmbedder, OllamaLlm};
use crate::retrieval::{ChunkIndex, Reranker};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: RagConfig,
    /// Question answering
    pipeline: ChatPipeline,
    /// Upload parsing and chunking
    ingest: IngestPipeline,
    /// Ready state
    ready: AtomicBool,
}

impl AppState {
    /// Wire up Ollama, the local store and the reranker from config
    pub async fn new(config: RagConfig) -> Result<Self> {
        tracing::info!("Initializing chat application state...");

        let ollama = Arc::new(OllamaClient::new(&config.llm, config.embeddings.model.clone())?);
        if ollama.health_check().await? {
            tracing::info!("Ollama reachable at {}", config.llm.base_url);
        } else {
            tracing::warn!(
                "Ollama not reachable at {}; questions will get the fallback answer until it is",
                config.llm.base_url
            );
        }

        let store = LocalVectorStore::from_config(&config.vector_db)?;
        let index = ChunkIndex::new(
            Arc::new(OllamaEmbedder::from_client(ollama.clone())),
            Arc::new(store),
        );
        tracing::info!("Vector store initialized ({} chunks)", index.len().await?);

        let reranker = Arc::new(Reranker::new(config.reranker.clone()));
        if config.reranker.preload {
            if let Err(e) = reranker.warm_up().await {
                tracing::warn!("Reranker preload failed, will retry on first question: {}", e);
            }
        }

        let pipeline = ChatPipeline::new(
            index,
            reranker,
            Arc::new(OllamaLlm::from_client(ollama)),
            &config,
        );

        let state = Self::from_parts(config, pipeline);
        state.set_ready(true);
        tracing::info!("Application state initialized");
        Ok(state)
    }

    /// Assemble state from an existing pipeline (not yet ready)
    pub fn from_parts(config: RagConfig, pipeline: ChatPipeline) -> Self {
        let ingest = IngestPipeline::from_config(&config.chunking);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pipeline,
                ingest,
                ready: AtomicBool::new(false),
            }),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &RagConfig {
        &self.inner.config
    }

    /// Get the chat pipeline
    pub fn pipeline(&self) -> &ChatPipeline {
        &self.inner.pipeline
    }

    /// Get the chunk index
    pub fn index(&self) -> &ChunkIndex {
        self.inner.pipeline.index()
    }

    /// Get the ingestion pipeline
    pub fn ingest(&self) -> &IngestPipeline {
        &self.inner.ingest
    }

    /// Check if ready
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        self.inner.ready.store(ready, Ordering::SeqCst);
    }
}
