//! In-process fakes shared by unit tests

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::chat::ChatPipeline;
use crate::config::{RagConfig, RerankerConfig};
use crate::error::{Error, Result};
use crate::providers::{
    ChatMessage, EmbeddingProvider, FragmentStream, LlmProvider, LocalVectorStore,
};
use crate::retrieval::{ChunkIndex, RelevanceScorer, Reranker};

/// Number of `embed` calls seen by a [`LetterEmbedder`]
#[derive(Clone, Default)]
pub struct EmbedCounter(Arc<AtomicUsize>);

impl EmbedCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Letter-frequency embeddings
#[derive(Default)]
pub struct LetterEmbedder {
    pub calls: EmbedCounter,
}

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.0.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![0.0f32; 27];
        for c in text.to_ascii_lowercase().bytes() {
            match c {
                b'a'..=b'z' => v[(c - b'a') as usize] += 1.0,
                _ => v[26] += 0.1,
            }
        }
        Ok(v)
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "letters"
    }
}

/// Replays a fixed answer, or fails the request
pub struct ScriptedLlm {
    fragments: Option<Vec<String>>,
}

impl ScriptedLlm {
    pub fn fragments(fragments: &[&str]) -> Self {
        Self {
            fragments: Some(fragments.iter().map(|f| f.to_string()).collect()),
        }
    }

    pub fn failing() -> Self {
        Self { fragments: None }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn stream_chat(&self, _messages: Vec<ChatMessage>) -> Result<FragmentStream> {
        match &self.fragments {
            Some(fragments) => Ok(stream::iter(fragments.clone().into_iter().map(Ok)).boxed()),
            None => Err(Error::llm("connection refused")),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.fragments.is_some())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

/// Scores a passage by how many query words it contains, squashed into (0, 1)
pub struct OverlapScorer;

impl RelevanceScorer for OverlapScorer {
    fn score(&self, query: &str, passages: &[&str]) -> Result<Vec<f32>> {
        Ok(passages
            .iter()
            .map(|p| {
                let hits = query.split_whitespace().filter(|w| p.contains(w)).count() as f32;
                1.0 / (1.0 + (1.0 - hits).exp())
            })
            .collect())
    }
}

/// Pipeline over a fresh on-disk store in `dir`
pub fn fixture_pipeline(dir: &tempfile::TempDir, llm: ScriptedLlm) -> (ChatPipeline, EmbedCounter) {
    let embedder = LetterEmbedder::default();
    let calls = embedder.calls.clone();

    let store = LocalVectorStore::open(&dir.path().join("chunks.redb"), "rag_app").unwrap();
    let index = ChunkIndex::new(Arc::new(embedder), Arc::new(store));
    let reranker = Reranker::with_scorer(RerankerConfig::default(), Arc::new(OverlapScorer));

    let pipeline = ChatPipeline::new(index, Arc::new(reranker), Arc::new(llm), &RagConfig::default());
    (pipeline, calls)
}
