//! End-to-end chat flow over the public API with in-process providers

use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use std::sync::Arc;

use pmay_rag::chat::NO_INFO_APOLOGY;
use pmay_rag::config::RerankerConfig;
use pmay_rag::generation::GENERATION_APOLOGY;
use pmay_rag::providers::{
    ChatMessage, EmbeddingProvider, FragmentStream, LlmProvider, LocalVectorStore,
};
use pmay_rag::retrieval::RelevanceScorer;
use pmay_rag::{ChatPipeline, Chunk, ChunkIndex, Error, RagConfig, Reranker, Result, StreamEvent};

struct LetterEmbedder;

#[async_trait]
impl EmbeddingProvider for LetterEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
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

struct ScriptedLlm(Option<Vec<&'static str>>);

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn stream_chat(&self, messages: Vec<ChatMessage>) -> Result<FragmentStream> {
        assert_eq!(messages.len(), 2);
        match &self.0 {
            Some(fragments) => {
                let items: Vec<Result<String>> = fragments.iter().map(|f| Ok(f.to_string())).collect();
                Ok(stream::iter(items).boxed())
            }
            None => Err(Error::llm("connection refused")),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.0.is_some())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

struct OverlapScorer;

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

fn pipeline(dir: &tempfile::TempDir, llm: ScriptedLlm) -> ChatPipeline {
    let store = LocalVectorStore::open(&dir.path().join("chunks.redb"), "rag_app").unwrap();
    let index = ChunkIndex::new(Arc::new(LetterEmbedder), Arc::new(store));
    let reranker = Reranker::with_scorer(RerankerConfig::default(), Arc::new(OverlapScorer));
    ChatPipeline::new(index, Arc::new(reranker), Arc::new(llm), &RagConfig::default())
}

async fn seed(pipeline: &ChatPipeline) {
    let chunks = vec![
        Chunk::new("Beneficiaries can apply online through the PMAY portal")
            .with_meta("source", "guide.pdf")
            .with_meta("page", 1),
        Chunk::new("The subsidy is credited to the loan account")
            .with_meta("source", "guide.pdf")
            .with_meta("page", 2),
        Chunk::new("Carpet area limits depend on the income group")
            .with_meta("source", "faq.pdf")
            .with_meta("page", 1),
        Chunk::new("Documents needed: Aadhaar, income proof and bank details")
            .with_meta("source", "faq.pdf")
            .with_meta("page", 3),
    ];
    assert_eq!(pipeline.index().add(chunks, "seed").await.unwrap(), 4);
}

async fn collect(pipeline: &ChatPipeline, message: &str) -> Vec<StreamEvent> {
    pipeline.respond(message).collect().await
}

#[tokio::test]
async fn greeting_is_answered_without_retrieval() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir, ScriptedLlm(None));

    let events = collect(&pipeline, "Hi").await;
    assert_eq!(events.len(), 1);
    assert!(events[0].as_text().unwrap().contains("PMAY"));
}

#[tokio::test]
async fn empty_index_yields_single_apology() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir, ScriptedLlm(Some(vec!["unused"])));

    let events = collect(&pipeline, "How do I apply?").await;
    assert_eq!(events, vec![StreamEvent::text(NO_INFO_APOLOGY)]);
}

#[tokio::test]
async fn answer_streams_fragments_then_sources() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir, ScriptedLlm(Some(vec!["You can ", "apply ", "online."])));
    seed(&pipeline).await;

    let events = collect(&pipeline, "how to apply online").await;
    let (last, texts) = events.split_last().unwrap();

    let answer: String = texts.iter().map(|e| e.as_text().unwrap()).collect();
    assert_eq!(answer, "You can apply online.");

    match last {
        StreamEvent::Sources { sources } => {
            assert!(!sources.is_empty() && sources.len() <= 3);
            assert!(sources[0].text.contains("apply online"));
            assert!(sources.windows(2).all(|w| w[0].score >= w[1].score));
            assert!(sources.iter().all(|s| s.score > 0.0 && s.score < 1.0));
        }
        other => panic!("expected sources, got {:?}", other),
    }
}

#[tokio::test]
async fn generation_failure_apologizes_and_still_cites() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&dir, ScriptedLlm(None));
    seed(&pipeline).await;

    let events = collect(&pipeline, "what documents are needed").await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].as_text(), Some(GENERATION_APOLOGY));
    assert!(matches!(events[1], StreamEvent::Sources { .. }));
}
