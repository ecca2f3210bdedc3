//! Retrieval orchestrator: one pass per chat message
//!
//! ```text
//! GreetingCheck -> QueryIndex -> Rerank -> StreamGeneration -> EmitSources -> Done
//!       |               |          |
//!       +---------------+----------+--> Done (canned reply or apology)
//! ```
//!
//! Every stage either emits at least one event or hands over to a stage
//! that does, so a client never sees an empty stream.

use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::RagConfig;
use crate::generation::{generate, GENERATION_APOLOGY, SYSTEM_PROMPT};
use crate::providers::LlmProvider;
use crate::retrieval::{ChunkIndex, RerankOutcome, Reranker};
use crate::types::{QueryResult, SourceRef, StreamEvent};

use super::greeting::GreetingResponder;

/// Reply when retrieval finds nothing to ground an answer on
pub const NO_INFO_APOLOGY: &str = "I apologize, but I couldn't find specific information about that in my knowledge base. Could you please rephrase your question or ask about a different aspect of PMAY?";

/// Stage of the per-message state machine
#[derive(Debug)]
enum ChatStage {
    GreetingCheck,
    QueryIndex,
    Rerank(QueryResult),
    StreamGeneration(QueryResult, RerankOutcome),
    EmitSources(QueryResult, RerankOutcome),
    Done,
}

/// Tunables read from config
#[derive(Debug, Clone)]
struct PipelineSettings {
    n_results: usize,
    preview_chars: usize,
    stream_buffer: usize,
}

/// Turns a chat message into a stream of [`StreamEvent`]s
#[derive(Clone)]
pub struct ChatPipeline {
    index: ChunkIndex,
    reranker: Arc<Reranker>,
    llm: Arc<dyn LlmProvider>,
    greetings: Arc<GreetingResponder>,
    settings: PipelineSettings,
}

impl ChatPipeline {
    /// Create a pipeline over the given collaborators
    pub fn new(
        index: ChunkIndex,
        reranker: Arc<Reranker>,
        llm: Arc<dyn LlmProvider>,
        config: &RagConfig,
    ) -> Self {
        Self {
            index,
            reranker,
            llm,
            greetings: Arc::new(GreetingResponder::default()),
            settings: PipelineSettings {
                n_results: config.retrieval.n_results,
                preview_chars: config.retrieval.source_preview_chars,
                stream_buffer: config.server.stream_buffer,
            },
        }
    }

    /// Index the pipeline retrieves from
    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    /// Reranker used by the pipeline
    pub fn reranker(&self) -> &Arc<Reranker> {
        &self.reranker
    }

    /// Answer `message`
    ///
    /// Work runs on a spawned task; events are delivered in order through a
    /// bounded channel. Dropping the stream stops the task at its next send.
    pub fn respond(&self, message: &str) -> ReceiverStream<StreamEvent> {
        let (tx, rx) = mpsc::channel(self.settings.stream_buffer.max(1));
        let pipeline = self.clone();
        let message = message.to_string();

        tokio::spawn(async move {
            pipeline.run(&message, &tx).await;
        });

        ReceiverStream::new(rx)
    }

    async fn run(&self, message: &str, tx: &mpsc::Sender<StreamEvent>) {
        let mut stage = ChatStage::GreetingCheck;

        loop {
            stage = match stage {
                ChatStage::GreetingCheck => match self.greetings.reply(message) {
                    Some(reply) => {
                        tracing::info!("Answered greeting without retrieval");
                        emit(tx, StreamEvent::text(reply)).await;
                        ChatStage::Done
                    }
                    None => ChatStage::QueryIndex,
                },

                ChatStage::QueryIndex => {
                    let retrieved = self.index.query(message, self.settings.n_results).await;
                    if retrieved.is_empty() {
                        tracing::info!("No documents retrieved for question");
                        emit(tx, StreamEvent::text(NO_INFO_APOLOGY)).await;
                        ChatStage::Done
                    } else {
                        ChatStage::Rerank(retrieved)
                    }
                }

                ChatStage::Rerank(retrieved) => {
                    let reranked = self.reranker.rerank(&retrieved.documents, message).await;
                    if reranked.is_empty() || reranked.text.trim().is_empty() {
                        emit(tx, StreamEvent::text(NO_INFO_APOLOGY)).await;
                        ChatStage::Done
                    } else {
                        ChatStage::StreamGeneration(retrieved, reranked)
                    }
                }

                ChatStage::StreamGeneration(retrieved, reranked) => {
                    let mut fragments = generate(
                        self.llm.clone(),
                        &reranked.text,
                        message,
                        SYSTEM_PROMPT,
                        self.settings.stream_buffer,
                    );

                    let mut connected = true;
                    let mut forwarded = 0usize;
                    while let Some(fragment) = fragments.next().await {
                        if !emit(tx, StreamEvent::text(fragment)).await {
                            connected = false;
                            break;
                        }
                        forwarded += 1;
                    }

                    if connected && forwarded == 0 {
                        tracing::warn!("Generation finished without any answer text");
                        connected = emit(tx, StreamEvent::text(GENERATION_APOLOGY)).await;
                    }

                    if connected {
                        ChatStage::EmitSources(retrieved, reranked)
                    } else {
                        ChatStage::Done
                    }
                }

                ChatStage::EmitSources(retrieved, reranked) => {
                    let sources = build_sources(&retrieved, &reranked, self.settings.preview_chars);
                    if sources.is_empty() {
                        tracing::warn!("No reranked id resolved to a retrieved document");
                    } else {
                        emit(tx, StreamEvent::Sources { sources }).await;
                    }
                    ChatStage::Done
                }

                ChatStage::Done => break,
            };
        }
    }
}

/// Send one event; false once the client is gone
async fn emit(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    match tx.send(event).await {
        Ok(()) => true,
        Err(_) => {
            tracing::debug!("Chat stream closed by client");
            false
        }
    }
}

/// Citations for the reranked passages, best first
///
/// Ids outside `retrieved` are dropped.
pub fn build_sources(
    retrieved: &QueryResult,
    reranked: &RerankOutcome,
    preview_chars: usize,
) -> Vec<SourceRef> {
    reranked
        .ids
        .iter()
        .zip(&reranked.scores)
        .filter_map(|(&id, &score)| {
            let text = retrieved.documents.get(id)?;
            let metadata = retrieved.metadatas.get(id).cloned().unwrap_or_default();
            Some(SourceRef::new(text, score, metadata, preview_chars))
        })
        .collect()
}
