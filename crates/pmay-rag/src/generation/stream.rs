//! Streamed generation: a producer task feeding a bounded channel
//!
//! The producer reads fragments from the upstream model and forwards each
//! one as soon as it arrives. A full channel blocks the producer; a closed
//! one (consumer gone) stops it.

use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::providers::LlmProvider;

use super::prompt::PromptBuilder;

/// Fragment sent in place of (or after) a failed generation
pub const GENERATION_APOLOGY: &str =
    "I apologize, but I encountered an error while processing your request. Please try again.";

/// Generate an answer to `query` grounded on `context`
///
/// Returns immediately; fragments arrive on the stream while the upstream
/// produces them. On failure the stream ends with [`GENERATION_APOLOGY`].
pub fn generate(
    llm: Arc<dyn LlmProvider>,
    context: &str,
    query: &str,
    system_prompt: &str,
    capacity: usize,
) -> ReceiverStream<String> {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let messages = PromptBuilder::build_messages(context, query, system_prompt);

    tokio::spawn(async move {
        let mut upstream = match llm.stream_chat(messages).await {
            Ok(upstream) => upstream,
            Err(e) => {
                tracing::error!("Generation request to {} failed: {}", llm.name(), e);
                let _ = tx.send(GENERATION_APOLOGY.to_string()).await;
                return;
            }
        };

        let mut forwarded = 0usize;
        while let Some(item) = upstream.next().await {
            match item {
                Ok(fragment) => {
                    if tx.send(fragment).await.is_err() {
                        tracing::debug!("Client went away after {} fragments", forwarded);
                        return;
                    }
                    forwarded += 1;
                }
                Err(e) => {
                    tracing::error!("Generation stream from {} failed: {}", llm.model(), e);
                    let _ = tx.send(GENERATION_APOLOGY.to_string()).await;
                    return;
                }
            }
        }

        tracing::debug!("Generation finished after {} fragments", forwarded);
    });

    ReceiverStream::new(rx)
}
