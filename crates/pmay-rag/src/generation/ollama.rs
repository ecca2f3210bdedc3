//! Ollama HTTP client: embeddings with retry, streamed chat generation

use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::providers::llm::{ChatMessage, FragmentStream};

/// Ollama API client with automatic retry
pub struct OllamaClient {
    /// HTTP client for short request/response calls
    client: Client,
    /// HTTP client for streamed generation (idle timeout only)
    stream_client: Client,
    /// Configuration
    config: LlmConfig,
    /// Embedding model
    embed_model: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    num_gpu: u32,
    num_thread: u32,
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client with retry support
    pub fn new(config: &LlmConfig, embed_model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            stream_client,
            config: config.clone(),
            embed_model: embed_model.into(),
        })
    }

    /// Generation model name
    pub fn generate_model(&self) -> &str {
        &self.config.generate_model
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            self.config.max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Llm("Unknown error".to_string())))
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding using Ollama with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);

        self.retry_request(|| {
            let request = EmbedRequest {
                model: self.embed_model.clone(),
                prompt: text.to_string(),
            };
            let url = url.as_str();

            async move {
                let response = self
                    .client
                    .post(url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

                if !response.status().is_success() {
                    return Err(Error::embedding(format!(
                        "Embedding failed: HTTP {}",
                        response.status()
                    )));
                }

                let embed_response: EmbedResponse = response.json().await.map_err(|e| {
                    Error::embedding(format!("Failed to parse embedding response: {}", e))
                })?;

                Ok(embed_response.embedding)
            }
        })
        .await
    }

    /// Start a streamed chat completion
    ///
    /// Resolves once the upstream accepted the request; the returned stream
    /// yields content fragments as they arrive.
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<FragmentStream> {
        let url = format!("{}/api/chat", self.config.base_url);

        let request = ChatRequestBody {
            model: &self.config.generate_model,
            messages,
            stream: true,
            options: ChatOptions {
                num_gpu: self.config.num_gpu,
                num_thread: self.config.num_thread,
                num_predict: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        };

        tracing::info!("Streaming chat with model: {}", self.config.generate_model);

        let response = self
            .stream_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::llm(format!("Stream request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::llm(format!("Stream failed: HTTP {} - {}", status, body)));
        }

        Ok(decode_chat_stream(Box::pin(response.bytes_stream())).boxed())
    }
}

#[derive(Deserialize)]
struct ChatStreamLine {
    #[serde(default)]
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct StreamMessage {
    #[serde(default)]
    content: String,
}

/// Incremental decoder for Ollama's NDJSON chat stream
///
/// Network reads split lines arbitrarily, so bytes are buffered until a
/// newline arrives. Lines after `done: true` or an error line are ignored.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl NdjsonDecoder {
    /// Feed bytes; returns the fragments completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Result<String>> {
        self.buffer.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode_line(&line[..line.len() - 1], &mut out);
        }
        out
    }

    /// Flush a trailing line without newline
    pub fn finish(&mut self) -> Vec<Result<String>> {
        let rest = std::mem::take(&mut self.buffer);
        let mut out = Vec::new();
        self.decode_line(&rest, &mut out);
        out
    }

    /// Whether the upstream signalled completion or failure
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &[u8], out: &mut Vec<Result<String>>) {
        if self.done {
            return;
        }
        let line = String::from_utf8_lossy(line);
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        match serde_json::from_str::<ChatStreamLine>(line) {
            Ok(chunk) => {
                if let Some(error) = chunk.error {
                    self.done = true;
                    out.push(Err(Error::llm(error)));
                    return;
                }
                match chunk.message {
                    Some(message) if !message.content.is_empty() => out.push(Ok(message.content)),
                    Some(_) => {}
                    None if !chunk.done => {
                        tracing::debug!("Stream line without message content: {}", line)
                    }
                    None => {}
                }
                if chunk.done {
                    self.done = true;
                }
            }
            Err(e) => tracing::debug!("Skipping undecodable stream line ({}): {}", e, line),
        }
    }
}

/// Turn a raw byte stream into a stream of content fragments
///
/// A transport error ends the stream with one `Err` item.
pub fn decode_chat_stream<S, B, E>(bytes: S) -> impl Stream<Item = Result<String>> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: std::fmt::Display + Send,
{
    struct State<S> {
        bytes: S,
        decoder: NdjsonDecoder,
        pending: VecDeque<Result<String>>,
        finished: bool,
    }

    let state = State {
        bytes,
        decoder: NdjsonDecoder::default(),
        pending: VecDeque::new(),
        finished: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let fragments = state.decoder.push(bytes.as_ref());
                    state.pending.extend(fragments);
                    state.finished = state.decoder.is_done();
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state
                        .pending
                        .push_back(Err(Error::llm(format!("Stream error: {}", e))));
                }
                None => {
                    state.finished = true;
                    let fragments = state.decoder.finish();
                    state.pending.extend(fragments);
                }
            }
        }
    })
}
