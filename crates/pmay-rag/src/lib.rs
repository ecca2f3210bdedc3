//! pmay-rag: retrieval-augmented chatbot backend for the PMAY housing scheme
//!
//! Questions go through a fixed pipeline: canned greetings are answered
//! directly, everything else is embedded and matched against the local
//! chunk index, reranked with an ONNX cross-encoder and answered by an
//! Ollama model streamed back as Server-Sent Events, followed by the
//! source passages the answer was grounded on.

pub mod chat;
pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod providers;
pub mod retrieval;
pub mod server;
pub mod types;

#[cfg(test)]
mod testing;

pub use chat::ChatPipeline;
pub use config::RagConfig;
pub use error::{Error, Result};
pub use retrieval::{ChunkIndex, Reranker};
pub use types::{
    document::{Chunk, Metadata},
    query::{ChatRequest, QueryResult},
    response::{SourceRef, StreamEvent, UploadResponse},
};
