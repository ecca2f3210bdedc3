//! Core types for the chatbot backend

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, Metadata};
pub use query::{ChatRequest, QueryResult};
pub use response::{SourceRef, StreamEvent, UploadResponse};
