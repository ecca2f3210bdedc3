//! Provider abstractions for embeddings, LLM generation and vector storage
//!
//! Trait-based seams so the pipeline can run against Ollama and the local
//! store in production and against in-process fakes in tests.

pub mod embedding;
pub mod llm;
pub mod local;
pub mod ollama;
pub mod vector_store;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatMessage, ChatRole, FragmentStream, LlmProvider};
pub use local::LocalVectorStore;
pub use ollama::{OllamaEmbedder, OllamaLlm};
pub use vector_store::{StoredChunk, VectorSearchResult, VectorStoreProvider};
