//! Retrieval: nearest-neighbour index and cross-encoder reranking

pub mod index;
pub mod reranker;

pub use index::ChunkIndex;
pub use reranker::{select_top_k, OnnxCrossEncoder, RelevanceScorer, RerankOutcome, Reranker};
