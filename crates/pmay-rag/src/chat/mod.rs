//! Chat orchestration: greeting shortcut, retrieval, reranking, streamed answer

pub mod greeting;
pub mod pipeline;

pub use greeting::GreetingResponder;
pub use pipeline::{build_sources, ChatPipeline, NO_INFO_APOLOGY};
