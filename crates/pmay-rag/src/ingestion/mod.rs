//! Document ingestion: PDF parsing and overlapping chunking

mod chunker;
pub(crate) mod parser;
mod processor;

pub use chunker::TextChunker;
pub use parser::{is_pdf, FileParser, PageContent, ParsedDocument};
pub use processor::IngestPipeline;
