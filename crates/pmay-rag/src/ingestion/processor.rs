//! Ingestion pipeline orchestration

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::Chunk;

use super::chunker::TextChunker;
use super::parser::{is_pdf, FileParser};

/// Raw upload bytes to index-ready chunks
#[derive(Debug, Clone)]
pub struct IngestPipeline {
    chunker: TextChunker,
}

impl IngestPipeline {
    /// Create a new ingestion pipeline
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunker: TextChunker::new(chunk_size, chunk_overlap),
        }
    }

    /// Create from config
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Parse and chunk one document
    ///
    /// Anything that is not a PDF yields no chunks. A PDF that cannot be
    /// read is an error.
    pub fn process(&self, data: &[u8], filename: &str) -> Result<Vec<Chunk>> {
        if !is_pdf(filename) {
            tracing::info!("Ignoring {}: not a PDF", filename);
            return Ok(Vec::new());
        }

        let parsed = FileParser::parse(filename, data)?;
        let chunks = self.chunker.chunk_document(filename, &parsed);

        tracing::info!(
            "Split {} into {} chunks ({} pages)",
            filename,
            chunks.len(),
            parsed.total_pages
        );
        Ok(chunks)
    }
}

impl Default for IngestPipeline {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::tests::sample_pdf;

    #[test]
    fn test_non_pdf_yields_nothing() {
        let chunks = IngestPipeline::default().process(b"plain text", "notes.txt").unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_pdf_yields_chunks_with_source() {
        let bytes = sample_pdf(&["Beneficiary led construction", "Credit linked subsidy"]);
        let chunks = IngestPipeline::default().process(&bytes, "Scheme.PDF").unwrap();

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.has_text()));
        assert!(chunks.iter().all(|c| c.metadata["source"] == "Scheme.PDF"));
        assert_eq!(chunks[0].metadata["total_pages"], 2);
    }

    #[test]
    fn test_unreadable_pdf_is_error() {
        assert!(IngestPipeline::default().process(b"%PDF-garbage", "x.pdf").is_err());
    }
}
