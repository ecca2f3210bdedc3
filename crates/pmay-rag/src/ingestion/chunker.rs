//! Overlapping text windows with page tracking

use unicode_segmentation::UnicodeSegmentation;

use super::parser::ParsedDocument;
use crate::types::Chunk;

/// Text chunker with configurable size and overlap
///
/// Windows hold at most `chunk_size` characters and end on a word
/// boundary; each window repeats up to `overlap` trailing characters of
/// the previous one. A single word longer than `chunk_size` becomes its
/// own window.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Chunk every page of a parsed document
    ///
    /// Metadata: `source`, `page`, `total_pages`, `chunk_index` (running
    /// across the whole document).
    pub fn chunk_document(&self, filename: &str, parsed: &ParsedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in &parsed.pages {
            for text in self.split_text(&page.content) {
                let chunk_index = chunks.len();
                chunks.push(
                    Chunk::new(text)
                        .with_meta("source", filename)
                        .with_meta("page", page.page_number)
                        .with_meta("total_pages", parsed.total_pages)
                        .with_meta("chunk_index", chunk_index),
                );
            }
        }

        chunks
    }

    /// Split text into overlapping windows; blank windows are dropped
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let segments: Vec<&str> = text.split_word_bounds().collect();
        let widths: Vec<usize> = segments.iter().map(|s| s.chars().count()).collect();

        let mut windows = Vec::new();
        let mut start = 0;

        while start < segments.len() {
            let mut end = start;
            let mut width = 0;
            while end < segments.len() && (end == start || width + widths[end] <= self.chunk_size) {
                width += widths[end];
                end += 1;
            }

            let window = segments[start..end].concat();
            let window = window.trim();
            if !window.is_empty() {
                windows.push(window.to_string());
            }

            if end >= segments.len() {
                break;
            }

            // Step back over at most `overlap` characters, always moving forward
            let mut next = end;
            let mut carried = 0;
            while next > start + 1 && carried + widths[next - 1] <= self.overlap {
                carried += widths[next - 1];
                next -= 1;
            }
            start = next;
        }

        windows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::PageContent;
    use proptest::prelude::*;

    #[test]
    fn test_short_text_is_one_chunk() {
        let chunker = TextChunker::new(1500, 200);
        assert_eq!(chunker.split_text("PMAY-Urban 2.0"), vec!["PMAY-Urban 2.0"]);
        assert!(chunker.split_text("  \n ").is_empty());
    }

    #[test]
    fn test_windows_overlap() {
        let chunker = TextChunker::new(20, 8);
        let windows = chunker.split_text("alpha beta gamma delta epsilon zeta eta theta");

        assert!(windows.len() > 1);
        for pair in windows.windows(2) {
            let last_word = pair[0].split_whitespace().last().unwrap();
            assert!(pair[1].contains(last_word), "{:?} does not overlap {:?}", pair[1], pair[0]);
        }
    }

    #[test]
    fn test_chunk_document_metadata() {
        let parsed = ParsedDocument {
            pages: vec![
                PageContent { page_number: 1, content: "first page".into() },
                PageContent { page_number: 3, content: "third page".into() },
            ],
            total_pages: 3,
        };
        let chunks = TextChunker::new(1500, 200).chunk_document("pmay.pdf", &parsed);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].metadata["source"], "pmay.pdf");
        assert_eq!(chunks[1].metadata["page"], 3);
        assert_eq!(chunks[1].metadata["total_pages"], 3);
        assert_eq!(chunks[1].metadata["chunk_index"], 1);
    }

    proptest! {
        #[test]
        fn prop_windows_bounded_and_cover_words(
            words in prop::collection::vec("[a-z]{1,12}", 1..200),
            size in 20usize..200,
            overlap in 0usize..20,
        ) {
            let text = words.join(" ");
            let chunker = TextChunker::new(size, overlap);
            let windows = chunker.split_text(&text);

            for window in &windows {
                prop_assert!(window.chars().count() <= size);
                prop_assert!(!window.trim().is_empty());
            }
            for word in &words {
                prop_assert!(windows.iter().any(|w| w.split_whitespace().any(|x| x == word.as_str())));
            }
        }
    }
}
