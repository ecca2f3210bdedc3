//! PDF text extraction, page by page

use crate::error::{Error, Result};

/// Text of one page
#[derive(Debug, Clone, PartialEq)]
pub struct PageContent {
    /// Page number (1-indexed)
    pub page_number: u32,
    /// Cleaned text of the page
    pub content: String,
}

/// Parsed document with extracted text
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Pages that carry text, in document order
    pub pages: Vec<PageContent>,
    /// Page count of the source document
    pub total_pages: u32,
}

impl ParsedDocument {
    /// Whether any page carries text
    pub fn has_text(&self) -> bool {
        self.pages.iter().any(|p| !p.content.trim().is_empty())
    }
}

/// Whether `filename` names a PDF (case-insensitive extension)
pub fn is_pdf(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// PDF parser
pub struct FileParser;

impl FileParser {
    /// Parse a PDF held in memory
    ///
    /// Text is extracted per page with lopdf. When that yields nothing the
    /// whole document goes through pdf-extract and is reported as page 1.
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        if !is_pdf(filename) {
            return Err(Error::UnsupportedFileType(format!(
                "{} - only PDF documents are accepted",
                filename
            )));
        }

        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        let total_pages = page_numbers.len() as u32;

        let mut pages = Vec::new();
        for page_number in page_numbers {
            match doc.extract_text(&[page_number]) {
                Ok(text) => {
                    let content = cleanup_pdf_text(&text);
                    if !content.is_empty() {
                        pages.push(PageContent { page_number, content });
                    }
                }
                Err(e) => tracing::debug!("{}: no text on page {}: {}", filename, page_number, e),
            }
        }

        if pages.is_empty() {
            tracing::warn!("{}: per-page extraction found no text, trying pdf-extract", filename);
            let text = pdf_extract::extract_text_from_mem(data)
                .map_err(|e| Error::file_parse(filename, format!("Text extraction failed: {}", e)))?;
            let content = cleanup_pdf_text(&text);
            if !content.is_empty() {
                pages.push(PageContent {
                    page_number: 1,
                    content,
                });
            }
        }

        if pages.is_empty() {
            return Err(Error::file_parse(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }

        tracing::info!(
            "Parsed {}: {} of {} pages carry text",
            filename,
            pages.len(),
            total_pages
        );

        Ok(ParsedDocument { pages, total_pages })
    }
}

/// Normalise extracted text: typographic punctuation to ASCII, no NULs,
/// trimmed lines, no blank lines
fn cleanup_pdf_text(text: &str) -> String {
    let text = text
        .replace('\0', "")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{00A0}', " ")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl");

    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
