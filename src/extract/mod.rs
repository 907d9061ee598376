
use lopdf::Document;
use tracing::{debug, info, warn};

use crate::config::ChunkingConfig;
use crate::split::TextSplitter;
use crate::store::{Chunk, ChunkMetadata};
use crate::{RagError, Result};

/// Text extracted from a single PDF page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub text: String,
    pub number: u32,
}

/// Turns raw PDF bytes into embedding-ready chunks.
#[derive(Debug, Clone)]
pub struct DocumentProcessor {
    splitter: TextSplitter,
}

impl DocumentProcessor {
    #[inline]
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            splitter: TextSplitter::new(config),
        }
    }

    /// Extract text from a PDF, page by page.
    ///
    /// Pages whose text extraction fails are skipped; a document that cannot
    /// be parsed at all is an error. Empty pages are dropped.
    #[inline]
    pub fn extract_pages(file_content: &[u8], filename: &str) -> Result<Vec<Page>> {
        let doc = Document::load_mem(file_content).map_err(|e| {
            RagError::Document(format!("Failed to parse PDF '{}': {}", filename, e))
        })?;

        let mut pages = Vec::new();
        for (page_num, _page_id) in doc.get_pages() {
            match doc.extract_text(&[page_num]) {
                Ok(text) => {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        pages.push(Page {
                            text: trimmed.to_string(),
                            number: page_num,
                        });
                    }
                }
                Err(e) => {
                    debug!("Failed to extract text from page {} of '{}': {}", page_num, filename, e);
                }
            }
        }

        if pages.is_empty() {
            warn!("No text extracted from '{}'", filename);
        } else {
            info!("Extracted {} pages from '{}'", pages.len(), filename);
        }

        Ok(pages)
    }

    /// Split extracted pages into chunks carrying provenance metadata.
    #[inline]
    pub fn chunk_pages(&self, pages: &[Page], source: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for page in pages {
            for (i, text) in self.splitter.split(&page.text).into_iter().enumerate() {
                chunks.push(Chunk {
                    text,
                    metadata: ChunkMetadata {
                        source: source.to_string(),
                        page: page.number,
                        chunk_index: i,
                    },
                });
            }
        }

        info!("Created {} chunks from {} pages of '{}'", chunks.len(), pages.len(), source);
        chunks
    }

    /// Full pipeline: extract text from a PDF and chunk it.
    #[inline]
    pub fn process(&self, file_content: &[u8], filename: &str) -> Result<Vec<Chunk>> {
        let pages = Self::extract_pages(file_content, filename)?;
        Ok(self.chunk_pages(&pages, filename))
    }
}
