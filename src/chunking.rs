//! Sliding-window text chunking
//!
//! Pages are concatenated (joined by a separator) and cut into windows of
//! `window` characters, each starting `window - overlap` characters after
//! the previous one. Offsets and lengths count Unicode scalar values, never
//! bytes, so a window never splits a code point.
//!
//! ```text
//! "AAAABBBBCCCC", window=4, overlap=2
//!  AAAA
//!    AABB
//!      BBBB
//!        BBCC
//!          CCCC   <- reaches the end, stop
//! ```

use serde::{Deserialize, Serialize};

use crate::config::ChunkingConfig;
use crate::document::Document;
use crate::errors::{QaError, Result};

/// A bounded window of document text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position in chunker output; identity inside the index
    pub id: usize,
    /// Page holding the chunk's first character
    pub source_page: usize,
    pub text: String,
    /// Character offset into the concatenated document text
    pub start_offset: usize,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Deterministic sliding-window chunker
#[derive(Debug, Clone)]
pub struct Chunker {
    window: usize,
    overlap: usize,
    page_separator: String,
}

impl Chunker {
    /// Validate `window > 0` and `overlap < window`
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        if config.window == 0 {
            return Err(QaError::Config("chunk window must be greater than 0".to_string()));
        }
        if config.overlap >= config.window {
            return Err(QaError::Config(format!(
                "chunk overlap ({}) must be less than window ({})",
                config.overlap, config.window
            )));
        }

        Ok(Self {
            window: config.window,
            overlap: config.overlap,
            page_separator: config.page_separator,
        })
    }

    /// Shorthand used mostly by tests
    pub fn with_window(window: usize, overlap: usize) -> Result<Self> {
        Self::new(ChunkingConfig {
            window,
            overlap,
            ..ChunkingConfig::default()
        })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance between consecutive window starts
    pub fn step(&self) -> usize {
        self.window - self.overlap
    }

    /// Concatenate the pages; also returns each page's starting char offset
    pub fn concatenate(&self, document: &Document) -> (String, Vec<usize>) {
        let mut text = String::new();
        let mut page_starts = Vec::with_capacity(document.page_count());
        let mut chars = 0;
        let separator_chars = self.page_separator.chars().count();

        for (i, page) in document.pages().iter().enumerate() {
            if i > 0 {
                text.push_str(&self.page_separator);
                chars += separator_chars;
            }
            page_starts.push(chars);
            text.push_str(&page.text);
            chars += page.text.chars().count();
        }

        (text, page_starts)
    }

    /// Split a document into ordered, overlapping chunks
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        if document.is_empty() {
            return Vec::new();
        }

        let (text, page_starts) = self.concatenate(document);
        let pages: Vec<usize> = document.pages().iter().map(|p| p.index).collect();

        self.split_text(&text)
            .into_iter()
            .map(|mut chunk| {
                // Last page whose start is at or before the chunk start
                let slot = page_starts
                    .partition_point(|&start| start <= chunk.start_offset)
                    .saturating_sub(1);
                chunk.source_page = pages.get(slot).copied().unwrap_or(0);
                chunk
            })
            .collect()
    }

    /// Split raw text; every chunk reports page 0
    pub fn split_text(&self, text: &str) -> Vec<Chunk> {
        // Byte offset of every char boundary, including the end
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = boundaries.len() - 1;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let end = (start + self.window).min(total);
            chunks.push(Chunk {
                id: chunks.len(),
                source_page: 0,
                text: text[boundaries[start]..boundaries[end]].to_string(),
                start_offset: start,
            });

            if end == total {
                break;
            }
            start += self.step();
        }

        chunks
    }
}

/// Rebuild the concatenated text by dropping each later chunk's overlap
pub fn reassemble(chunks: &[Chunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(overlap));
        }
    }
    out
}
