use async_trait::async_trait;
use ragvault_core::{RagError, RagResult};

/// A piece of document text ready to be embedded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedChunk {
    /// Chunk text.
    pub text: String,
    /// 1-based page the text came from.
    pub page_number: usize,
    /// Position of the chunk within the whole document, from 0.
    pub chunk_index: usize,
}

/// Trait for turning a document into chunks.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Split the document `name` with contents `bytes` into chunks.
    async fn parse(&self, name: &str, bytes: &[u8]) -> RagResult<Vec<ParsedChunk>>;
}

/// Parser for UTF-8 text.
///
/// Form feeds (`\x0c`) separate pages. Each page is cut into consecutive
/// pieces of at most `chunk_size` characters; whitespace-only pieces are
/// dropped.
#[derive(Debug, Clone)]
pub struct PlainTextParser {
    chunk_size: usize,
}

impl PlainTextParser {
    /// Create a parser producing chunks of at most `chunk_size` characters.
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Maximum characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split already-decoded text.
    pub fn split(&self, text: &str) -> Vec<ParsedChunk> {
        let mut chunks = Vec::new();
        for (page_idx, page) in text.split('\x0c').enumerate() {
            for piece in split_chars(page, self.chunk_size) {
                if piece.trim().is_empty() {
                    continue;
                }
                chunks.push(ParsedChunk {
                    text: piece.to_string(),
                    page_number: page_idx + 1,
                    chunk_index: chunks.len(),
                });
            }
        }
        chunks
    }
}

impl Default for PlainTextParser {
    fn default() -> Self {
        Self::new(500)
    }
}

#[async_trait]
impl DocumentParser for PlainTextParser {
    async fn parse(&self, name: &str, bytes: &[u8]) -> RagResult<Vec<ParsedChunk>> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| RagError::Parse(format!("{name} is not valid UTF-8: {e}")))?;
        Ok(self.split(text))
    }
}

/// Slices of at most `size` characters, never splitting a code point.
fn split_chars(text: &str, size: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in text.char_indices() {
        if count == size {
            pieces.push(&text[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}
