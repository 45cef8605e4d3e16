//! Overlapping fixed-window text chunker.
//!
//! Splits document text into [`Chunk`]s of a configurable size, measured in
//! approximate tokens, where each chunk repeats the tail of its predecessor
//! so that sentences crossing a boundary keep their context.
//!
//! # Algorithm
//!
//! 1. Convert `chunk_tokens` and `overlap_tokens` to characters using a
//!    4 chars/token ratio.
//! 2. Open a window of `max_chars` characters at the current start.
//! 3. If the window does not reach the end of the text, pull its end back
//!    to just after the last whitespace in the second half of the window
//!    (falling back to a hard cut when there is none).
//! 4. Emit the window, then start the next one `overlap_chars` before the
//!    end of the previous one.
//! 5. Text shorter than one window yields exactly one chunk; empty text
//!    yields a single empty chunk.
//!
//! Chunk text is an exact slice of the input: nothing is trimmed, so the
//! spans cover the input with no gaps. Chunk ids are name-based UUIDs of the
//! document id and chunk index, so re-chunking the same text with the same
//! [`ChunkSpec`] reproduces identical chunks.
//!
//! # Example
//!
//! ```rust
//! use mishkat_core::chunk::{chunk_text, ChunkSpec};
//!
//! let spec = ChunkSpec::new(1024, 20).unwrap();
//! let chunks = chunk_text("doc-123", "Hello world.\n\nSecond paragraph.", &spec);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{RagError, Result};
use crate::models::{Chunk, Document};

/// Approximate characters-per-token ratio.
pub const CHARS_PER_TOKEN: usize = 4;

/// Validated chunk size and overlap, in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    chunk_tokens: usize,
    overlap_tokens: usize,
}

impl ChunkSpec {
    /// Overlap must be strictly smaller than the chunk size.
    pub fn new(chunk_tokens: usize, overlap_tokens: usize) -> Result<Self> {
        if chunk_tokens == 0 {
            return Err(RagError::InvalidInput(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if overlap_tokens >= chunk_tokens {
            return Err(RagError::InvalidInput(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap_tokens, chunk_tokens
            )));
        }
        Ok(Self {
            chunk_tokens,
            overlap_tokens,
        })
    }

    pub fn chunk_tokens(&self) -> usize {
        self.chunk_tokens
    }

    pub fn overlap_tokens(&self) -> usize {
        self.overlap_tokens
    }

    pub fn max_chars(&self) -> usize {
        self.chunk_tokens * CHARS_PER_TOKEN
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_tokens * CHARS_PER_TOKEN
    }
}

impl Default for ChunkSpec {
    fn default() -> Self {
        Self {
            chunk_tokens: 1024,
            overlap_tokens: 20,
        }
    }
}

/// Split text into overlapping chunks.
///
/// Returns chunks with contiguous indices starting at 0. Each chunk's
/// `hash` is the SHA-256 of its text and its `span` is the character range
/// it was cut from.
///
/// # Guarantees
///
/// - At least one chunk is always returned (even for empty text).
/// - `chunks[0].span.start == 0` and the last span ends at the text length.
/// - Each span starts exactly `overlap_chars` before the previous span ends.
pub fn chunk_text(document_id: &str, text: &str, spec: &ChunkSpec) -> Vec<Chunk> {
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    if total == 0 {
        return vec![make_chunk(document_id, 0, text, 0..0)];
    }

    let chars: Vec<char> = text.chars().collect();
    let max_chars = spec.max_chars();
    let overlap = spec.overlap_chars();

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let hard_end = (start + max_chars).min(total);
        let end = if hard_end < total {
            snap_to_whitespace(&chars, start, hard_end, max_chars, overlap)
        } else {
            hard_end
        };

        chunks.push(make_chunk(
            document_id,
            chunk_index,
            &text[offsets[start]..offsets[end]],
            start..end,
        ));
        chunk_index += 1;

        if end >= total {
            break;
        }
        start = end - overlap;
    }

    chunks
}

/// Chunk a document, carrying its source metadata onto every chunk.
pub fn chunk_document(doc: &Document, spec: &ChunkSpec) -> Vec<Chunk> {
    let mut chunks = chunk_text(&doc.id, &doc.text, spec);
    for chunk in &mut chunks {
        chunk.metadata = Some(doc.metadata.clone());
    }
    chunks
}

/// Pull a window end back to just after a whitespace character.
///
/// Only ends past the middle of the window (and past the overlap, so the
/// next window still advances) are considered.
fn snap_to_whitespace(
    chars: &[char],
    start: usize,
    hard_end: usize,
    max_chars: usize,
    overlap: usize,
) -> usize {
    let floor = start + (max_chars / 2).max(overlap + 1);
    (floor..=hard_end)
        .rev()
        .find(|&end| chars[end - 1].is_whitespace())
        .unwrap_or(hard_end)
}

/// Stable id for chunk `index` of `document_id`.
pub fn chunk_id(document_id: &str, index: i64) -> String {
    let name = format!("{}:{}", document_id, index);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn make_chunk(document_id: &str, index: i64, text: &str, span: std::ops::Range<usize>) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: chunk_id(document_id, index),
        document_id: document_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        span,
        hash,
        metadata: None,
    }
}
