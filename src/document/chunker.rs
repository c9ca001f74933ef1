use crate::error::{RagError, Result};

/// Character treated as the end of a sentence when looking for a cut point.
pub const SENTENCE_TERMINAL: char = '.';

/// One bounded segment of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// Splits text into sentence-respecting chunks of at most `max_chunk_length` characters.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chunk_length: usize,
}

impl Chunker {
    pub fn new(max_chunk_length: usize) -> Result<Self> {
        if max_chunk_length == 0 {
            return Err(RagError::Config(
                "max chunk length must be greater than zero".to_string(),
            ));
        }
        Ok(Self { max_chunk_length })
    }

    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        chunk_text(text, self.max_chunk_length)
    }
}

/// Split `text` into chunks of at most `max_chunk_length` characters.
///
/// A window that stops short of the end of the text is pulled back to just after
/// the last [`SENTENCE_TERMINAL`] inside it; a window without one is hard-cut, so a
/// sentence longer than the limit ends up spread over several chunks. Every chunk is
/// trimmed and whitespace-only windows are dropped. Lengths are counted in chars.
pub fn chunk_text(text: &str, max_chunk_length: usize) -> Vec<Chunk> {
    if max_chunk_length == 0 {
        return Vec::new();
    }

    let offsets: Vec<(usize, char)> = text.char_indices().collect();
    let len = offsets.len();
    let byte_at = |i: usize| if i == len { text.len() } else { offsets[i].0 };

    let mut pieces = Vec::new();
    let mut start = 0;
    while start < len {
        let mut end = (start + max_chunk_length).min(len);
        if end < len {
            if let Some(pos) = (start..end)
                .rev()
                .find(|&i| offsets[i].1 == SENTENCE_TERMINAL)
            {
                end = pos + 1;
            }
        }

        let piece = text[byte_at(start)..byte_at(end)].trim();
        if !piece.is_empty() {
            pieces.push(piece);
        }
        start = end;
    }

    let total_chunks = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(chunk_index, piece)| Chunk {
            text: piece.to_string(),
            chunk_index,
            total_chunks,
        })
        .collect()
}
