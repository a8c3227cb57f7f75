//! Deterministic text chunking
//!
//! Splits a document into bounded, optionally overlapping slices measured in
//! characters. Chunks borrow from the document; nothing is copied. When a cut
//! would land mid-text, the chunk is shortened to the last sentence terminator
//! in the back half of its window, provided that terminator lies beyond the
//! previous chunk's end.
//!
//! Every chunk carries a *core* range: the part not shared with the previous
//! chunk. Concatenating the cores of all chunks in order yields the original
//! text exactly.

use std::ops::Range;

use crate::bail_invalid;
use crate::error::Result;

const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

/// One contiguous slice of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Position of this chunk in the document (0-based)
    pub index: usize,
    /// Byte offset where the chunk starts
    pub start: usize,
    /// Byte offset one past the chunk's last byte
    pub end: usize,
    /// Byte offset where the part not shared with the previous chunk begins
    pub core_start: usize,
    /// The chunk text
    pub text: &'a str,
}

impl<'a> Chunk<'a> {
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// The part of the chunk not covered by the previous chunk
    pub fn core(&self) -> &'a str {
        &self.text[self.core_start - self.start..]
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Chunking parameters, validated on construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            bail_invalid!("chunk size", "must be greater than zero");
        }
        if overlap >= chunk_size {
            bail_invalid!(
                "chunk overlap",
                format!("{overlap} must be smaller than chunk size {chunk_size}")
            );
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily split `text` into chunks
    pub fn split<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks {
            text,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            next_start: 0,
            prev_end: 0,
            index: 0,
        }
    }
}

/// Iterator over the chunks of a document
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    chunk_size: usize,
    overlap: usize,
    next_start: usize,
    prev_end: usize,
    index: usize,
}

impl<'a> Chunks<'a> {
    fn boundary(&self, start: usize) -> usize {
        let window_end = advance_chars(self.text, start, self.chunk_size);
        if window_end >= self.text.len() {
            return self.text.len();
        }

        let half_window = advance_chars(self.text, start, self.chunk_size / 2);
        let lower = half_window.max(self.prev_end);
        sentence_end(self.text, lower, window_end).unwrap_or(window_end)
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.prev_end >= self.text.len() {
            return None;
        }

        let start = self.next_start;
        let end = self.boundary(start);
        let chunk = Chunk {
            index: self.index,
            start,
            end,
            core_start: self.prev_end,
            text: &self.text[start..end],
        };

        // Step back by the overlap, but always move past the current start
        let overlapped = retreat_chars(self.text, end, self.overlap);
        self.next_start = overlapped.max(next_char(self.text, start));
        self.prev_end = end;
        self.index += 1;

        Some(chunk)
    }
}

/// Byte offset `n` characters after `from`, clamped to the text length
fn advance_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map(|(offset, _)| from + offset)
        .unwrap_or(text.len())
}

/// Byte offset `n` characters before `to`, clamped to zero
fn retreat_chars(text: &str, to: usize, n: usize) -> usize {
    if n == 0 {
        return to;
    }
    text[..to]
        .char_indices()
        .rev()
        .nth(n - 1)
        .map(|(offset, _)| offset)
        .unwrap_or(0)
}

fn next_char(text: &str, at: usize) -> usize {
    at + text[at..].chars().next().map_or(0, char::len_utf8)
}

/// End offset just past the last terminator in `[lower, upper)` that is
/// followed by whitespace
fn sentence_end(text: &str, lower: usize, upper: usize) -> Option<usize> {
    if lower >= upper {
        return None;
    }
    text[lower..upper]
        .char_indices()
        .rev()
        .map(|(offset, c)| (lower + offset, c))
        .find(|&(pos, c)| {
            SENTENCE_TERMINATORS.contains(&c)
                && text[pos + c.len_utf8()..]
                    .chars()
                    .next()
                    .is_some_and(char::is_whitespace)
        })
        .map(|(pos, c)| pos + c.len_utf8())
}
