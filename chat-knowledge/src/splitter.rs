//! Recursive character text splitting.
//!
//! Splits document text into overlapping chunks, preferring paragraph
//! boundaries, then line breaks, then sentence ends, then words, before
//! falling back to a hard character split. Lengths are measured in characters.

use std::collections::VecDeque;

use crate::{KnowledgeError, KnowledgeResult};

/// Separator priority order for recursive splitting. The empty string is the
/// terminal hard-split level.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

const DEFAULT_CHUNK_SIZE: usize = 1000;
const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Recursive character splitter with configurable chunk size and overlap.
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Creates a splitter with the default chunk size (1000 chars) and
    /// overlap (200 chars).
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    /// Creates a splitter with custom parameters.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::InvalidConfig`] when the chunk size is zero
    /// or the overlap is not strictly smaller than the chunk size.
    pub fn custom(chunk_size: usize, chunk_overlap: usize) -> KnowledgeResult<Self> {
        if chunk_size == 0 {
            return Err(KnowledgeError::InvalidConfig(
                "chunk size must be non-zero",
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(KnowledgeError::InvalidConfig(
                "chunk overlap must be smaller than chunk size",
            ));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    /// Returns the target chunk size in characters.
    #[must_use]
    pub const fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Returns the overlap between consecutive chunks in characters.
    #[must_use]
    pub const fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits text into chunks.
    #[must_use]
    pub fn split(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        self.split_with(text, SEPARATORS, &mut chunks);
        chunks
    }

    fn split_with(&self, text: &str, separators: &[&str], out: &mut Vec<String>) {
        if char_len(text) <= self.chunk_size {
            if !text.trim().is_empty() {
                out.push(text.to_owned());
            }
            return;
        }

        let Some((separator, rest)) = separators.split_first() else {
            self.hard_split(text, out);
            return;
        };

        if separator.is_empty() {
            self.hard_split(text, out);
            return;
        }

        if !text.contains(separator) {
            self.split_with(text, rest, out);
            return;
        }

        let pieces: Vec<&str> = text.split(separator).collect();
        self.merge_pieces(&pieces, separator, rest, out);
    }

    /// Greedily packs split pieces into chunks, carrying a trailing window of
    /// pieces into the next chunk to provide the configured overlap.
    fn merge_pieces(
        &self,
        pieces: &[&str],
        separator: &str,
        deeper_separators: &[&str],
        out: &mut Vec<String>,
    ) {
        let sep_len = char_len(separator);
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut window_len = 0usize;

        for &piece in pieces {
            let piece_len = char_len(piece);

            if piece_len > self.chunk_size {
                emit(&window, separator, out);
                window.clear();
                window_len = 0;
                self.split_with(piece, deeper_separators, out);
                continue;
            }

            let added = if window.is_empty() {
                piece_len
            } else {
                piece_len + sep_len
            };

            if window_len + added > self.chunk_size && !window.is_empty() {
                emit(&window, separator, out);
                while window_len > self.chunk_overlap {
                    let Some((_, front_len)) = window.pop_front() else {
                        break;
                    };
                    window_len -= if window.is_empty() {
                        front_len
                    } else {
                        front_len + sep_len
                    };
                }
            }

            window_len += if window.is_empty() {
                piece_len
            } else {
                piece_len + sep_len
            };
            window.push_back((piece, piece_len));
        }

        emit(&window, separator, out);
    }

    /// Terminal level: fixed-size character windows stepped by
    /// `chunk_size - chunk_overlap`.
    fn hard_split(&self, text: &str, out: &mut Vec<String>) {
        let chars: Vec<char> = text.chars().collect();
        let step = self.chunk_size - self.chunk_overlap;
        let mut start = 0;

        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            let chunk: String = chars[start..end].iter().collect();
            if !chunk.trim().is_empty() {
                out.push(chunk);
            }
            if end == chars.len() {
                break;
            }
            start += step;
        }
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn emit(window: &VecDeque<(&str, usize)>, separator: &str, out: &mut Vec<String>) {
    if window.is_empty() {
        return;
    }
    let chunk = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    if !chunk.trim().is_empty() {
        out.push(chunk);
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_chunk() {
        let splitter = TextSplitter::new();
        let chunks = splitter.split("one small paragraph");
        assert_eq!(chunks, vec!["one small paragraph".to_owned()]);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        let splitter = TextSplitter::new();
        assert!(splitter.split("   \n\n  ").is_empty());
    }

    #[test]
    fn chunks_respect_the_size_limit() {
        let splitter = TextSplitter::custom(100, 20).unwrap();
        let paragraph = "sentence one here. sentence two follows. ".repeat(20);
        let chunks = splitter.split(&paragraph);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(
                chunk.chars().count() <= 100,
                "chunk exceeded limit: {} chars",
                chunk.chars().count()
            );
        }
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let splitter = TextSplitter::custom(40, 0).unwrap();
        let text = "first paragraph body\n\nsecond paragraph body";
        let chunks = splitter.split(text);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "first paragraph body");
        assert_eq!(chunks[1], "second paragraph body");
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let splitter = TextSplitter::custom(30, 10).unwrap();
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = splitter.split(&text);

        assert!(chunks.len() > 1);
        // The tail of one chunk reappears at the head of the next.
        for pair in chunks.windows(2) {
            let tail_word = pair[0].split_whitespace().last().unwrap();
            assert!(
                pair[1].contains(tail_word),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn hard_split_handles_unbroken_text() {
        let splitter = TextSplitter::custom(50, 10).unwrap();
        let text = "x".repeat(200);
        let chunks = splitter.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50);
        }
    }

    #[test]
    fn hard_split_is_char_boundary_safe() {
        let splitter = TextSplitter::custom(10, 2).unwrap();
        let text = "é".repeat(40);
        let chunks = splitter.split(&text);
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.chars().all(|ch| ch == 'é'));
        }
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(matches!(
            TextSplitter::custom(0, 0),
            Err(KnowledgeError::InvalidConfig(_))
        ));
        assert!(matches!(
            TextSplitter::custom(100, 100),
            Err(KnowledgeError::InvalidConfig(_))
        ));
    }
}
