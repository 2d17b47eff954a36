//! Recursive character splitter.
//!
//! Text is split on the coarsest separator that occurs in it (paragraphs,
//! then lines, then sentences, then words, then characters). Pieces are
//! merged greedily up to `chunk_size` characters, and each new chunk starts
//! with up to `chunk_overlap` characters of trailing pieces from the last one.

use docqa_types::{ChunkingSettings, DocumentPage};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::error::ExtractError;

const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];

/// A chunk of page text that has not been assigned a vector id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageChunk {
    pub file_name: String,
    pub page_number: u32,
    pub chunk_index: u32,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ExtractError> {
        if chunk_size == 0 {
            return Err(ExtractError::InvalidConfig("chunk_size must be > 0".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(ExtractError::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self, ExtractError> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into trimmed, non-empty chunks of at most `chunk_size`
    /// characters.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, finer));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }
        chunks
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut merged, &window, separator);
                // Keep a tail of at most chunk_overlap characters that still
                // leaves room for the incoming piece.
                while total > self.chunk_overlap
                    || (total > 0 && total + len + sep_len > self.chunk_size)
                {
                    let Some(first) = window.pop_front() else {
                        break;
                    };
                    let removed_joiner = if window.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(char_len(first) + removed_joiner);
                }
            }

            let joiner = if window.is_empty() { 0 } else { sep_len };
            window.push_back(piece);
            total += len + joiner;
        }
        push_joined(&mut merged, &window, separator);
        merged
    }
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 200,
        }
    }
}

fn push_joined(out: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split every page, keeping file and page provenance on each chunk.
pub fn chunk_pages(pages: &[DocumentPage], splitter: &RecursiveSplitter) -> Vec<PageChunk> {
    pages
        .iter()
        .flat_map(|page| {
            splitter
                .split_text(&page.text)
                .into_iter()
                .enumerate()
                .map(|(i, text)| PageChunk {
                    file_name: page.file_name.clone(),
                    page_number: page.page_number,
                    chunk_index: i as u32,
                    text,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        assert!(RecursiveSplitter::new(100, 100).is_err());
        assert!(RecursiveSplitter::new(0, 0).is_err());
        assert!(RecursiveSplitter::new(100, 20).is_ok());
    }

    #[test]
    fn test_empty_text_has_no_chunks() {
        let splitter = RecursiveSplitter::default();
        assert!(splitter.split_text("").is_empty());
        assert!(splitter.split_text(" \n\n ").is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let splitter = RecursiveSplitter::default();
        let chunks = splitter.split_text("A short paragraph.");
        assert_eq!(chunks, vec!["A short paragraph.".to_string()]);
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let splitter = RecursiveSplitter::new(100, 20).unwrap();
        let text = format!("{}\n\n{}\n{}", words(60), words(30), "x".repeat(250));
        let chunks = splitter.split_text(&text);

        assert!(chunks.len() > 3);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 100, "chunk too long: {}", chunk.len());
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let splitter = RecursiveSplitter::new(60, 20).unwrap();
        let chunks = splitter.split_text(&words(40));

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let first_word_of_next = pair[1].split(' ').next().unwrap();
            assert!(
                pair[0].split(' ').any(|w| w == first_word_of_next),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_no_overlap_when_zero() {
        let splitter = RecursiveSplitter::new(60, 0).unwrap();
        let chunks = splitter.split_text(&words(40));
        let rejoined = chunks.join(" ");
        assert_eq!(rejoined, words(40));
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let splitter = RecursiveSplitter::new(50, 0).unwrap();
        let text = "First paragraph is here.\n\nSecond paragraph follows.";
        let chunks = splitter.split_text(text);
        assert_eq!(
            chunks,
            vec![
                "First paragraph is here.".to_string(),
                "Second paragraph follows.".to_string()
            ]
        );
    }

    #[test]
    fn test_chunk_pages_keeps_provenance() {
        let splitter = RecursiveSplitter::new(30, 5).unwrap();
        let pages = vec![
            DocumentPage::new("/d/a.pdf", 1, "alpha beta gamma delta epsilon zeta eta theta"),
            DocumentPage::new("/d/a.pdf", 2, "short"),
        ];
        let chunks = chunk_pages(&pages, &splitter);

        let page_two: Vec<_> = chunks.iter().filter(|c| c.page_number == 2).collect();
        assert_eq!(page_two.len(), 1);
        assert_eq!(page_two[0].chunk_index, 0);
        assert_eq!(page_two[0].text, "short");

        let page_one: Vec<_> = chunks.iter().filter(|c| c.page_number == 1).collect();
        assert!(page_one.len() > 1);
        for (i, chunk) in page_one.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.file_name, "a.pdf");
        }
    }
}
