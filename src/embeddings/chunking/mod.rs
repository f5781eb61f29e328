
use std::collections::VecDeque;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::table::TextUnit;

/// Boundaries tried in order: paragraph, line, sentence, word, then single characters
const SEPARATORS: [&str; 5] = ["\n\n", "\n", SENTENCE_SEPARATOR, " ", ""];
const SENTENCE_SEPARATOR: &str = ". ";

/// Represents a chunk of content ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    /// The content text
    pub content: String,
    /// Row of the source table this chunk was cut from
    pub source_row: usize,
    /// The index of this chunk within its row
    pub chunk_index: usize,
    /// Length of `content` in characters
    pub char_count: usize,
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of the same row
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Recursive character splitter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextSplitter {
    /// Out-of-range sizes are clamped: `chunk_size >= 1` and `chunk_overlap < chunk_size`.
    #[inline]
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    #[inline]
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split text into pieces of at most `chunk_size` characters.
    /// Empty or whitespace-only text yields no pieces.
    #[inline]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let (splits, joiner): (Vec<String>, &str) = if separator.is_empty() {
            (text.chars().map(String::from).collect(), "")
        } else if separator == SENTENCE_SEPARATOR {
            // Sentences keep their full stop; only the space is a joiner
            let sentences = text
                .split_inclusive(separator)
                .map(|s| s.strip_suffix(' ').unwrap_or(s))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            (sentences, " ")
        } else {
            let pieces = text
                .split(separator)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            (pieces, separator)
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<String> = Vec::new();

        for split in splits {
            if char_len(&split) <= self.chunk_size {
                fitting.push(split);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge_splits(&fitting, joiner));
                fitting.clear();
            }

            if remaining.is_empty() {
                chunks.push(split);
            } else {
                chunks.extend(self.split_recursive(&split, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge_splits(&fitting, joiner));
        }

        chunks
    }

    /// Greedily pack splits into chunks, carrying up to `chunk_overlap`
    /// characters of trailing splits into the next chunk
    fn merge_splits(&self, splits: &[String], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for split in splits {
            let len = char_len(split);
            let joiner = if current.is_empty() { 0 } else { separator_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut chunks, &current, separator);

                loop {
                    let joiner = if current.is_empty() { 0 } else { separator_len };
                    let no_room = total > 0 && total + len + joiner > self.chunk_size;
                    if total <= self.chunk_overlap && !no_room {
                        break;
                    }
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                    if !current.is_empty() {
                        total -= separator_len;
                    }
                }
            }

            if !current.is_empty() {
                total += separator_len;
            }
            current.push_back(split);
            total += len;
        }

        push_joined(&mut chunks, &current, separator);
        chunks
    }
}

impl Default for TextSplitter {
    #[inline]
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

fn push_joined(chunks: &mut Vec<String>, parts: &VecDeque<&str>, separator: &str) {
    let joined = parts.iter().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

/// Split `text` into overlapping chunks of at most `chunk_size` characters
#[inline]
pub fn split(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    TextSplitter::new(chunk_size, chunk_overlap).split_text(text)
}

/// Chunk every text unit, keeping global order (row order, then position in row).
///
/// Units with no populated field contribute no chunks, so a field selection
/// that matches nothing produces an empty result instead of label-only text.
#[inline]
pub fn chunk_units(units: &[TextUnit], config: &ChunkingConfig) -> Vec<ContentChunk> {
    let splitter = TextSplitter::from_config(config);

    let chunks: Vec<ContentChunk> = units
        .iter()
        .filter(|unit| unit.populated)
        .flat_map(|unit| {
            splitter
                .split_text(&unit.text)
                .into_iter()
                .enumerate()
                .map(|(chunk_index, content)| ContentChunk {
                    char_count: char_len(&content),
                    content,
                    source_row: unit.row,
                    chunk_index,
                })
        })
        .collect();

    debug!(
        "Chunked {} text units into {} chunks (avg {} chars)",
        units.len(),
        chunks.len(),
        chunks.iter().map(|c| c.char_count).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// Length in Unicode scalar values
#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// First `max_chars` characters of `text`
#[inline]
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
