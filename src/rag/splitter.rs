//! Recursive token-bounded text splitting.
//!
//! Text is cut on the coarsest separator present (paragraphs, then lines,
//! then words, then characters). Pieces are greedily merged back into chunks
//! of at most `chunk_size` tokens, and consecutive chunks share up to
//! `chunk_overlap` tokens of trailing context.

use std::collections::VecDeque;

use super::shard::Document;
use crate::llm::tokens::TokenCounter;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Clone)]
pub struct TokenTextSplitter {
    counter: TokenCounter,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TokenTextSplitter {
    /// `chunk_overlap` is clamped below `chunk_size`.
    pub fn new(counter: TokenCounter, chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            counter,
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// One document per chunk, each carrying its source document's metadata.
    pub fn split_documents(&self, documents: &[Document]) -> Vec<Document> {
        documents
            .iter()
            .flat_map(|doc| {
                self.split_text(&doc.page_content)
                    .into_iter()
                    .map(|chunk| Document {
                        page_content: chunk,
                        metadata: doc.metadata.clone(),
                    })
            })
            .collect()
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &SEPARATORS)
    }

    fn len(&self, text: &str) -> usize {
        self.counter.count_tokens(text)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(i, c)| &text[i..i + c.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|s| !s.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();
        for piece in pieces {
            if self.len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                chunks.extend(self.merge_pieces(&fitting, separator));
                fitting.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !fitting.is_empty() {
            chunks.extend(self.merge_pieces(&fitting, separator));
        }
        chunks
    }

    fn merge_pieces(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = self.len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let piece_len = self.len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };

            if total + piece_len + joiner > self.chunk_size && !window.is_empty() {
                if total > self.chunk_size {
                    tracing::warn!(
                        "Created a chunk of size {}, which is longer than the specified {}",
                        total,
                        self.chunk_size
                    );
                }
                if let Some(chunk) = join_window(&window, separator) {
                    chunks.push(chunk);
                }
                // Drop from the front until the tail fits as overlap and the
                // next piece fits alongside it.
                while total > self.chunk_overlap
                    || (total > 0
                        && total
                            + piece_len
                            + if window.is_empty() { 0 } else { separator_len }
                            > self.chunk_size)
                {
                    let Some((_, first_len)) = window.pop_front() else {
                        break;
                    };
                    let joined = if window.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(first_len + joined);
                }
            }

            total += piece_len + if window.is_empty() { 0 } else { separator_len };
            window.push_back((piece, piece_len));
        }

        if let Some(chunk) = join_window(&window, separator) {
            chunks.push(chunk);
        }
        chunks
    }
}

fn join_window(window: &VecDeque<(&str, usize)>, separator: &str) -> Option<String> {
    let joined = window
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
