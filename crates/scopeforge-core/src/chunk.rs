//! Paragraph-boundary text chunker.
//!
//! Splits ingest text into pieces no longer than `max_chars` characters.
//! Splitting happens on paragraph boundaries (`\n\n`) so each piece stays
//! semantically coherent; consecutive short paragraphs are packed into
//! one piece while they fit.
//!
//! # Algorithm
//!
//! 1. Split text on `\n\n` and trim each paragraph; drop blank ones.
//! 2. Accumulate paragraphs into a buffer until adding the next one
//!    would exceed `max_chars` (the `\n\n` joiner counts).
//! 3. Flush the buffer as a piece and start a new one.
//! 4. A paragraph longer than `max_chars` is hard-split at exactly
//!    `max_chars` characters (never inside a UTF-8 code point).
//!
//! Lengths are measured in `char`s, not bytes.
//!
//! # Example
//!
//! ```rust
//! use scopeforge_core::chunk::split_text;
//!
//! let pieces = split_text("Hello world.\n\nSecond paragraph.", 2000);
//! assert_eq!(pieces.len(), 1);
//! ```

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::DocumentChunk;

/// Split text into pieces of at most `max_chars` characters.
///
/// Returns an empty vector for blank text. A `max_chars` of zero is
/// treated as one.
pub fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut pieces = Vec::new();
    let mut buf = String::new();
    let mut buf_chars = 0usize;

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }
        let para_chars = trimmed.chars().count();

        let would_be = if buf.is_empty() {
            para_chars
        } else {
            buf_chars + 2 + para_chars
        };

        if would_be > max_chars && !buf.is_empty() {
            pieces.push(std::mem::take(&mut buf));
            buf_chars = 0;
        }

        if para_chars > max_chars {
            pieces.extend(hard_split(trimmed, max_chars));
            continue;
        }

        if !buf.is_empty() {
            buf.push_str("\n\n");
            buf_chars += 2;
        }
        buf.push_str(trimmed);
        buf_chars += para_chars;
    }

    if !buf.is_empty() {
        pieces.push(buf);
    }

    pieces
}

/// Cut `text` into consecutive runs of `max_chars` characters.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|run| run.iter().collect::<String>())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Inputs shared by every chunk of one ingest call.
#[derive(Debug, Clone)]
pub struct ChunkOrigin<'a> {
    pub project_id: &'a str,
    pub source_type: &'a str,
    pub document_key: &'a str,
    pub ingest_id: &'a str,
    pub tags: &'a BTreeSet<String>,
    pub created_at: DateTime<Utc>,
}

/// Create a [`DocumentChunk`] with a fresh UUID and SHA-256 content hash.
pub fn make_chunk(
    origin: &ChunkOrigin<'_>,
    index: i64,
    text: &str,
    embedding: Vec<f32>,
) -> DocumentChunk {
    DocumentChunk {
        id: Uuid::new_v4().to_string(),
        source_project_id: origin.project_id.to_string(),
        source_type: origin.source_type.to_string(),
        document_key: origin.document_key.to_string(),
        ingest_id: origin.ingest_id.to_string(),
        chunk_index: index,
        text: text.to_string(),
        embedding,
        tags: origin.tags.clone(),
        created_at: origin.created_at,
        hash: content_hash(text),
    }
}

/// Hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
