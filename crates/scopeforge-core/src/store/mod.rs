//! Persistence abstraction for document chunks.
//!
//! The [`ChunkStore`] trait is the durable side of the vector index: the
//! index persists every ingest's chunks through it before publishing them
//! to readers, and rebuilds its in-memory state from
//! [`load_all`](ChunkStore::load_all).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::DocumentChunk;

/// Durable storage for chunks.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`persist_batch`](ChunkStore::persist_batch) | Durably write a group of chunks, all-or-nothing |
/// | [`persist`](ChunkStore::persist) | Single-chunk form of `persist_batch` |
/// | [`load_all`](ChunkStore::load_all) | Read every persisted chunk, oldest first |
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Durably write every chunk in `chunks`. A failed call leaves no
    /// trace of any of them.
    async fn persist_batch(&self, chunks: &[DocumentChunk]) -> Result<()>;

    async fn persist(&self, chunk: &DocumentChunk) -> Result<()> {
        self.persist_batch(std::slice::from_ref(chunk)).await
    }

    /// Read every persisted chunk, ordered by `created_at` then `id`.
    async fn load_all(&self) -> Result<Vec<DocumentChunk>>;
}
