//! In-memory [`ChunkStore`] implementation for tests and ephemeral runs.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Nothing survives the process.

use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::DocumentChunk;

use super::ChunkStore;

/// In-memory chunk store.
pub struct InMemoryChunkStore {
    chunks: RwLock<Vec<DocumentChunk>>,
}

impl InMemoryChunkStore {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryChunkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkStore for InMemoryChunkStore {
    async fn persist_batch(&self, batch: &[DocumentChunk]) -> Result<()> {
        let mut chunks = self
            .chunks
            .write()
            .map_err(|_| anyhow!("chunk store lock poisoned"))?;
        for (i, chunk) in batch.iter().enumerate() {
            let seen = chunks.iter().chain(&batch[..i]).any(|c| c.id == chunk.id);
            if seen {
                return Err(anyhow!("chunk {} already persisted", chunk.id));
            }
        }
        chunks.extend(batch.iter().cloned());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<DocumentChunk>> {
        let chunks = self
            .chunks
            .read()
            .map_err(|_| anyhow!("chunk store lock poisoned"))?;
        let mut out = chunks.clone();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(out)
    }
}
