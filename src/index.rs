//! Vector Index Store.
//!
//! Holds every chunk's embedding in memory for brute-force cosine search
//! and persists each chunk through a [`ChunkStore`] before it becomes
//! visible.
//!
//! # Concurrency
//!
//! - **Writers** (`insert_batch`, `rebuild`) are serialized by an async mutex.
//! - **Readers** (`query`) clone an `Arc<Snapshot>` under a short read
//!   lock and search it without holding any lock.
//! - A new snapshot is published by swapping the `Arc` after a whole
//!   ingest is durably persisted, so a query observes an ingest either
//!   fully or not at all.
//!
//! # Soft replacement
//!
//! Chunks are grouped by `document_key`. Only chunks from the newest
//! ingest of each key (highest `(created_at, ingest_id)`) are returned
//! by queries; older ingests stay persisted but hidden.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use scopeforge_core::embedding::similarity;
use scopeforge_core::models::{DocumentChunk, RetrievalHit, RetrievalResult};
use scopeforge_core::store::ChunkStore;
use scopeforge_core::{Error, Result};

/// Immutable view of the index at one point in time.
#[derive(Debug, Default)]
struct Snapshot {
    chunks: Vec<Arc<DocumentChunk>>,
    /// Winning ingest per document key.
    latest: HashMap<String, (DateTime<Utc>, String)>,
}

impl Snapshot {
    fn from_chunks(chunks: Vec<DocumentChunk>) -> Self {
        let mut snap = Snapshot::default();
        for chunk in chunks {
            snap.push(Arc::new(chunk));
        }
        snap
    }

    fn push(&mut self, chunk: Arc<DocumentChunk>) {
        let candidate = (chunk.created_at, chunk.ingest_id.clone());
        match self.latest.get(&chunk.document_key) {
            Some(current) if *current >= candidate => {}
            _ => {
                self.latest.insert(chunk.document_key.clone(), candidate);
            }
        }
        self.chunks.push(chunk);
    }

    fn is_live(&self, chunk: &DocumentChunk) -> bool {
        self.latest
            .get(&chunk.document_key)
            .map(|(_, ingest)| *ingest == chunk.ingest_id)
            .unwrap_or(false)
    }
}

/// Shared, single-writer / multi-reader vector index.
pub struct VectorIndex {
    dims: usize,
    store: Arc<dyn ChunkStore>,
    writer: tokio::sync::Mutex<()>,
    snapshot: RwLock<Arc<Snapshot>>,
}

impl VectorIndex {
    /// Create an empty index over `store` without loading anything.
    pub fn new(dims: usize, store: Arc<dyn ChunkStore>) -> Self {
        Self {
            dims,
            store,
            writer: tokio::sync::Mutex::new(()),
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
        }
    }

    /// Create an index and load every persisted chunk. An empty store is fine.
    pub async fn open(dims: usize, store: Arc<dyn ChunkStore>) -> Result<Self> {
        let index = Self::new(dims, store);
        match index.rebuild().await {
            Ok(_) | Err(Error::EmptyIndex) => Ok(index),
            Err(e) => Err(e),
        }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of chunks held, hidden ones included.
    pub fn len(&self) -> usize {
        self.current().chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `created_at` of the live ingest for `document_key`, if any.
    pub fn latest_ingest_time(&self, document_key: &str) -> Option<DateTime<Utc>> {
        self.current().latest.get(document_key).map(|(t, _)| *t)
    }

    fn current(&self) -> Arc<Snapshot> {
        // Publishing is a single pointer swap; a poisoned lock still holds a whole snapshot.
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    fn publish(&self, snap: Snapshot) {
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(snap);
    }

    fn check_dims(&self, actual: usize) -> Result<()> {
        if actual != self.dims {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual,
            });
        }
        Ok(())
    }

    /// Persist `chunk` and make it visible to subsequent queries.
    pub async fn insert(&self, chunk: DocumentChunk) -> Result<()> {
        self.insert_batch(vec![chunk]).await
    }

    /// Persist every chunk of one ingest, then publish them together.
    ///
    /// Fails with `DimensionMismatch` before touching storage when any
    /// embedding length differs from the index dimension. A storage
    /// failure persists and publishes nothing, so a previous version of
    /// the same document key stays live.
    pub async fn insert_batch(&self, chunks: Vec<DocumentChunk>) -> Result<()> {
        for chunk in &chunks {
            self.check_dims(chunk.embedding.len())?;
        }
        if chunks.is_empty() {
            return Ok(());
        }

        let _writer = self.writer.lock().await;
        self.store.persist_batch(&chunks).await.map_err(|e| {
            Error::ingest(format!("failed to persist {} chunk(s): {:#}", chunks.len(), e))
        })?;

        let base = self.current();
        let mut next = Snapshot {
            chunks: base.chunks.clone(),
            latest: base.latest.clone(),
        };
        for chunk in chunks {
            next.push(Arc::new(chunk));
        }
        self.publish(next);
        Ok(())
    }

    /// Live chunks of `document_key` in `chunk_index` order.
    pub fn document_chunks(&self, document_key: &str) -> Vec<DocumentChunk> {
        let snap = self.current();
        let mut chunks: Vec<DocumentChunk> = snap
            .chunks
            .iter()
            .filter(|c| c.document_key == document_key && snap.is_live(c))
            .map(|c| DocumentChunk::clone(c))
            .collect();
        chunks.sort_by_key(|c| c.chunk_index);
        chunks
    }

    /// Return up to `k` live chunks most similar to `vector`.
    ///
    /// Sorted by similarity descending, then `created_at` descending, then
    /// id. Fails with `EmptyIndex` only when the index holds no chunks.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<RetrievalResult> {
        self.check_dims(vector.len())?;

        let snap = self.current();
        if snap.chunks.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if k == 0 {
            return Ok(RetrievalResult::empty());
        }

        let mut hits: Vec<RetrievalHit> = snap
            .chunks
            .iter()
            .filter(|c| snap.is_live(c))
            .map(|c| RetrievalHit {
                similarity: similarity(vector, &c.embedding),
                chunk: DocumentChunk::clone(c),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.chunk.created_at.cmp(&a.chunk.created_at))
                .then_with(|| a.chunk.id.cmp(&b.chunk.id))
        });
        hits.truncate(k);

        Ok(RetrievalResult { hits })
    }

    /// Reconstruct the in-memory index from persisted chunks.
    ///
    /// Idempotent. Returns the number of chunks loaded, or `EmptyIndex`
    /// when nothing is persisted (the index is reset to empty either way).
    pub async fn rebuild(&self) -> Result<usize> {
        let _writer = self.writer.lock().await;

        let chunks = self
            .store
            .load_all()
            .await
            .map_err(|e| Error::storage(format!("{:#}", e)))?;
        for chunk in &chunks {
            self.check_dims(chunk.embedding.len())?;
        }

        let n = chunks.len();
        self.publish(Snapshot::from_chunks(chunks));
        tracing::info!(chunks = n, "vector index rebuilt");

        if n == 0 {
            return Err(Error::EmptyIndex);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use scopeforge_core::store::memory::InMemoryChunkStore;
    use std::collections::BTreeSet;

    fn chunk(
        id: &str,
        key: &str,
        ingest: &str,
        offset_ms: i64,
        embedding: Vec<f32>,
    ) -> DocumentChunk {
        DocumentChunk {
            id: id.into(),
            source_project_id: "p".into(),
            source_type: "document".into(),
            document_key: key.into(),
            ingest_id: ingest.into(),
            chunk_index: 0,
            text: id.into(),
            embedding,
            tags: BTreeSet::new(),
            created_at: DateTime::from_timestamp_millis(1_700_000_000_000).unwrap()
                + Duration::milliseconds(offset_ms),
            hash: String::new(),
        }
    }

    fn index(dims: usize) -> VectorIndex {
        VectorIndex::new(dims, Arc::new(InMemoryChunkStore::new()))
    }

    #[tokio::test]
    async fn self_query_returns_chunk_with_similarity_one() {
        let idx = index(3);
        let v = vec![0.2, 0.4, 0.9];
        idx.insert(chunk("c1", "k1", "i1", 0, v.clone())).await.unwrap();

        let r = idx.query(&v, 1).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r.hits[0].chunk.id, "c1");
        assert!((r.hits[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn insert_rejects_wrong_dimension() {
        let idx = index(3);
        let err = idx
            .insert(chunk("c1", "k", "i", 0, vec![1.0, 0.0]))
            .await
            .unwrap_err();
        assert_eq!(err, Error::DimensionMismatch { expected: 3, actual: 2 });
        assert!(idx.is_empty());
    }

    #[tokio::test]
    async fn empty_index_query_errors_but_poor_match_does_not() {
        let idx = index(2);
        assert_eq!(idx.query(&[1.0, 0.0], 3).unwrap_err(), Error::EmptyIndex);

        idx.insert(chunk("c1", "k", "i", 0, vec![1.0, 0.0])).await.unwrap();
        let r = idx.query(&[0.0, 1.0], 3).unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r.hits[0].similarity, 0.0);
        assert!(idx.query(&[0.0, 1.0], 0).unwrap().is_empty());
    }

    #[tokio::test]
    async fn results_sorted_and_ties_prefer_newest() {
        let idx = index(2);
        idx.insert(chunk("old", "k1", "i1", 0, vec![1.0, 0.0])).await.unwrap();
        idx.insert(chunk("new", "k2", "i2", 50, vec![1.0, 0.0])).await.unwrap();
        idx.insert(chunk("mid", "k3", "i3", 10, vec![1.0, 1.0])).await.unwrap();
        idx.insert(chunk("far", "k4", "i4", 20, vec![0.0, 1.0])).await.unwrap();

        let r = idx.query(&[1.0, 0.0], 10).unwrap();
        let ids: Vec<_> = r.hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "mid", "far"]);
        for w in r.hits.windows(2) {
            assert!(w[0].similarity >= w[1].similarity);
        }
        assert_eq!(idx.query(&[1.0, 0.0], 2).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn newer_ingest_soft_replaces_older_under_same_key() {
        let idx = index(2);
        idx.insert(chunk("v1", "doc", "ing-1", 0, vec![1.0, 0.0])).await.unwrap();
        idx.insert(chunk("v2", "doc", "ing-2", 10, vec![0.9, 0.1])).await.unwrap();

        let r = idx.query(&[1.0, 0.0], 5).unwrap();
        let ids: Vec<_> = r.hits.iter().map(|h| h.chunk.id.as_str()).collect();
        assert_eq!(ids, vec!["v2"]);
        assert_eq!(idx.len(), 2);
    }

    #[tokio::test]
    async fn batch_with_one_bad_dimension_is_rejected_whole() {
        let idx = index(2);
        let batch = vec![
            chunk("a", "doc", "i1", 0, vec![1.0, 0.0]),
            chunk("b", "doc", "i1", 0, vec![1.0, 0.0, 0.0]),
        ];
        let err = idx.insert_batch(batch).await.unwrap_err();
        assert_eq!(err, Error::DimensionMismatch { expected: 2, actual: 3 });
        assert!(idx.is_empty());
    }

    #[tokio::test]
    async fn document_chunks_follow_live_ingest_in_order() {
        let idx = index(2);
        let mut first = chunk("v1", "doc", "ing-1", 0, vec![1.0, 0.0]);
        first.text = "old".into();
        idx.insert(first).await.unwrap();

        let mut second = Vec::new();
        for (i, text) in ["intro", "body"].iter().enumerate().rev() {
            let mut c = chunk(&format!("v2-{}", i), "doc", "ing-2", 10, vec![1.0, 0.0]);
            c.chunk_index = i as i64;
            c.text = text.to_string();
            second.push(c);
        }
        idx.insert_batch(second).await.unwrap();

        let texts: Vec<_> = idx
            .document_chunks("doc")
            .into_iter()
            .map(|c| c.text)
            .collect();
        assert_eq!(texts, vec!["intro".to_string(), "body".to_string()]);
        assert!(idx.document_chunks("missing").is_empty());
    }

    #[tokio::test]
    async fn rebuild_restores_state_and_is_idempotent() {
        let store: Arc<dyn ChunkStore> = Arc::new(InMemoryChunkStore::new());
        let idx = VectorIndex::new(2, Arc::clone(&store));
        assert_eq!(idx.rebuild().await.unwrap_err(), Error::EmptyIndex);

        idx.insert(chunk("a", "k1", "i1", 0, vec![1.0, 0.0])).await.unwrap();
        idx.insert(chunk("b", "k1", "i2", 5, vec![1.0, 0.0])).await.unwrap();
        let before = idx.query(&[1.0, 0.0], 5).unwrap();

        let fresh = VectorIndex::open(2, Arc::clone(&store)).await.unwrap();
        assert_eq!(fresh.len(), 2);
        assert_eq!(fresh.query(&[1.0, 0.0], 5).unwrap(), before);

        assert_eq!(fresh.rebuild().await.unwrap(), 2);
        assert_eq!(fresh.rebuild().await.unwrap(), 2);
        assert_eq!(fresh.query(&[1.0, 0.0], 5).unwrap(), before);
    }

    #[tokio::test]
    async fn rebuild_rejects_persisted_chunks_of_wrong_dimension() {
        let store: Arc<dyn ChunkStore> = Arc::new(InMemoryChunkStore::new());
        store
            .persist(&chunk("a", "k", "i", 0, vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        let err = VectorIndex::open(2, store).await.err().unwrap();
        assert_eq!(err.kind(), scopeforge_core::ErrorKind::DimensionMismatch);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_reads_see_whole_chunks() {
        let idx = Arc::new(index(4));
        idx.insert(chunk("seed", "seed", "seed", 0, vec![1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();

        let writer = {
            let idx = Arc::clone(&idx);
            tokio::spawn(async move {
                for i in 0..50 {
                    let c = chunk(
                        &format!("c{}", i),
                        &format!("k{}", i),
                        &format!("i{}", i),
                        i + 1,
                        vec![1.0, i as f32, 0.5, 0.25],
                    );
                    idx.insert(c).await.unwrap();
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let idx = Arc::clone(&idx);
            readers.push(tokio::spawn(async move {
                let mut last = 0;
                for _ in 0..100 {
                    let r = idx.query(&[1.0, 0.0, 0.0, 0.0], 100).unwrap();
                    assert!(r.len() >= last, "snapshot went backwards");
                    for h in &r.hits {
                        assert_eq!(h.chunk.embedding.len(), 4);
                    }
                    last = r.len();
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }
        assert_eq!(idx.len(), 51);
    }
}
