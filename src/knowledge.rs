//! Knowledge Base Manager.
//!
//! Owns the [`VectorIndex`] and the embedding provider and exposes the
//! three knowledge-base operations:
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`ingest`](KnowledgeBase::ingest) | Chunk, embed, and insert text |
//! | [`retrieve`](KnowledgeBase::retrieve) | Embed a query and return the top-k precedent |
//! | [`reindex_feedback`](KnowledgeBase::reindex_feedback) | Ingest a reviewer comment; visible on return |
//! | [`best_expected_output`](KnowledgeBase::best_expected_output) | Expected output of the closest seeded example |
//!
//! All chunks of one ingest are written as a single batch on a spawned
//! task, so dropping the caller's future (client disconnect) never
//! interrupts the write, and a failed write leaves the previous version
//! of the document live.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use scopeforge_core::chunk::{make_chunk, split_text, ChunkOrigin};
use scopeforge_core::embedding::EmbeddingProvider;
use scopeforge_core::evaluate::expected_output_of;
use scopeforge_core::models::{FeedbackRecord, IngestMetadata, RetrievalResult};
use scopeforge_core::store::ChunkStore;
use scopeforge_core::{Error, Result};

use crate::config::Config;
use crate::embedding::{create_provider, embed_one};
use crate::index::VectorIndex;
use crate::sqlite_store::SqliteChunkStore;
use crate::{db, migrate};

/// Source type recorded on feedback chunks.
pub const FEEDBACK_SOURCE: &str = "feedback";

/// What one ingest call wrote.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub ingest_id: String,
    pub document_key: String,
    pub chunk_ids: Vec<String>,
}

pub struct KnowledgeBase {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    max_chars: usize,
    top_k: usize,
}

impl KnowledgeBase {
    /// Assemble a knowledge base from parts.
    ///
    /// Fails with `DimensionMismatch` when the provider's dimension
    /// differs from the index dimension.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        max_chars: usize,
        top_k: usize,
    ) -> Result<Self> {
        if embedder.dims() != index.dims() {
            return Err(Error::DimensionMismatch {
                expected: index.dims(),
                actual: embedder.dims(),
            });
        }
        Ok(Self {
            embedder,
            index,
            max_chars,
            top_k,
        })
    }

    /// Open the SQLite-backed knowledge base described by `config`.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        let store: Arc<dyn ChunkStore> = Arc::new(SqliteChunkStore::new(pool));
        let embedder = create_provider(&config.embedding)?;
        Self::open_with(config, embedder, store).await
    }

    /// Open over an explicit provider and store, loading persisted chunks.
    pub async fn open_with(
        config: &Config,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn ChunkStore>,
    ) -> anyhow::Result<Self> {
        let index = Arc::new(VectorIndex::open(config.dims(), store).await?);
        tracing::info!(
            model = embedder.model_name(),
            dims = index.dims(),
            chunks = index.len(),
            "knowledge base opened"
        );
        Ok(Self::new(
            embedder,
            index,
            config.chunking.max_chars,
            config.retrieval.top_k,
        )?)
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn embedder(&self) -> &dyn EmbeddingProvider {
        self.embedder.as_ref()
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Chunk `text`, embed each chunk, and insert them into the index.
    pub async fn ingest(&self, text: &str, metadata: &IngestMetadata) -> Result<IngestReport> {
        let pieces = split_text(text, self.max_chars);
        if pieces.is_empty() {
            return Err(Error::ingest("text is empty; nothing to ingest"));
        }

        let vectors = self
            .embedder
            .embed(&pieces)
            .await
            .map_err(|e| Error::ingest(format!("embedding failed: {:#}", e)))?;
        if vectors.len() != pieces.len() {
            return Err(Error::ingest(format!(
                "embedding provider returned {} vectors for {} chunks",
                vectors.len(),
                pieces.len()
            )));
        }
        for v in &vectors {
            if v.len() != self.index.dims() {
                return Err(Error::DimensionMismatch {
                    expected: self.index.dims(),
                    actual: v.len(),
                });
            }
        }

        let ingest_id = Uuid::new_v4().to_string();
        let document_key = metadata
            .document_key
            .clone()
            .unwrap_or_else(|| format!("{}:{}", metadata.source_type, Uuid::new_v4()));
        let origin = ChunkOrigin {
            project_id: &metadata.project_id,
            source_type: &metadata.source_type,
            document_key: &document_key,
            ingest_id: &ingest_id,
            tags: &metadata.tags,
            created_at: self.next_created_at(&document_key),
        };
        let chunks: Vec<_> = pieces
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| make_chunk(&origin, i as i64, text, vector))
            .collect();
        let chunk_ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();

        let index = Arc::clone(&self.index);
        tokio::spawn(async move { index.insert_batch(chunks).await })
        .await
        .map_err(|e| Error::ingest(format!("insert task failed: {}", e)))??;

        tracing::info!(
            project = %metadata.project_id,
            source_type = %metadata.source_type,
            document_key = %document_key,
            chunks = chunk_ids.len(),
            "ingested"
        );

        Ok(IngestReport {
            ingest_id,
            document_key,
            chunk_ids,
        })
    }

    /// Millisecond-precision timestamp, strictly after the key's live ingest
    /// so a re-ingest always wins, in memory and after a SQLite rebuild.
    fn next_created_at(&self, document_key: &str) -> DateTime<Utc> {
        let now = Utc::now();
        let now = DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now);
        match self.index.latest_ingest_time(document_key) {
            Some(prev) if prev >= now => prev + Duration::milliseconds(1),
            _ => now,
        }
    }

    /// Return the `k` live chunks most similar to `query_text`.
    ///
    /// An empty index yields an empty result.
    pub async fn retrieve(&self, query_text: &str, k: usize) -> Result<RetrievalResult> {
        let vector = embed_one(self.embedder.as_ref(), query_text)
            .await
            .map_err(|e| {
                Error::embedding(format!(
                    "{} could not embed the query: {:#}",
                    self.embedder.model_name(),
                    e
                ))
            })?;

        match self.index.query(&vector, k) {
            Ok(result) => {
                tracing::debug!(
                    k,
                    hits = result.len(),
                    top = ?result.top_similarity(),
                    "retrieved"
                );
                Ok(result)
            }
            Err(Error::EmptyIndex) => {
                tracing::debug!("retrieve against empty index");
                Ok(RetrievalResult::empty())
            }
            Err(e) => Err(e),
        }
    }

    /// Expected output of the document closest to `text`.
    ///
    /// Reassembles the live chunks of the top hit's document and returns
    /// the part after `EXPECTED_OUTPUT:`, or the whole document when the
    /// marker is absent. `None` when nothing matches.
    pub async fn best_expected_output(&self, text: &str) -> Result<Option<String>> {
        let result = self.retrieve(text, 1).await?;
        let Some(best) = result.hits.first() else {
            return Ok(None);
        };
        let document = self
            .index
            .document_chunks(&best.chunk.document_key)
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("\n\n");
        tracing::debug!(
            document_key = %best.chunk.document_key,
            similarity = best.similarity,
            "best expected output"
        );
        Ok(Some(expected_output_of(&document).to_string()))
    }

    /// Ingest a reviewer comment. Visible to `retrieve` once this returns.
    pub async fn reindex_feedback(&self, record: &FeedbackRecord) -> Result<IngestReport> {
        let mut metadata = IngestMetadata::new(&record.project_id, FEEDBACK_SOURCE)
            .with_tag(FEEDBACK_SOURCE)
            .with_document_key(format!(
                "{}:{}:{}",
                FEEDBACK_SOURCE,
                record.project_id,
                Uuid::new_v4()
            ));
        if let Some(reviewer) = &record.reviewer {
            metadata = metadata.with_tag(format!("reviewer:{}", reviewer));
        }
        self.ingest(&record.reviewer_comment, &metadata).await
    }
}
