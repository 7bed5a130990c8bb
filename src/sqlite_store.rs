//! SQLite-backed [`ChunkStore`] implementation.
//!
//! One row per chunk in the `chunks` table. Embeddings are stored as
//! little-endian f32 BLOBs, tags as a JSON array, and `created_at` as
//! Unix milliseconds so ordering survives a round trip.

use std::collections::BTreeSet;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use scopeforge_core::embedding::{blob_to_vec, vec_to_blob};
use scopeforge_core::models::DocumentChunk;
use scopeforge_core::store::ChunkStore;

/// SQLite implementation of the [`ChunkStore`] trait.
pub struct SqliteChunkStore {
    pool: SqlitePool,
}

impl SqliteChunkStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_chunk(row: &SqliteRow) -> Result<DocumentChunk> {
    let created_ms: i64 = row.get("created_at");
    let created_at: DateTime<Utc> = DateTime::from_timestamp_millis(created_ms)
        .ok_or_else(|| anyhow!("invalid created_at timestamp: {}", created_ms))?;
    let tags_json: String = row.get("tags_json");
    let tags: BTreeSet<String> =
        serde_json::from_str(&tags_json).context("invalid tags_json column")?;
    let blob: Vec<u8> = row.get("embedding");
    let dims: i64 = row.get("dims");
    let embedding = blob_to_vec(&blob);
    if embedding.len() as i64 != dims {
        return Err(anyhow!(
            "stored embedding has {} values, row says {}",
            embedding.len(),
            dims
        ));
    }

    Ok(DocumentChunk {
        id: row.get("id"),
        source_project_id: row.get("source_project_id"),
        source_type: row.get("source_type"),
        document_key: row.get("document_key"),
        ingest_id: row.get("ingest_id"),
        chunk_index: row.get("chunk_index"),
        text: row.get("text"),
        embedding,
        tags,
        created_at,
        hash: row.get("hash"),
    })
}

#[async_trait]
impl ChunkStore for SqliteChunkStore {
    async fn persist_batch(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for chunk in chunks {
            let tags_json = serde_json::to_string(&chunk.tags)?;
            sqlx::query(
                r#"
                INSERT INTO chunks (id, source_project_id, source_type, document_key, ingest_id,
                                    chunk_index, text, hash, tags_json, embedding, dims,
                                    created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.source_project_id)
            .bind(&chunk.source_type)
            .bind(&chunk.document_key)
            .bind(&chunk.ingest_id)
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .bind(&chunk.hash)
            .bind(&tags_json)
            .bind(vec_to_blob(&chunk.embedding))
            .bind(chunk.embedding.len() as i64)
            .bind(chunk.created_at.timestamp_millis())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to persist chunk {}", chunk.id))?;
        }
        // Dropping `tx` on an early return rolls the whole batch back.
        tx.commit().await?;

        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<DocumentChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source_project_id, source_type, document_key, ingest_id, chunk_index,
                   text, hash, tags_json, embedding, dims, created_at
            FROM chunks
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chunk).collect()
    }
}
