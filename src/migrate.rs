use anyhow::Result;
use sqlx::SqlitePool;

/// Create the knowledge-base schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            source_project_id TEXT NOT NULL,
            source_type TEXT NOT NULL,
            document_key TEXT NOT NULL,
            ingest_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            tags_json TEXT NOT NULL DEFAULT '[]',
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(ingest_id, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document_key ON chunks(document_key)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_created_at ON chunks(created_at, id)")
        .execute(pool)
        .await?;

    Ok(())
}
