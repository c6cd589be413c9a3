use anyhow::Result;

use crate::config::Config;
use crate::db;

/// Create the site index schema. Idempotent: safe to run repeatedly.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Documents: one row per ingested site or note, content blob plus
    // the raw metadata map as JSON.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            source_id TEXT NOT NULL UNIQUE,
            content TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            dedup_hash TEXT NOT NULL
        )
        "#,
    )
    .execute(&pool)
    .await?;

    // One embedding vector per document, stored as little-endian f32 bytes.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS document_vectors (
            document_id TEXT PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            embedding BLOB NOT NULL,
            content_hash TEXT NOT NULL,
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_updated_at ON documents(updated_at DESC)")
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}
