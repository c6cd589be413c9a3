//! Embedding backfill for the site index.
//!
//! Ingest embeds inline when it can; documents whose embedding call
//! failed (or that were ingested with the provider disabled) are picked
//! up here. A vector is stale when its stored content hash no longer
//! matches the document content.

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding;

struct PendingDocument {
    id: String,
    content: String,
    content_hash: String,
}

/// Embed documents that are missing vectors or whose vectors are stale.
pub async fn run_embed_pending(
    config: &Config,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let model_name = provider.model_name().to_string();
    let pool = db::connect(config).await?;
    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);

    let pending = find_pending_documents(&pool, &model_name).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  documents needing embeddings: {}", pending.len());
        pool.close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all documents up to date");
        pool.close().await;
        return Ok(());
    }

    let total = pending.len();
    let mut embedded = 0u64;
    let mut failed = 0u64;

    for batch in pending.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|p| p.content.clone()).collect();

        match embedding::embed_texts(provider.as_ref(), &config.embedding, &texts).await {
            Ok(vectors) => {
                for (doc, vec) in batch.iter().zip(vectors.iter()) {
                    upsert_vector(
                        &pool,
                        &doc.id,
                        &model_name,
                        provider.dims(),
                        &doc.content_hash,
                        vec,
                    )
                    .await?;
                    embedded += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "embedding batch failed");
                failed += batch.len() as u64;
            }
        }
    }

    println!("embed pending");
    println!("  total pending: {}", total);
    println!("  embedded: {}", embedded);
    println!("  failed: {}", failed);

    pool.close().await;
    Ok(())
}

/// Embed a single document during ingest. Fallible; ingest records a
/// failure as pending rather than aborting.
pub async fn embed_document_inline(
    config: &Config,
    pool: &SqlitePool,
    doc_id: &str,
    content: &str,
) -> Result<()> {
    let provider = embedding::create_provider(&config.embedding)?;
    let vector = embedding::embed_query(provider.as_ref(), &config.embedding, content).await?;

    upsert_vector(
        pool,
        doc_id,
        provider.model_name(),
        provider.dims(),
        &content_hash(content),
        &vector,
    )
    .await
}

async fn find_pending_documents(pool: &SqlitePool, model: &str) -> Result<Vec<PendingDocument>> {
    let rows = sqlx::query(
        r#"
        SELECT d.id, d.content, v.content_hash AS vector_hash, v.model AS vector_model
        FROM documents d
        LEFT JOIN document_vectors v ON v.document_id = d.id
        ORDER BY d.source_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut pending = Vec::new();

    for row in rows {
        let content: String = row.get("content");
        let hash = content_hash(&content);
        let vector_hash: Option<String> = row.get("vector_hash");
        let vector_model: Option<String> = row.get("vector_model");

        let up_to_date =
            vector_hash.as_deref() == Some(hash.as_str()) && vector_model.as_deref() == Some(model);
        if !up_to_date {
            pending.push(PendingDocument {
                id: row.get("id"),
                content,
                content_hash: hash,
            });
        }
    }

    Ok(pending)
}

async fn upsert_vector(
    pool: &SqlitePool,
    document_id: &str,
    model: &str,
    dims: usize,
    content_hash: &str,
    vector: &[f32],
) -> Result<()> {
    let blob = embedding::vec_to_blob(vector);

    sqlx::query(
        r#"
        INSERT INTO document_vectors (document_id, model, dims, embedding, content_hash)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(document_id) DO UPDATE SET
            model = excluded.model,
            dims = excluded.dims,
            embedding = excluded.embedding,
            content_hash = excluded.content_hash
        "#,
    )
    .bind(document_id)
    .bind(model)
    .bind(dims as i64)
    .bind(&blob)
    .bind(content_hash)
    .execute(pool)
    .await?;

    Ok(())
}

fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
