//! Vector store retrieval.
//!
//! The site index lives in SQLite: one row per document plus a stored
//! embedding vector. Nearest-neighbour search embeds the query through
//! the configured provider, computes cosine similarity against every
//! stored vector in Rust, and returns the top `k` candidates.
//!
//! Each candidate carries both the distance reported here (cosine
//! distance, `1 − similarity`) and the stored vector itself, so ranking
//! can apply either scoring strategy downstream.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::embedding;
use crate::models::{SiteDocument, SiteMetadata};
use crate::scoring::cosine_similarity;

/// A retrieval candidate: the document, the distance reported by the
/// index, and the stored embedding for on-demand re-scoring.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub document: SiteDocument,
    pub distance: f64,
    pub vector: Option<Vec<f32>>,
}

/// Embed `query` and return the `k` nearest documents together with the
/// query vector used for the comparison.
///
/// Documents without a stored vector are not candidates. Malformed
/// metadata is coerced to defaults here, at the boundary, and never
/// surfaces as an error.
pub async fn similarity_search(
    config: &Config,
    pool: &SqlitePool,
    query: &str,
    k: usize,
) -> Result<(Vec<Candidate>, Vec<f32>)> {
    let provider = embedding::create_provider(&config.embedding)?;
    let query_vec = embedding::embed_query(provider.as_ref(), &config.embedding, query).await?;

    let rows = sqlx::query(
        r#"
        SELECT d.id, d.content, d.metadata_json, v.embedding
        FROM documents d
        JOIN document_vectors v ON v.document_id = d.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut candidates: Vec<Candidate> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let vector = embedding::blob_to_vec(&blob);
            let similarity = cosine_similarity(&query_vec, &vector) as f64;
            let metadata_json: String = row.get("metadata_json");

            Candidate {
                document: SiteDocument {
                    id: row.get("id"),
                    content: row.get("content"),
                    metadata: SiteMetadata::from_json(&metadata_json),
                },
                distance: 1.0 - similarity,
                vector: Some(vector),
            }
        })
        .collect();

    // Nearest first; stable so equal distances keep row order.
    candidates.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    candidates.truncate(k);

    Ok((candidates, query_vec))
}

/// Count documents and stored vectors, for status output.
pub async fn index_counts(pool: &SqlitePool) -> Result<(i64, i64)> {
    let docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(pool)
        .await?;
    let vectors: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM document_vectors")
        .fetch_one(pool)
        .await?;
    Ok((docs, vectors))
}
