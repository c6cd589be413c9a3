//! Offline ingestion: load site records into the index.
//!
//! Walks the configured data directory and ingests two kinds of files:
//!
//! - `.json` — an array of site records. The description and the issue,
//!   solution, and tag lists are composed into the content blob; every
//!   other field becomes metadata (lists joined with `", "`).
//! - `.txt` — free-text notes. The whole file is the content; metadata
//!   records the filename and the parent directory as a category.
//!
//! Embedding happens inline and is non-fatal: documents whose embedding
//! call fails are stored anyway and counted as pending (`gwk embed`
//! backfills them later).

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::content::build_site_content;
use crate::db;
use crate::embed_cmd;

/// A normalized item ready for storage: stable source id, composed
/// content blob, and the metadata map as stored.
#[derive(Debug, Clone)]
pub struct IngestItem {
    pub source_id: String,
    pub content: String,
    pub metadata: Map<String, Value>,
}

pub async fn run_ingest(config: &Config, dry_run: bool, limit: Option<usize>) -> Result<()> {
    let ingest_config = config
        .ingest
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("[ingest] section not configured"))?;

    let root = &ingest_config.root;
    if !root.exists() {
        bail!("Ingest root does not exist: {}", root.display());
    }

    let include_set = build_globset(&ingest_config.include_globs)?;
    let exclude_set = build_globset(&ingest_config.exclude_globs)?;

    let mut items = Vec::new();

    let walker = WalkDir::new(root).follow_links(ingest_config.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                items.extend(parse_site_file(&rel_str, &text)?);
            }
            Some("txt") => {
                let text = std::fs::read_to_string(path).unwrap_or_default();
                items.push(text_file_item(path, &rel_str, text));
            }
            _ => {}
        }
    }

    // Deterministic ingest order.
    items.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    if let Some(lim) = limit {
        items.truncate(lim);
    }

    if dry_run {
        println!("ingest {} (dry-run)", root.display());
        println!("  items found: {}", items.len());
        return Ok(());
    }

    let pool = db::connect(config).await?;

    let mut upserted = 0u64;
    let mut unchanged = 0u64;
    let mut embedded = 0u64;
    let mut pending = 0u64;

    for item in &items {
        match upsert_document(&pool, item).await? {
            Upsert::Written(doc_id) => {
                upserted += 1;
                if config.embedding.is_enabled() {
                    match embed_cmd::embed_document_inline(config, &pool, &doc_id, &item.content)
                        .await
                    {
                        Ok(()) => embedded += 1,
                        Err(e) => {
                            tracing::warn!(doc = %doc_id, error = %e, "inline embedding failed");
                            pending += 1;
                        }
                    }
                } else {
                    pending += 1;
                }
            }
            Upsert::Unchanged => unchanged += 1,
        }
    }

    println!("ingest {}", root.display());
    println!("  items found: {}", items.len());
    println!("  upserted documents: {}", upserted);
    println!("  unchanged: {}", unchanged);
    if config.embedding.is_enabled() {
        println!("  embeddings written: {}", embedded);
    }
    println!("  embeddings pending: {}", pending);
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Parse one `.json` site file into ingest items.
///
/// Mirrors the content contract consumed by the parser: the description
/// goes on the first line, followed by the labeled issue/solution/tag
/// sections. All remaining fields are metadata; list values are joined
/// into comma-separated strings so the metadata map stays scalar.
pub fn parse_site_file(rel_path: &str, text: &str) -> Result<Vec<IngestItem>> {
    let records: Vec<Value> = serde_json::from_str(text)
        .with_context(|| format!("{} is not a JSON array of site records", rel_path))?;

    let mut items = Vec::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        let Value::Object(record) = record else {
            bail!("{}[{}] is not an object", rel_path, index);
        };

        let description = record
            .get("description")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let issues = string_list(record.get("currentIssues"));
        let solutions = string_list(record.get("suitableSolutions"));
        let tags = string_list(record.get("tags"));

        let content = build_site_content(description, &issues, &solutions, &tags);

        let mut metadata = Map::new();
        for (key, value) in &record {
            // Already folded into the content blob. Tags stay in both
            // places, matching the stored corpus.
            if matches!(key.as_str(), "description" | "currentIssues" | "suitableSolutions") {
                continue;
            }
            match value {
                Value::Array(list) => {
                    let joined = list
                        .iter()
                        .map(scalar_to_string)
                        .collect::<Vec<_>>()
                        .join(", ");
                    metadata.insert(key.clone(), Value::String(joined));
                }
                other => {
                    metadata.insert(key.clone(), other.clone());
                }
            }
        }

        let source_id = record
            .get("id")
            .map(scalar_to_string)
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("{}#{}", rel_path, index));

        items.push(IngestItem {
            source_id,
            content,
            metadata,
        });
    }

    Ok(items)
}

fn text_file_item(path: &std::path::Path, rel_path: &str, text: String) -> IngestItem {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let category = path
        .parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let mut metadata = Map::new();
    metadata.insert("filename".to_string(), Value::String(filename));
    metadata.insert("category".to_string(), Value::String(category));

    IngestItem {
        source_id: rel_path.to_string(),
        content: text,
        metadata,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|list| list.iter().map(scalar_to_string).collect())
        .unwrap_or_default()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

enum Upsert {
    Written(String),
    Unchanged,
}

async fn upsert_document(pool: &SqlitePool, item: &IngestItem) -> Result<Upsert> {
    let metadata_json = serde_json::to_string(&item.metadata)?;

    let mut hasher = Sha256::new();
    hasher.update(item.source_id.as_bytes());
    hasher.update(item.content.as_bytes());
    hasher.update(metadata_json.as_bytes());
    let dedup_hash = format!("{:x}", hasher.finalize());

    let existing: Option<(String, String)> =
        sqlx::query_as("SELECT id, dedup_hash FROM documents WHERE source_id = ?")
            .bind(&item.source_id)
            .fetch_optional(pool)
            .await?;

    if let Some((_, ref existing_hash)) = existing {
        if existing_hash == &dedup_hash {
            return Ok(Upsert::Unchanged);
        }
    }

    let doc_id = existing
        .map(|(id, _)| id)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO documents (id, source_id, content, metadata_json, created_at, updated_at, dedup_hash)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_id) DO UPDATE SET
            content = excluded.content,
            metadata_json = excluded.metadata_json,
            updated_at = excluded.updated_at,
            dedup_hash = excluded.dedup_hash
        "#,
    )
    .bind(&doc_id)
    .bind(&item.source_id)
    .bind(&item.content)
    .bind(&metadata_json)
    .bind(now)
    .bind(now)
    .bind(&dedup_hash)
    .execute(pool)
    .await?;

    Ok(Upsert::Written(doc_id))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_site_file_composes_content() {
        let json = r#"[{
            "id": "site-1",
            "name": "Canal Bank",
            "location": "East Ward",
            "priority": "high",
            "area": 540,
            "description": "Bare canal bank",
            "currentIssues": ["erosion", "runoff"],
            "suitableSolutions": ["willow spiling"],
            "tags": ["water", "bank"]
        }]"#;

        let items = parse_site_file("sites.json", json).unwrap();
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.source_id, "site-1");
        assert_eq!(
            item.content,
            "Bare canal bank\nCurrent Issues: erosion, runoff\nSuitable Solutions: willow spiling\nTags: water, bank"
        );
        assert_eq!(
            item.metadata.get("tags").and_then(|v| v.as_str()),
            Some("water, bank")
        );
        assert!(item.metadata.get("description").is_none());
        assert_eq!(item.metadata.get("area").and_then(|v| v.as_i64()), Some(540));
    }

    #[test]
    fn test_parse_site_file_missing_id_uses_path() {
        let json = r#"[{"description": "No id here"}]"#;
        let items = parse_site_file("data/sites.json", json).unwrap();
        assert_eq!(items[0].source_id, "data/sites.json#0");
    }

    #[test]
    fn test_parse_site_file_rejects_non_array() {
        assert!(parse_site_file("x.json", r#"{"not": "an array"}"#).is_err());
    }
}
