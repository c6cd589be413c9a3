//! Core data models for the query pipeline.
//!
//! These types cover the stored document shape, the coerced metadata view,
//! and the wire contract served to clients. Metadata coercion happens here,
//! exactly once, at the storage boundary; downstream code only ever sees
//! typed fields with documented defaults.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::content::ParsedContent;

/// A document read from the vector index: an opaque content blob plus
/// loosely-typed metadata.
#[derive(Debug, Clone)]
pub struct SiteDocument {
    pub id: String,
    pub content: String,
    pub metadata: SiteMetadata,
}

/// Priority class attached to a site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    #[default]
    Low,
}

impl Priority {
    /// Coerce a raw metadata string. Anything unrecognized defaults to low.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" => Priority::High,
            "medium" => Priority::Medium,
            _ => Priority::Low,
        }
    }
}

/// Typed view of a document's metadata map.
///
/// The recognized keys are coerced into named fields with defaults
/// (missing or malformed values never raise: `priority` falls back to
/// low, `area` to 0.0, strings to empty). Unrecognized keys are carried
/// opaquely in `extra`.
#[derive(Debug, Clone, Default)]
pub struct SiteMetadata {
    pub id: String,
    pub name: String,
    pub location: String,
    pub priority: Priority,
    pub area: f64,
    pub extra: Map<String, Value>,
}

impl SiteMetadata {
    /// Coerce a raw metadata JSON string. Malformed JSON yields the
    /// all-defaults view rather than an error.
    pub fn from_json(raw: &str) -> Self {
        let map: Map<String, Value> = match serde_json::from_str(raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        Self::from_map(map)
    }

    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let id = take_string(&mut map, "id");
        let name = take_string(&mut map, "name");
        let location = take_string(&mut map, "location");
        let priority = map
            .remove("priority")
            .as_ref()
            .and_then(Value::as_str)
            .map(Priority::parse)
            .unwrap_or_default();
        let area = take_number(&mut map, "area").max(0.0);

        Self {
            id,
            name,
            location,
            priority,
            area,
            extra: map,
        }
    }
}

/// Remove a key and coerce it to a string: strings pass through, numbers
/// are rendered, everything else becomes empty.
fn take_string(map: &mut Map<String, Value>, key: &str) -> String {
    match map.remove(key) {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Remove a key and coerce it to a number: numbers pass through, numeric
/// strings are parsed, everything else becomes 0.0.
fn take_number(map: &mut Map<String, Value>, key: &str) -> f64 {
    match map.remove(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// The externally-visible projection of a ranked document.
///
/// Field names follow the client contract (camelCase on the wire).
/// `matchedTerms` is reserved for term highlighting and is always empty.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    pub location: String,
    pub description: String,
    pub current_issues: Vec<String>,
    pub suitable_solutions: Vec<String>,
    pub priority: Priority,
    pub area: f64,
    pub tags: Vec<String>,
    pub relevance_score: f64,
    pub matched_terms: Vec<String>,
}

impl SearchResult {
    /// Assemble a result from the coerced metadata, parsed content, and
    /// a computed relevance score.
    pub fn new(metadata: &SiteMetadata, parsed: ParsedContent, relevance_score: f64) -> Self {
        Self {
            id: metadata.id.clone(),
            name: metadata.name.clone(),
            location: metadata.location.clone(),
            description: parsed.description,
            current_issues: parsed.current_issues,
            suitable_solutions: parsed.suitable_solutions,
            priority: metadata.priority,
            area: metadata.area,
            tags: parsed.tags,
            relevance_score,
            matched_terms: Vec::new(),
        }
    }
}

// ============ Request / response contract ============

/// Structured request body for `POST /query`.
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Structured answer: a synthesized summary plus results ordered by
/// descending relevance score.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub summary: String,
    pub results: Vec<SearchResult>,
}

/// Legacy request body for `POST /ask`.
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

/// Legacy plain-text answer shape.
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub text: String,
}
