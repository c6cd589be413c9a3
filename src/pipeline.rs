//! The query pipeline: ranking, context assembly, and the request
//! lifecycle that ties retrieval and summarization together.
//!
//! A request moves through retrieve, then rank, then summarize, with
//! two short-circuits: when no generation backend is configured
//! the whole pipeline degrades to a fixed placeholder before retrieval,
//! and when retrieval yields no candidates the summarizer is never
//! invoked. No failure inside the pipeline aborts a request: retrieval
//! errors collapse to an empty candidate set and generation errors are
//! rendered into the summary field.

use sqlx::SqlitePool;

use crate::config::{Config, ScoringStrategy};
use crate::content::parse_content;
use crate::generation::Summarizer;
use crate::models::{QueryResponse, SearchResult};
use crate::scoring::{cosine_similarity, distance_to_score};
use crate::store::{self, Candidate};

/// Summary returned when no generation backend is configured.
pub const NO_BACKEND_SUMMARY: &str =
    "Summarization is not configured. Set [generation] provider in the config to enable answers.";

/// Summary returned when retrieval produces no candidates.
pub const NO_MATCH_SUMMARY: &str = "No relevant documents found for this query.";

/// Ranking policy: which scorer to apply, and the optional minimum-score
/// filter (disabled by default).
#[derive(Debug, Clone, Copy, Default)]
pub struct RankPolicy {
    pub strategy: ScoringStrategy,
    pub min_score: Option<f64>,
}

impl RankPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            strategy: config.retrieval.strategy,
            min_score: config.retrieval.min_score,
        }
    }
}

/// A ranked candidate: the wire-facing result plus the original content
/// blob retained for context assembly.
#[derive(Debug, Clone)]
pub struct RankedDocument {
    pub result: SearchResult,
    pub content: String,
}

/// Score, parse, and order candidates by descending relevance.
///
/// Per candidate: compute the relevance score with the policy's strategy,
/// parse the content blob into typed fields, and project the coerced
/// metadata into a [`SearchResult`]. The sort is stable, so candidates
/// with equal scores keep their retrieval order. When `min_score` is set
/// the filter is applied after the sort.
///
/// The cosine strategy needs `query_vector`; a candidate with a missing
/// vector (or a missing query vector) scores 0.0 rather than failing the
/// batch.
pub fn rank(
    candidates: Vec<Candidate>,
    query_vector: Option<&[f32]>,
    policy: &RankPolicy,
) -> Vec<RankedDocument> {
    let mut ranked: Vec<RankedDocument> = candidates
        .into_iter()
        .map(|candidate| {
            let score = match policy.strategy {
                ScoringStrategy::Distance => distance_to_score(candidate.distance),
                ScoringStrategy::Cosine => match (query_vector, candidate.vector.as_deref()) {
                    (Some(query), Some(stored)) => cosine_similarity(query, stored) as f64,
                    _ => 0.0,
                },
            };

            let parsed = parse_content(&candidate.document.content);
            RankedDocument {
                result: SearchResult::new(&candidate.document.metadata, parsed, score),
                content: candidate.document.content,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.result
            .relevance_score
            .partial_cmp(&a.result.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    if let Some(min_score) = policy.min_score {
        ranked.retain(|doc| doc.result.relevance_score >= min_score);
    }

    ranked
}

/// Join the original, unparsed content of the retained candidates, in
/// ranked order, bounded to `max_chars` (cut at a char boundary).
pub fn assemble_context(ranked: &[RankedDocument], max_chars: usize) -> String {
    let mut context = ranked
        .iter()
        .map(|doc| doc.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    if context.len() > max_chars {
        let mut cut = max_chars;
        while cut > 0 && !context.is_char_boundary(cut) {
            cut -= 1;
        }
        context.truncate(cut);
    }

    context
}

/// Rank candidates and produce the response, invoking the summarizer
/// only when there is context to summarize.
///
/// A generation failure is captured here, at the boundary, and rendered
/// into the summary field; the ranked results are returned regardless.
pub async fn respond(
    config: &Config,
    summarizer: &dyn Summarizer,
    candidates: Vec<Candidate>,
    query_vector: Option<&[f32]>,
    query: &str,
) -> QueryResponse {
    if candidates.is_empty() {
        return QueryResponse {
            summary: NO_MATCH_SUMMARY.to_string(),
            results: Vec::new(),
        };
    }

    let policy = RankPolicy::from_config(config);
    let ranked = rank(candidates, query_vector, &policy);

    // The min-score filter can empty the set; the summarizer must never
    // see empty context.
    if ranked.is_empty() {
        return QueryResponse {
            summary: NO_MATCH_SUMMARY.to_string(),
            results: Vec::new(),
        };
    }

    let context = assemble_context(&ranked, config.generation.max_context_chars);

    let summary = match summarizer.summarize(&context, query).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(backend = summarizer.name(), error = %e, "summarization failed");
            format!("Summary unavailable: {}", e)
        }
    };

    QueryResponse {
        summary,
        results: ranked.into_iter().map(|doc| doc.result).collect(),
    }
}

/// Answer a query end to end.
///
/// Degrades to the fixed placeholder before retrieval when no generation
/// backend is configured. A retrieval failure is absorbed as an empty
/// candidate set. This function never returns an error for a well-formed
/// query; every failure mode is reflected in the response payload.
pub async fn answer_query(
    config: &Config,
    pool: &SqlitePool,
    summarizer: &dyn Summarizer,
    query: &str,
) -> QueryResponse {
    if !summarizer.is_configured() {
        return QueryResponse {
            summary: NO_BACKEND_SUMMARY.to_string(),
            results: Vec::new(),
        };
    }

    let (candidates, query_vector) =
        match store::similarity_search(config, pool, query, config.retrieval.top_k).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "retrieval failed; treating as empty candidate set");
                (Vec::new(), Vec::new())
            }
        };

    let query_vector = if query_vector.is_empty() {
        None
    } else {
        Some(query_vector.as_slice())
    };

    respond(config, summarizer, candidates, query_vector, query).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Priority, SiteDocument, SiteMetadata};

    fn make_candidate(id: &str, content: &str, metadata_json: &str, distance: f64) -> Candidate {
        Candidate {
            document: SiteDocument {
                id: id.to_string(),
                content: content.to_string(),
                metadata: SiteMetadata::from_json(metadata_json),
            },
            distance,
            vector: None,
        }
    }

    #[test]
    fn test_rank_orders_by_descending_score() {
        let candidates = vec![
            make_candidate("a", "A", "{}", 0.5),
            make_candidate("b", "B", "{}", 0.1),
            make_candidate("c", "C", "{}", 2.0),
        ];
        let ranked = rank(candidates, None, &RankPolicy::default());

        let descriptions: Vec<&str> = ranked
            .iter()
            .map(|d| d.result.description.as_str())
            .collect();
        assert_eq!(descriptions, vec!["B", "A", "C"]);

        assert!((ranked[0].result.relevance_score - 0.909).abs() < 5e-4);
        assert!((ranked[1].result.relevance_score - 0.667).abs() < 5e-4);
        assert!((ranked[2].result.relevance_score - 0.333).abs() < 5e-4);
    }

    #[test]
    fn test_rank_equal_scores_keep_input_order() {
        let candidates = vec![
            make_candidate("first", "First", r#"{"id": "first"}"#, 1.0),
            make_candidate("second", "Second", r#"{"id": "second"}"#, 1.0),
        ];
        let ranked = rank(candidates, None, &RankPolicy::default());
        assert_eq!(ranked[0].result.id, "first");
        assert_eq!(ranked[1].result.id, "second");
    }

    #[test]
    fn test_rank_populates_parsed_fields_and_metadata() {
        let candidates = vec![make_candidate(
            "a",
            "Compacted verge\nCurrent Issues: flooding, runoff\nTags: water",
            r#"{"id": "s7", "name": "Verge", "priority": "high", "area": 320}"#,
            0.0,
        )];
        let ranked = rank(candidates, None, &RankPolicy::default());
        let result = &ranked[0].result;
        assert_eq!(result.description, "Compacted verge");
        assert_eq!(result.current_issues, vec!["flooding", "runoff"]);
        assert_eq!(result.tags, vec!["water"]);
        assert_eq!(result.priority, Priority::High);
        assert_eq!(result.area, 320.0);
        assert_eq!(result.relevance_score, 1.0);
        assert!(result.matched_terms.is_empty());
    }

    #[test]
    fn test_rank_metadata_defaults() {
        let candidates = vec![make_candidate("a", "Desc", "{}", 0.2)];
        let ranked = rank(candidates, None, &RankPolicy::default());
        assert_eq!(ranked[0].result.priority, Priority::Low);
        assert_eq!(ranked[0].result.area, 0.0);
        assert_eq!(ranked[0].result.id, "");
    }

    #[test]
    fn test_rank_min_score_filter() {
        let candidates = vec![
            make_candidate("a", "A", "{}", 0.1),
            make_candidate("b", "B", "{}", 2.0),
        ];
        let policy = RankPolicy {
            min_score: Some(0.5),
            ..Default::default()
        };
        let ranked = rank(candidates, None, &policy);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].result.description, "A");
    }

    #[test]
    fn test_rank_cosine_strategy_missing_vector_scores_zero() {
        let candidates = vec![make_candidate("a", "A", "{}", 0.1)];
        let policy = RankPolicy {
            strategy: ScoringStrategy::Cosine,
            min_score: None,
        };
        let query = vec![1.0f32, 0.0];
        let ranked = rank(candidates, Some(&query), &policy);
        assert_eq!(ranked[0].result.relevance_score, 0.0);
    }

    #[test]
    fn test_rank_cosine_strategy_scores_from_vectors() {
        let mut candidate = make_candidate("a", "A", "{}", 0.9);
        candidate.vector = Some(vec![1.0, 0.0]);
        let policy = RankPolicy {
            strategy: ScoringStrategy::Cosine,
            min_score: None,
        };
        let query = vec![1.0f32, 0.0];
        let ranked = rank(vec![candidate], Some(&query), &policy);
        assert!((ranked[0].result.relevance_score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_assemble_context_ranked_order() {
        let candidates = vec![
            make_candidate("a", "far away", "{}", 2.0),
            make_candidate("b", "nearest", "{}", 0.0),
        ];
        let ranked = rank(candidates, None, &RankPolicy::default());
        let context = assemble_context(&ranked, 1000);
        assert_eq!(context, "nearest\nfar away");
    }

    #[test]
    fn test_assemble_context_truncates_at_char_boundary() {
        let candidates = vec![make_candidate("a", "grüner Korridor", "{}", 0.0)];
        let ranked = rank(candidates, None, &RankPolicy::default());
        // Cut lands inside the two-byte 'ü'; truncation backs up to the
        // previous boundary.
        let context = assemble_context(&ranked, 3);
        assert_eq!(context, "gr");
    }
}
