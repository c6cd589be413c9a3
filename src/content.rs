//! Structured content parsing.
//!
//! Site documents are stored in the vector index as a single text blob:
//! a free-text description on the first line followed by labeled,
//! comma-separated sections (`Current Issues:`, `Suitable Solutions:`,
//! `Tags:`). This module decodes that blob back into typed fields, and
//! provides the inverse used by the ingest pipeline.
//!
//! Parsing never fails: absent sections yield empty lists, and lines
//! that match no known label are ignored.

/// The typed fields recovered from a document's content blob.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedContent {
    pub description: String,
    pub current_issues: Vec<String>,
    pub suitable_solutions: Vec<String>,
    pub tags: Vec<String>,
}

const ISSUES_LABEL: &str = "Current Issues:";
const SOLUTIONS_LABEL: &str = "Suitable Solutions:";
const TAGS_LABEL: &str = "Tags:";

/// Parse a content blob into its typed fields.
///
/// The first line is the description (empty if the blob is empty). Each
/// subsequent line is checked against the known labels; on a match the
/// remainder is split on commas, trimmed, and empty pieces dropped.
///
/// A repeated label overwrites the earlier occurrence (last write wins).
pub fn parse_content(content: &str) -> ParsedContent {
    let mut lines = content.lines();
    let description = lines.next().unwrap_or_default().to_string();

    let mut parsed = ParsedContent {
        description,
        ..Default::default()
    };

    for line in lines {
        if let Some(rest) = line.strip_prefix(ISSUES_LABEL) {
            parsed.current_issues = split_list(rest);
        } else if let Some(rest) = line.strip_prefix(SOLUTIONS_LABEL) {
            parsed.suitable_solutions = split_list(rest);
        } else if let Some(rest) = line.strip_prefix(TAGS_LABEL) {
            parsed.tags = split_list(rest);
        }
    }

    parsed
}

/// Compose a content blob from typed fields (the ingest-side inverse of
/// [`parse_content`]).
pub fn build_site_content(
    description: &str,
    current_issues: &[String],
    suitable_solutions: &[String],
    tags: &[String],
) -> String {
    format!(
        "{}\n{} {}\n{} {}\n{} {}",
        description,
        ISSUES_LABEL,
        current_issues.join(", "),
        SOLUTIONS_LABEL,
        suitable_solutions.join(", "),
        TAGS_LABEL,
        tags.join(", "),
    )
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_blob() {
        let parsed = parse_content("A\nCurrent Issues: x, y\nTags: z");
        assert_eq!(parsed.description, "A");
        assert_eq!(parsed.current_issues, vec!["x", "y"]);
        assert!(parsed.suitable_solutions.is_empty());
        assert_eq!(parsed.tags, vec!["z"]);
    }

    #[test]
    fn test_parse_empty() {
        let parsed = parse_content("");
        assert_eq!(parsed.description, "");
        assert!(parsed.current_issues.is_empty());
        assert!(parsed.suitable_solutions.is_empty());
        assert!(parsed.tags.is_empty());
    }

    #[test]
    fn test_parse_trims_and_drops_empty_pieces() {
        let parsed = parse_content("Desc\nSuitable Solutions:  rain garden ,, bioswale , ");
        assert_eq!(parsed.suitable_solutions, vec!["rain garden", "bioswale"]);
    }

    #[test]
    fn test_parse_ignores_unknown_lines() {
        let parsed = parse_content("Desc\nnot a label\nTags: a");
        assert_eq!(parsed.tags, vec!["a"]);
        assert!(parsed.current_issues.is_empty());
    }

    #[test]
    fn test_parse_repeated_label_last_wins() {
        let parsed = parse_content("Desc\nTags: a, b\nTags: c");
        assert_eq!(parsed.tags, vec!["c"]);
    }

    #[test]
    fn test_build_then_parse_roundtrip() {
        let issues = vec!["flooding".to_string(), "erosion".to_string()];
        let solutions = vec!["swale".to_string()];
        let tags = vec!["water".to_string()];
        let blob = build_site_content("Low-lying park", &issues, &solutions, &tags);
        let parsed = parse_content(&blob);
        assert_eq!(parsed.description, "Low-lying park");
        assert_eq!(parsed.current_issues, issues);
        assert_eq!(parsed.suitable_solutions, solutions);
        assert_eq!(parsed.tags, tags);
    }
}
