//! Relevance scoring primitives.
//!
//! Two equivalent strategies are supported, because candidates can carry
//! either a precomputed distance from the vector index or a raw stored
//! embedding:
//!
//! - [`distance_to_score`] — maps a non-negative distance into `(0, 1]`.
//! - [`cosine_similarity`] — compares two embedding vectors directly.
//!
//! Both are pure functions over primitive numeric sequences with no
//! dependency on any particular index implementation.

/// Convert a distance reported by the vector index into a relevance score.
///
/// `score = 1 / (1 + distance)`. For non-negative distances the score is
/// monotonically decreasing in the distance and bounded in `(0, 1]`, with
/// a distance of 0 (exact match) scoring exactly 1.0.
pub fn distance_to_score(distance: f64) -> f64 {
    1.0 / (1.0 + distance)
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns `0.0` if the vectors differ in length or either has zero norm;
/// a document with a degenerate embedding ranks last rather than erroring.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_scores_one() {
        assert_eq!(distance_to_score(0.0), 1.0);
    }

    #[test]
    fn test_known_distances() {
        assert!((distance_to_score(0.1) - 0.909).abs() < 5e-4);
        assert!((distance_to_score(0.5) - 0.667).abs() < 5e-4);
        assert!((distance_to_score(2.0) - 0.333).abs() < 5e-4);
    }

    #[test]
    fn test_score_monotonically_decreasing_and_bounded() {
        let distances = [0.0, 0.01, 0.5, 1.0, 10.0, 1e6];
        let mut prev = f64::INFINITY;
        for d in distances {
            let s = distance_to_score(d);
            assert!(s > 0.0 && s <= 1.0, "score out of range: {}", s);
            assert!(s < prev || (s - prev).abs() < f64::EPSILON);
            prev = s;
        }
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 2.0, 3.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn test_cosine_length_mismatch() {
        let a = vec![1.0, 2.0];
        let b = vec![1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
