use std::collections::HashSet;

use crate::external_catalog::MovieCandidate;

/// Runner-up candidates kept for the review screen.
pub const MAX_ALTERNATIVES: usize = 4;

const TITLE_WEIGHT: f64 = 0.60;
const POPULARITY_WEIGHT: f64 = 0.25;
const TOP_RANK_BONUS: f64 = 0.15;

/// Popularity at which the popularity score saturates.
const POPULARITY_CEILING: f64 = 100.0;

fn normalize(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Similarity of two titles in `[0, 1]`.
///
/// Exact matches (after normalization) score 1.0, a title contained in the
/// other scores the length ratio, anything else the word-set Jaccard index.
pub fn title_similarity(query: &str, title: &str) -> f64 {
    match (query.is_empty(), title.is_empty()) {
        (true, true) => return 1.0,
        (true, false) | (false, true) => return 0.0,
        _ => {}
    }

    let q = normalize(query);
    let t = normalize(title);

    if q == t {
        return 1.0;
    }

    if q.contains(&t) || t.contains(&q) {
        let (q_len, t_len) = (q.chars().count(), t.chars().count());
        let longer = q_len.max(t_len);
        return if longer == 0 {
            0.0
        } else {
            q_len.min(t_len) as f64 / longer as f64
        };
    }

    let q_words: HashSet<&str> = q.split_whitespace().collect();
    let t_words: HashSet<&str> = t.split_whitespace().collect();
    if q_words.is_empty() || t_words.is_empty() {
        return 0.0;
    }

    let overlap = q_words.intersection(&t_words).count();
    let total = q_words.union(&t_words).count();
    overlap as f64 / total as f64
}

/// Popularity mapped linearly onto `[0, 1]`.
pub fn popularity_score(popularity: f64) -> f64 {
    if popularity <= 0.0 || popularity.is_nan() {
        return 0.0;
    }
    (popularity / POPULARITY_CEILING).min(1.0)
}

/// Confidence that `title` is what `query` refers to.
pub fn calculate_confidence(query: &str, title: &str, popularity: f64, is_top_result: bool) -> f64 {
    let bonus = if is_top_result { TOP_RANK_BONUS } else { 0.0 };
    let confidence = title_similarity(query, title) * TITLE_WEIGHT
        + popularity_score(popularity) * POPULARITY_WEIGHT
        + bonus;
    confidence.clamp(0.0, 1.0)
}

/// A search result with its confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub confidence: f64,
    pub candidate: MovieCandidate,
}

/// Score candidates in search order and sort them best first.
///
/// The search backend's first result gets the rank bonus. Equal scores keep
/// search order.
pub fn rank_candidates(query: &str, candidates: Vec<MovieCandidate>) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| ScoredCandidate {
            confidence: calculate_confidence(query, &candidate.title, candidate.popularity, i == 0),
            candidate,
        })
        .collect();

    scored.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    scored
}
