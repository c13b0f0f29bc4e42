//! Disc label cleanup and candidate scoring.
//!
//! Everything here is pure; the identify stage feeds it search results.

mod label;
mod scoring;

pub use label::{clean_disc_label, prettify_label, split_year, SearchQuery};
pub use scoring::{
    calculate_confidence, popularity_score, rank_candidates, title_similarity, ScoredCandidate,
    MAX_ALTERNATIVES,
};
