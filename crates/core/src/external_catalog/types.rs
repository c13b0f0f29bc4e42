//! Types for metadata search results.

use serde::{Deserialize, Serialize};

/// A movie returned by metadata search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovieCandidate {
    /// TMDB movie ID.
    pub id: i64,
    /// Movie title.
    pub title: String,
    /// Release year, if the catalog knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Catalog popularity (unbounded, roughly 0-100 for well known titles).
    #[serde(default)]
    pub popularity: f64,
    /// Poster path (relative to the TMDB image base URL).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster_ref: Option<String>,
}

impl MovieCandidate {
    /// Parse the year out of a `YYYY-MM-DD` (or partial) release date.
    pub fn year_from_release_date(release_date: Option<&str>) -> Option<i32> {
        release_date
            .and_then(|d| d.get(0..4))
            .and_then(|y| y.parse().ok())
    }
}
