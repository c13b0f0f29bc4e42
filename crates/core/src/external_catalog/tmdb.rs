//! TMDB (The Movie Database) API client.
//!
//! Authenticates with a v4 read access token sent as a Bearer header.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ExternalCatalogError, MetadataSearch, MovieCandidate};
use crate::metrics;

/// Maximum number of search results kept per query.
const MAX_RESULTS: usize = 10;

/// Connection settings for [`TmdbClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    /// v4 read access token.
    pub api_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

pub struct TmdbClient {
    client: Client,
    base_url: String,
    api_token: String,
}

impl TmdbClient {
    /// Fails when the token is empty.
    pub fn new(config: TmdbConfig) -> Result<Self, ExternalCatalogError> {
        if config.api_token.is_empty() {
            return Err(ExternalCatalogError::NotConfigured(
                "TMDB API token is required".to_string(),
            ));
        }

        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        let base_url = config
            .base_url
            .unwrap_or_else(|| "https://api.themoviedb.org/3".to_string());

        Ok(Self {
            client,
            base_url,
            api_token: config.api_token,
        })
    }

    /// `/search/movie`, first page, capped at ten results.
    pub async fn search_movies(
        &self,
        query: &str,
        year: Option<i32>,
    ) -> Result<Vec<MovieCandidate>, ExternalCatalogError> {
        debug!("TMDB movie search: query='{}', year={:?}", query, year);

        let year = year.map(|y| y.to_string());
        let mut params = vec![("query", query), ("include_adult", "false")];
        if let Some(year) = year.as_deref() {
            params.push(("year", year));
        }

        let response = self
            .client
            .get(format!("{}/search/movie", self.base_url))
            .bearer_auth(&self.api_token)
            .query(&params)
            .send()
            .await?;
        let response = check_status(response).await?;

        let page: TmdbSearchResponse = response.json().await.map_err(|e| {
            ExternalCatalogError::ParseError(format!("Unexpected movie search payload: {}", e))
        })?;
        Ok(page.into_candidates())
    }
}

async fn check_status(response: Response) -> Result<Response, ExternalCatalogError> {
    match response.status() {
        s if s.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED => Err(ExternalCatalogError::NotConfigured(
            "TMDB rejected the API token".to_string(),
        )),
        StatusCode::TOO_MANY_REQUESTS => Err(ExternalCatalogError::RateLimitExceeded),
        s => Err(ExternalCatalogError::ApiError {
            status: s.as_u16(),
            message: response.text().await.unwrap_or_default(),
        }),
    }
}

#[async_trait]
impl MetadataSearch for TmdbClient {
    async fn search(
        &self,
        query: &str,
        year_hint: Option<i32>,
    ) -> Result<Vec<MovieCandidate>, ExternalCatalogError> {
        let started = Instant::now();
        let result = self.search_movies(query, year_hint).await;

        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["tmdb", "search_movie", outcome])
            .inc();
        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["tmdb", "search_movie"])
            .observe(started.elapsed().as_secs_f64());

        result
    }
}

#[derive(Debug, Deserialize)]
struct TmdbSearchResponse {
    #[serde(default)]
    results: Vec<TmdbMovieResult>,
}

impl TmdbSearchResponse {
    fn into_candidates(self) -> Vec<MovieCandidate> {
        self.results
            .into_iter()
            .take(MAX_RESULTS)
            .map(MovieCandidate::from)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct TmdbMovieResult {
    id: i64,
    title: String,
    release_date: Option<String>,
    poster_path: Option<String>,
    #[serde(default)]
    popularity: f64,
}

impl From<TmdbMovieResult> for MovieCandidate {
    fn from(r: TmdbMovieResult) -> Self {
        Self {
            id: r.id,
            year: MovieCandidate::year_from_release_date(r.release_date.as_deref()),
            title: r.title,
            popularity: r.popularity,
            poster_ref: r.poster_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_token() {
        let result = TmdbClient::new(TmdbConfig {
            api_token: String::new(),
            base_url: None,
        });
        assert!(matches!(result, Err(ExternalCatalogError::NotConfigured(_))));
    }

    #[test]
    fn test_movie_result_conversion() {
        let result = TmdbMovieResult {
            id: 603,
            title: "The Matrix".to_string(),
            release_date: Some("1999-03-30".to_string()),
            poster_path: Some("/poster.jpg".to_string()),
            popularity: 85.3,
        };

        let candidate: MovieCandidate = result.into();
        assert_eq!(candidate.id, 603);
        assert_eq!(candidate.title, "The Matrix");
        assert_eq!(candidate.year, Some(1999));
        assert_eq!(candidate.poster_ref.as_deref(), Some("/poster.jpg"));
    }

    #[test]
    fn test_search_response_keeps_ten_results() {
        let results: Vec<String> = (0..15)
            .map(|i| format!(r#"{{"id": {}, "title": "Movie {}", "popularity": 1.0}}"#, i, i))
            .collect();
        let json = format!(r#"{{"page": 1, "results": [{}]}}"#, results.join(","));

        let response: TmdbSearchResponse = serde_json::from_str(&json).unwrap();
        let candidates = response.into_candidates();
        assert_eq!(candidates.len(), 10);
        assert_eq!(candidates[0].title, "Movie 0");
        assert!(candidates[0].year.is_none());
    }
}
