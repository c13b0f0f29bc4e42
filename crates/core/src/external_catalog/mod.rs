//! Metadata search backends.
//!
//! The Identify Stage only depends on [`MetadataSearch`]; [`TmdbClient`] is
//! the production implementation.

mod tmdb;
mod types;

pub use tmdb::{TmdbClient, TmdbConfig};
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when interacting with external catalogs.
#[derive(Debug, Error)]
pub enum ExternalCatalogError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded, please wait before retrying")]
    RateLimitExceeded,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// Failed to parse response.
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Client not configured (missing API token, etc.).
    #[error("Client not configured: {0}")]
    NotConfigured(String),
}

/// Movie lookup by free-text title.
#[async_trait]
pub trait MetadataSearch: Send + Sync {
    /// Search for movies matching `query`, best catalog match first.
    async fn search(
        &self,
        query: &str,
        year_hint: Option<i32>,
    ) -> Result<Vec<MovieCandidate>, ExternalCatalogError>;
}
