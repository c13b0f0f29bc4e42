//! Mock metadata search for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::external_catalog::{ExternalCatalogError, MetadataSearch, MovieCandidate};

/// Mock implementation of the MetadataSearch trait.
///
/// Results are keyed by lowercased query. A year hint filters results to
/// that year, like the real search does.
#[derive(Debug, Default)]
pub struct MockMetadataSearch {
    results: Arc<RwLock<HashMap<String, Vec<MovieCandidate>>>>,
    queries: Arc<RwLock<Vec<(String, Option<i32>)>>>,
    /// If set, the next search will fail with this message.
    next_error: Arc<RwLock<Option<String>>>,
}

impl MockMetadataSearch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results returned for `query`, in search order.
    pub async fn add_results(&self, query: &str, results: Vec<MovieCandidate>) {
        self.results
            .write()
            .await
            .insert(query.to_lowercase(), results);
    }

    /// Configure the next search to fail.
    pub async fn set_next_error(&self, message: &str) {
        *self.next_error.write().await = Some(message.to_string());
    }

    /// Every (query, year hint) searched, in order.
    pub async fn queries(&self) -> Vec<(String, Option<i32>)> {
        self.queries.read().await.clone()
    }
}

#[async_trait]
impl MetadataSearch for MockMetadataSearch {
    async fn search(
        &self,
        query: &str,
        year_hint: Option<i32>,
    ) -> Result<Vec<MovieCandidate>, ExternalCatalogError> {
        self.queries
            .write()
            .await
            .push((query.to_string(), year_hint));

        if let Some(message) = self.next_error.write().await.take() {
            return Err(ExternalCatalogError::ApiError {
                status: 500,
                message,
            });
        }

        let results = self
            .results
            .read()
            .await
            .get(&query.to_lowercase())
            .cloned()
            .unwrap_or_default();

        Ok(match year_hint {
            Some(year) => results
                .into_iter()
                .filter(|c| c.year == Some(year))
                .collect(),
            None => results,
        })
    }
}
