//! Collection log listing.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use discshelf_core::job::{CollectionItem, CollectionLog};

use super::error::ApiError;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Deserialize)]
pub struct ListCollectionParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListCollectionResponse {
    pub items: Vec<CollectionItem>,
    pub limit: i64,
}

/// Most recently filed items first
pub async fn list_collection(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListCollectionParams>,
) -> Result<Json<ListCollectionResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let items = state.store().list_collection(limit)?;
    Ok(Json(ListCollectionResponse { items, limit }))
}
