//! Job API handlers: listing, review decisions and the operator mode.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use discshelf_core::{
    job::{ContentMode, Job, JobFilter, JobStatus, JobStore},
    JobError,
};

use super::error::ApiError;
use crate::state::AppState;

/// Maximum allowed limit for job queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for job queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing jobs
#[derive(Debug, Deserialize)]
pub struct ListJobsParams {
    /// Filter by status
    pub status: Option<String>,
    /// Filter by drive
    pub drive: Option<String>,
    /// Include archived jobs when no status is given
    #[serde(default)]
    pub include_archived: bool,
    /// Maximum number of jobs to return
    pub limit: Option<i64>,
}

/// Response for listing jobs
#[derive(Debug, Serialize)]
pub struct ListJobsResponse {
    pub jobs: Vec<Job>,
    pub limit: i64,
}

/// Request body for approving a job in review
#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    /// Optional content mode correction
    pub mode: Option<ContentMode>,
}

/// Request body for naming a job by hand
#[derive(Debug, Deserialize)]
pub struct IdentifyBody {
    pub title: String,
    pub year: Option<i32>,
    /// TMDB id, when known
    pub external_id: Option<i64>,
}

/// Current operator mode
#[derive(Debug, Serialize, Deserialize)]
pub struct ModeBody {
    pub mode: ContentMode,
}

// ============================================================================
// Handlers
// ============================================================================

/// List jobs, newest first
pub async fn list_jobs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListJobsParams>,
) -> Result<Json<ListJobsResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let mut filter = JobFilter::new().with_limit(limit);
    if let Some(status) = params.status.as_deref() {
        let status = status.parse::<JobStatus>().map_err(ApiError::bad_request)?;
        filter = filter.with_status(status);
    }
    if let Some(drive) = params.drive {
        filter = filter.with_drive(drive);
    }
    if params.include_archived {
        filter = filter.with_archived();
    }

    let jobs = state.store().list(&filter)?;
    Ok(Json(ListJobsResponse { jobs, limit }))
}

/// Get a single job
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, ApiError> {
    let job = state.store().get(id)?.ok_or(JobError::NotFound(id))?;
    Ok(Json(job))
}

/// Accept the automatic identification of a job in review
pub async fn approve_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    body: Option<Json<ApproveBody>>,
) -> Result<Json<Job>, ApiError> {
    let Json(body) = body.unwrap_or_default();
    let job = state.review().approve(id, body.mode)?;
    Ok(Json(job))
}

/// Name a job in review by hand
pub async fn identify_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<IdentifyBody>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .review()
        .identify(id, &body.title, body.year, body.external_id)?;
    Ok(Json(job))
}

/// Name a job before it reaches identification
pub async fn pre_identify_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<IdentifyBody>,
) -> Result<Json<Job>, ApiError> {
    let job = state
        .review()
        .pre_identify(id, &body.title, body.year, body.external_id)?;
    Ok(Json(job))
}

/// Reject a job in review
pub async fn skip_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.review().skip(id)?))
}

/// Hide a finished job from the default listing
pub async fn archive_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.review().archive(id)?))
}

/// Get the mode applied to newly inserted discs
pub async fn get_mode(State(state): State<Arc<AppState>>) -> Result<Json<ModeBody>, ApiError> {
    let mode = state.review().get_mode()?;
    Ok(Json(ModeBody { mode }))
}

/// Change the mode applied to newly inserted discs
pub async fn set_mode(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ModeBody>,
) -> Result<Json<ModeBody>, ApiError> {
    state.review().set_mode(body.mode)?;
    Ok(Json(body))
}
