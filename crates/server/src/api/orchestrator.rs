//! Orchestrator and oversight API handlers.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use discshelf_core::stages::OrchestratorStatus;

use super::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

/// Result of a consistency check
#[derive(Debug, Serialize)]
pub struct OversightCheckResponse {
    pub healthy: bool,
    pub issues: Vec<String>,
}

/// Result of repairing duplicate encodes
#[derive(Debug, Serialize)]
pub struct FixEncodingResponse {
    pub reset: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get orchestrator status
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<OrchestratorStatus> {
    Json(state.orchestrator().status())
}

/// Run the consistency check on demand
pub async fn check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<OversightCheckResponse>, ApiError> {
    let issues = state.oversight().check_consistency()?;
    Ok(Json(OversightCheckResponse {
        healthy: issues.is_empty(),
        issues,
    }))
}

/// Keep the newest encoding job and requeue the rest
pub async fn fix_encoding(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FixEncodingResponse>, ApiError> {
    let reset = state.oversight().fix_stuck_encoding()?;
    if reset > 0 {
        info!("Requeued {} duplicate encoding job(s)", reset);
    }
    Ok(Json(FixEncodingResponse { reset }))
}
