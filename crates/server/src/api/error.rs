//! Error responses shared by the API handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use discshelf_core::{JobError, ReviewError};

/// Error body returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// A failed request: status code plus message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        let status = match &err {
            JobError::NotFound(_) => StatusCode::NOT_FOUND,
            JobError::InvalidState { .. } => StatusCode::CONFLICT,
            JobError::Database(msg) => {
                error!("Database error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::Job(e) => e.into(),
            ReviewError::InvalidInput(msg) => Self::bad_request(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discshelf_core::JobStatus;

    #[test]
    fn test_job_errors_map_to_status_codes() {
        assert_eq!(
            ApiError::from(JobError::NotFound(7)).status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(JobError::InvalidState {
                job_id: 7,
                current_state: JobStatus::Ripping,
                operation: "approve".to_string(),
            })
            .status,
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(JobError::Database("locked".to_string())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_review_errors_map_to_status_codes() {
        let err = ApiError::from(ReviewError::InvalidInput("Title is required".to_string()));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Title is required");

        let err = ApiError::from(ReviewError::Job(JobError::NotFound(3)));
        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Job not found: 3");
    }
}
