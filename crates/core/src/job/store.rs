//! Job storage traits and types.

use std::collections::HashMap;

use thiserror::Error;

use super::{
    CollectionItem, ContentMode, Identification, Job, JobStatus, JobUpdate, NewCollectionItem,
};

/// Error type for job store operations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(i64),

    /// The job's current status does not allow the operation.
    #[error("Cannot {operation} job {job_id}: current state is {current_state}")]
    InvalidState {
        job_id: i64,
        current_state: JobStatus,
        operation: String,
    },

    #[error("Database error: {0}")]
    Database(String),
}

/// Request to create a new job.
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    pub drive_id: String,
    pub disc_label: String,
    pub content_mode: ContentMode,
}

impl CreateJobRequest {
    pub fn new(
        drive_id: impl Into<String>,
        disc_label: impl Into<String>,
        content_mode: ContentMode,
    ) -> Self {
        Self {
            drive_id: drive_id.into(),
            disc_label: disc_label.into(),
            content_mode,
        }
    }
}

/// Filter for listing jobs.
#[derive(Debug, Clone)]
pub struct JobFilter {
    /// Filter by status.
    pub status: Option<JobStatus>,
    /// Filter by drive.
    pub drive_id: Option<String>,
    /// Include archived jobs when no status filter is given.
    pub include_archived: bool,
    /// Maximum number of results.
    pub limit: i64,
}

impl Default for JobFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl JobFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            status: None,
            drive_id: None,
            include_archived: false,
            limit: 100,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_drive(mut self, drive_id: impl Into<String>) -> Self {
        self.drive_id = Some(drive_id.into());
        self
    }

    pub fn with_archived(mut self) -> Self {
        self.include_archived = true;
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }
}

/// Trait for job storage backends.
///
/// The store is the single source of truth for job status. Every mutation
/// touches `updated_at`.
pub trait JobStore: Send + Sync {
    /// Create a new job in `Pending`.
    fn create(&self, request: CreateJobRequest) -> Result<Job, JobError>;

    /// Get a job by ID.
    fn get(&self, id: i64) -> Result<Option<Job>, JobError>;

    /// List jobs matching the filter, newest first.
    fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, JobError>;

    /// All jobs in the given status, oldest first.
    fn list_by_status(&self, status: JobStatus) -> Result<Vec<Job>, JobError>;

    /// Every job that is not `Complete`, `Failed` or `Archived`, oldest first.
    fn list_active(&self) -> Result<Vec<Job>, JobError>;

    /// Oldest job on the drive that is `Pending` or `Ripping`.
    fn active_job_for_drive(&self, drive_id: &str) -> Result<Option<Job>, JobError>;

    /// Atomically move a job from `expected` to `next`.
    ///
    /// Returns `false` without touching the row when the job is no longer in
    /// `expected`.
    fn claim(&self, id: i64, expected: JobStatus, next: JobStatus) -> Result<bool, JobError>;

    /// Set a job's status along with any fields in `update`.
    ///
    /// Rejects edges that are not part of the state machine. Leaving
    /// `Moving` resets the move retry counter.
    fn update_status(&self, id: i64, status: JobStatus, update: JobUpdate)
        -> Result<Job, JobError>;

    /// Overwrite the identification fields without changing status.
    fn update_identification(&self, id: i64, identification: Identification)
        -> Result<Job, JobError>;

    /// Change the content mode of a job.
    fn update_content_mode(&self, id: i64, mode: ContentMode) -> Result<Job, JobError>;

    /// Bump the move retry counter of a `Moving` job and return the new value.
    fn increment_move_retry(&self, id: i64) -> Result<u32, JobError>;

    /// Number of jobs per status. Statuses with no jobs are absent.
    fn count_by_status(&self) -> Result<HashMap<JobStatus, usize>, JobError>;
}

/// Append-only record of items that made it into the library.
pub trait CollectionLog: Send + Sync {
    fn record(&self, item: NewCollectionItem) -> Result<CollectionItem, JobError>;

    /// Most recent entries first.
    fn list_collection(&self, limit: i64) -> Result<Vec<CollectionItem>, JobError>;
}

/// Accessor for the operator-selected content mode.
pub trait ModeSettings: Send + Sync {
    /// Current mode, `Movie` when never set.
    fn current_mode(&self) -> Result<ContentMode, JobError>;

    fn set_mode(&self, mode: ContentMode) -> Result<(), JobError>;
}
