//! Operator decisions on jobs.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::job::{
    ContentMode, Identification, Job, JobError, JobStatus, JobStore, JobUpdate, ModeSettings,
};

/// Errors from operator actions.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Review-queue and housekeeping actions, applied through the job store.
#[derive(Clone)]
pub struct ReviewActions {
    store: Arc<dyn JobStore>,
    settings: Arc<dyn ModeSettings>,
}

impl ReviewActions {
    pub fn new(store: Arc<dyn JobStore>, settings: Arc<dyn ModeSettings>) -> Self {
        Self { store, settings }
    }

    fn load(&self, job_id: i64) -> Result<Job, JobError> {
        self.store.get(job_id)?.ok_or(JobError::NotFound(job_id))
    }

    fn require(&self, job_id: i64, allowed: &[JobStatus], operation: &str) -> Result<Job, JobError> {
        let job = self.load(job_id)?;
        if !allowed.contains(&job.status) {
            return Err(JobError::InvalidState {
                job_id,
                current_state: job.status,
                operation: operation.to_string(),
            });
        }
        Ok(job)
    }

    /// Accept the identification of a job in review.
    pub fn approve(&self, job_id: i64, mode: Option<ContentMode>) -> Result<Job, ReviewError> {
        let job = self.require(job_id, &[JobStatus::Review], "approve")?;
        if job.title().is_none() {
            return Err(ReviewError::InvalidInput(format!(
                "Job {} has no identified title to approve",
                job_id
            )));
        }

        if let Some(mode) = mode.filter(|m| *m != job.content_mode) {
            self.store.update_content_mode(job_id, mode)?;
        }
        let job = self
            .store
            .update_status(job_id, JobStatus::Moving, JobUpdate::new())?;
        info!("Job {} approved as {:?}", job_id, job.identified_title);
        Ok(job)
    }

    /// Name a job in review by hand and send it to the library.
    pub fn identify(
        &self,
        job_id: i64,
        title: &str,
        year: Option<i32>,
        external_id: Option<i64>,
    ) -> Result<Job, ReviewError> {
        let title = clean_title(title)?;
        self.require(job_id, &[JobStatus::Review], "identify")?;

        self.store
            .update_identification(job_id, Identification::manual(title, year, external_id))?;
        let job = self
            .store
            .update_status(job_id, JobStatus::Moving, JobUpdate::new())?;
        info!("Job {} identified by operator as {}", job_id, title);
        Ok(job)
    }

    /// Name a job before it reaches identification so the search is skipped.
    pub fn pre_identify(
        &self,
        job_id: i64,
        title: &str,
        year: Option<i32>,
        external_id: Option<i64>,
    ) -> Result<Job, ReviewError> {
        let title = clean_title(title)?;
        self.require(
            job_id,
            &[
                JobStatus::Pending,
                JobStatus::Ripping,
                JobStatus::Ripped,
                JobStatus::Encoding,
                JobStatus::Encoded,
                JobStatus::Identifying,
            ],
            "pre-identify",
        )?;

        let job = self
            .store
            .update_identification(job_id, Identification::manual(title, year, external_id))?;
        info!("Job {} pre-identified as {}", job_id, title);
        Ok(job)
    }

    /// Reject a job in review.
    pub fn skip(&self, job_id: i64) -> Result<Job, ReviewError> {
        self.require(job_id, &[JobStatus::Review], "skip")?;
        let job = self.store.update_status(
            job_id,
            JobStatus::Failed,
            JobUpdate::new().with_error("Skipped by user"),
        )?;
        info!("Job {} skipped by operator", job_id);
        Ok(job)
    }

    /// Hide a finished job from active views.
    pub fn archive(&self, job_id: i64) -> Result<Job, ReviewError> {
        self.require(job_id, &[JobStatus::Complete, JobStatus::Failed], "archive")?;
        Ok(self
            .store
            .update_status(job_id, JobStatus::Archived, JobUpdate::new())?)
    }

    pub fn get_mode(&self) -> Result<ContentMode, ReviewError> {
        Ok(self.settings.current_mode()?)
    }

    /// Mode applied to jobs created from now on.
    pub fn set_mode(&self, mode: ContentMode) -> Result<(), ReviewError> {
        self.settings.set_mode(mode)?;
        info!("Content mode set to {}", mode);
        Ok(())
    }
}

fn clean_title(title: &str) -> Result<&str, ReviewError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ReviewError::InvalidInput("title cannot be empty".to_string()));
    }
    Ok(title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{CreateJobRequest, SqliteJobStore};
    use crate::testing::fixtures;

    fn setup() -> (ReviewActions, Arc<SqliteJobStore>) {
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        (ReviewActions::new(store.clone(), store.clone()), store)
    }

    fn job(store: &SqliteJobStore, status: JobStatus) -> Job {
        fixtures::job_in_status(
            store,
            CreateJobRequest::new("0", "DISC", ContentMode::Movie),
            status,
            JobUpdate::new(),
        )
    }

    #[test]
    fn test_approve_requires_title() {
        let (actions, store) = setup();
        let job = job(&store, JobStatus::Review);

        assert!(matches!(
            actions.approve(job.id, None),
            Err(ReviewError::InvalidInput(_))
        ));

        store
            .update_identification(job.id, Identification::manual("Heat", Some(1995), None))
            .unwrap();
        let approved = actions.approve(job.id, Some(ContentMode::Other)).unwrap();
        assert_eq!(approved.status, JobStatus::Moving);
        assert_eq!(approved.content_mode, ContentMode::Other);
    }

    #[test]
    fn test_identify_from_review() {
        let (actions, store) = setup();
        let job = job(&store, JobStatus::Review);

        let job = actions
            .identify(job.id, "  The Thing ", Some(1982), Some(1091))
            .unwrap();
        assert_eq!(job.status, JobStatus::Moving);
        assert_eq!(job.identified_title.as_deref(), Some("The Thing"));
        assert_eq!(job.confidence, Some(1.0));
        assert_eq!(job.external_id, Some(1091));
    }

    #[test]
    fn test_identify_rejects_blank_title_and_wrong_state() {
        let (actions, store) = setup();
        let pending = job(&store, JobStatus::Pending);

        assert!(matches!(
            actions.identify(pending.id, "   ", None, None),
            Err(ReviewError::InvalidInput(_))
        ));
        assert!(matches!(
            actions.identify(pending.id, "Heat", None, None),
            Err(ReviewError::Job(JobError::InvalidState { .. }))
        ));
        assert!(matches!(
            actions.identify(999, "Heat", None, None),
            Err(ReviewError::Job(JobError::NotFound(999)))
        ));
    }

    #[test]
    fn test_pre_identify_keeps_status() {
        let (actions, store) = setup();
        let ripping = job(&store, JobStatus::Ripping);

        let updated = actions.pre_identify(ripping.id, "Alien", Some(1979), None).unwrap();
        assert_eq!(updated.status, JobStatus::Ripping);
        assert_eq!(updated.identified_title.as_deref(), Some("Alien"));

        let review = job(&store, JobStatus::Review);
        assert!(actions.pre_identify(review.id, "Alien", None, None).is_err());
        let complete = job(&store, JobStatus::Complete);
        assert!(actions.pre_identify(complete.id, "Alien", None, None).is_err());
    }

    #[test]
    fn test_skip_and_archive() {
        let (actions, store) = setup();
        let review = job(&store, JobStatus::Review);

        let skipped = actions.skip(review.id).unwrap();
        assert_eq!(skipped.status, JobStatus::Failed);
        assert_eq!(skipped.error_message.as_deref(), Some("Skipped by user"));

        let archived = actions.archive(review.id).unwrap();
        assert_eq!(archived.status, JobStatus::Archived);
        assert!(actions.archive(review.id).is_err());

        let pending = job(&store, JobStatus::Pending);
        assert!(actions.skip(pending.id).is_err());
        assert!(actions.archive(pending.id).is_err());
    }

    #[test]
    fn test_mode_round_trip() {
        let (actions, _store) = setup();
        assert_eq!(actions.get_mode().unwrap(), ContentMode::Movie);
        actions.set_mode(ContentMode::Tv).unwrap();
        assert_eq!(actions.get_mode().unwrap(), ContentMode::Tv);
    }
}
