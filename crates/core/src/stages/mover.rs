//! Move stage: file encodes into the library.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use tracing::{error, info, warn};

use super::{fail_job, OrchestratorError};
use crate::config::LibraryConfig;
use crate::job::{CollectionLog, Job, JobStatus, JobStore, JobUpdate, NewCollectionItem};
use crate::metrics;
use crate::notify::{EventHandle, PipelineEvent};
use crate::placer::{place_in_library, PlacedFile, Placer};

/// Result of one placement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Complete,
    /// Library root missing; attempt number and limit.
    Retrying { attempt: u32, max: u32 },
    Failed,
}

/// Places every `Moving` job and retries while its library root is missing.
pub struct MoveStage {
    store: Arc<dyn JobStore>,
    collection: Arc<dyn CollectionLog>,
    placer: Arc<dyn Placer>,
    events: Option<EventHandle>,
    library: LibraryConfig,
    max_retries: u32,
    retry_interval: Duration,
}

impl MoveStage {
    pub fn new(
        store: Arc<dyn JobStore>,
        collection: Arc<dyn CollectionLog>,
        placer: Arc<dyn Placer>,
        events: Option<EventHandle>,
        library: LibraryConfig,
        max_retries: u32,
        retry_interval: Duration,
    ) -> Self {
        Self {
            store,
            collection,
            placer,
            events,
            library,
            max_retries,
            retry_interval,
        }
    }

    /// Attempt every `Moving` job once, except jobs that retried less than
    /// `retry_interval` ago.
    pub async fn tick(&self) -> Vec<(i64, MoveOutcome)> {
        let jobs = match self.store.list_by_status(JobStatus::Moving) {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Failed to list moving jobs: {}", e);
                return Vec::new();
            }
        };

        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            if !self.due(&job) {
                continue;
            }
            let outcome = self.process(&job).await;
            outcomes.push((job.id, outcome));
        }
        outcomes
    }

    fn due(&self, job: &Job) -> bool {
        if job.move_retry_count == 0 || self.retry_interval.is_zero() {
            return true;
        }
        let since = Utc::now()
            .signed_duration_since(job.updated_at)
            .to_std()
            .unwrap_or_default();
        since >= self.retry_interval
    }

    async fn process(&self, job: &Job) -> MoveOutcome {
        let (source, title) = match required_fields(job) {
            Ok(fields) => fields,
            Err(e) => return self.fail(job, e.to_string()),
        };

        let root = self.library.root_for(job.content_mode);
        match place_in_library(
            self.placer.as_ref(),
            &source,
            root,
            title,
            job.identified_year,
        )
        .await
        {
            Ok(placed) => self.complete(job, title, placed).await,
            Err(e) if e.is_retryable() => self.retry(job, &e.to_string()),
            Err(e) => self.fail(job, e.to_string()),
        }
    }

    fn retry(&self, job: &Job, reason: &str) -> MoveOutcome {
        let attempt = match self.store.increment_move_retry(job.id) {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to record move retry for job {}: {}", job.id, e);
                return MoveOutcome::Failed;
            }
        };
        metrics::MOVE_RETRIES.inc();

        if attempt > self.max_retries {
            error!(
                "Job {}: max retries ({}) exceeded for missing library directory",
                job.id, self.max_retries
            );
            return self.fail(job, format!("Max retries exceeded: {}", reason));
        }

        warn!(
            "Job {}: {}, retry {}/{}",
            job.id, reason, attempt, self.max_retries
        );
        let message = format!(
            "Destination not found, retry {}/{}: {}",
            attempt, self.max_retries, reason
        );
        if let Err(e) = self.store.update_status(
            job.id,
            JobStatus::Moving,
            JobUpdate::new().with_error(message),
        ) {
            warn!("Failed to record retry message for job {}: {}", job.id, e);
        }
        metrics::record_stage("move", "retry");
        MoveOutcome::Retrying {
            attempt,
            max: self.max_retries,
        }
    }

    fn fail(&self, job: &Job, message: impl Into<String>) -> MoveOutcome {
        fail_job(
            self.store.as_ref(),
            self.events.as_ref(),
            job,
            "move",
            message,
        );
        MoveOutcome::Failed
    }

    async fn complete(&self, job: &Job, title: &str, placed: PlacedFile) -> MoveOutcome {
        if let Err(e) = self.store.update_status(
            job.id,
            JobStatus::Complete,
            JobUpdate::new().with_final_path(&placed.destination),
        ) {
            return self.fail(job, e.to_string());
        }
        metrics::record_stage("move", "success");
        info!(
            "Job {} completed: {} -> {}",
            job.id,
            title,
            placed.destination.display()
        );

        if let Err(e) = self.collection.record(NewCollectionItem {
            title: title.to_string(),
            year: job.identified_year,
            content_mode: job.content_mode,
            external_id: job.external_id,
            file_path: placed.destination.clone(),
        }) {
            error!("Failed to add job {} to collection log: {}", job.id, e);
        }

        if let Some(events) = &self.events {
            events
                .emit(PipelineEvent::JobCompleted {
                    job_id: job.id,
                    disc_label: job.disc_label.clone(),
                    title: Some(title.to_string()),
                    year: job.identified_year,
                    final_path: placed.destination.clone(),
                })
                .await;
        }

        if let Some(encode_path) = &job.encode_path {
            remove_parent_dir(encode_path, "encode").await;
        }
        if let Some(rip_path) = &job.rip_path {
            remove_parent_dir(rip_path, "rip").await;
        }

        MoveOutcome::Complete
    }
}

/// The encoded file and title a placement needs.
fn required_fields(job: &Job) -> Result<(PathBuf, &str), OrchestratorError> {
    let source = match &job.encode_path {
        Some(path) if path.is_file() => path.clone(),
        other => {
            let shown = other
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string());
            return Err(OrchestratorError::MissingData(format!(
                "Encoded file not found: {}",
                shown
            )));
        }
    };
    let title = job.title().ok_or_else(|| {
        OrchestratorError::MissingData("Job missing identified_title".to_string())
    })?;
    Ok((source, title))
}

async fn remove_parent_dir(path: &Path, kind: &str) {
    let Some(dir) = path.parent() else {
        return;
    };
    if !dir.is_dir() {
        return;
    }
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => info!("Cleaned up {} directory: {}", kind, dir.display()),
        Err(e) => error!(
            "Failed to clean up {} directory {}: {}",
            kind,
            dir.display(),
            e
        ),
    }
}
