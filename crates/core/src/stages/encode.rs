//! Encode stage: one encode system-wide, oldest rip first.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{fail_job, OrchestratorError};
use crate::config::WorkspaceConfig;
use crate::encoder::{EncodeProgress, Encoder};
use crate::job::{Job, JobStatus, JobStore, JobUpdate};
use crate::metrics;
use crate::notify::EventHandle;

/// Takes the oldest `Ripped` job and encodes it.
///
/// Not re-entrant: the next encode starts only after `tick` returns.
pub struct EncodeStage {
    store: Arc<dyn JobStore>,
    encoder: Arc<dyn Encoder>,
    events: Option<EventHandle>,
    workspace: WorkspaceConfig,
}

impl EncodeStage {
    pub fn new(
        store: Arc<dyn JobStore>,
        encoder: Arc<dyn Encoder>,
        events: Option<EventHandle>,
        workspace: WorkspaceConfig,
    ) -> Self {
        Self {
            store,
            encoder,
            events,
            workspace,
        }
    }

    /// Process the head of the `Ripped` queue. Returns the job id worked on.
    pub async fn tick(&self) -> Option<i64> {
        match self.store.list_by_status(JobStatus::Encoding) {
            Ok(encoding) if !encoding.is_empty() => {
                debug!("Job {} is already encoding, waiting", encoding[0].id);
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Failed to list encoding jobs: {}", e);
                return None;
            }
        }

        let job = match self.store.list_by_status(JobStatus::Ripped) {
            Ok(jobs) => jobs.into_iter().next()?,
            Err(e) => {
                warn!("Failed to list ripped jobs: {}", e);
                return None;
            }
        };

        let Some(input) = job.rip_path.clone().filter(|p| p.is_file()) else {
            let shown = job
                .rip_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string());
            fail_job(
                self.store.as_ref(),
                self.events.as_ref(),
                &job,
                "encode",
                OrchestratorError::MissingData(format!("Input file not found: {}", shown))
                    .to_string(),
            );
            return Some(job.id);
        };

        match self.store.claim(job.id, JobStatus::Ripped, JobStatus::Encoding) {
            Ok(true) => {}
            Ok(false) => return None,
            Err(e) => {
                warn!("Failed to claim job {}: {}", job.id, e);
                return None;
            }
        }

        self.process(&job, input).await;
        Some(job.id)
    }

    /// Where the encode of `input` for `job_id` is written.
    pub fn output_path(&self, job_id: i64, input: &std::path::Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("job_{}", job_id));
        self.workspace
            .encoding_dir(job_id)
            .join(format!("{}.mkv", stem))
    }

    async fn process(&self, job: &Job, input: PathBuf) {
        info!("Starting encode of {}", job.disc_label);
        let output = self.output_path(job.id, &input);
        let started = Instant::now();

        match self.encode(job.id, &input, &output).await {
            Ok(()) => {
                metrics::ENCODE_DURATION
                    .with_label_values(&["success"])
                    .observe(started.elapsed().as_secs_f64());
                match self.store.update_status(
                    job.id,
                    JobStatus::Encoded,
                    JobUpdate::new().with_encode_path(&output),
                ) {
                    Ok(_) => {
                        metrics::record_stage("encode", "success");
                        info!(
                            "Completed encode of {} to {}",
                            job.disc_label,
                            output.display()
                        );
                    }
                    Err(e) => fail_job(
                        self.store.as_ref(),
                        self.events.as_ref(),
                        job,
                        "encode",
                        e.to_string(),
                    ),
                }
            }
            Err(e) => {
                metrics::ENCODE_DURATION
                    .with_label_values(&["failed"])
                    .observe(started.elapsed().as_secs_f64());
                fail_job(
                    self.store.as_ref(),
                    self.events.as_ref(),
                    job,
                    "encode",
                    e.to_string(),
                );
            }
        }
    }

    async fn encode(
        &self,
        job_id: i64,
        input: &std::path::Path,
        output: &std::path::Path,
    ) -> Result<(), OrchestratorError> {
        let (tx, mut rx) = mpsc::channel::<EncodeProgress>(16);
        let reporter = tokio::spawn(async move {
            let mut last_decile = 0;
            while let Some(progress) = rx.recv().await {
                let decile = (progress.percent / 10.0) as u32;
                if decile > last_decile {
                    last_decile = decile;
                    debug!(
                        "Encode progress for job {}: {:.1}% ({} fps, ETA {})",
                        job_id,
                        progress.percent,
                        progress.fps.map(|f| f.to_string()).unwrap_or_default(),
                        progress.eta.as_deref().unwrap_or("?")
                    );
                }
            }
        });

        let result = self.encoder.encode(input, output, Some(tx)).await;
        let _ = reporter.await;
        Ok(result?)
    }
}
