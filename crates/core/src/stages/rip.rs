//! Rip stage: one rip per drive, drives in parallel.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{fail_job, OrchestratorError};
use crate::config::WorkspaceConfig;
use crate::drive::DriveBackend;
use crate::job::{Job, JobStatus, JobStore, JobUpdate};
use crate::metrics;
use crate::notify::EventHandle;
use crate::ripper::{select_main_title, RipProgress, Ripper, RipperError};

/// Claims `Pending` jobs per idle drive and rips their main feature.
#[derive(Clone)]
pub struct RipStage {
    store: Arc<dyn JobStore>,
    drive: Arc<dyn DriveBackend>,
    ripper: Arc<dyn Ripper>,
    events: Option<EventHandle>,
    workspace: WorkspaceConfig,
    drive_ids: Vec<String>,
    settle_delay: Duration,
    min_feature_secs: u64,
    busy: Arc<Mutex<HashSet<String>>>,
}

/// Releases a drive when the rip task ends, however it ends.
struct BusyGuard {
    busy: Arc<Mutex<HashSet<String>>>,
    drive_id: String,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.drive_id);
    }
}

impl RipStage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn JobStore>,
        drive: Arc<dyn DriveBackend>,
        ripper: Arc<dyn Ripper>,
        events: Option<EventHandle>,
        workspace: WorkspaceConfig,
        drive_ids: Vec<String>,
        settle_delay: Duration,
        min_feature_secs: u64,
    ) -> Self {
        Self {
            store,
            drive,
            ripper,
            events,
            workspace,
            drive_ids,
            settle_delay,
            min_feature_secs,
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Drives with a rip in flight, sorted.
    pub fn busy_drives(&self) -> Vec<String> {
        let mut drives: Vec<String> = self
            .busy
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect();
        drives.sort();
        drives
    }

    fn try_reserve(&self, drive_id: &str) -> Option<BusyGuard> {
        let mut busy = self.busy.lock().unwrap_or_else(|e| e.into_inner());
        if !busy.insert(drive_id.to_string()) {
            return None;
        }
        Some(BusyGuard {
            busy: Arc::clone(&self.busy),
            drive_id: drive_id.to_string(),
        })
    }

    /// Start a rip on every idle drive whose oldest active job is `Pending`.
    ///
    /// Rips are spawned into `tasks` so the caller decides how long to wait
    /// for them. Returns how many were started.
    pub fn tick(&self, tasks: &mut JoinSet<()>) -> usize {
        let mut started = 0;

        for drive_id in &self.drive_ids {
            let Some(guard) = self.try_reserve(drive_id) else {
                debug!("Drive {} is busy ripping, skipping", drive_id);
                continue;
            };

            let job = match self.store.active_job_for_drive(drive_id) {
                Ok(Some(job)) if job.status == JobStatus::Pending => job,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Failed to fetch job for drive {}: {}", drive_id, e);
                    continue;
                }
            };

            match self.store.claim(job.id, JobStatus::Pending, JobStatus::Ripping) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!("Failed to claim job {}: {}", job.id, e);
                    continue;
                }
            }

            let stage = self.clone();
            tasks.spawn(async move {
                let _guard = guard;
                stage.process(job).await;
            });
            started += 1;
        }

        started
    }

    async fn process(&self, job: Job) {
        info!("Starting rip of {} from drive {}", job.disc_label, job.drive_id);
        let started = Instant::now();

        match self.rip(&job).await {
            Ok(path) => {
                metrics::RIP_DURATION
                    .with_label_values(&["success"])
                    .observe(started.elapsed().as_secs_f64());
                match self.store.update_status(
                    job.id,
                    JobStatus::Ripped,
                    JobUpdate::new().with_rip_path(&path),
                ) {
                    Ok(_) => {
                        metrics::record_stage("rip", "success");
                        info!("Completed rip of {} to {}", job.disc_label, path.display());
                    }
                    Err(e) => fail_job(
                        self.store.as_ref(),
                        self.events.as_ref(),
                        &job,
                        "rip",
                        e.to_string(),
                    ),
                }
            }
            Err(e) => {
                metrics::RIP_DURATION
                    .with_label_values(&["failed"])
                    .observe(started.elapsed().as_secs_f64());
                fail_job(
                    self.store.as_ref(),
                    self.events.as_ref(),
                    &job,
                    "rip",
                    e.to_string(),
                );
            }
        }

        match self.drive.eject(&job.drive_id).await {
            Ok(true) => debug!("Ejected drive {}", job.drive_id),
            Ok(false) => warn!("Drive {} refused to eject", job.drive_id),
            Err(e) => warn!("Failed to eject drive {}: {}", job.drive_id, e),
        }
    }

    async fn rip(&self, job: &Job) -> Result<PathBuf, OrchestratorError> {
        if !self.settle_delay.is_zero() {
            debug!("Waiting for disc to be ready in drive {}", job.drive_id);
            tokio::time::sleep(self.settle_delay).await;
        }

        let titles = self.ripper.list_titles(&job.drive_id).await?;
        let main = select_main_title(&titles, self.min_feature_secs).ok_or_else(|| {
            RipperError::DiscRead {
                device: job.drive_id.clone(),
                details: "No titles found on disc".to_string(),
            }
        })?;
        info!(
            "Selected title {} ({} min) of {} for job {}",
            main.index,
            main.duration_secs / 60,
            titles.len(),
            job.id
        );

        let out_dir = self.workspace.staging_dir(job.id);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(RipperError::Process)?;

        let (tx, mut rx) = mpsc::channel::<RipProgress>(16);
        let job_id = job.id;
        let reporter = tokio::spawn(async move {
            let mut last_decile = 0;
            while let Some(progress) = rx.recv().await {
                let decile = (progress.fraction * 10.0) as u32;
                if decile > last_decile {
                    last_decile = decile;
                    debug!("Rip progress for job {}: {:.0}%", job_id, progress.fraction * 100.0);
                }
            }
        });

        let result = self
            .ripper
            .rip(&job.drive_id, main.index, &out_dir, Some(tx))
            .await;
        let _ = reporter.await;

        Ok(result?)
    }
}
