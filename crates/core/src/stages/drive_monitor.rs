//! Disc insertion detection.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::drive::{DriveBackend, UNKNOWN_LABEL};
use crate::job::{CreateJobRequest, Job, JobStore, ModeSettings};
use crate::metrics;

/// Turns a disc-presence edge on a drive into a `Pending` job.
pub struct DriveMonitor {
    drive: Arc<dyn DriveBackend>,
    store: Arc<dyn JobStore>,
    settings: Arc<dyn ModeSettings>,
    drive_ids: Vec<String>,
    has_disc: HashMap<String, bool>,
}

impl DriveMonitor {
    pub fn new(
        drive: Arc<dyn DriveBackend>,
        store: Arc<dyn JobStore>,
        settings: Arc<dyn ModeSettings>,
        drive_ids: Vec<String>,
    ) -> Self {
        Self {
            drive,
            store,
            settings,
            drive_ids,
            has_disc: HashMap::new(),
        }
    }

    /// Poll every drive once. Returns the jobs created.
    pub async fn tick(&mut self) -> Vec<Job> {
        let mut created = Vec::new();
        for drive_id in self.drive_ids.clone() {
            if let Some(job) = self.poll_drive(&drive_id).await {
                created.push(job);
            }
        }
        created
    }

    async fn poll_drive(&mut self, drive_id: &str) -> Option<Job> {
        let status = match self.drive.poll(drive_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Failed to read status of drive {}: {}", drive_id, e);
                self.has_disc.insert(drive_id.to_string(), false);
                return None;
            }
        };

        let had_disc = self
            .has_disc
            .insert(drive_id.to_string(), status.has_disc)
            .unwrap_or(false);
        if !status.has_disc || had_disc {
            return None;
        }

        let label = status
            .label
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
        info!("Disc inserted in drive {}: {}", drive_id, label);

        match self.store.active_job_for_drive(drive_id) {
            Ok(Some(existing)) => {
                debug!(
                    "Drive {} already has job {} in {}, not creating another",
                    drive_id, existing.id, existing.status
                );
                return None;
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to check active jobs for drive {}: {}", drive_id, e);
                return None;
            }
        }

        let mode = self.settings.current_mode().unwrap_or_else(|e| {
            warn!("Failed to read current mode, using default: {}", e);
            Default::default()
        });

        match self
            .store
            .create(CreateJobRequest::new(drive_id, label.as_str(), mode))
        {
            Ok(job) => {
                metrics::JOBS_CREATED.inc();
                info!(
                    "Created job {} for disc {} in drive {} ({})",
                    job.id, label, drive_id, mode
                );
                Some(job)
            }
            Err(e) => {
                warn!("Failed to create job for drive {}: {}", drive_id, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::DriveStatus;
    use crate::job::{ContentMode, JobStatus, SqliteJobStore};
    use crate::testing::MockDrive;

    fn setup(drives: &[&str]) -> (DriveMonitor, Arc<MockDrive>, Arc<SqliteJobStore>) {
        let drive = Arc::new(MockDrive::new());
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let monitor = DriveMonitor::new(
            drive.clone(),
            store.clone(),
            store.clone(),
            drives.iter().map(|d| d.to_string()).collect(),
        );
        (monitor, drive, store)
    }

    #[tokio::test]
    async fn test_insertion_creates_job_once() {
        let (mut monitor, drive, store) = setup(&["0"]);

        assert!(monitor.tick().await.is_empty());

        drive.insert_disc("0", "THE_MATRIX").await;
        let created = monitor.tick().await;
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].disc_label, "THE_MATRIX");
        assert_eq!(created[0].status, JobStatus::Pending);
        assert_eq!(created[0].content_mode, ContentMode::Movie);

        // disc still present: no edge
        assert!(monitor.tick().await.is_empty());
        assert_eq!(store.list_by_status(JobStatus::Pending).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reinsert_with_active_job_is_ignored() {
        let (mut monitor, drive, store) = setup(&["0"]);

        drive.insert_disc("0", "ALIEN").await;
        monitor.tick().await;
        drive.remove_disc("0").await;
        monitor.tick().await;
        drive.insert_disc("0", "ALIEN").await;

        assert!(monitor.tick().await.is_empty());
        assert_eq!(store.list_active().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_label_uses_sentinel_and_current_mode() {
        let (mut monitor, drive, store) = setup(&["0"]);
        store.set_mode(ContentMode::HomeMovies).unwrap();

        drive
            .set_status(
                "0",
                DriveStatus {
                    has_disc: true,
                    label: None,
                },
            )
            .await;
        let created = monitor.tick().await;
        assert_eq!(created[0].disc_label, UNKNOWN_LABEL);
        assert_eq!(created[0].content_mode, ContentMode::HomeMovies);
    }

    #[tokio::test]
    async fn test_poll_error_counts_as_no_disc() {
        let (mut monitor, drive, _store) = setup(&["0"]);

        drive.set_poll_error("0", true).await;
        assert!(monitor.tick().await.is_empty());

        drive.set_poll_error("0", false).await;
        drive.insert_disc("0", "HEAT").await;
        assert_eq!(monitor.tick().await.len(), 1);
    }
}
