//! Mock drive backend for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::drive::{DriveBackend, DriveError, DriveStatus};

/// Mock implementation of the DriveBackend trait.
///
/// Drives start empty. Ejecting removes the disc, like a real tray.
#[derive(Debug, Default)]
pub struct MockDrive {
    statuses: Arc<RwLock<HashMap<String, DriveStatus>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    ejects: Arc<RwLock<HashMap<String, usize>>>,
}

impl MockDrive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a labelled disc in the drive.
    pub async fn insert_disc(&self, drive_id: &str, label: &str) {
        self.set_status(drive_id, DriveStatus::with_disc(label)).await;
    }

    pub async fn remove_disc(&self, drive_id: &str) {
        self.set_status(drive_id, DriveStatus::empty()).await;
    }

    pub async fn set_status(&self, drive_id: &str, status: DriveStatus) {
        self.statuses
            .write()
            .await
            .insert(drive_id.to_string(), status);
    }

    /// Make polls of the drive fail until cleared.
    pub async fn set_poll_error(&self, drive_id: &str, failing: bool) {
        let mut set = self.failing.write().await;
        if failing {
            set.insert(drive_id.to_string());
        } else {
            set.remove(drive_id);
        }
    }

    /// Number of times the drive was ejected.
    pub async fn eject_count(&self, drive_id: &str) -> usize {
        self.ejects
            .read()
            .await
            .get(drive_id)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl DriveBackend for MockDrive {
    async fn poll(&self, drive_id: &str) -> Result<DriveStatus, DriveError> {
        if self.failing.read().await.contains(drive_id) {
            return Err(DriveError::CommandFailed {
                drive_id: drive_id.to_string(),
                details: "mock poll failure".to_string(),
            });
        }
        Ok(self
            .statuses
            .read()
            .await
            .get(drive_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn eject(&self, drive_id: &str) -> Result<bool, DriveError> {
        *self
            .ejects
            .write()
            .await
            .entry(drive_id.to_string())
            .or_insert(0) += 1;
        self.remove_disc(drive_id).await;
        Ok(true)
    }
}
