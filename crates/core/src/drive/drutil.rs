//! Drive backend built on macOS `drutil` and `diskutil`.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{DriveBackend, DriveError, DriveStatus};

/// Drive backend that shells out to `drutil`.
pub struct DrutilDrive {
    drutil_path: PathBuf,
    diskutil_path: PathBuf,
}

impl DrutilDrive {
    pub fn new(drutil_path: impl Into<PathBuf>, diskutil_path: impl Into<PathBuf>) -> Self {
        Self {
            drutil_path: drutil_path.into(),
            diskutil_path: diskutil_path.into(),
        }
    }

    async fn run(&self, program: &Path, args: &[&str]) -> Result<std::process::Output, DriveError> {
        Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| DriveError::Spawn {
                tool: program.display().to_string(),
                source: e,
            })
    }

    /// Parse `drutil status` output into presence and raw label.
    pub fn parse_status(output: &str) -> DriveStatus {
        if output.trim().is_empty() || output.contains("No Media Inserted") {
            return DriveStatus::empty();
        }

        let mut has_disc = output.contains("Media") && !output.contains("No Media");
        let mut label = None;

        if let Some(name) = Self::field(output, "Name:") {
            label = Some(name);
            has_disc = true;
        }

        DriveStatus { has_disc, label }
    }

    /// Extract the `Volume Name:` field from `diskutil info` output.
    pub fn parse_volume_name(output: &str) -> Option<String> {
        Self::field(output, "Volume Name:")
    }

    fn field(output: &str, key: &str) -> Option<String> {
        output.lines().find_map(|line| {
            let (_, rest) = line.split_once(key)?;
            let value = rest.trim();
            (!value.is_empty()).then(|| value.to_string())
        })
    }

    async fn volume_name(&self, device: &str) -> Option<String> {
        match self.run(&self.diskutil_path, &["info", device]).await {
            Ok(output) => Self::parse_volume_name(&String::from_utf8_lossy(&output.stdout)),
            Err(e) => {
                warn!("Failed to read volume name for {}: {}", device, e);
                None
            }
        }
    }
}

#[async_trait]
impl DriveBackend for DrutilDrive {
    async fn poll(&self, drive_id: &str) -> Result<DriveStatus, DriveError> {
        let output = self
            .run(&self.drutil_path, &["status", "-drive", drive_id])
            .await?;

        let mut status = Self::parse_status(&String::from_utf8_lossy(&output.stdout));

        // drutil reports the device node rather than the volume name
        if let Some(device) = status.label.clone().filter(|l| l.starts_with("/dev/")) {
            status.label = self.volume_name(&device).await;
        }

        debug!("Drive {} status: {:?}", drive_id, status);
        Ok(status)
    }

    async fn eject(&self, drive_id: &str) -> Result<bool, DriveError> {
        let output = self
            .run(&self.drutil_path, &["eject", "-drive", drive_id])
            .await?;

        if !output.status.success() {
            warn!(
                "Eject of drive {} failed: {}",
                drive_id,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.status.success())
    }
}
