//! Optical drive presence detection and eject.

mod drutil;

pub use drutil::DrutilDrive;

use async_trait::async_trait;
use thiserror::Error;

/// Label used when the disc label cannot be read.
pub const UNKNOWN_LABEL: &str = "UNKNOWN";

/// Errors from the drive backend.
#[derive(Debug, Error)]
pub enum DriveError {
    /// The drive tool could not be run.
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// The drive tool ran but reported a failure.
    #[error("Drive {drive_id} command failed: {details}")]
    CommandFailed { drive_id: String, details: String },
}

/// What a single poll of a drive found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveStatus {
    pub has_disc: bool,
    /// Disc label, when the drive reports one.
    pub label: Option<String>,
}

impl DriveStatus {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_disc(label: impl Into<String>) -> Self {
        Self {
            has_disc: true,
            label: Some(label.into()),
        }
    }
}

/// Backend that reports disc presence and ejects discs.
#[async_trait]
pub trait DriveBackend: Send + Sync {
    /// Query whether a disc is present in the drive.
    async fn poll(&self, drive_id: &str) -> Result<DriveStatus, DriveError>;

    /// Eject the disc. Returns whether the drive accepted the command.
    async fn eject(&self, drive_id: &str) -> Result<bool, DriveError>;
}
