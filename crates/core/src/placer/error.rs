//! Library placement errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while filing a file into the library.
#[derive(Debug, Error)]
pub enum PlacerError {
    #[error("Encoded file not found: {path}")]
    SourceNotFound { path: PathBuf },

    /// The library root is absent, usually an unmounted volume.
    #[error("Library directory not found: {path}")]
    DestinationRootMissing { path: PathBuf },

    /// The title sanitizes to nothing usable as a file name.
    #[error("Title {title:?} does not produce a valid file name")]
    InvalidTitle { title: String },

    /// The `Title (Year)` folder could not be created.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rename or copy into the library failed part way.
    #[error("Failed to {action} {source} to {destination}: {error}")]
    Transfer {
        action: &'static str,
        source: PathBuf,
        destination: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// A cross-volume copy read back different bytes.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlacerError {
    pub(super) fn transfer(
        action: &'static str,
        source: &std::path::Path,
        destination: &std::path::Path,
        error: std::io::Error,
    ) -> Self {
        Self::Transfer {
            action,
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            error,
        }
    }

    /// Whether waiting and trying again can succeed.
    ///
    /// Only a missing library root qualifies; every other failure is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DestinationRootMissing { .. })
    }
}
