//! Encoding backend.

mod handbrake;

pub use handbrake::HandBrakeEncoder;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while encoding.
#[derive(Debug, Error)]
pub enum EncoderError {
    /// Encoder binary not found.
    #[error("HandBrakeCLI not found at path: {path}")]
    NotFound { path: PathBuf },

    /// Input file missing or not a regular file.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The encoder exited with a non-zero status.
    #[error("Encoding failed with exit code {exit_code:?}: {details}")]
    Failed {
        exit_code: Option<i32>,
        details: String,
    },

    /// The encoder exited cleanly but left no usable output.
    #[error("Output file {path} is unusable: {reason}")]
    BadOutput { path: PathBuf, reason: String },

    /// I/O error while running the encoder.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Progress of an in-flight encode.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProgress {
    /// Percentage complete (0.0 - 100.0).
    pub percent: f32,
    /// Current frames per second, when reported.
    pub fps: Option<f32>,
    /// Estimated time remaining, as printed by the encoder.
    pub eta: Option<String>,
}

/// A backend that transcodes a ripped file.
#[async_trait]
pub trait Encoder: Send + Sync {
    /// Encode `input` into `output` using the backend's fixed preset.
    ///
    /// Progress is informational; dropping the receiver does not stop the encode.
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        progress: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<(), EncoderError>;
}
