//! Types for the pipeline orchestrator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encoder::EncoderError;
use crate::external_catalog::ExternalCatalogError;
use crate::job::JobError;
use crate::placer::PlacerError;
use crate::ripper::RipperError;
use crate::vision::VisionError;

/// Errors that can occur while a stage works on a job.
///
/// The display text is what ends up in the job's `error_message`.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Ripper(#[from] RipperError),

    #[error(transparent)]
    Encoder(#[from] EncoderError),

    #[error(transparent)]
    Catalog(#[from] ExternalCatalogError),

    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error(transparent)]
    Placer(#[from] PlacerError),

    /// A field a stage depends on is missing or points at nothing.
    #[error("{0}")]
    MissingData(String),
}

/// Counts of jobs reset by [`startup_cleanup`](super::Oversight::startup_cleanup).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// `Ripping` jobs set to `Failed`.
    pub ripping_failed: usize,
    /// `Encoding` jobs set back to `Ripped`.
    pub encoding_reset: usize,
    /// `Identifying` jobs set back to `Encoded`.
    pub identifying_reset: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.ripping_failed + self.encoding_reset + self.identifying_reset
    }
}

/// Current status of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Whether the orchestrator is running.
    pub running: bool,
    /// Drives being watched.
    pub drives: Vec<String>,
    /// Drives with a rip in flight.
    pub busy_drives: Vec<String>,
    /// Non-archived job counts keyed by status.
    pub job_counts: BTreeMap<String, usize>,
}
