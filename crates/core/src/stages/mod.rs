//! Pipeline stage workers and their supervisor.
//!
//! Each stage is a poll loop that claims jobs in one status range from the
//! [`JobStore`] and moves them forward:
//! - **Drive monitor**: disc insertion creates a `Pending` job
//! - **Rip**: `Pending -> Ripping -> Ripped`, one rip per drive, drives in parallel
//! - **Encode**: `Ripped -> Encoding -> Encoded`, one encode system-wide, FIFO
//! - **Identify**: `Encoded -> Identifying -> {Review, Moving}`
//! - **Move**: `Moving -> Complete`, retrying while the library root is missing
//!
//! [`Oversight`] checks the store for invariant violations and repairs what a
//! crash left behind. [`Orchestrator`] owns the loops.

mod config;
mod drive_monitor;
mod encode;
mod identify;
mod mover;
mod oversight;
mod review;
mod rip;
mod runner;
mod types;

pub use config::OrchestratorConfig;
pub use drive_monitor::DriveMonitor;
pub use encode::EncodeStage;
pub use identify::{IdentifyOutcome, IdentifyStage};
pub use mover::{MoveOutcome, MoveStage};
pub use oversight::{
    Oversight, ENCODING_TIMEOUT_HOURS, IDENTIFYING_TIMEOUT_HOURS, RIPPING_TIMEOUT_HOURS,
};
pub use review::{ReviewActions, ReviewError};
pub use rip::RipStage;
pub use runner::{Orchestrator, PipelineBackends};
pub use types::{CleanupReport, OrchestratorError, OrchestratorStatus};

use tracing::error;

use crate::job::{Job, JobStatus, JobStore, JobUpdate};
use crate::metrics;
use crate::notify::{EventHandle, PipelineEvent};

/// Move a job to `Failed`, record the outcome and notify.
///
/// Store errors are logged; the caller has nothing left to do with them.
pub(crate) fn fail_job(
    store: &dyn JobStore,
    events: Option<&EventHandle>,
    job: &Job,
    stage: &str,
    message: impl Into<String>,
) {
    let message = message.into();
    error!("Job {} failed in {} stage: {}", job.id, stage, message);

    if let Err(e) = store.update_status(
        job.id,
        JobStatus::Failed,
        JobUpdate::new().with_error(message.clone()),
    ) {
        error!("Failed to mark job {} as failed: {}", job.id, e);
        return;
    }
    metrics::record_stage(stage, "failed");

    if let Some(events) = events {
        events.try_emit(PipelineEvent::JobFailed {
            job_id: job.id,
            disc_label: job.disc_label.clone(),
            error: message,
        });
    }
}
