use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Something a human may want to hear about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The file landed in the library.
    JobCompleted {
        job_id: i64,
        disc_label: String,
        title: Option<String>,
        year: Option<i32>,
        final_path: PathBuf,
    },
    /// The job stopped in `Failed`.
    JobFailed {
        job_id: i64,
        disc_label: String,
        error: String,
    },
    /// Identification needs an operator decision.
    ReviewNeeded {
        job_id: i64,
        disc_label: String,
        confidence: f64,
    },
}

impl PipelineEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::JobCompleted { .. } => "job_completed",
            PipelineEvent::JobFailed { .. } => "job_failed",
            PipelineEvent::ReviewNeeded { .. } => "review_needed",
        }
    }

    pub fn job_id(&self) -> i64 {
        match self {
            PipelineEvent::JobCompleted { job_id, .. }
            | PipelineEvent::JobFailed { job_id, .. }
            | PipelineEvent::ReviewNeeded { job_id, .. } => *job_id,
        }
    }
}
