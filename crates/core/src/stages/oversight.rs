//! Consistency checks and crash recovery.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use super::CleanupReport;
use crate::job::{Job, JobError, JobStatus, JobStore, JobUpdate};
use crate::metrics;

/// Hours a job may sit in `Ripping` before it is reported.
pub const RIPPING_TIMEOUT_HOURS: i64 = 4;
/// Hours a job may sit in `Encoding` before it is reported.
pub const ENCODING_TIMEOUT_HOURS: i64 = 8;
/// Hours a job may sit in `Identifying` before it is reported.
pub const IDENTIFYING_TIMEOUT_HOURS: i64 = 1;

const INTERRUPTED_RIP: &str = "Rip interrupted by restart";

fn timeout_for(status: JobStatus) -> Option<Duration> {
    let hours = match status {
        JobStatus::Ripping => RIPPING_TIMEOUT_HOURS,
        JobStatus::Encoding => ENCODING_TIMEOUT_HOURS,
        JobStatus::Identifying => IDENTIFYING_TIMEOUT_HOURS,
        _ => return None,
    };
    Some(Duration::hours(hours))
}

fn job_ids(jobs: &[&Job]) -> String {
    jobs.iter()
        .map(|j| j.id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Read-mostly checks over the job store.
#[derive(Clone)]
pub struct Oversight {
    store: Arc<dyn JobStore>,
}

impl Oversight {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Report every invariant violation among active jobs. Mutates nothing.
    pub fn check_consistency(&self) -> Result<Vec<String>, JobError> {
        self.check_consistency_at(Utc::now())
    }

    /// [`check_consistency`](Self::check_consistency) against a fixed clock.
    pub fn check_consistency_at(&self, now: DateTime<Utc>) -> Result<Vec<String>, JobError> {
        let active = self.store.list_active()?;
        let mut issues = Vec::new();

        let encoding: Vec<&Job> = active
            .iter()
            .filter(|j| j.status == JobStatus::Encoding)
            .collect();
        if encoding.len() > 1 {
            issues.push(format!(
                "Multiple jobs in ENCODING status ({} jobs: {}). Only one job should be encoding at a time.",
                encoding.len(),
                job_ids(&encoding)
            ));
        }

        let mut ripping_by_drive: BTreeMap<&str, Vec<&Job>> = BTreeMap::new();
        for job in active.iter().filter(|j| j.status == JobStatus::Ripping) {
            ripping_by_drive
                .entry(job.drive_id.as_str())
                .or_default()
                .push(job);
        }
        for (drive_id, jobs) in &ripping_by_drive {
            if jobs.len() > 1 {
                issues.push(format!(
                    "Multiple jobs RIPPING on drive {} ({} jobs: {}). Only one job can rip from a drive at a time.",
                    drive_id,
                    jobs.len(),
                    job_ids(jobs)
                ));
            }
        }

        for job in &active {
            let Some(timeout) = timeout_for(job.status) else {
                continue;
            };
            let stuck_for = now - job.updated_at;
            if stuck_for > timeout {
                issues.push(format!(
                    "Job {} appears stuck in {} for {:.1} hours (threshold: {} hours).",
                    job.id,
                    job.status.as_str().to_uppercase(),
                    stuck_for.num_seconds() as f64 / 3600.0,
                    timeout.num_hours()
                ));
            }
        }

        Ok(issues)
    }

    /// Keep the most recently updated `Encoding` job and send the rest back
    /// to `Ripped`. Returns how many were reset.
    pub fn fix_stuck_encoding(&self) -> Result<usize, JobError> {
        let mut encoding = self.store.list_by_status(JobStatus::Encoding)?;
        if encoding.len() <= 1 {
            return Ok(0);
        }

        encoding.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        let mut fixed = 0;
        for job in encoding.iter().skip(1) {
            self.store
                .update_status(job.id, JobStatus::Ripped, JobUpdate::new())?;
            metrics::OVERSIGHT_RESETS
                .with_label_values(&["stuck_encoding"])
                .inc();
            info!("Reset stuck encoding job {} to ripped", job.id);
            fixed += 1;
        }
        Ok(fixed)
    }

    /// Reset jobs a previous process left mid-stage.
    ///
    /// Rips cannot resume, so `Ripping` becomes `Failed`. Encodes and
    /// identifications restart from their input. Must run before any stage
    /// starts polling.
    pub fn startup_cleanup(&self) -> Result<CleanupReport, JobError> {
        let mut report = CleanupReport::default();

        for job in self.store.list_by_status(JobStatus::Ripping)? {
            self.store.update_status(
                job.id,
                JobStatus::Failed,
                JobUpdate::new().with_error(INTERRUPTED_RIP),
            )?;
            metrics::OVERSIGHT_RESETS
                .with_label_values(&["rip_failed"])
                .inc();
            warn!("Job {} was ripping at shutdown, marked failed", job.id);
            report.ripping_failed += 1;
        }

        for job in self.store.list_by_status(JobStatus::Encoding)? {
            self.store
                .update_status(job.id, JobStatus::Ripped, JobUpdate::new())?;
            metrics::OVERSIGHT_RESETS
                .with_label_values(&["encode_requeued"])
                .inc();
            info!("Job {} was encoding at shutdown, requeued", job.id);
            report.encoding_reset += 1;
        }

        for job in self.store.list_by_status(JobStatus::Identifying)? {
            self.store
                .update_status(job.id, JobStatus::Encoded, JobUpdate::new())?;
            metrics::OVERSIGHT_RESETS
                .with_label_values(&["identify_requeued"])
                .inc();
            info!("Job {} was identifying at shutdown, requeued", job.id);
            report.identifying_reset += 1;
        }

        if report.total() > 0 {
            info!(
                "Startup cleanup: {} rips failed, {} encodes and {} identifications requeued",
                report.ripping_failed, report.encoding_reset, report.identifying_reset
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ContentMode, CreateJobRequest, SqliteJobStore};
    use crate::testing::fixtures;

    fn setup() -> (Oversight, Arc<SqliteJobStore>) {
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        (Oversight::new(store.clone()), store)
    }

    fn job(store: &SqliteJobStore, drive: &str, status: JobStatus) -> Job {
        fixtures::job_in_status(
            store,
            CreateJobRequest::new(drive, "LABEL", ContentMode::Movie),
            status,
            JobUpdate::new(),
        )
    }

    #[test]
    fn test_healthy_store_has_no_issues() {
        let (oversight, store) = setup();
        job(&store, "0", JobStatus::Encoding);
        job(&store, "0", JobStatus::Ripping);
        job(&store, "1", JobStatus::Ripping);
        job(&store, "0", JobStatus::Review);

        assert!(oversight.check_consistency().unwrap().is_empty());
    }

    #[test]
    fn test_reports_duplicate_encoding_and_ripping() {
        let (oversight, store) = setup();
        let a = job(&store, "0", JobStatus::Encoding);
        let b = job(&store, "1", JobStatus::Encoding);
        job(&store, "2", JobStatus::Ripping);
        job(&store, "2", JobStatus::Ripping);

        let issues = oversight.check_consistency().unwrap();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains(&format!("{}, {}", a.id, b.id)));
        assert!(issues[1].contains("RIPPING on drive 2"));
    }

    #[test]
    fn test_reports_stuck_jobs_by_state_timeout() {
        let (oversight, store) = setup();
        let identifying = job(&store, "0", JobStatus::Identifying);
        job(&store, "1", JobStatus::Encoding);

        let two_hours = Utc::now() + Duration::hours(2);
        let issues = oversight.check_consistency_at(two_hours).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].starts_with(&format!("Job {} appears stuck in IDENTIFYING", identifying.id)));

        let nine_hours = Utc::now() + Duration::hours(9);
        assert_eq!(oversight.check_consistency_at(nine_hours).unwrap().len(), 2);
    }

    #[test]
    fn test_check_does_not_mutate() {
        let (oversight, store) = setup();
        let a = job(&store, "0", JobStatus::Encoding);
        job(&store, "1", JobStatus::Encoding);
        let before = store.get(a.id).unwrap().unwrap();

        oversight.check_consistency().unwrap();
        let after = store.get(a.id).unwrap().unwrap();
        assert_eq!(before.status, after.status);
        assert_eq!(before.updated_at, after.updated_at);
    }

    #[test]
    fn test_fix_stuck_encoding_keeps_most_recent() {
        let (oversight, store) = setup();
        let older = job(&store, "0", JobStatus::Encoding);
        let newer = job(&store, "1", JobStatus::Encoding);

        assert_eq!(oversight.fix_stuck_encoding().unwrap(), 1);
        assert_eq!(store.get(older.id).unwrap().unwrap().status, JobStatus::Ripped);
        assert_eq!(store.get(newer.id).unwrap().unwrap().status, JobStatus::Encoding);
        assert_eq!(oversight.fix_stuck_encoding().unwrap(), 0);
    }

    #[test]
    fn test_startup_cleanup_resets_transient_jobs() {
        let (oversight, store) = setup();
        let ripping = job(&store, "0", JobStatus::Ripping);
        let encoding = job(&store, "1", JobStatus::Encoding);
        let identifying = job(&store, "1", JobStatus::Identifying);
        let review = job(&store, "1", JobStatus::Review);

        let report = oversight.startup_cleanup().unwrap();
        assert_eq!(
            report,
            CleanupReport {
                ripping_failed: 1,
                encoding_reset: 1,
                identifying_reset: 1,
            }
        );

        let ripping = store.get(ripping.id).unwrap().unwrap();
        assert_eq!(ripping.status, JobStatus::Failed);
        assert_eq!(ripping.error_message.as_deref(), Some(INTERRUPTED_RIP));
        assert_eq!(store.get(encoding.id).unwrap().unwrap().status, JobStatus::Ripped);
        assert_eq!(store.get(identifying.id).unwrap().unwrap().status, JobStatus::Encoded);
        assert_eq!(store.get(review.id).unwrap().unwrap().status, JobStatus::Review);
    }

    #[test]
    fn test_startup_cleanup_is_idempotent_on_clean_store() {
        let (oversight, store) = setup();
        job(&store, "0", JobStatus::Pending);
        job(&store, "0", JobStatus::Complete);

        assert_eq!(oversight.startup_cleanup().unwrap(), CleanupReport::default());
        assert_eq!(oversight.startup_cleanup().unwrap(), CleanupReport::default());
    }
}
