//! Testing utilities and mock implementations of the pipeline backends.
//!
//! Every external tool the pipeline drives (optical drives, the ripper, the
//! encoder, metadata search, the vision model and the library filesystem) has
//! a mock here, so whole pipeline runs can be exercised without hardware.
//!
//! # Example
//!
//! ```rust,ignore
//! use discshelf_core::testing::{MockDrive, MockRipper};
//!
//! let drive = MockDrive::new();
//! let ripper = MockRipper::new();
//!
//! drive.insert_disc("0", "THE_MATRIX").await;
//! ripper.set_titles(vec![fixtures::title(0, 136)]).await;
//!
//! // Hand them to PipelineBackends...
//! ```

mod mock_drive;
mod mock_encoder;
mod mock_metadata_search;
mod mock_placer;
mod mock_ripper;
mod mock_vision;
mod recording_sink;

pub use mock_drive::MockDrive;
pub use mock_encoder::MockEncoder;
pub use mock_metadata_search::MockMetadataSearch;
pub use mock_placer::{MockPlacer, RecordedPlacement};
pub use mock_ripper::MockRipper;
pub use mock_vision::{MockAiIdentifier, MockScreenshotter};
pub use recording_sink::RecordingSink;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::config::{
        Config, DatabaseConfig, DrivesConfig, LibraryConfig, ServerConfig, ToolsConfig,
        WorkspaceConfig,
    };
    use crate::external_catalog::MovieCandidate;
    use crate::job::{CreateJobRequest, Job, JobStatus, JobStore, JobUpdate};
    use crate::ripper::TitleInfo;
    use crate::stages::OrchestratorConfig;

    /// A disc title of the given length in minutes.
    pub fn title(index: u32, minutes: u64) -> TitleInfo {
        TitleInfo {
            index,
            duration_secs: minutes * 60,
            size_bytes: minutes * 50 * 1024 * 1024,
            chapters: (minutes / 5).max(1) as u32,
            filename: format!("title_t{:02}.mkv", index),
        }
    }

    /// A metadata search result.
    pub fn candidate(id: i64, title: &str, year: Option<i32>, popularity: f64) -> MovieCandidate {
        MovieCandidate {
            id,
            title: title.to_string(),
            year,
            popularity,
            poster_ref: Some(format!("/poster_{}.jpg", id)),
        }
    }

    /// Write a small file at `root/rel`, creating parent directories.
    pub fn write_file(root: &Path, rel: &str) -> PathBuf {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture directory");
        }
        std::fs::write(&path, b"fixture").expect("write fixture file");
        path
    }

    /// Statuses a new job passes through to reach `target`.
    fn path_to(target: JobStatus) -> Vec<JobStatus> {
        use JobStatus::*;

        const FORWARD: [JobStatus; 5] = [Ripping, Ripped, Encoding, Encoded, Identifying];
        let through_identifying = |rest: &[JobStatus]| {
            let mut path = FORWARD.to_vec();
            path.extend_from_slice(rest);
            path
        };

        match target {
            Pending => Vec::new(),
            Failed => vec![Failed],
            Archived => vec![Failed, Archived],
            Review => through_identifying(&[Review]),
            Moving => through_identifying(&[Moving]),
            Complete => through_identifying(&[Moving, Complete]),
            forward => {
                let end = FORWARD.iter().position(|s| *s == forward).unwrap_or(0);
                FORWARD[..=end].to_vec()
            }
        }
    }

    /// Create a job and walk it through the state machine to `target`.
    ///
    /// `update` is applied on the final transition.
    pub fn job_in_status(
        store: &dyn JobStore,
        request: CreateJobRequest,
        target: JobStatus,
        update: JobUpdate,
    ) -> Job {
        let mut job = store.create(request).expect("create fixture job");
        let path = path_to(target);
        let last = path.len().saturating_sub(1);
        for (i, status) in path.into_iter().enumerate() {
            let step = if i == last {
                update.clone()
            } else {
                JobUpdate::new()
            };
            job = store
                .update_status(job.id, status, step)
                .expect("fixture transition");
        }
        job
    }

    /// Library roots under `root`, not created on disk.
    pub fn library_config(root: &Path) -> LibraryConfig {
        LibraryConfig {
            movies: root.join("Movies"),
            tv: root.join("TV Shows"),
            home_movies: root.join("Home Movies"),
            other: root.join("Other"),
        }
    }

    /// A full configuration rooted at `root` with fast polling.
    pub fn test_config(root: &Path) -> Config {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                path: root.join("discshelf.db"),
            },
            workspace: WorkspaceConfig {
                root: root.join("work"),
            },
            library: library_config(&root.join("library")),
            drives: DrivesConfig {
                ids: vec!["0".to_string(), "1".to_string()],
            },
            orchestrator: OrchestratorConfig {
                enabled: true,
                drive_poll_interval_ms: 20,
                stage_poll_interval_ms: 20,
                move_retry_interval_ms: 20,
                rip_settle_delay_ms: 0,
                stop_timeout_ms: 2000,
                oversight_interval_ms: 1000,
                ..OrchestratorConfig::default()
            },
            tools: ToolsConfig::default(),
            tmdb: None,
            ai: None,
            notifications: None,
        }
    }
}
