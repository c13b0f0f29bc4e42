//! Pipeline lifecycle integration tests.
//!
//! These run the full orchestrator against mock drives, ripper, encoder and
//! metadata search, with the real SQLite store and filesystem placer:
//! - Disc insertion through to a file in the library
//! - Parallel rips on two drives
//! - Low confidence matches waiting for review
//! - Move retries while the library is unavailable

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;

use discshelf_core::{
    create_event_system,
    config::Config,
    external_catalog::MetadataSearch,
    job::{CollectionLog, ContentMode, Job, JobFilter, JobStatus, JobStore, SqliteJobStore},
    notify::{EventSink, PipelineEvent},
    placer::FsPlacer,
    stages::{Orchestrator, PipelineBackends, ReviewActions},
    testing::{
        fixtures, MockDrive, MockEncoder, MockMetadataSearch, MockRipper, RecordingSink,
    },
};

const WAIT: Duration = Duration::from_secs(10);

/// Test helper wiring an orchestrator to mocks.
struct TestHarness {
    orchestrator: Orchestrator,
    store: Arc<SqliteJobStore>,
    drive: Arc<MockDrive>,
    ripper: Arc<MockRipper>,
    search: Arc<MockMetadataSearch>,
    sink: Arc<RecordingSink>,
    dispatcher: JoinHandle<()>,
    config: Config,
    _temp_dir: TempDir,
}

impl TestHarness {
    async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = fixtures::test_config(temp_dir.path());
        adjust(&mut config);

        let store = Arc::new(
            SqliteJobStore::new(&config.database.path).expect("Failed to create job store"),
        );
        let drive = Arc::new(MockDrive::new());
        let ripper = Arc::new(MockRipper::new());
        let search = Arc::new(MockMetadataSearch::new());
        let sink = Arc::new(RecordingSink::new());

        let (events, dispatcher) =
            create_event_system(vec![Arc::clone(&sink) as Arc<dyn EventSink>], 64);
        let dispatcher = tokio::spawn(dispatcher.run());

        let backends = PipelineBackends {
            drive: drive.clone(),
            ripper: ripper.clone(),
            encoder: Arc::new(MockEncoder::new()),
            placer: Arc::new(FsPlacer::new()),
            search: Some(search.clone() as Arc<dyn MetadataSearch>),
            ai: None,
            screenshots: None,
        };
        let orchestrator = Orchestrator::new(&config, store.clone(), backends, Some(events));

        Self {
            orchestrator,
            store,
            drive,
            ripper,
            search,
            sink,
            dispatcher,
            config,
            _temp_dir: temp_dir,
        }
    }

    fn create_movie_library(&self) -> PathBuf {
        let root = self.config.library.movies.clone();
        std::fs::create_dir_all(&root).expect("Failed to create library root");
        root
    }

    fn jobs(&self) -> Vec<Job> {
        self.store
            .list(&JobFilter::new().with_archived())
            .expect("Failed to list jobs")
    }

    /// Wait until the job for `label` satisfies `check`.
    async fn wait_for_job(&self, label: &str, check: impl Fn(&Job) -> bool) -> Job {
        let (this, check) = (self, &check);
        let found = eventually(move || async move {
            this.jobs()
                .into_iter()
                .find(|j| j.disc_label == label && check(j))
        })
        .await;
        found.unwrap_or_else(|| {
            panic!(
                "Job for {} never reached the expected state: {:?}",
                label,
                self.jobs()
                    .iter()
                    .map(|j| (j.disc_label.clone(), j.status, j.error_message.clone()))
                    .collect::<Vec<_>>()
            )
        })
    }

    async fn wait_for_status(&self, label: &str, status: JobStatus) -> Job {
        self.wait_for_job(label, |j| j.status == status).await
    }

    async fn wait_for_event(&self, matches: impl Fn(&PipelineEvent) -> bool) -> PipelineEvent {
        let (sink, matches) = (&self.sink, &matches);
        eventually(move || async move { sink.events().await.into_iter().find(|e| matches(e)) })
            .await
            .expect("Event was never delivered")
    }

    async fn shutdown(self) {
        self.orchestrator.stop().await;
        drop(self.orchestrator);
        let _ = tokio::time::timeout(Duration::from_secs(2), self.dispatcher).await;
    }
}

async fn eventually<T, F, Fut>(mut probe: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if let Some(value) = probe().await {
            return Some(value);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

#[tokio::test]
async fn test_disc_to_library() {
    let harness = TestHarness::new().await;
    let movies = harness.create_movie_library();
    harness
        .search
        .add_results(
            "the matrix",
            vec![fixtures::candidate(603, "The Matrix", Some(1999), 85.0)],
        )
        .await;

    harness.orchestrator.start().await;
    harness.drive.insert_disc("0", "THE_MATRIX").await;

    let job = harness
        .wait_for_status("THE_MATRIX", JobStatus::Complete)
        .await;

    let expected = movies.join("The Matrix (1999)").join("The Matrix (1999).mkv");
    assert_eq!(job.final_path.as_deref(), Some(expected.as_path()));
    assert!(expected.is_file());
    assert_eq!(job.identified_title.as_deref(), Some("The Matrix"));
    assert_eq!(job.identified_year, Some(1999));
    assert_eq!(job.external_id, Some(603));
    assert_eq!(job.content_mode, ContentMode::Movie);
    assert!(job.error_message.is_none());

    // Main feature picked, workspace cleaned
    assert_eq!(harness.ripper.ripped_titles().await, vec![("0".to_string(), 1)]);
    assert_eq!(harness.drive.eject_count("0").await, 1);
    assert!(!harness.config.workspace.staging_dir(job.id).exists());
    assert!(!harness.config.workspace.encoding_dir(job.id).exists());

    let collection = harness.store.list_collection(10).unwrap();
    assert_eq!(collection.len(), 1);
    assert_eq!(collection[0].title, "The Matrix");
    assert_eq!(collection[0].file_path, expected);

    let event = harness
        .wait_for_event(|e| matches!(e, PipelineEvent::JobCompleted { .. }))
        .await;
    assert_eq!(event.job_id(), job.id);

    // One job per insertion
    assert_eq!(harness.jobs().len(), 1);
    harness.shutdown().await;
}

#[tokio::test]
async fn test_two_drives_rip_in_parallel() {
    let harness = TestHarness::new().await;
    harness.create_movie_library();
    harness.ripper.set_rip_delay(Duration::from_millis(200)).await;
    harness
        .search
        .add_results("alien", vec![fixtures::candidate(348, "Alien", Some(1979), 60.0)])
        .await;
    harness
        .search
        .add_results("heat", vec![fixtures::candidate(949, "Heat", Some(1995), 50.0)])
        .await;

    harness.orchestrator.start().await;
    harness.drive.insert_disc("0", "ALIEN").await;
    harness.drive.insert_disc("1", "HEAT").await;

    // Both rips are in flight at once
    let h = &harness;
    let both_ripping = eventually(move || async move {
        let ripping = h
            .jobs()
            .into_iter()
            .filter(|j| j.status == JobStatus::Ripping)
            .count();
        (ripping == 2).then_some(())
    })
    .await;
    assert!(both_ripping.is_some(), "Drives did not rip concurrently");

    let alien = harness.wait_for_status("ALIEN", JobStatus::Complete).await;
    let heat = harness.wait_for_status("HEAT", JobStatus::Complete).await;
    assert_eq!(alien.drive_id, "0");
    assert_eq!(heat.drive_id, "1");
    assert_ne!(alien.rip_path, heat.rip_path);
    assert_ne!(alien.final_path, heat.final_path);

    harness.shutdown().await;
}

#[tokio::test]
async fn test_unmatched_disc_waits_for_review() {
    let harness = TestHarness::new().await;
    let movies = harness.create_movie_library();

    harness.orchestrator.start().await;
    harness.drive.insert_disc("0", "DISC_42").await;

    let job = harness.wait_for_status("DISC_42", JobStatus::Review).await;
    assert!(job.identified_title.is_none());
    assert_eq!(job.confidence, Some(0.0));

    let event = harness
        .wait_for_event(|e| matches!(e, PipelineEvent::ReviewNeeded { .. }))
        .await;
    assert_eq!(event.job_id(), job.id);

    // Stays put until the operator acts
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        harness.store.get(job.id).unwrap().unwrap().status,
        JobStatus::Review
    );

    let review = ReviewActions::new(harness.store.clone(), harness.store.clone());
    review
        .identify(job.id, "Galaxy Quest", Some(1999), Some(926))
        .unwrap();

    let job = harness.wait_for_status("DISC_42", JobStatus::Complete).await;
    assert_eq!(
        job.final_path,
        Some(movies.join("Galaxy Quest (1999)").join("Galaxy Quest (1999).mkv"))
    );
    assert_eq!(job.confidence, Some(1.0));

    harness.shutdown().await;
}

#[tokio::test]
async fn test_home_movies_skip_search() {
    let harness = TestHarness::new().await;
    let root = harness.config.library.home_movies.clone();
    std::fs::create_dir_all(&root).unwrap();
    ReviewActions::new(harness.store.clone(), harness.store.clone())
        .set_mode(ContentMode::HomeMovies)
        .unwrap();

    harness.orchestrator.start().await;
    harness.drive.insert_disc("0", "FAMILY_TRIP_2019").await;

    let job = harness
        .wait_for_status("FAMILY_TRIP_2019", JobStatus::Complete)
        .await;
    assert_eq!(job.content_mode, ContentMode::HomeMovies);
    assert_eq!(job.identified_title.as_deref(), Some("Family Trip 2019"));
    assert!(job.final_path.unwrap().starts_with(&root));
    assert!(harness.search.queries().await.is_empty());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_move_waits_for_library_to_appear() {
    let harness = TestHarness::with_config(|config| {
        config.orchestrator.move_retry_interval_ms = 50;
        config.orchestrator.max_move_retries = 100;
    })
    .await;
    harness
        .search
        .add_results("alien", vec![fixtures::candidate(348, "Alien", Some(1979), 60.0)])
        .await;

    harness.orchestrator.start().await;
    harness.drive.insert_disc("0", "ALIEN").await;

    let waiting = harness
        .wait_for_job("ALIEN", |j| {
            j.status == JobStatus::Moving && j.move_retry_count >= 1
        })
        .await;
    assert!(waiting
        .error_message
        .as_deref()
        .unwrap_or_default()
        .starts_with("Destination not found, retry"));

    harness.create_movie_library();
    let job = harness.wait_for_status("ALIEN", JobStatus::Complete).await;
    assert_eq!(job.move_retry_count, 0);
    assert!(job.error_message.is_none());

    harness.shutdown().await;
}

#[tokio::test]
async fn test_move_gives_up_after_max_retries() {
    let harness = TestHarness::with_config(|config| {
        config.orchestrator.max_move_retries = 3;
    })
    .await;
    harness
        .search
        .add_results("alien", vec![fixtures::candidate(348, "Alien", Some(1979), 60.0)])
        .await;

    harness.orchestrator.start().await;
    harness.drive.insert_disc("0", "ALIEN").await;

    let job = harness.wait_for_status("ALIEN", JobStatus::Failed).await;
    assert!(job
        .error_message
        .as_deref()
        .unwrap_or_default()
        .starts_with("Max retries exceeded"));

    let event = harness
        .wait_for_event(|e| matches!(e, PipelineEvent::JobFailed { .. }))
        .await;
    assert_eq!(event.job_id(), job.id);

    harness.shutdown().await;
}
