//! Orchestrator: owns the stage loops.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use super::{
    DriveMonitor, EncodeStage, IdentifyStage, MoveStage, OrchestratorConfig, OrchestratorStatus,
    Oversight, RipStage,
};
use crate::config::Config;
use crate::drive::DriveBackend;
use crate::encoder::Encoder;
use crate::external_catalog::MetadataSearch;
use crate::job::{CollectionLog, JobStatus, JobStore, ModeSettings};
use crate::notify::EventHandle;
use crate::placer::Placer;
use crate::ripper::Ripper;
use crate::vision::{AiIdentifier, ScreenshotExtractor};

/// The external collaborators the stages drive.
#[derive(Clone)]
pub struct PipelineBackends {
    pub drive: Arc<dyn DriveBackend>,
    pub ripper: Arc<dyn Ripper>,
    pub encoder: Arc<dyn Encoder>,
    pub placer: Arc<dyn Placer>,
    /// Without a metadata search every movie goes to review.
    pub search: Option<Arc<dyn MetadataSearch>>,
    pub ai: Option<Arc<dyn AiIdentifier>>,
    pub screenshots: Option<Arc<dyn ScreenshotExtractor>>,
}

/// The pipeline orchestrator - runs every stage as its own poll loop.
pub struct Orchestrator {
    config: OrchestratorConfig,
    drive_ids: Vec<String>,
    store: Arc<dyn JobStore>,
    monitor: Arc<Mutex<DriveMonitor>>,
    rip: RipStage,
    encode: Arc<EncodeStage>,
    identify: Arc<IdentifyStage>,
    mover: Arc<MoveStage>,
    oversight: Oversight,

    // Runtime state
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Create an orchestrator over `store`, which also serves as the
    /// collection log and the mode setting.
    pub fn new<S>(
        config: &Config,
        store: Arc<S>,
        backends: PipelineBackends,
        events: Option<EventHandle>,
    ) -> Self
    where
        S: JobStore + CollectionLog + ModeSettings + 'static,
    {
        let jobs: Arc<dyn JobStore> = store.clone();
        let collection: Arc<dyn CollectionLog> = store.clone();
        let settings: Arc<dyn ModeSettings> = store;
        let orch = &config.orchestrator;
        let drive_ids = config.drives.ids.clone();

        let monitor = DriveMonitor::new(
            Arc::clone(&backends.drive),
            Arc::clone(&jobs),
            settings,
            drive_ids.clone(),
        );
        let rip = RipStage::new(
            Arc::clone(&jobs),
            Arc::clone(&backends.drive),
            backends.ripper,
            events.clone(),
            config.workspace.clone(),
            drive_ids.clone(),
            orch.rip_settle_delay(),
            orch.min_feature_duration_secs,
        );
        let encode = EncodeStage::new(
            Arc::clone(&jobs),
            backends.encoder,
            events.clone(),
            config.workspace.clone(),
        );
        let mut identify = IdentifyStage::new(
            Arc::clone(&jobs),
            backends.search,
            events.clone(),
            orch.auto_approve_threshold,
        );
        if let (Some(ai), Some(screenshots)) = (backends.ai, backends.screenshots) {
            identify = identify.with_ai(ai, screenshots);
        }
        let mover = MoveStage::new(
            Arc::clone(&jobs),
            collection,
            backends.placer,
            events,
            config.library.clone(),
            orch.max_move_retries,
            orch.move_retry_interval(),
        );

        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            config: orch.clone(),
            drive_ids,
            oversight: Oversight::new(Arc::clone(&jobs)),
            store: jobs,
            monitor: Arc::new(Mutex::new(monitor)),
            rip,
            encode: Arc::new(encode),
            identify: Arc::new(identify),
            mover: Arc::new(mover),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Oversight over the same store, for operator-triggered checks.
    pub fn oversight(&self) -> &Oversight {
        &self.oversight
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the orchestrator (spawns background tasks).
    ///
    /// Jobs left mid-stage by a previous process are reset before any loop
    /// starts polling.
    pub async fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }

        info!("Starting pipeline orchestrator");

        if let Err(e) = self.oversight.startup_cleanup() {
            error!("Startup cleanup failed: {}", e);
        }

        let mut tasks = self.tasks.lock().await;

        let monitor = Arc::clone(&self.monitor);
        tasks.push(self.spawn_loop(
            "Drive monitor",
            self.config.drive_poll_interval(),
            move || {
                let monitor = Arc::clone(&monitor);
                async move {
                    monitor.lock().await.tick().await;
                }
            },
        ));

        tasks.push(self.spawn_rip_loop());

        let encode = Arc::clone(&self.encode);
        tasks.push(self.spawn_loop(
            "Encode",
            self.config.stage_poll_interval(),
            move || {
                let encode = Arc::clone(&encode);
                async move {
                    encode.tick().await;
                }
            },
        ));

        let identify = Arc::clone(&self.identify);
        tasks.push(self.spawn_loop(
            "Identify",
            self.config.stage_poll_interval(),
            move || {
                let identify = Arc::clone(&identify);
                async move {
                    identify.tick().await;
                }
            },
        ));

        let mover = Arc::clone(&self.mover);
        tasks.push(self.spawn_loop(
            "Move",
            self.config.stage_poll_interval(),
            move || {
                let mover = Arc::clone(&mover);
                async move {
                    mover.tick().await;
                }
            },
        ));

        let oversight = self.oversight.clone();
        tasks.push(self.spawn_loop(
            "Oversight",
            self.config.oversight_interval(),
            move || {
                let oversight = oversight.clone();
                async move {
                    match oversight.check_consistency() {
                        Ok(issues) => {
                            for issue in issues {
                                warn!("Consistency check: {}", issue);
                            }
                        }
                        Err(e) => warn!("Consistency check failed: {}", e),
                    }
                }
            },
        ));

        info!(
            "Pipeline orchestrator started watching {} drive(s)",
            self.drive_ids.len()
        );
    }

    /// Stop the orchestrator gracefully.
    ///
    /// Loops finish their current iteration; in-flight rips and encodes are
    /// awaited up to `stop_timeout_ms`, then aborted.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            warn!("Orchestrator not running");
            return;
        }

        info!("Stopping pipeline orchestrator");

        // Signal shutdown to all workers
        let _ = self.shutdown_tx.send(());

        let handles: Vec<JoinHandle<()>> = self.tasks.lock().await.drain(..).collect();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let timeout = self.config.stop_timeout();
        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(
                "Workers did not stop within {:?}, aborting {} task(s)",
                timeout,
                aborts.len()
            );
            for abort in aborts {
                abort.abort();
            }
        }

        info!("Pipeline orchestrator stopped");
    }

    /// Get current orchestrator status.
    pub fn status(&self) -> OrchestratorStatus {
        let job_counts: BTreeMap<String, usize> = match self.store.count_by_status() {
            Ok(counts) => counts
                .into_iter()
                .filter(|(status, _)| *status != JobStatus::Archived)
                .map(|(status, count)| (status.as_str().to_string(), count))
                .collect(),
            Err(e) => {
                warn!("Failed to count jobs: {}", e);
                BTreeMap::new()
            }
        };

        OrchestratorStatus {
            running: self.is_running(),
            drives: self.drive_ids.clone(),
            busy_drives: self.rip.busy_drives(),
            job_counts,
        }
    }

    fn spawn_loop<F, Fut>(
        &self,
        name: &'static str,
        interval: Duration,
        mut tick: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!("{} loop started", name);
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("{} loop received shutdown signal", name);
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        tick().await;
                    }
                }
            }
            info!("{} loop stopped", name);
        })
    }

    /// The rip loop keeps its rips in a `JoinSet` so stopping waits for them
    /// and an abort takes them down too.
    fn spawn_rip_loop(&self) -> JoinHandle<()> {
        let running = Arc::clone(&self.running);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let rip = self.rip.clone();
        let interval = self.config.stage_poll_interval();

        tokio::spawn(async move {
            info!("Rip loop started");
            let mut in_flight = JoinSet::new();
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Rip loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        while let Some(result) = in_flight.try_join_next() {
                            if let Err(e) = result {
                                error!("Rip task ended abnormally: {}", e);
                            }
                        }
                        rip.tick(&mut in_flight);
                    }
                }
            }

            if !in_flight.is_empty() {
                info!("Waiting for {} rip(s) to finish", in_flight.len());
            }
            while let Some(result) = in_flight.join_next().await {
                if let Err(e) = result {
                    error!("Rip task ended abnormally: {}", e);
                }
            }
            info!("Rip loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{ContentMode, CreateJobRequest, JobUpdate, SqliteJobStore};
    use crate::testing::{fixtures, MockDrive, MockEncoder, MockPlacer, MockRipper};
    use tempfile::TempDir;

    fn backends() -> PipelineBackends {
        PipelineBackends {
            drive: Arc::new(MockDrive::new()),
            ripper: Arc::new(MockRipper::new()),
            encoder: Arc::new(MockEncoder::new()),
            placer: Arc::new(MockPlacer::new()),
            search: None,
            ai: None,
            screenshots: None,
        }
    }

    #[tokio::test]
    async fn test_start_runs_startup_cleanup_and_stop_is_bounded() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let interrupted = fixtures::job_in_status(
            store.as_ref(),
            CreateJobRequest::new("9", "OLD", ContentMode::Movie),
            JobStatus::Ripping,
            JobUpdate::new(),
        );

        let config = fixtures::test_config(temp.path());
        let orchestrator = Orchestrator::new(&config, store.clone(), backends(), None);
        assert!(!orchestrator.status().running);

        orchestrator.start().await;
        assert!(orchestrator.is_running());
        assert_eq!(
            store.get(interrupted.id).unwrap().unwrap().status,
            JobStatus::Failed
        );

        let status = orchestrator.status();
        assert!(status.running);
        assert_eq!(status.drives, config.drives.ids);
        assert_eq!(status.job_counts.get("failed"), Some(&1));

        let started = std::time::Instant::now();
        orchestrator.stop().await;
        assert!(!orchestrator.is_running());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_double_start_and_stop_are_harmless() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let orchestrator =
            Orchestrator::new(&fixtures::test_config(temp.path()), store, backends(), None);

        orchestrator.stop().await;
        orchestrator.start().await;
        orchestrator.start().await;
        orchestrator.stop().await;
        orchestrator.stop().await;
        assert!(!orchestrator.is_running());
    }
}
