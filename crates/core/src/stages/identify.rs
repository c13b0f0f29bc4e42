//! Identify stage: label to title, then auto-approve or review.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{fail_job, OrchestratorError};
use crate::external_catalog::{MetadataSearch, MovieCandidate};
use crate::identify::{
    clean_disc_label, prettify_label, rank_candidates, split_year, ScoredCandidate,
    MAX_ALTERNATIVES,
};
use crate::job::{ContentType, Identification, Job, JobStatus, JobStore};
use crate::metrics;
use crate::notify::{EventHandle, PipelineEvent};
use crate::vision::{AiIdentifier, ScreenshotExtractor};

/// Where a job went after identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifyOutcome {
    /// Confident enough, or named by the operator or the label.
    Moving,
    /// Needs an operator decision.
    Review,
    Failed,
}

/// Claims `Encoded` jobs and identifies them.
pub struct IdentifyStage {
    store: Arc<dyn JobStore>,
    search: Option<Arc<dyn MetadataSearch>>,
    ai: Option<Arc<dyn AiIdentifier>>,
    screenshots: Option<Arc<dyn ScreenshotExtractor>>,
    events: Option<EventHandle>,
    auto_approve_threshold: f64,
}

impl IdentifyStage {
    pub fn new(
        store: Arc<dyn JobStore>,
        search: Option<Arc<dyn MetadataSearch>>,
        events: Option<EventHandle>,
        auto_approve_threshold: f64,
    ) -> Self {
        Self {
            store,
            search,
            ai: None,
            screenshots: None,
            events,
            auto_approve_threshold,
        }
    }

    /// Enable the AI fallback for labels the metadata search cannot place.
    pub fn with_ai(
        mut self,
        ai: Arc<dyn AiIdentifier>,
        screenshots: Arc<dyn ScreenshotExtractor>,
    ) -> Self {
        self.ai = Some(ai);
        self.screenshots = Some(screenshots);
        self
    }

    /// Identify every `Encoded` job.
    pub async fn tick(&self) -> Vec<(i64, IdentifyOutcome)> {
        let jobs = match self.store.list_by_status(JobStatus::Encoded) {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("Failed to list encoded jobs: {}", e);
                return Vec::new();
            }
        };

        let mut outcomes = Vec::new();
        for job in jobs {
            match self
                .store
                .claim(job.id, JobStatus::Encoded, JobStatus::Identifying)
            {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!("Failed to claim job {}: {}", job.id, e);
                    continue;
                }
            }

            let outcome = match self.process(&job).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    fail_job(
                        self.store.as_ref(),
                        self.events.as_ref(),
                        &job,
                        "identify",
                        e.to_string(),
                    );
                    IdentifyOutcome::Failed
                }
            };
            outcomes.push((job.id, outcome));
        }
        outcomes
    }

    async fn process(&self, job: &Job) -> Result<IdentifyOutcome, OrchestratorError> {
        info!("Identifying content for {}", job.disc_label);

        if let Some(title) = job.title() {
            info!(
                "Job {} already identified as '{}', skipping automatic identification",
                job.id, title
            );
            return self.to_moving(job);
        }

        if job.content_mode.uses_disc_label() {
            let title = prettify_label(&job.disc_label);
            info!("Job {} is {}, using label '{}'", job.id, job.content_mode, title);
            self.store.update_identification(
                job.id,
                Identification {
                    title: Some(title),
                    confidence: 1.0,
                    ..Identification::unknown()
                },
            )?;
            return self.to_moving(job);
        }

        let identification = match self.search_label(&job.disc_label).await? {
            Some(identification) => identification,
            None => self.ai_fallback(job).await?.unwrap_or_else(Identification::unknown),
        };

        let confidence = identification.confidence;
        let found = identification.title.is_some();
        if found {
            info!(
                "Job {} matched {:?} ({:?}) with {:.0}% confidence",
                job.id,
                identification.title,
                identification.year,
                confidence * 100.0
            );
        }
        self.store.update_identification(job.id, identification)?;

        if found && confidence >= self.auto_approve_threshold {
            info!("Job {} auto-approved", job.id);
            return self.to_moving(job);
        }

        if found {
            info!("Job {} needs review ({:.0}% confidence)", job.id, confidence * 100.0);
        } else {
            info!("Job {} could not be identified, needs manual review", job.id);
        }
        self.store
            .update_status(job.id, JobStatus::Review, Default::default())?;
        metrics::record_stage("identify", "review");
        if let Some(events) = &self.events {
            events.try_emit(PipelineEvent::ReviewNeeded {
                job_id: job.id,
                disc_label: job.disc_label.clone(),
                confidence,
            });
        }
        Ok(IdentifyOutcome::Review)
    }

    fn to_moving(&self, job: &Job) -> Result<IdentifyOutcome, OrchestratorError> {
        self.store
            .update_status(job.id, JobStatus::Moving, Default::default())?;
        metrics::record_stage("identify", "success");
        Ok(IdentifyOutcome::Moving)
    }

    /// Metadata search for a disc label. `None` when nothing came back.
    async fn search_label(&self, label: &str) -> Result<Option<Identification>, OrchestratorError> {
        let Some(search) = &self.search else {
            debug!("No metadata search configured");
            return Ok(None);
        };

        let cleaned = clean_disc_label(label);
        let query = split_year(&cleaned);
        debug!(
            "Cleaned disc label '{}' -> '{}' (year {:?})",
            label, query.title, query.year
        );

        let mut candidates = search.search(&query.title, query.year).await?;
        if candidates.is_empty() && query.year.is_some() {
            debug!("No results with year hint, retrying '{}' without it", query.title);
            candidates = search.search(&query.title, None).await?;
        }

        let mut ranked = rank_candidates(&query.title, candidates).into_iter();
        let Some(best) = ranked.next() else {
            return Ok(None);
        };
        metrics::MATCH_CONFIDENCE
            .with_label_values(&["search"])
            .observe(best.confidence);

        let alternatives = ranked
            .take(MAX_ALTERNATIVES)
            .map(|s: ScoredCandidate| s.candidate)
            .collect();
        Ok(Some(identified(best.candidate, best.confidence, alternatives)))
    }

    /// Ask the AI backend about the encoded video, then look its answer up.
    async fn ai_fallback(&self, job: &Job) -> Result<Option<Identification>, OrchestratorError> {
        let (Some(ai), Some(extractor), Some(search)) = (&self.ai, &self.screenshots, &self.search)
        else {
            return Ok(None);
        };
        let Some(video) = job.encode_path.as_ref().filter(|p| p.is_file()) else {
            return Ok(None);
        };

        let shots_dir = video
            .parent()
            .map(|p| p.join("screenshots"))
            .unwrap_or_else(|| PathBuf::from("screenshots"));
        let shots = extractor.extract(video, &shots_dir).await;
        if shots.is_empty() {
            debug!("No screenshots for job {}, skipping AI identification", job.id);
            return Ok(None);
        }

        info!("No metadata results, trying AI identification for {}", job.disc_label);
        let guess = match ai.identify(&job.disc_label, &shots).await {
            Ok(Some(guess)) => guess,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("AI identification failed for job {}: {}", job.id, e);
                return Ok(None);
            }
        };
        let Some(title) = guess.title.as_deref() else {
            return Ok(None);
        };

        let mut results = search.search(title, guess.year).await?.into_iter();
        let Some(top) = results.next() else {
            return Ok(None);
        };
        metrics::MATCH_CONFIDENCE
            .with_label_values(&["ai"])
            .observe(guess.confidence);

        let alternatives = results.take(MAX_ALTERNATIVES).collect();
        Ok(Some(identified(top, guess.confidence, alternatives)))
    }
}

fn identified(
    candidate: MovieCandidate,
    confidence: f64,
    alternatives: Vec<MovieCandidate>,
) -> Identification {
    Identification {
        content_type: ContentType::Movie,
        title: Some(candidate.title),
        year: candidate.year,
        external_id: Some(candidate.id),
        confidence,
        poster_ref: candidate.poster_ref,
        alternatives,
    }
}
