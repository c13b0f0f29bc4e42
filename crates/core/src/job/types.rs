//! Core job data types.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::external_catalog::MovieCandidate;

// ============================================================================
// Status
// ============================================================================

/// Pipeline status of a job.
///
/// The happy path is
/// `Pending -> Ripping -> Ripped -> Encoding -> Encoded -> Identifying -> {Review, Moving}`,
/// then `Review -> Moving` on approval and `Moving -> Complete`.
/// `Complete` and `Failed` can be archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Ripping,
    Ripped,
    Encoding,
    Encoded,
    Identifying,
    Review,
    Moving,
    Complete,
    Failed,
    Archived,
}

impl JobStatus {
    /// Every status, in pipeline order.
    pub const ALL: [JobStatus; 11] = [
        JobStatus::Pending,
        JobStatus::Ripping,
        JobStatus::Ripped,
        JobStatus::Encoding,
        JobStatus::Encoded,
        JobStatus::Identifying,
        JobStatus::Review,
        JobStatus::Moving,
        JobStatus::Complete,
        JobStatus::Failed,
        JobStatus::Archived,
    ];

    /// Stable lowercase name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Ripping => "ripping",
            JobStatus::Ripped => "ripped",
            JobStatus::Encoding => "encoding",
            JobStatus::Encoded => "encoded",
            JobStatus::Identifying => "identifying",
            JobStatus::Review => "review",
            JobStatus::Moving => "moving",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
            JobStatus::Archived => "archived",
        }
    }

    /// Returns true for `Complete`, `Failed` and `Archived`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Failed | JobStatus::Archived
        )
    }

    /// Whether `self -> next` is an edge of the state machine.
    ///
    /// Besides the forward edges this admits the recovery edges used by
    /// oversight (`Encoding -> Ripped`, `Identifying -> Encoded`) and
    /// `Moving -> Moving` for placement retries.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;

        if next == Failed {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Pending, Ripping)
                | (Ripping, Ripped)
                | (Ripped, Encoding)
                | (Encoding, Encoded)
                | (Encoded, Identifying)
                | (Identifying, Review)
                | (Identifying, Moving)
                | (Review, Moving)
                | (Moving, Moving)
                | (Moving, Complete)
                | (Complete, Archived)
                | (Failed, Archived)
                | (Encoding, Ripped)
                | (Identifying, Encoded)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown job status: {}", s))
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Operator-selected classification of a disc.
///
/// Decides whether identification runs and which library root receives the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    #[default]
    Movie,
    Tv,
    HomeMovies,
    Other,
}

impl ContentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentMode::Movie => "movie",
            ContentMode::Tv => "tv",
            ContentMode::HomeMovies => "home_movies",
            ContentMode::Other => "other",
        }
    }

    /// Modes whose discs are named after their label instead of being looked up.
    pub fn uses_disc_label(&self) -> bool {
        matches!(self, ContentMode::HomeMovies | ContentMode::Other)
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "movie" => Ok(ContentMode::Movie),
            "tv" => Ok(ContentMode::Tv),
            "home_movies" => Ok(ContentMode::HomeMovies),
            "other" => Ok(ContentMode::Other),
            _ => Err(format!("unknown content mode: {}", s)),
        }
    }
}

/// What identification concluded the disc contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    #[default]
    Unknown,
    Movie,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Unknown => "unknown",
            ContentType::Movie => "movie",
        }
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unknown" => Ok(ContentType::Unknown),
            "movie" => Ok(ContentType::Movie),
            _ => Err(format!("unknown content type: {}", s)),
        }
    }
}

// ============================================================================
// Job
// ============================================================================

/// One disc-to-library work item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub drive_id: String,
    /// Raw label as reported by the drive.
    pub disc_label: String,
    pub content_mode: ContentMode,
    pub content_type: ContentType,
    pub status: JobStatus,

    pub identified_title: Option<String>,
    pub identified_year: Option<i32>,
    /// TMDB id of the chosen match.
    pub external_id: Option<i64>,
    pub confidence: Option<f64>,
    pub poster_ref: Option<String>,
    /// Runner-up matches shown to the operator during review.
    #[serde(default)]
    pub alternatives: Vec<MovieCandidate>,

    pub rip_path: Option<PathBuf>,
    pub encode_path: Option<PathBuf>,
    pub final_path: Option<PathBuf>,

    pub error_message: Option<String>,
    pub move_retry_count: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Identified title, if it is set and non-blank.
    pub fn title(&self) -> Option<&str> {
        self.identified_title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Field changes applied together with a status update.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub rip_path: Option<PathBuf>,
    pub encode_path: Option<PathBuf>,
    pub final_path: Option<PathBuf>,
    pub error_message: Option<String>,
}

impl JobUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rip_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.rip_path = Some(path.into());
        self
    }

    pub fn with_encode_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.encode_path = Some(path.into());
        self
    }

    pub fn with_final_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.final_path = Some(path.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Identification fields written by the Identify Stage or an operator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identification {
    pub content_type: ContentType,
    pub title: Option<String>,
    pub year: Option<i32>,
    pub external_id: Option<i64>,
    pub confidence: f64,
    pub poster_ref: Option<String>,
    pub alternatives: Vec<MovieCandidate>,
}

impl Identification {
    /// No match from any source.
    pub fn unknown() -> Self {
        Self::default()
    }

    /// A title confirmed by a human, trusted fully.
    pub fn manual(title: impl Into<String>, year: Option<i32>, external_id: Option<i64>) -> Self {
        Self {
            content_type: ContentType::Movie,
            title: Some(title.into()),
            year,
            external_id,
            confidence: 1.0,
            poster_ref: None,
            alternatives: Vec::new(),
        }
    }
}

// ============================================================================
// Collection log
// ============================================================================

/// A finished item recorded in the collection log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionItem {
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    pub content_mode: ContentMode,
    pub external_id: Option<i64>,
    pub file_path: PathBuf,
    pub added_at: DateTime<Utc>,
}

/// Request to append to the collection log.
#[derive(Debug, Clone)]
pub struct NewCollectionItem {
    pub title: String,
    pub year: Option<i32>,
    pub content_mode: ContentMode,
    pub external_id: Option<i64>,
    pub file_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Ripping));
        assert!(JobStatus::Identifying.can_transition_to(JobStatus::Review));
        assert!(JobStatus::Identifying.can_transition_to(JobStatus::Moving));
        assert!(JobStatus::Review.can_transition_to(JobStatus::Moving));
        assert!(JobStatus::Moving.can_transition_to(JobStatus::Moving));
        assert!(JobStatus::Moving.can_transition_to(JobStatus::Complete));
        assert!(JobStatus::Complete.can_transition_to(JobStatus::Archived));
        assert!(JobStatus::Failed.can_transition_to(JobStatus::Archived));
    }

    #[test]
    fn test_backward_and_skipping_transitions_rejected() {
        assert!(!JobStatus::Ripped.can_transition_to(JobStatus::Pending));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Encoding));
        assert!(!JobStatus::Encoded.can_transition_to(JobStatus::Moving));
        assert!(!JobStatus::Complete.can_transition_to(JobStatus::Moving));
        assert!(!JobStatus::Archived.can_transition_to(JobStatus::Archived));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Archived));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal_only() {
        for status in JobStatus::ALL {
            assert_eq!(
                status.can_transition_to(JobStatus::Failed),
                !status.is_terminal(),
                "{} -> failed",
                status
            );
        }
    }

    #[test]
    fn test_recovery_transitions() {
        assert!(JobStatus::Encoding.can_transition_to(JobStatus::Ripped));
        assert!(JobStatus::Identifying.can_transition_to(JobStatus::Encoded));
        assert!(!JobStatus::Ripping.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<JobStatus>().is_err());
        assert_eq!("REVIEW".parse::<JobStatus>().unwrap(), JobStatus::Review);
    }

    #[test]
    fn test_content_mode_parsing() {
        assert_eq!(
            "home_movies".parse::<ContentMode>().unwrap(),
            ContentMode::HomeMovies
        );
        assert_eq!("TV".parse::<ContentMode>().unwrap(), ContentMode::Tv);
        assert!("music".parse::<ContentMode>().is_err());
        assert_eq!(ContentMode::default(), ContentMode::Movie);
        assert!(ContentMode::Other.uses_disc_label());
        assert!(!ContentMode::Movie.uses_disc_label());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&JobStatus::Identifying).unwrap();
        assert_eq!(json, "\"identifying\"");
        let mode = serde_json::to_string(&ContentMode::HomeMovies).unwrap();
        assert_eq!(mode, "\"home_movies\"");
    }
}
