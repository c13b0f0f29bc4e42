//! Ripping backend: disc title enumeration and title extraction.
//!
//! The rip stage only depends on the [`Ripper`] trait. [`MakeMkvRipper`]
//! drives `makemkvcon` in robot mode.

mod makemkv;

pub use makemkv::MakeMkvRipper;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors returned by a ripping backend.
#[derive(Debug, Error)]
pub enum RipperError {
    /// The disc could not be read or has no titles.
    #[error("Failed to read disc in {device}: {details}")]
    DiscRead { device: String, details: String },

    /// Extracting a title failed.
    #[error("Failed to rip title {title_index} from {device}: {details}")]
    Rip {
        device: String,
        title_index: u32,
        details: String,
    },

    /// The backend process could not be started or awaited.
    #[error("Ripper process error: {0}")]
    Process(#[from] std::io::Error),
}

/// One title on a disc.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleInfo {
    pub index: u32,
    pub duration_secs: u64,
    pub size_bytes: u64,
    pub chapters: u32,
    /// Output filename the backend would use.
    pub filename: String,
}

/// Progress of an in-flight rip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RipProgress {
    /// Fraction complete (0.0 - 1.0).
    pub fraction: f32,
}

/// A backend able to list and extract disc titles.
#[async_trait]
pub trait Ripper: Send + Sync {
    /// Enumerate the titles on the disc in `drive_id`.
    async fn list_titles(&self, drive_id: &str) -> Result<Vec<TitleInfo>, RipperError>;

    /// Rip one title into `out_dir` and return the produced file.
    ///
    /// Progress updates are best-effort; a full or closed channel is ignored.
    async fn rip(
        &self,
        drive_id: &str,
        title_index: u32,
        out_dir: &Path,
        progress: Option<mpsc::Sender<RipProgress>>,
    ) -> Result<PathBuf, RipperError>;
}

/// Pick the main feature from a disc's titles.
///
/// The longest title at least `min_duration_secs` long wins. When none
/// qualifies the longest title overall is used. Ties keep the first title.
pub fn select_main_title(titles: &[TitleInfo], min_duration_secs: u64) -> Option<&TitleInfo> {
    longest(titles.iter().filter(|t| t.duration_secs >= min_duration_secs))
        .or_else(|| longest(titles.iter()))
}

fn longest<'a>(titles: impl Iterator<Item = &'a TitleInfo>) -> Option<&'a TitleInfo> {
    titles.fold(None, |best: Option<&TitleInfo>, t| match best {
        Some(b) if b.duration_secs >= t.duration_secs => Some(b),
        _ => Some(t),
    })
}
