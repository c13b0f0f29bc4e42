//! Mock ripper for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use super::fixtures;
use crate::ripper::{RipProgress, Ripper, RipperError, TitleInfo};

/// Mock implementation of the Ripper trait.
///
/// Every drive reports the same titles. Rips write a small file named after
/// the title into the output directory.
#[derive(Debug)]
pub struct MockRipper {
    titles: Arc<RwLock<Vec<TitleInfo>>>,
    /// If set, the next rip will fail with this error.
    next_error: Arc<RwLock<Option<RipperError>>>,
    delay: Arc<RwLock<Duration>>,
    ripped: Arc<RwLock<Vec<(String, u32)>>>,
}

impl Default for MockRipper {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRipper {
    /// A ripper whose discs hold a 2 hour feature and a short extra.
    pub fn new() -> Self {
        Self {
            titles: Arc::new(RwLock::new(vec![
                fixtures::title(0, 5),
                fixtures::title(1, 120),
            ])),
            next_error: Arc::new(RwLock::new(None)),
            delay: Arc::new(RwLock::new(Duration::ZERO)),
            ripped: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_titles(&self, titles: Vec<TitleInfo>) {
        *self.titles.write().await = titles;
    }

    /// Configure the next rip to fail with the given error.
    pub async fn set_rip_error(&self, error: RipperError) {
        *self.next_error.write().await = Some(error);
    }

    /// Simulated rip duration.
    pub async fn set_rip_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    /// (drive, title index) of every rip attempted.
    pub async fn ripped_titles(&self) -> Vec<(String, u32)> {
        self.ripped.read().await.clone()
    }
}

#[async_trait]
impl Ripper for MockRipper {
    async fn list_titles(&self, _drive_id: &str) -> Result<Vec<TitleInfo>, RipperError> {
        Ok(self.titles.read().await.clone())
    }

    async fn rip(
        &self,
        drive_id: &str,
        title_index: u32,
        out_dir: &Path,
        progress: Option<mpsc::Sender<RipProgress>>,
    ) -> Result<PathBuf, RipperError> {
        self.ripped
            .write()
            .await
            .push((drive_id.to_string(), title_index));

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if let Some(tx) = &progress {
            let _ = tx.try_send(RipProgress { fraction: 0.5 });
            let _ = tx.try_send(RipProgress { fraction: 1.0 });
        }

        tokio::fs::create_dir_all(out_dir).await?;
        let path = out_dir.join(format!("title_t{:02}.mkv", title_index));
        tokio::fs::write(&path, b"mock rip").await?;
        Ok(path)
    }
}
