//! Mock AI identifier and screenshot extractor for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::vision::{AiGuess, AiIdentifier, ScreenshotExtractor, VisionError};

/// Mock implementation of the AiIdentifier trait.
#[derive(Debug, Default)]
pub struct MockAiIdentifier {
    guess: Arc<RwLock<Option<AiGuess>>>,
    /// If set, the next call will fail with this message.
    next_error: Arc<RwLock<Option<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockAiIdentifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_guess(&self, guess: Option<AiGuess>) {
        *self.guess.write().await = guess;
    }

    pub async fn set_next_error(&self, message: &str) {
        *self.next_error.write().await = Some(message.to_string());
    }

    /// Labels the identifier was asked about.
    pub async fn calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl AiIdentifier for MockAiIdentifier {
    async fn identify(
        &self,
        label: &str,
        _screenshots: &[PathBuf],
    ) -> Result<Option<AiGuess>, VisionError> {
        self.calls.write().await.push(label.to_string());
        if let Some(message) = self.next_error.write().await.take() {
            return Err(VisionError::Api {
                status: 529,
                message,
            });
        }
        Ok(self.guess.read().await.clone())
    }
}

/// Mock implementation of the ScreenshotExtractor trait.
///
/// Writes `count` placeholder images into the requested directory.
#[derive(Debug)]
pub struct MockScreenshotter {
    count: usize,
    extracted_to: Arc<RwLock<Vec<PathBuf>>>,
}

impl MockScreenshotter {
    pub fn new(count: usize) -> Self {
        Self {
            count,
            extracted_to: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Output directories of every extraction.
    pub async fn extracted_to(&self) -> Vec<PathBuf> {
        self.extracted_to.read().await.clone()
    }
}

#[async_trait]
impl ScreenshotExtractor for MockScreenshotter {
    async fn extract(&self, _video: &Path, out_dir: &Path) -> Vec<PathBuf> {
        self.extracted_to.write().await.push(out_dir.to_path_buf());
        if tokio::fs::create_dir_all(out_dir).await.is_err() {
            return Vec::new();
        }

        let mut paths = Vec::with_capacity(self.count);
        for i in 1..=self.count {
            let path = out_dir.join(format!("screenshot_{:02}.jpg", i));
            if tokio::fs::write(&path, b"\xff\xd8\xff").await.is_ok() {
                paths.push(path);
            }
        }
        paths
    }
}
