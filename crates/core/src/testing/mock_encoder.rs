//! Mock encoder for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::encoder::{EncodeProgress, Encoder, EncoderError};

/// Mock implementation of the Encoder trait.
///
/// Successful encodes write a small file at the output path.
#[derive(Debug)]
pub struct MockEncoder {
    /// If set, the next encode will fail with this error.
    next_error: Arc<RwLock<Option<EncoderError>>>,
    encoded: Arc<RwLock<Vec<PathBuf>>>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEncoder {
    pub fn new() -> Self {
        Self {
            next_error: Arc::new(RwLock::new(None)),
            encoded: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Configure the next encode to fail with the given error.
    pub async fn set_next_error(&self, error: EncoderError) {
        *self.next_error.write().await = Some(error);
    }

    /// Inputs of every encode attempted, in order.
    pub async fn encoded_inputs(&self) -> Vec<PathBuf> {
        self.encoded.read().await.clone()
    }
}

#[async_trait]
impl Encoder for MockEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        progress: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<(), EncoderError> {
        self.encoded.write().await.push(input.to_path_buf());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        if let Some(tx) = &progress {
            let _ = tx.try_send(EncodeProgress {
                percent: 100.0,
                fps: Some(30.0),
                eta: None,
            });
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(output, b"mock encode").await?;
        Ok(())
    }
}
