use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::placer::{PlacedFile, Placer, PlacerError};

/// One call to [`MockPlacer::place`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedPlacement {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub success: bool,
}

/// Placer that only records where files would have gone.
#[derive(Debug, Default)]
pub struct MockPlacer {
    placements: Arc<RwLock<Vec<RecordedPlacement>>>,
    next_error: Arc<RwLock<Option<PlacerError>>>,
}

impl MockPlacer {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn recorded_placements(&self) -> Vec<RecordedPlacement> {
        self.placements.read().await.clone()
    }

    /// Fail the next placement with `error`.
    pub async fn set_next_error(&self, error: PlacerError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl Placer for MockPlacer {
    async fn place(&self, source: &Path, destination: &Path) -> Result<PlacedFile, PlacerError> {
        let outcome = match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(PlacedFile {
                destination: destination.to_path_buf(),
                size_bytes: 0,
                checksum: None,
            }),
        };

        self.placements.write().await.push(RecordedPlacement {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            success: outcome.is_ok(),
        });
        outcome
    }
}
