//! File system placer implementation.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::{debug, warn};

use super::error::PlacerError;
use super::{PlacedFile, Placer};

const DEFAULT_BUFFER_SIZE: usize = 8 * 1024 * 1024;

/// Moves files with `rename`, falling back to a verified copy across devices.
pub struct FsPlacer {
    buffer_size: usize,
}

impl Default for FsPlacer {
    fn default() -> Self {
        Self::new()
    }
}

impl FsPlacer {
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    /// Sets the buffer size for copies.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Attempts to move a file atomically (rename).
    ///
    /// Returns `Ok(false)` when source and destination are on different devices.
    async fn try_atomic_move(source: &Path, destination: &Path) -> Result<bool, PlacerError> {
        match fs::rename(source, destination).await {
            Ok(()) => Ok(true),
            Err(e) => {
                // EXDEV is 18 on Linux and macOS
                if e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18) {
                    Ok(false)
                } else {
                    Err(PlacerError::transfer("move", source, destination, e))
                }
            }
        }
    }

    /// Copies a file and returns its size and SHA-256.
    async fn copy_file(&self, source: &Path, destination: &Path) -> Result<(u64, String), PlacerError> {
        let copy_failed = |e| PlacerError::transfer("copy", source, destination, e);

        let source_file = File::open(source).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PlacerError::SourceNotFound {
                    path: source.to_path_buf(),
                }
            } else {
                PlacerError::Io(e)
            }
        })?;
        let dest_file = File::create(destination).await.map_err(copy_failed)?;

        let mut reader = BufReader::with_capacity(self.buffer_size, source_file);
        let mut writer = BufWriter::with_capacity(self.buffer_size, dest_file);
        let mut hasher = Sha256::new();
        let mut total_bytes = 0u64;
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let bytes_read = reader.read(&mut buffer).await.map_err(copy_failed)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
            writer
                .write_all(&buffer[..bytes_read])
                .await
                .map_err(copy_failed)?;
            total_bytes += bytes_read as u64;
        }

        writer.flush().await.map_err(copy_failed)?;
        Ok((total_bytes, format!("{:x}", hasher.finalize())))
    }

    /// SHA-256 of a file on disk.
    async fn checksum(&self, path: &Path) -> Result<String, PlacerError> {
        let file = File::open(path).await?;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = vec![0u8; self.buffer_size];
        let mut hasher = Sha256::new();

        loop {
            let bytes_read = reader.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    async fn copy_then_delete(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<(u64, Option<String>), PlacerError> {
        let (size, expected) = self.copy_file(source, destination).await?;

        let actual = self.checksum(destination).await?;
        if actual != expected {
            if let Err(e) = fs::remove_file(destination).await {
                warn!("Failed to remove bad copy {}: {}", destination.display(), e);
            }
            return Err(PlacerError::ChecksumMismatch {
                path: destination.to_path_buf(),
                expected,
                actual,
            });
        }

        fs::remove_file(source).await?;
        Ok((size, Some(expected)))
    }
}

#[async_trait]
impl Placer for FsPlacer {
    async fn place(&self, source: &Path, destination: &Path) -> Result<PlacedFile, PlacerError> {
        if !source.is_file() {
            return Err(PlacerError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PlacerError::DirectoryCreationFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }

        let (size_bytes, checksum) = if Self::try_atomic_move(source, destination).await? {
            (fs::metadata(destination).await?.len(), None)
        } else {
            debug!(
                "{} and {} are on different devices, copying",
                source.display(),
                destination.display()
            );
            self.copy_then_delete(source, destination).await?
        };

        Ok(PlacedFile {
            destination: destination.to_path_buf(),
            size_bytes,
            checksum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_place_creates_parents_and_moves() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("encoding/job_1/movie.mkv");
        let dest = temp.path().join("Movies/The Matrix (1999)/The Matrix (1999).mkv");
        fs::create_dir_all(source.parent().unwrap()).await.unwrap();
        fs::write(&source, "video bytes").await.unwrap();

        let placed = FsPlacer::new().place(&source, &dest).await.unwrap();

        assert_eq!(placed.destination, dest);
        assert_eq!(placed.size_bytes, 11);
        assert!(dest.exists());
        assert!(!source.exists());
    }

    #[tokio::test]
    async fn test_place_missing_source() {
        let temp = TempDir::new().unwrap();
        let result = FsPlacer::new()
            .place(&temp.path().join("nope.mkv"), &temp.path().join("out.mkv"))
            .await;
        assert!(matches!(result, Err(PlacerError::SourceNotFound { .. })));
    }

    #[tokio::test]
    async fn test_copy_then_delete_verifies_checksum() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.mkv");
        let dest = temp.path().join("dest.mkv");
        fs::write(&source, "test content for checksum").await.unwrap();

        let placer = FsPlacer::new().with_buffer_size(4);
        let (size, checksum) = placer.copy_then_delete(&source, &dest).await.unwrap();

        assert_eq!(size, 25);
        assert_eq!(checksum.unwrap(), placer.checksum(&dest).await.unwrap());
        assert!(!source.exists());
        assert_eq!(
            fs::read_to_string(&dest).await.unwrap(),
            "test content for checksum"
        );
    }

    #[tokio::test]
    async fn test_place_overwrites_existing_destination() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.mkv");
        let dest = temp.path().join("out.mkv");
        fs::write(&source, "new").await.unwrap();
        fs::write(&dest, "old").await.unwrap();

        FsPlacer::new().place(&source, &dest).await.unwrap();
        assert_eq!(fs::read_to_string(&dest).await.unwrap(), "new");
    }
}
