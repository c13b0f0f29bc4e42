//! Filing encoded files into the library.
//!
//! [`place_in_library`] resolves `root/Title (Year)/Title (Year).mkv` and
//! hands the actual move to a [`Placer`]. [`FsPlacer`] renames when it can and
//! falls back to a checksummed copy when the library lives on another volume.

mod error;
mod fs_placer;
mod naming;

pub use error::PlacerError;
pub use fs_placer::FsPlacer;
pub use naming::{library_destination, library_name, sanitize_filename, LIBRARY_EXTENSION};

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// A file that reached its final location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedFile {
    pub destination: PathBuf,
    pub size_bytes: u64,
    /// SHA-256 of the content, when it was copied rather than renamed.
    pub checksum: Option<String>,
}

/// Moves a single file to an exact destination path.
#[async_trait]
pub trait Placer: Send + Sync {
    /// Move `source` to `destination`, creating parent directories.
    ///
    /// An existing file at `destination` is replaced.
    async fn place(&self, source: &Path, destination: &Path) -> Result<PlacedFile, PlacerError>;
}

/// File `source` under `root` using the library naming scheme.
///
/// A missing `root` is reported as [`PlacerError::DestinationRootMissing`]
/// before anything is touched.
pub async fn place_in_library(
    placer: &dyn Placer,
    source: &Path,
    root: &Path,
    title: &str,
    year: Option<i32>,
) -> Result<PlacedFile, PlacerError> {
    if !source.is_file() {
        return Err(PlacerError::SourceNotFound {
            path: source.to_path_buf(),
        });
    }

    if !tokio::fs::metadata(root)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(PlacerError::DestinationRootMissing {
            path: root.to_path_buf(),
        });
    }

    let destination =
        library_destination(root, title, year).ok_or_else(|| PlacerError::InvalidTitle {
            title: title.to_string(),
        })?;

    placer.place(source, &destination).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_place_in_library() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("Movies");
        std::fs::create_dir(&root).unwrap();
        let source = temp.path().join("encoded.mkv");
        std::fs::write(&source, "x").unwrap();

        let placed = place_in_library(&FsPlacer::new(), &source, &root, "Alien", Some(1979))
            .await
            .unwrap();
        assert_eq!(placed.destination, root.join("Alien (1979)/Alien (1979).mkv"));
    }

    #[tokio::test]
    async fn test_missing_root_is_retryable() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("encoded.mkv");
        std::fs::write(&source, "x").unwrap();

        let err = place_in_library(
            &FsPlacer::new(),
            &source,
            &temp.path().join("Unmounted"),
            "Alien",
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_retryable());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_unusable_title() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("encoded.mkv");
        std::fs::write(&source, "x").unwrap();

        let err = place_in_library(&FsPlacer::new(), &source, temp.path(), "///", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlacerError::InvalidTitle { .. }));
        assert!(!err.is_retryable());
    }
}
