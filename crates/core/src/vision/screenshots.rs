//! Frame extraction with ffmpeg/ffprobe.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::ScreenshotExtractor;

/// Frame positions as fractions of runtime, clear of opening and closing credits.
const FRAME_OFFSETS: [f64; 4] = [0.15, 0.35, 0.55, 0.75];

/// Screenshot extractor that shells out to ffmpeg.
pub struct FfmpegScreenshotter {
    ffmpeg_path: PathBuf,
    ffprobe_path: PathBuf,
}

impl FfmpegScreenshotter {
    pub fn new(ffmpeg_path: impl Into<PathBuf>, ffprobe_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Seek positions in seconds for a video of `duration` seconds.
    pub fn timestamps(duration: f64) -> Vec<f64> {
        FRAME_OFFSETS.iter().map(|o| duration * o).collect()
    }

    async fn duration(&self, video: &Path) -> Option<f64> {
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(video)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| warn!("Failed to run ffprobe: {}", e))
            .ok()?;

        if !output.status.success() {
            return None;
        }
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| *d > 0.0)
    }

    async fn grab_frame(&self, video: &Path, at: f64, out: &Path) -> bool {
        let result = Command::new(&self.ffmpeg_path)
            .args(["-y", "-ss", &format!("{:.3}", at), "-i"])
            .arg(video)
            .args(["-vframes", "1", "-q:v", "2", "-vf", "scale='min(1280,iw)':-1"])
            .arg(out)
            .stdin(Stdio::null())
            .output()
            .await;

        match result {
            Ok(output) if output.status.success() && out.exists() => true,
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                warn!(
                    "ffmpeg failed to grab frame at {:.1}s: {}",
                    at,
                    stderr.chars().take(200).collect::<String>()
                );
                false
            }
            Err(e) => {
                warn!("Failed to run ffmpeg: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl ScreenshotExtractor for FfmpegScreenshotter {
    async fn extract(&self, video: &Path, out_dir: &Path) -> Vec<PathBuf> {
        if !video.exists() {
            warn!("Video file not found: {}", video.display());
            return Vec::new();
        }

        let Some(duration) = self.duration(video).await else {
            warn!("Could not determine duration of {}", video.display());
            return Vec::new();
        };

        if let Err(e) = tokio::fs::create_dir_all(out_dir).await {
            warn!("Failed to create {}: {}", out_dir.display(), e);
            return Vec::new();
        }

        let mut frames = Vec::new();
        for (i, at) in Self::timestamps(duration).into_iter().enumerate() {
            let out = out_dir.join(format!("screenshot_{:02}.jpg", i + 1));
            if self.grab_frame(video, at, &out).await {
                debug!("Extracted frame at {:.1}s to {}", at, out.display());
                frames.push(out);
            }
        }

        info!(
            "Extracted {}/{} screenshots from {}",
            frames.len(),
            FRAME_OFFSETS.len(),
            video.display()
        );
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_timestamps() {
        let ts = FfmpegScreenshotter::timestamps(100.0);
        assert_eq!(ts.len(), 4);
        assert!((ts[0] - 15.0).abs() < 1e-9);
        assert!((ts[3] - 75.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_video_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let shots = FfmpegScreenshotter::new("ffmpeg", "ffprobe")
            .extract(&dir.path().join("missing.mkv"), dir.path())
            .await;
        assert!(shots.is_empty());
    }

    #[tokio::test]
    async fn test_missing_tools_yield_nothing() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("movie.mkv");
        std::fs::write(&video, b"not a video").unwrap();

        let shots = FfmpegScreenshotter::new("/nonexistent/ffmpeg", "/nonexistent/ffprobe")
            .extract(&video, &dir.path().join("screenshots"))
            .await;
        assert!(shots.is_empty());
    }
}
