//! HandBrakeCLI encoder.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use regex_lite::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{EncodeProgress, Encoder, EncoderError};

/// Archive preset: x264 RF16 slow/film, stereo AAC 192k, chapter markers, MKV.
const PRESET_ARGS: &[&str] = &[
    "-e",
    "x264",
    "-q",
    "16",
    "--encoder-profile",
    "high",
    "--encoder-level",
    "4.0",
    "--encoder-preset",
    "slow",
    "--encoder-tune",
    "film",
    "--cfr",
    "--decomb",
    "-a",
    "1",
    "-E",
    "av_aac",
    "-B",
    "192",
    "--mixdown",
    "stereo",
    "-R",
    "auto",
    "--markers",
    "--auto-anamorphic",
    "--modulus",
    "2",
    "-f",
    "mkv",
];

const ERROR_KEYWORDS: &[&str] = &["error", "fail", "invalid", "cannot", "unable", "exception"];

/// Encoder that shells out to `HandBrakeCLI`.
pub struct HandBrakeEncoder {
    handbrake_path: PathBuf,
}

impl HandBrakeEncoder {
    pub fn new(handbrake_path: impl Into<PathBuf>) -> Self {
        Self {
            handbrake_path: handbrake_path.into(),
        }
    }

    /// Full argument list for one encode.
    pub fn build_args(input: &Path, output: &Path) -> Vec<String> {
        let mut args = vec![
            "--input".to_string(),
            input.to_string_lossy().to_string(),
            "--output".to_string(),
            output.to_string_lossy().to_string(),
        ];
        args.extend(PRESET_ARGS.iter().map(|a| a.to_string()));
        args
    }

    /// Parse an `Encoding: task 1 of 1, 45.67 % (30.5 fps, avg 29.8 fps, ETA 00h05m12s)` line.
    pub fn parse_progress(line: &str) -> Option<EncodeProgress> {
        if !line.contains("Encoding:") {
            return None;
        }

        let percent_re = Regex::new(r"(\d+\.?\d*)\s*%").ok()?;
        let percent: f32 = percent_re.captures(line)?[1].parse().ok()?;

        let fps = Regex::new(r"\((\d+\.?\d*)\s*fps")
            .ok()
            .and_then(|re| re.captures(line))
            .and_then(|caps| caps[1].parse().ok());

        let eta = Regex::new(r"ETA\s+(\d+h\d+m\d+s)")
            .ok()
            .and_then(|re| re.captures(line))
            .map(|caps| caps[1].to_string());

        Some(EncodeProgress { percent, fps, eta })
    }

    /// Pick the lines worth keeping from stderr after a failure.
    pub fn error_details(lines: &[String], max_lines: usize) -> String {
        if lines.is_empty() {
            return "No error details available".to_string();
        }

        let errors: Vec<&str> = lines
            .iter()
            .filter(|l| {
                let lower = l.to_lowercase();
                ERROR_KEYWORDS.iter().any(|kw| lower.contains(kw))
            })
            .map(String::as_str)
            .take(max_lines)
            .collect();

        if errors.is_empty() {
            lines[lines.len().saturating_sub(max_lines)..].join("\n")
        } else {
            errors.join("\n")
        }
    }
}

#[async_trait]
impl Encoder for HandBrakeEncoder {
    async fn encode(
        &self,
        input: &Path,
        output: &Path,
        progress: Option<mpsc::Sender<EncodeProgress>>,
    ) -> Result<(), EncoderError> {
        if !input.is_file() {
            return Err(EncoderError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = Self::build_args(input, output);
        debug!("Running HandBrakeCLI {:?}", args);

        // progress and errors both arrive on stderr
        let mut child = Command::new(&self.handbrake_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EncoderError::NotFound {
                        path: self.handbrake_path.clone(),
                    }
                } else {
                    EncoderError::Io(e)
                }
            })?;

        let mut stderr_lines = Vec::new();
        if let Some(stderr) = child.stderr.take() {
            let mut lines = BufReader::new(stderr).lines();
            while let Some(line) = lines.next_line().await? {
                if let (Some(tx), Some(update)) = (&progress, Self::parse_progress(&line)) {
                    let _ = tx.try_send(update);
                }
                stderr_lines.push(line);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            error!(
                "HandBrakeCLI exited with {:?} encoding {}",
                status.code(),
                input.display()
            );
            return Err(EncoderError::Failed {
                exit_code: status.code(),
                details: Self::error_details(&stderr_lines, 10),
            });
        }

        let size = match tokio::fs::metadata(output).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(EncoderError::BadOutput {
                    path: output.to_path_buf(),
                    reason: "output file was not created".to_string(),
                })
            }
        };
        if size == 0 {
            return Err(EncoderError::BadOutput {
                path: output.to_path_buf(),
                reason: "output file is empty".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_args_uses_archive_preset() {
        let args = HandBrakeEncoder::build_args(Path::new("/in/title.mkv"), Path::new("/out/x.mkv"));
        assert_eq!(&args[..4], ["--input", "/in/title.mkv", "--output", "/out/x.mkv"]);
        let joined = args.join(" ");
        assert!(joined.contains("-e x264 -q 16"));
        assert!(joined.contains("--encoder-tune film"));
        assert!(joined.contains("-E av_aac -B 192 --mixdown stereo"));
        assert!(joined.ends_with("-f mkv"));
    }

    #[test]
    fn test_parse_progress_full_line() {
        let line = "Encoding: task 1 of 1, 45.67 % (30.50 fps, avg 29.80 fps, ETA 00h05m12s)";
        let progress = HandBrakeEncoder::parse_progress(line).unwrap();
        assert!((progress.percent - 45.67).abs() < 0.001);
        assert_eq!(progress.fps, Some(30.5));
        assert_eq!(progress.eta.as_deref(), Some("00h05m12s"));
    }

    #[test]
    fn test_parse_progress_minimal_line() {
        let progress = HandBrakeEncoder::parse_progress("Encoding: task 1 of 1, 3.00 %").unwrap();
        assert_eq!(progress.percent, 3.0);
        assert!(progress.fps.is_none());
        assert!(progress.eta.is_none());
        assert!(HandBrakeEncoder::parse_progress("Muxing: this may take awhile...").is_none());
    }

    #[test]
    fn test_error_details_prefers_error_lines() {
        let lines: Vec<String> = vec![
            "[10:00:00] hb_init: starting libhb thread".into(),
            "[10:00:01] ERROR: unable to open input".into(),
            "[10:00:01] libhb: work result = 3".into(),
        ];
        let details = HandBrakeEncoder::error_details(&lines, 10);
        assert!(details.contains("unable to open input"));
        assert!(!details.contains("hb_init"));
    }

    #[test]
    fn test_error_details_falls_back_to_tail() {
        let lines: Vec<String> = (0..20).map(|i| format!("line {}", i)).collect();
        let details = HandBrakeEncoder::error_details(&lines, 3);
        assert_eq!(details, "line 17\nline 18\nline 19");
        assert_eq!(
            HandBrakeEncoder::error_details(&[], 3),
            "No error details available"
        );
    }

    #[tokio::test]
    async fn test_missing_input() {
        let dir = TempDir::new().unwrap();
        let encoder = HandBrakeEncoder::new("HandBrakeCLI");
        let err = encoder
            .encode(
                &dir.path().join("missing.mkv"),
                &dir.path().join("out.mkv"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EncoderError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("title.mkv");
        std::fs::write(&input, b"data").unwrap();

        let encoder = HandBrakeEncoder::new("/nonexistent/HandBrakeCLI");
        let err = encoder
            .encode(&input, &dir.path().join("out/x.mkv"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EncoderError::NotFound { .. }));
    }
}
