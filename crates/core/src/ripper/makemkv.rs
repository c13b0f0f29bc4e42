//! `makemkvcon` ripping backend.
//!
//! Robot mode (`-r`) output is line oriented:
//! - `TINFO:title,attribute,code,"value"` describes titles
//! - `MSG:code,flags,count,"message",...` carries diagnostics
//! - `PRGV:current,total,max` reports progress

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::SystemTime;

use async_trait::async_trait;
use regex_lite::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::{RipProgress, Ripper, RipperError, TitleInfo};

const ATTR_CHAPTERS: u32 = 8;
const ATTR_DURATION: u32 = 9;
const ATTR_SIZE_BYTES: u32 = 10;
const ATTR_SIZE_FORMATTED: u32 = 11;
const ATTR_FILENAME: u32 = 27;

/// Messages that show up on every run and carry no diagnostic value.
const ROUTINE_MESSAGES: &[&str] = &[
    "started",
    "opened in os access mode",
    "operation successfully",
];

/// Ripper backed by the MakeMKV command line tool.
pub struct MakeMkvRipper {
    makemkvcon_path: PathBuf,
}

impl MakeMkvRipper {
    pub fn new(makemkvcon_path: impl Into<PathBuf>) -> Self {
        Self {
            makemkvcon_path: makemkvcon_path.into(),
        }
    }

    /// MakeMKV source argument for a drive.
    ///
    /// Numeric drive ids are 1-based `drutil` indexes while MakeMKV counts
    /// from 0. Anything else is treated as a device path.
    pub fn source_for(drive_id: &str) -> String {
        match drive_id.parse::<u32>() {
            Ok(n) => format!("disc:{}", n.saturating_sub(1)),
            Err(_) => format!("dev:{}", drive_id),
        }
    }

    /// Parse `H:MM:SS` or `MM:SS` into seconds.
    pub fn parse_duration(value: &str) -> u64 {
        let parts: Vec<u64> = match value.split(':').map(|p| p.trim().parse()).collect() {
            Ok(parts) => parts,
            Err(_) => return 0,
        };
        match parts.as_slice() {
            [h, m, s] => h * 3600 + m * 60 + s,
            [m, s] => m * 60 + s,
            _ => 0,
        }
    }

    /// Parse a size such as `4.7 GB`, `700 MB` or a plain byte count.
    pub fn parse_size(value: &str) -> u64 {
        let value = value.trim();
        if let Ok(bytes) = value.parse::<u64>() {
            return bytes;
        }

        let Some(caps) = Regex::new(r"(?i)^([\d.]+)\s*(GB|MB|KB|B)")
            .ok()
            .and_then(|re| re.captures(value))
        else {
            return 0;
        };

        let number: f64 = caps[1].parse().unwrap_or(0.0);
        let multiplier = match caps[2].to_ascii_uppercase().as_str() {
            "GB" => 1024.0 * 1024.0 * 1024.0,
            "MB" => 1024.0 * 1024.0,
            "KB" => 1024.0,
            _ => 1.0,
        };
        (number * multiplier) as u64
    }

    /// Collect titles from `makemkvcon info` output, ordered by index.
    pub fn parse_title_info(output: &str) -> Vec<TitleInfo> {
        let mut titles: BTreeMap<u32, TitleInfo> = BTreeMap::new();

        for line in output.lines() {
            let Some(rest) = line.strip_prefix("TINFO:") else {
                continue;
            };
            let parts: Vec<&str> = rest.splitn(4, ',').collect();
            if parts.len() < 4 {
                continue;
            }
            let (Ok(index), Ok(attr)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) else {
                continue;
            };
            let value = parts[3].trim().trim_matches('"');

            let title = titles.entry(index).or_insert_with(|| TitleInfo {
                index,
                duration_secs: 0,
                size_bytes: 0,
                chapters: 0,
                filename: String::new(),
            });

            match attr {
                ATTR_CHAPTERS => title.chapters = value.parse().unwrap_or(0),
                ATTR_DURATION => title.duration_secs = Self::parse_duration(value),
                ATTR_SIZE_BYTES => title.size_bytes = Self::parse_size(value),
                ATTR_SIZE_FORMATTED if title.size_bytes == 0 => {
                    title.size_bytes = Self::parse_size(value)
                }
                ATTR_FILENAME => title.filename = value.to_string(),
                _ => {}
            }
        }

        titles.into_values().collect()
    }

    /// Text of a single `MSG:` line.
    fn message_text(line: &str) -> Option<String> {
        let rest = line.strip_prefix("MSG:")?;
        let quoted = rest.splitn(4, ',').nth(3)?;
        let text = quoted
            .trim()
            .trim_start_matches('"')
            .split("\",\"")
            .next()?
            .trim_end_matches('"');
        Some(text.to_string())
    }

    /// Diagnostic messages from robot output, routine chatter removed.
    pub fn parse_messages(output: &str) -> Vec<String> {
        output
            .lines()
            .filter_map(Self::message_text)
            .filter(|msg| {
                let lower = msg.to_lowercase();
                !ROUTINE_MESSAGES.iter().any(|r| lower.contains(r))
            })
            .collect()
    }

    /// Fraction complete from a `PRGV:` line.
    pub fn parse_progress(line: &str) -> Option<f32> {
        let rest = line.strip_prefix("PRGV:")?;
        let parts: Vec<&str> = rest.trim().split(',').collect();
        if parts.len() < 3 {
            return None;
        }
        let current: f32 = parts[0].parse().ok()?;
        let max: f32 = parts[2].parse().ok()?;
        (max > 0.0).then(|| (current / max).clamp(0.0, 1.0))
    }

    /// Most recently modified `.mkv` in `dir`.
    async fn newest_mkv(dir: &Path) -> Result<Option<PathBuf>, std::io::Error> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_mkv = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mkv"));
            if !is_mkv {
                continue;
            }
            let modified = entry
                .metadata()
                .await?
                .modified()
                .unwrap_or(SystemTime::UNIX_EPOCH);
            match &newest {
                Some((t, _)) if *t >= modified => {}
                _ => newest = Some((modified, path)),
            }
        }

        Ok(newest.map(|(_, path)| path))
    }

    fn tail(messages: &[String], n: usize) -> String {
        messages[messages.len().saturating_sub(n)..].join("; ")
    }
}

#[async_trait]
impl Ripper for MakeMkvRipper {
    async fn list_titles(&self, drive_id: &str) -> Result<Vec<TitleInfo>, RipperError> {
        let source = Self::source_for(drive_id);
        debug!("Reading disc info from {}", source);

        let output = Command::new(&self.makemkvcon_path)
            .args(["-r", "info", &source])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| RipperError::DiscRead {
                device: drive_id.to_string(),
                details: format!("Failed to run makemkvcon: {}", e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let titles = Self::parse_title_info(&stdout);

        if titles.is_empty() {
            let messages = Self::parse_messages(&stdout);
            if !messages.is_empty() {
                warn!("MakeMKV messages for drive {}: {:?}", drive_id, messages);
            }
            let details = if messages.is_empty() {
                "No titles found on disc".to_string()
            } else {
                format!("No titles found on disc: {}", messages.join("; "))
            };
            return Err(RipperError::DiscRead {
                device: drive_id.to_string(),
                details,
            });
        }

        Ok(titles)
    }

    async fn rip(
        &self,
        drive_id: &str,
        title_index: u32,
        out_dir: &Path,
        progress: Option<mpsc::Sender<RipProgress>>,
    ) -> Result<PathBuf, RipperError> {
        tokio::fs::create_dir_all(out_dir).await?;
        let source = Self::source_for(drive_id);
        let rip_error = |details: String| RipperError::Rip {
            device: drive_id.to_string(),
            title_index,
            details,
        };

        let mut child = Command::new(&self.makemkvcon_path)
            .args(["-r", "--progress=-same", "mkv", &source])
            .arg(title_index.to_string())
            .arg(out_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| rip_error("makemkvcon stdout was not captured".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut messages = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if let Some(fraction) = Self::parse_progress(&line) {
                if let Some(tx) = &progress {
                    let _ = tx.try_send(RipProgress { fraction });
                }
            } else if let Some(msg) = Self::message_text(&line) {
                messages.push(msg);
            }
        }

        let status = child.wait().await?;
        if !status.success() {
            let details = if messages.is_empty() {
                "no details".to_string()
            } else {
                Self::tail(&messages, 5)
            };
            error!(
                "makemkvcon exited with {:?} for drive {}: {}",
                status.code(),
                drive_id,
                details
            );
            return Err(rip_error(format!(
                "makemkvcon exited with {:?}: {}",
                status.code(),
                details
            )));
        }

        match Self::newest_mkv(out_dir).await? {
            Some(path) => Ok(path),
            None => {
                let details = if messages.is_empty() {
                    "No MKV file produced".to_string()
                } else {
                    format!("No MKV file produced: {}", Self::tail(&messages, 10))
                };
                Err(rip_error(details))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_source_for_drive() {
        assert_eq!(MakeMkvRipper::source_for("1"), "disc:0");
        assert_eq!(MakeMkvRipper::source_for("2"), "disc:1");
        assert_eq!(MakeMkvRipper::source_for("0"), "disc:0");
        assert_eq!(MakeMkvRipper::source_for("/dev/disk4"), "dev:/dev/disk4");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(MakeMkvRipper::parse_duration("1:45:30"), 6330);
        assert_eq!(MakeMkvRipper::parse_duration("05:00"), 300);
        assert_eq!(MakeMkvRipper::parse_duration("garbage"), 0);
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(MakeMkvRipper::parse_size("1024"), 1024);
        assert_eq!(MakeMkvRipper::parse_size("1024 KB"), 1024 * 1024);
        assert_eq!(MakeMkvRipper::parse_size("2 gb"), 2 * 1024 * 1024 * 1024);
        assert_eq!(MakeMkvRipper::parse_size("n/a"), 0);
    }

    #[test]
    fn test_parse_title_info() {
        let output = r#"CINFO:2,0,"THE_MATRIX"
TINFO:0,8,0,"28"
TINFO:0,9,0,"2:16:17"
TINFO:0,10,0,"7516192768"
TINFO:0,27,0,"title00.mkv"
TINFO:1,9,0,"0:05:00"
TINFO:1,11,0,"700 MB"
TINFO:1,27,0,"title01.mkv"
"#;
        let titles = MakeMkvRipper::parse_title_info(output);
        assert_eq!(titles.len(), 2);
        assert_eq!(titles[0].index, 0);
        assert_eq!(titles[0].chapters, 28);
        assert_eq!(titles[0].duration_secs, 8177);
        assert_eq!(titles[0].size_bytes, 7516192768);
        assert_eq!(titles[0].filename, "title00.mkv");
        assert_eq!(titles[1].size_bytes, 700 * 1024 * 1024);
    }

    #[test]
    fn test_formatted_size_does_not_override_bytes() {
        let output = "TINFO:0,10,0,\"100\"\nTINFO:0,11,0,\"4.7 GB\"\n";
        let titles = MakeMkvRipper::parse_title_info(output);
        assert_eq!(titles[0].size_bytes, 100);
    }

    #[test]
    fn test_parse_messages_skips_routine() {
        let output = r#"MSG:1005,0,1,"MakeMKV v1.17.5 started","%1 started","MakeMKV v1.17.5"
MSG:2003,0,3,"Error 'Scsi error' occurred while reading","%1","x"
MSG:5010,0,0,"Failed to open disc","Failed to open disc"
"#;
        let messages = MakeMkvRipper::parse_messages(output);
        assert_eq!(
            messages,
            vec![
                "Error 'Scsi error' occurred while reading".to_string(),
                "Failed to open disc".to_string()
            ]
        );
    }

    #[test]
    fn test_parse_progress() {
        assert_eq!(MakeMkvRipper::parse_progress("PRGV:32768,0,65536"), Some(0.5));
        assert_eq!(MakeMkvRipper::parse_progress("PRGV:1,1,0"), None);
        assert_eq!(MakeMkvRipper::parse_progress("PRGC:5017,0,\"Saving\""), None);
    }

    #[tokio::test]
    async fn test_newest_mkv_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("title00.mkv"), b"x").unwrap();

        let found = MakeMkvRipper::newest_mkv(dir.path()).await.unwrap();
        assert_eq!(found, Some(dir.path().join("title00.mkv")));
    }

    #[tokio::test]
    async fn test_missing_binary_is_disc_read_error() {
        let ripper = MakeMkvRipper::new("/nonexistent/makemkvcon");
        let err = ripper.list_titles("1").await.unwrap_err();
        assert!(matches!(err, RipperError::DiscRead { .. }));
    }
}
