//! AI-assisted identification from video frames.
//!
//! Used only as a fallback when metadata search finds nothing for a label.

mod anthropic;
mod screenshots;

pub use anthropic::AnthropicVision;
pub use screenshots::FfmpegScreenshotter;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the vision backends.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No usable screenshots")]
    NoScreenshots,

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

/// Anthropic vision configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL (default: https://api.anthropic.com).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Best guess returned by an AI identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct AiGuess {
    pub title: Option<String>,
    pub year: Option<i32>,
    /// Self-reported confidence mapped to 0.0 - 1.0.
    pub confidence: f64,
    pub is_movie: bool,
}

/// Identifies content from a disc label and a handful of frames.
#[async_trait]
pub trait AiIdentifier: Send + Sync {
    /// Returns `Ok(None)` when the backend has no answer.
    async fn identify(
        &self,
        label: &str,
        screenshots: &[PathBuf],
    ) -> Result<Option<AiGuess>, VisionError>;
}

/// Grabs still frames from a video file.
#[async_trait]
pub trait ScreenshotExtractor: Send + Sync {
    /// Write frames into `out_dir` and return the paths that were produced.
    ///
    /// An empty list means no frames could be taken.
    async fn extract(&self, video: &Path, out_dir: &Path) -> Vec<PathBuf>;
}

/// Map a `CONFIDENCE:` word to a score.
pub fn confidence_from_word(word: &str) -> f64 {
    match word.to_ascii_uppercase().as_str() {
        "HIGH" => 0.85,
        "MEDIUM" => 0.6,
        "LOW" => 0.3,
        _ => 0.5,
    }
}

/// Parse the line-oriented answer the vision prompt asks for.
///
/// A `TITLE: unknown` answer yields a guess without a title.
pub fn parse_ai_response(text: &str) -> AiGuess {
    let capture = |pattern: &str| {
        Regex::new(pattern)
            .ok()
            .and_then(|re| re.captures(text))
            .and_then(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
    };

    let title = capture(r"(?im)^\s*TITLE:\s*(.+?)\s*$")
        .filter(|t| !t.is_empty() && !t.eq_ignore_ascii_case("unknown"));

    let year = capture(r"(?i)YEAR:\s*(\d{4}|unknown)").and_then(|y| y.parse().ok());

    let is_movie = capture(r"(?i)TYPE:\s*(MOVIE|TV|unknown)")
        .map(|t| !t.eq_ignore_ascii_case("tv"))
        .unwrap_or(true);

    let confidence = capture(r"(?i)CONFIDENCE:\s*(HIGH|MEDIUM|LOW)")
        .map(|c| confidence_from_word(&c))
        .unwrap_or(0.5);

    AiGuess {
        title,
        year,
        confidence,
        is_movie,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_response() {
        let text = "TITLE: The Matrix\nYEAR: 1999\nTYPE: MOVIE\nCONFIDENCE: HIGH\nREASONING: green code";
        let guess = parse_ai_response(text);
        assert_eq!(guess.title.as_deref(), Some("The Matrix"));
        assert_eq!(guess.year, Some(1999));
        assert!(guess.is_movie);
        assert_eq!(guess.confidence, 0.85);
    }

    #[test]
    fn test_parse_unknown_response() {
        let text = "TITLE: unknown\nYEAR: unknown\nTYPE: unknown\nCONFIDENCE: LOW\nREASONING: dark frames";
        let guess = parse_ai_response(text);
        assert!(guess.title.is_none());
        assert!(guess.year.is_none());
        assert_eq!(guess.confidence, 0.3);
    }

    #[test]
    fn test_parse_tv_and_missing_confidence() {
        let guess = parse_ai_response("title: Firefly\ntype: tv");
        assert_eq!(guess.title.as_deref(), Some("Firefly"));
        assert!(!guess.is_movie);
        assert_eq!(guess.confidence, 0.5);
    }

    #[test]
    fn test_confidence_words() {
        assert_eq!(confidence_from_word("medium"), 0.6);
        assert_eq!(confidence_from_word("???"), 0.5);
    }

    #[test]
    fn test_ai_config_default_model() {
        let config: AiConfig = toml::from_str(r#"api_key = "sk-test""#).unwrap();
        assert_eq!(config.model, "claude-sonnet-4-20250514");
        assert!(config.base_url.is_none());
    }
}
