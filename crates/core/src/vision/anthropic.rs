//! Anthropic messages API with image content blocks.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{parse_ai_response, AiConfig, AiGuess, AiIdentifier, VisionError};
use crate::metrics;

const MAX_IMAGES: usize = 4;
const MAX_TOKENS: u32 = 500;

/// AI identifier backed by a Claude vision model.
pub struct AnthropicVision {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl AnthropicVision {
    pub fn new(config: AiConfig) -> Result<Self, VisionError> {
        if config.api_key.is_empty() {
            return Err(VisionError::NotConfigured(
                "Anthropic API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key,
            model: config.model,
            api_base: config
                .base_url
                .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn media_type(path: &Path) -> &'static str {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        }
    }

    async fn load_images(screenshots: &[PathBuf]) -> Vec<ContentBlock> {
        let mut blocks = Vec::new();
        for path in screenshots.iter().take(MAX_IMAGES) {
            match tokio::fs::read(path).await {
                Ok(bytes) => blocks.push(ContentBlock::Image {
                    source: ImageSource {
                        source_type: "base64",
                        media_type: Self::media_type(path),
                        data: base64::engine::general_purpose::STANDARD.encode(bytes),
                    },
                }),
                Err(e) => warn!("Failed to load screenshot {}: {}", path.display(), e),
            }
        }
        blocks
    }

    fn prompt(label: &str) -> String {
        format!(
            r#"I need help identifying a movie or TV show from these screenshots.

The disc label was: "{label}"

Based on the screenshots and disc label, identify this content. Look at visual style, recognizable actors or settings, genre indicators and any visible text or credits.

Respond in this exact format:
TITLE: [exact title of the movie or TV show]
YEAR: [release year, or "unknown" if unsure]
TYPE: [MOVIE or TV]
CONFIDENCE: [HIGH, MEDIUM, or LOW]
REASONING: [brief explanation]

If you cannot identify the content, respond with:
TITLE: unknown
YEAR: unknown
TYPE: unknown
CONFIDENCE: LOW
REASONING: [what you can tell about the content]"#
        )
    }

    async fn request(&self, content: Vec<ContentBlock>) -> Result<String, VisionError> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user",
                content,
            }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(VisionError::Api { status, message });
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        Ok(parsed
            .content
            .into_iter()
            .filter(|c| c.content_type == "text")
            .filter_map(|c| c.text)
            .collect::<Vec<_>>()
            .join(""))
    }
}

#[async_trait]
impl AiIdentifier for AnthropicVision {
    async fn identify(
        &self,
        label: &str,
        screenshots: &[PathBuf],
    ) -> Result<Option<AiGuess>, VisionError> {
        let mut content = Self::load_images(screenshots).await;
        if content.is_empty() {
            return Err(VisionError::NoScreenshots);
        }
        content.push(ContentBlock::Text {
            text: Self::prompt(label),
        });

        let started = Instant::now();
        let result = self.request(content).await;

        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["anthropic", "identify", outcome])
            .inc();
        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["anthropic", "identify"])
            .observe(started.elapsed().as_secs_f64());

        let guess = parse_ai_response(&result?);
        info!(
            "AI identified '{}' as {:?} ({:?}), confidence {:.2}",
            label, guess.title, guess.year, guess.confidence
        );
        Ok(guess.title.is_some().then_some(guess))
    }
}

// ============================================================================
// API types
// ============================================================================

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentBlock {
    Image { source: ImageSource },
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: &'static str,
    media_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(key: &str) -> AiConfig {
        AiConfig {
            api_key: key.to_string(),
            model: "claude-test".to_string(),
            base_url: Some("http://127.0.0.1:9".to_string()),
        }
    }

    #[test]
    fn test_requires_api_key() {
        assert!(matches!(
            AnthropicVision::new(config("")),
            Err(VisionError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_media_type_from_extension() {
        assert_eq!(AnthropicVision::media_type(Path::new("a.PNG")), "image/png");
        assert_eq!(AnthropicVision::media_type(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(AnthropicVision::media_type(Path::new("noext")), "image/jpeg");
    }

    #[test]
    fn test_content_block_serialization() {
        let block = ContentBlock::Image {
            source: ImageSource {
                source_type: "base64",
                media_type: "image/jpeg",
                data: "AAAA".to_string(),
            },
        };
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["source"]["type"], "base64");
        assert_eq!(json["source"]["media_type"], "image/jpeg");

        let text = serde_json::to_value(ContentBlock::Text {
            text: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(text["type"], "text");
        assert_eq!(text["text"], "hi");
    }

    #[tokio::test]
    async fn test_load_images_caps_at_four() {
        let dir = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..6)
            .map(|i| {
                let p = dir.path().join(format!("screenshot_{:02}.jpg", i));
                std::fs::write(&p, b"\xff\xd8\xff").unwrap();
                p
            })
            .collect();

        let blocks = AnthropicVision::load_images(&paths).await;
        assert_eq!(blocks.len(), 4);
    }

    #[tokio::test]
    async fn test_identify_without_screenshots() {
        let vision = AnthropicVision::new(config("sk-test")).unwrap();
        let err = vision.identify("LABEL", &[]).await.unwrap_err();
        assert!(matches!(err, VisionError::NoScreenshots));
    }
}
