//! Pushover push notifications.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{EventEnvelope, EventSink, NotifyError, PipelineEvent};
use crate::metrics;

const PUSHOVER_API_URL: &str = "https://api.pushover.net/1/messages.json";

/// Pushover credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushoverConfig {
    pub user_key: String,
    pub api_token: String,
    /// Link attached to review notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_ui_url: Option<String>,
    /// Override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// A rendered notification.
#[derive(Debug, Clone, PartialEq)]
pub struct PushoverMessage {
    pub title: String,
    pub message: String,
    pub priority: i8,
    pub url: Option<String>,
    pub url_title: Option<String>,
}

impl PushoverMessage {
    /// Render an event as a notification.
    pub fn for_event(event: &PipelineEvent, web_ui_url: Option<&str>) -> Self {
        match event {
            PipelineEvent::JobCompleted {
                disc_label,
                title,
                year,
                ..
            } => {
                let message = match (title, year) {
                    (Some(title), Some(year)) => {
                        format!("{} identified as {} ({})", disc_label, title, year)
                    }
                    (Some(title), None) => format!("{} identified as {}", disc_label, title),
                    (None, _) => format!("{} has been processed", disc_label),
                };
                Self {
                    title: "Disc Complete".to_string(),
                    message,
                    priority: 0,
                    url: None,
                    url_title: None,
                }
            }
            PipelineEvent::JobFailed {
                disc_label, error, ..
            } => Self {
                title: "Ripping Error".to_string(),
                message: format!("{}: {}", disc_label, error),
                priority: 1,
                url: None,
                url_title: None,
            },
            PipelineEvent::ReviewNeeded {
                disc_label,
                confidence,
                ..
            } => Self {
                title: "Review Needed".to_string(),
                message: format!(
                    "{} needs review ({:.0}% confidence)",
                    disc_label,
                    confidence * 100.0
                ),
                priority: 0,
                url: web_ui_url.map(str::to_string),
                url_title: web_ui_url.map(|_| "Open Review Queue".to_string()),
            },
        }
    }
}

/// Event sink that posts to the Pushover API.
pub struct PushoverNotifier {
    client: reqwest::Client,
    config: PushoverConfig,
}

impl PushoverNotifier {
    pub fn new(config: PushoverConfig) -> Result<Self, NotifyError> {
        if config.user_key.is_empty() || config.api_token.is_empty() {
            return Err(NotifyError::NotConfigured(
                "Pushover user key and API token are required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, config })
    }

    fn form_fields(&self, message: &PushoverMessage) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("token", self.config.api_token.clone()),
            ("user", self.config.user_key.clone()),
            ("title", message.title.clone()),
            ("message", message.message.clone()),
            ("priority", message.priority.to_string()),
        ];
        if let Some(url) = &message.url {
            fields.push(("url", url.clone()));
        }
        if let Some(url_title) = &message.url_title {
            fields.push(("url_title", url_title.clone()));
        }
        fields
    }

    async fn send(&self, message: &PushoverMessage) -> Result<(), NotifyError> {
        let form = self.form_fields(message);

        let response = self
            .client
            .post(self.config.api_url.as_deref().unwrap_or(PUSHOVER_API_URL))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for PushoverNotifier {
    fn name(&self) -> &str {
        "pushover"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), NotifyError> {
        let message =
            PushoverMessage::for_event(&envelope.event, self.config.web_ui_url.as_deref());

        let started = Instant::now();
        let result = self.send(&message).await;

        let outcome = if result.is_ok() { "success" } else { "error" };
        metrics::EXTERNAL_SERVICE_REQUESTS
            .with_label_values(&["pushover", "send", outcome])
            .inc();
        metrics::EXTERNAL_SERVICE_DURATION
            .with_label_values(&["pushover", "send"])
            .observe(started.elapsed().as_secs_f64());

        if result.is_ok() {
            tracing::debug!("Sent Pushover notification: {}", message.title);
        }
        result
    }
}
