//! Event sink that keeps what it receives.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::{EventEnvelope, EventSink, NotifyError, PipelineEvent};

/// Records every pipeline event for assertions.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Arc<RwLock<Vec<PipelineEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().await.clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), NotifyError> {
        self.events.write().await.push(envelope.event.clone());
        Ok(())
    }
}
