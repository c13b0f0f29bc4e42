use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{EventEnvelope, EventHandle, NotifyError};

/// A consumer of pipeline events.
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self, envelope: &EventEnvelope) -> Result<(), NotifyError>;
}

/// Background task that drains the event channel into every sink.
pub struct EventDispatcher {
    rx: mpsc::Receiver<EventEnvelope>,
    sinks: Vec<Arc<dyn EventSink>>,
}

impl EventDispatcher {
    pub fn new(rx: mpsc::Receiver<EventEnvelope>, sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { rx, sinks }
    }

    /// Run until every [`EventHandle`] has been dropped.
    pub async fn run(mut self) {
        tracing::info!("Event dispatcher started with {} sink(s)", self.sinks.len());

        while let Some(envelope) = self.rx.recv().await {
            for sink in &self.sinks {
                if let Err(e) = sink.handle(&envelope).await {
                    tracing::error!(
                        "Sink {} failed on {} for job {}: {}",
                        sink.name(),
                        envelope.event.event_type(),
                        envelope.event.job_id(),
                        e
                    );
                }
            }
        }

        tracing::info!("Event dispatcher shutting down");
    }
}

/// Create an event system.
///
/// Returns the handle to clone into stages and the dispatcher to spawn with
/// `tokio::spawn(dispatcher.run())`.
pub fn create_event_system(
    sinks: Vec<Arc<dyn EventSink>>,
    buffer_size: usize,
) -> (EventHandle, EventDispatcher) {
    let (tx, rx) = mpsc::channel(buffer_size);
    (EventHandle::new(tx), EventDispatcher::new(rx, sinks))
}
