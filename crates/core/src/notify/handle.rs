use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::PipelineEvent;

/// Event plus the time it was emitted.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: PipelineEvent,
}

/// Handle for emitting pipeline events.
///
/// Cheap to clone. Sending never fails the caller; errors are only logged.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    fn envelope(event: PipelineEvent) -> EventEnvelope {
        EventEnvelope {
            timestamp: Utc::now(),
            event,
        }
    }

    /// Emit an event, waiting for channel capacity.
    pub async fn emit(&self, event: PipelineEvent) {
        if let Err(e) = self.tx.send(Self::envelope(event)).await {
            tracing::error!("Failed to emit pipeline event: {}", e);
        }
    }

    /// Emit without waiting. Returns false if the event was dropped.
    pub fn try_emit(&self, event: PipelineEvent) -> bool {
        match self.tx.try_send(Self::envelope(event)) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to emit pipeline event: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn review(job_id: i64) -> PipelineEvent {
        PipelineEvent::ReviewNeeded {
            job_id,
            disc_label: "LABEL".to_string(),
            confidence: 0.4,
        }
    }

    #[tokio::test]
    async fn test_emit_event() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = EventHandle::new(tx);

        handle.emit(review(1)).await;

        let envelope = rx.recv().await.expect("Should receive event");
        assert_eq!(envelope.event.job_id(), 1);
    }

    #[test]
    fn test_try_emit_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = EventHandle::new(tx);

        assert!(handle.try_emit(review(1)));
        assert!(!handle.try_emit(review(2)));
    }

    #[tokio::test]
    async fn test_emit_closed_channel() {
        let (tx, rx) = mpsc::channel::<EventEnvelope>(10);
        let handle = EventHandle::new(tx);
        drop(rx);

        // logged, not propagated
        handle.emit(review(1)).await;
    }
}
