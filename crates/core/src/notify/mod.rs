//! Fire-and-forget pipeline events.
//!
//! Stages emit through an [`EventHandle`]; an [`EventDispatcher`] task fans
//! each event out to the configured [`EventSink`]s. A failing sink is logged
//! and never feeds back into job state.

mod dispatcher;
mod events;
mod handle;
mod pushover;

pub use dispatcher::{create_event_system, EventDispatcher, EventSink};
pub use events::PipelineEvent;
pub use handle::{EventEnvelope, EventHandle};
pub use pushover::{PushoverConfig, PushoverMessage, PushoverNotifier};

use thiserror::Error;

/// Errors raised by event sinks.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Notification rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Not configured: {0}")]
    NotConfigured(String),
}
