use std::sync::Arc;

use discshelf_core::{
    stages::{Oversight, ReviewActions},
    Config, Orchestrator, SanitizedConfig, SqliteJobStore,
};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<SqliteJobStore>,
    review: ReviewActions,
    oversight: Oversight,
    orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<SqliteJobStore>,
        review: ReviewActions,
        oversight: Oversight,
        orchestrator: Arc<Orchestrator>,
    ) -> Self {
        Self {
            config,
            store,
            review,
            oversight,
            orchestrator,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    /// Job store, also the collection log and mode setting.
    pub fn store(&self) -> &SqliteJobStore {
        self.store.as_ref()
    }

    pub fn review(&self) -> &ReviewActions {
        &self.review
    }

    pub fn oversight(&self) -> &Oversight {
        &self.oversight
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        self.orchestrator.as_ref()
    }
}
