pub mod config;
pub mod drive;
pub mod encoder;
pub mod external_catalog;
pub mod identify;
pub mod job;
pub mod metrics;
pub mod notify;
pub mod placer;
pub mod ripper;
pub mod stages;
pub mod testing;
pub mod vision;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use job::{
    CollectionLog, ContentMode, CreateJobRequest, Job, JobError, JobFilter, JobStatus, JobStore,
    ModeSettings, SqliteJobStore,
};
pub use notify::{create_event_system, EventHandle, PipelineEvent};
pub use stages::{Orchestrator, PipelineBackends, ReviewActions, ReviewError};
