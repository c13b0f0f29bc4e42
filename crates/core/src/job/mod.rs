//! Job records and their persistence.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{CollectionLog, CreateJobRequest, JobError, JobFilter, JobStore, ModeSettings};
pub use types::{
    CollectionItem, ContentMode, ContentType, Identification, Job, JobStatus, JobUpdate,
    NewCollectionItem,
};
