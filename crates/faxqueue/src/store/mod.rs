//! Job store contract and its backends.
//!
//! The dispatch engine only ever sees `dyn JobStore`. Each operation is
//! individually atomic; there is no cross-operation transaction.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::DatabaseError;
use crate::job::{Job, JobStatus, NewJob, QueueStatus};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryJobStore;
pub use sqlite::SqliteJobStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("Job store lock poisoned")]
    LockPoisoned,
}

pub trait JobStore: Send + Sync {
    /// Validates and inserts a new Pending job.
    fn create(&self, new_job: NewJob) -> Result<Job, StoreError>;

    /// Sets status and error message (`None` clears it) and refreshes
    /// `updated_at`.
    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError>;

    fn update_artifact_path(&self, id: &str, path: &str) -> Result<(), StoreError>;

    fn get(&self, id: &str) -> Result<Option<Job>, StoreError>;

    /// All jobs, oldest `created_at` first, ties in insertion order.
    fn list(&self) -> Result<Vec<Job>, StoreError>;

    /// Atomically moves a job from Pending to Processing. Returns `false`
    /// if the job was no longer Pending.
    fn claim(&self, id: &str) -> Result<bool, StoreError>;

    /// Error -> Pending with the error message cleared. Returns `false` for
    /// jobs that are missing or not in Error.
    fn retry(&self, id: &str) -> Result<bool, StoreError>;

    fn retry_all_errors(&self) -> Result<usize, StoreError>;

    fn clear_completed(&self) -> Result<usize, StoreError>;

    fn clear_all(&self) -> Result<usize, StoreError>;

    /// Moves Processing jobs not updated since `cutoff` to Error.
    fn reclaim_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    fn queue_status(&self) -> Result<QueueStatus, StoreError> {
        let mut status = QueueStatus::default();
        for job in self.list()? {
            status.count(job.status);
        }
        Ok(status)
    }
}

pub(crate) const STALE_PROCESSING_MESSAGE: &str =
    "Processing was interrupted before completion; retry to send again";
