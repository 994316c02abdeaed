//! Job store persisted in SQLite.

use chrono::{DateTime, Utc};

use super::{JobStore, StoreError, STALE_PROCESSING_MESSAGE};
use crate::db::job_repo::{self, format_timestamp, JobRow};
use crate::db::Database;
use crate::job::{Job, JobStatus, NewJob, QueueStatus};

/// Durable job store backed by a [`Database`] handle.
#[derive(Clone)]
pub struct SqliteJobStore {
    db: Database,
}

impl SqliteJobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn now() -> String {
        format_timestamp(Utc::now())
    }
}

fn expect_row(id: &str, changed: usize) -> Result<(), StoreError> {
    if changed == 0 {
        log::warn!("No job row with id {}", id);
        return Err(StoreError::NotFound(id.to_string()));
    }
    Ok(())
}

impl JobStore for SqliteJobStore {
    fn create(&self, new_job: NewJob) -> Result<Job, StoreError> {
        new_job.validate().map_err(StoreError::InvalidJob)?;
        let row = JobRow::from_job(&new_job.into_job());
        job_repo::insert(&self.db, &row)?;
        // Re-read through the row so timestamps carry stored precision.
        let job = row.into_job()?;
        log::debug!("Created job {} for {}", job.id, job.destination);
        Ok(job)
    }

    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let changed =
            job_repo::update_status(&self.db, id, status.code(), error_message, &Self::now())?;
        expect_row(id, changed)
    }

    fn update_artifact_path(&self, id: &str, path: &str) -> Result<(), StoreError> {
        let changed = job_repo::update_artifact_path(&self.db, id, path, &Self::now())?;
        expect_row(id, changed)
    }

    fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        match job_repo::find_by_id(&self.db, id)? {
            Some(row) => Ok(Some(row.into_job()?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<Job>, StoreError> {
        let mut jobs = Vec::new();
        for row in job_repo::list(&self.db)? {
            let id = row.id.clone();
            match row.into_job() {
                Ok(job) => jobs.push(job),
                // One bad row must not hide the rest of the queue.
                Err(e) => log::error!("Skipping unreadable job row {}: {}", id, e),
            }
        }
        Ok(jobs)
    }

    fn claim(&self, id: &str) -> Result<bool, StoreError> {
        Ok(job_repo::transition(
            &self.db,
            id,
            JobStatus::Pending.code(),
            JobStatus::Processing.code(),
            &Self::now(),
        )?)
    }

    fn retry(&self, id: &str) -> Result<bool, StoreError> {
        Ok(job_repo::transition(
            &self.db,
            id,
            JobStatus::Error.code(),
            JobStatus::Pending.code(),
            &Self::now(),
        )?)
    }

    fn retry_all_errors(&self) -> Result<usize, StoreError> {
        Ok(job_repo::transition_all(
            &self.db,
            JobStatus::Error.code(),
            JobStatus::Pending.code(),
            &Self::now(),
        )?)
    }

    fn clear_completed(&self) -> Result<usize, StoreError> {
        Ok(job_repo::delete_by_status(
            &self.db,
            JobStatus::Completed.code(),
        )?)
    }

    fn clear_all(&self) -> Result<usize, StoreError> {
        Ok(job_repo::delete_all(&self.db)?)
    }

    fn reclaim_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        Ok(job_repo::fail_stale_processing(
            &self.db,
            JobStatus::Processing.code(),
            JobStatus::Error.code(),
            &format_timestamp(cutoff),
            STALE_PROCESSING_MESSAGE,
            &Self::now(),
        )?)
    }

    fn queue_status(&self) -> Result<QueueStatus, StoreError> {
        let mut status = QueueStatus::default();
        for (code, count) in job_repo::count_by_status(&self.db)? {
            match JobStatus::from_code(code) {
                Some(JobStatus::Pending) => status.pending = count,
                Some(JobStatus::Processing) => status.processing = count,
                Some(JobStatus::Completed) => status.completed = count,
                Some(JobStatus::Error) => status.error = count,
                None => log::warn!("Ignoring {} jobs with unknown status {}", count, code),
            }
        }
        Ok(status)
    }
}
