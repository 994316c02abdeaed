//! In-process job store.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::{JobStore, StoreError, STALE_PROCESSING_MESSAGE};
use crate::job::{Job, JobStatus, NewJob};

/// Job store held entirely in memory, kept in insertion order.
#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<Vec<Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Job>> {
        match self.jobs.read() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Job>> {
        match self.jobs.write() {
            Ok(g) => g,
            Err(poisoned) => {
                log::warn!("Memory job store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn with_job<T>(&self, id: &str, f: impl FnOnce(&mut Job) -> T) -> Result<T, StoreError> {
        let mut jobs = self.write();
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(f(job))
    }
}

impl JobStore for MemoryJobStore {
    fn create(&self, new_job: NewJob) -> Result<Job, StoreError> {
        new_job.validate().map_err(StoreError::InvalidJob)?;
        let job = new_job.into_job();
        self.write().push(job.clone());
        log::debug!("Created job {} for {}", job.id, job.destination);
        Ok(job)
    }

    fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.status = status;
            job.error_message = error_message.map(str::to_string);
            job.updated_at = Utc::now();
        })
    }

    fn update_artifact_path(&self, id: &str, path: &str) -> Result<(), StoreError> {
        self.with_job(id, |job| {
            job.converted_artifact_path = Some(path.to_string());
            job.updated_at = Utc::now();
        })
    }

    fn get(&self, id: &str) -> Result<Option<Job>, StoreError> {
        Ok(self.read().iter().find(|j| j.id == id).cloned())
    }

    fn list(&self) -> Result<Vec<Job>, StoreError> {
        let mut jobs = self.read().clone();
        // Stable, so equal timestamps keep insertion order.
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }

    fn claim(&self, id: &str) -> Result<bool, StoreError> {
        let mut jobs = self.write();
        match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) if job.status == JobStatus::Pending => {
                job.status = JobStatus::Processing;
                job.error_message = None;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn retry(&self, id: &str) -> Result<bool, StoreError> {
        let mut jobs = self.write();
        match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) if job.status == JobStatus::Error => {
                job.status = JobStatus::Pending;
                job.error_message = None;
                job.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn retry_all_errors(&self) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut count = 0;
        for job in self.write().iter_mut().filter(|j| j.status == JobStatus::Error) {
            job.status = JobStatus::Pending;
            job.error_message = None;
            job.updated_at = now;
            count += 1;
        }
        Ok(count)
    }

    fn clear_completed(&self) -> Result<usize, StoreError> {
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|j| j.status != JobStatus::Completed);
        Ok(before - jobs.len())
    }

    fn clear_all(&self) -> Result<usize, StoreError> {
        let mut jobs = self.write();
        let count = jobs.len();
        jobs.clear();
        Ok(count)
    }

    fn reclaim_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let now = Utc::now();
        let mut count = 0;
        for job in self
            .write()
            .iter_mut()
            .filter(|j| j.status == JobStatus::Processing && j.updated_at < cutoff)
        {
            job.status = JobStatus::Error;
            job.error_message = Some(STALE_PROCESSING_MESSAGE.to_string());
            job.updated_at = now;
            count += 1;
        }
        Ok(count)
    }
}
