//! Fax job model and its status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job status, persisted as the integer codes used by the intake side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Completed,
    Error,
    Processing,
}

impl JobStatus {
    pub fn code(self) -> i64 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Completed => 1,
            JobStatus::Error => -1,
            JobStatus::Processing => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(JobStatus::Pending),
            1 => Some(JobStatus::Completed),
            -1 => Some(JobStatus::Error),
            2 => Some(JobStatus::Processing),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Processing => "processing",
        }
    }

    /// Allowed moves:
    /// Pending -> Processing | Pending, Processing -> Completed | Error,
    /// Error -> Pending. Completed never reopens.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Pending)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Error)
                | (JobStatus::Error, JobStatus::Pending)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for JobStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        let code = i64::deserialize(deserializer)?;
        JobStatus::from_code(code)
            .ok_or_else(|| D::Error::custom(format!("Unknown job status code {}", code)))
    }
}

/// Descriptive fields carried through the lifecycle untouched.
/// Only `callback_url` is read, by the notification relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_destination: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub source_reference: String,
    pub destination: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error_message: Option<String>,
    pub converted_artifact_path: Option<String>,
    #[serde(flatten)]
    pub metadata: JobMetadata,
}

impl Job {
    pub fn callback_url(&self) -> Option<&str> {
        self.metadata
            .callback_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
    }
}

/// Intake request for a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub source_reference: String,
    pub destination: String,
    pub metadata: JobMetadata,
    /// Pre-set creation time; `None` means now.
    pub created_at: Option<DateTime<Utc>>,
}

impl NewJob {
    pub fn new(source_reference: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source_reference: source_reference.into(),
            destination: destination.into(),
            metadata: JobMetadata::default(),
            created_at: None,
        }
    }

    pub fn with_metadata(mut self, metadata: JobMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_callback(mut self, url: impl Into<String>) -> Self {
        self.metadata.callback_url = Some(url.into());
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Checks the intake invariants and returns the message for the first
    /// violation.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_reference.trim().is_empty() {
            return Err("source_reference must not be empty".to_string());
        }
        if self.destination.trim().is_empty() {
            return Err("destination must not be empty".to_string());
        }
        Ok(())
    }

    /// Builds the initial Pending record.
    pub fn into_job(self) -> Job {
        let created_at = self.created_at.unwrap_or_else(Utc::now);
        Job {
            id: uuid::Uuid::new_v4().to_string(),
            source_reference: self.source_reference,
            destination: self.destination,
            status: JobStatus::Pending,
            created_at,
            updated_at: created_at,
            error_message: None,
            converted_artifact_path: None,
            metadata: self.metadata,
        }
    }
}

/// Per-status job counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub error: u64,
}

impl QueueStatus {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.error
    }

    pub(crate) fn count(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Error => self.error += 1,
        }
    }
}
