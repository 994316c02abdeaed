//! Best-effort outbound notification of job outcomes.

use std::time::Duration;

use async_trait::async_trait;

use crate::job::Job;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Failed { error_message: String },
}

/// Receives terminal outcomes for jobs that carry a callback URL.
///
/// Implementations must not fail the caller: errors are logged and dropped.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, job: &Job, url: &str, outcome: &Outcome);
}

/// Calls the job's callback URL with an HTTP GET.
#[derive(Clone)]
pub struct CallbackNotifier {
    client: reqwest::Client,
}

impl CallbackNotifier {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn call(&self, job_id: &str, url: &str, outcome: &Outcome) {
        let request = match outcome {
            Outcome::Completed => self.client.get(url),
            Outcome::Failed { error_message } => self.client.get(url).query(&[
                ("job_id", job_id),
                ("status", "error"),
                ("error_message", error_message.as_str()),
            ]),
        };

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                log::info!("Callback for job {} delivered to {}", job_id, url);
            }
            Ok(response) => {
                log::warn!(
                    "Callback for job {} to {} returned HTTP {}",
                    job_id,
                    url,
                    response.status()
                );
            }
            Err(e) if e.is_timeout() => {
                log::warn!("Callback for job {} to {} timed out", job_id, url);
            }
            Err(e) => {
                log::warn!("Callback for job {} to {} failed: {}", job_id, url, e);
            }
        }
    }
}

#[async_trait]
impl Notifier for CallbackNotifier {
    /// Returns immediately; the request runs on a detached task.
    async fn notify(&self, job: &Job, url: &str, outcome: &Outcome) {
        let notifier = self.clone();
        let job_id = job.id.clone();
        let url = url.to_string();
        let outcome = outcome.clone();
        tokio::spawn(async move {
            notifier.call(&job_id, &url, &outcome).await;
        });
    }
}

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _job: &Job, _url: &str, _outcome: &Outcome) {}
}
