//! Recording gateways and notifiers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use faxqueue::notify::{Notifier, Outcome};
use faxqueue::{GatewayError, Job, TransmissionGateway};

/// One recorded `send` call.
#[derive(Debug, Clone)]
pub struct SentFax {
    pub file: PathBuf,
    pub destination: String,
    /// Whether the file existed when the gateway received it.
    pub file_existed: bool,
}

/// Succeeds after an optional delay, tracking overlapping calls.
pub struct CountingGateway {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    sent: Mutex<Vec<SentFax>>,
}

impl CountingGateway {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<SentFax> {
        self.sent.lock().unwrap().clone()
    }

    pub fn destinations(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.destination).collect()
    }
}

#[async_trait]
impl TransmissionGateway for CountingGateway {
    async fn send(&self, file: &Path, destination: &str) -> Result<(), GatewayError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        self.sent.lock().unwrap().push(SentFax {
            file: file.to_path_buf(),
            destination: destination.to_string(),
            file_existed: file.exists(),
        });

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Rejects the first `failures` calls with numbered messages, then succeeds.
pub struct FailingGateway {
    failures: usize,
    calls: AtomicUsize,
}

impl FailingGateway {
    pub fn always() -> Self {
        Self::first(usize::MAX)
    }

    pub fn first(failures: usize) -> Self {
        Self {
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransmissionGateway for FailingGateway {
    async fn send(&self, _file: &Path, _destination: &str) -> Result<(), GatewayError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(GatewayError::Rejected(format!("no answer (call {})", call)))
        } else {
            Ok(())
        }
    }
}

/// Records notifications instead of sending them.
#[derive(Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(String, String, Outcome)>>,
}

impl RecordingNotifier {
    /// `(job_id, url, outcome)` per notification.
    pub fn calls(&self) -> Vec<(String, String, Outcome)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, job: &Job, url: &str, outcome: &Outcome) {
        self.calls
            .lock()
            .unwrap()
            .push((job.id.clone(), url.to_string(), outcome.clone()));
    }
}
