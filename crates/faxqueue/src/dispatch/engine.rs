use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::cleanup;
use super::config::DispatchConfig;
use super::retry;
use crate::error::GatewayError;
use crate::gateway::{TransmissionChannel, TransmissionGateway};
use crate::job::{Job, JobStatus};
use crate::materializer::Materializer;
use crate::notify::{NoopNotifier, Notifier, Outcome};
use crate::store::{JobStore, StoreError};

/// Tries at recording a terminal status before it is deferred.
const RECORD_ATTEMPTS: u32 = 3;

/// What happened to the job a loop iteration picked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: String,
    pub status: JobStatus,
    /// Gateway calls made; zero when materialization failed.
    pub attempts: u32,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The selected job stopped being Pending before it could be claimed.
    AlreadyClaimed,
    StoreUnavailable,
}

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Idle,
    Dispatched(JobOutcome),
    Skipped(SkipReason),
}

/// Controls a running engine from outside the loop.
#[derive(Clone)]
pub struct EngineHandle {
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
}

impl EngineHandle {
    /// Ends the current pause early, e.g. right after intake.
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    /// Stops the loop after the job in flight, if any, is finished.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// The single consumer that drains Pending jobs through the gateway.
pub struct DispatchEngine {
    store: Arc<dyn JobStore>,
    materializer: Arc<Materializer>,
    gateway: Arc<dyn TransmissionGateway>,
    notifier: Arc<dyn Notifier>,
    channel: TransmissionChannel,
    config: DispatchConfig,
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
    exit_when_idle: bool,
    /// Terminal status the store refused; written before the next job.
    unrecorded: Mutex<Option<JobOutcome>>,
}

impl DispatchEngine {
    pub fn new(
        store: Arc<dyn JobStore>,
        materializer: Arc<Materializer>,
        gateway: Arc<dyn TransmissionGateway>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            materializer,
            gateway,
            notifier: Arc::new(NoopNotifier),
            channel: TransmissionChannel::global(),
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
            wake: Arc::new(Notify::new()),
            exit_when_idle: false,
            unrecorded: Mutex::new(None),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replaces the process-wide line, e.g. to isolate a test.
    pub fn with_channel(mut self, channel: TransmissionChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Makes [`run`](Self::run) return once the queue has been drained.
    pub fn exit_when_idle(mut self) -> Self {
        self.exit_when_idle = true;
        self
    }

    pub fn channel(&self) -> &TransmissionChannel {
        &self.channel
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            shutdown: Arc::clone(&self.shutdown),
            wake: Arc::clone(&self.wake),
        }
    }

    /// Fails Processing jobs untouched for longer than `older_than`.
    pub fn reclaim_stale(&self, older_than: Duration) -> Result<usize, StoreError> {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age));
        let Some(cutoff) = cutoff else {
            log::warn!("Stale reclaim age {:?} is out of range, skipping", older_than);
            return Ok(0);
        };

        let reclaimed = self.store.reclaim_stale(cutoff)?;
        if reclaimed > 0 {
            log::warn!(
                "Moved {} stale Processing jobs to Error (not updated since {})",
                reclaimed,
                cutoff
            );
        }
        Ok(reclaimed)
    }

    /// Runs until [`EngineHandle::shutdown`] is called, or until nothing is
    /// pending when built with [`exit_when_idle`](Self::exit_when_idle).
    pub async fn run(&self) {
        if let Some(age) = self.config.reclaim_stale_after {
            if let Err(e) = self.reclaim_stale(age) {
                log::error!("Stale job reclaim failed: {}", e);
            }
        }

        log::info!("Dispatch engine started");

        while !self.shutdown.load(Ordering::Acquire) {
            let pause = match self.run_once().await {
                Tick::Idle if self.exit_when_idle => {
                    log::info!("Queue drained");
                    break;
                }
                Tick::Idle => self.config.idle_interval,
                Tick::Dispatched(_) | Tick::Skipped(SkipReason::AlreadyClaimed) => {
                    self.config.busy_interval
                }
                Tick::Skipped(SkipReason::StoreUnavailable) => self.config.store_error_backoff,
            };

            if self.shutdown.load(Ordering::Acquire) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = self.wake.notified() => {
                    log::debug!("Dispatch loop woken early");
                }
            }
        }

        log::info!("Dispatch engine stopped");
    }

    pub fn spawn(self) -> (EngineHandle, JoinHandle<()>) {
        let handle = self.handle();
        let task = tokio::spawn(async move { self.run().await });
        (handle, task)
    }

    /// Picks the oldest Pending job, if any, and carries it to a terminal
    /// status.
    pub async fn run_once(&self) -> Tick {
        if !self.flush_unrecorded() {
            return Tick::Skipped(SkipReason::StoreUnavailable);
        }

        let jobs = match self.store.list() {
            Ok(jobs) => jobs,
            Err(e) => {
                log::error!("Failed to read job queue: {}", e);
                return Tick::Skipped(SkipReason::StoreUnavailable);
            }
        };

        // Earliest created_at; ties go to the earlier list position.
        let next = jobs
            .into_iter()
            .filter(|job| job.status == JobStatus::Pending)
            .enumerate()
            .min_by_key(|(position, job)| (job.created_at, *position))
            .map(|(_, job)| job);

        let Some(job) = next else {
            return Tick::Idle;
        };

        match self.store.claim(&job.id) {
            Ok(true) => {}
            Ok(false) => {
                log::debug!("Job {} was claimed elsewhere", job.id);
                return Tick::Skipped(SkipReason::AlreadyClaimed);
            }
            Err(e) => {
                log::error!("Failed to claim job {}: {}", job.id, e);
                return Tick::Skipped(SkipReason::StoreUnavailable);
            }
        }
        log::info!(
            "Job {}: {} -> {}",
            job.id,
            JobStatus::Pending,
            JobStatus::Processing
        );

        let span = tracing::info_span!("dispatch", job_id = %job.id);
        Tick::Dispatched(self.dispatch(job).instrument(span).await)
    }

    async fn dispatch(&self, job: Job) -> JobOutcome {
        let mut transient = Vec::new();

        let result = match self.channel.acquire().await {
            Ok(permit) => {
                let result = AssertUnwindSafe(self.transmit(&job, &mut transient))
                    .catch_unwind()
                    .await;
                drop(permit);
                match result {
                    Ok(result) => result,
                    Err(panic) => Err(panic_message(panic)),
                }
            }
            Err(e) => Err((0, e.to_string())),
        };

        let outcome = match result {
            Ok(attempts) => JobOutcome {
                job_id: job.id.clone(),
                status: JobStatus::Completed,
                attempts,
                error_message: None,
            },
            Err((attempts, message)) => JobOutcome {
                job_id: job.id.clone(),
                status: JobStatus::Error,
                attempts,
                error_message: Some(message),
            },
        };

        self.record(&outcome).await;
        self.relay(&job, &outcome).await;

        cleanup::cleanup_all(
            &transient,
            self.config.cleanup_attempts,
            self.config.cleanup_delay,
        )
        .await;

        outcome
    }

    async fn transmit(
        &self,
        job: &Job,
        transient: &mut Vec<PathBuf>,
    ) -> Result<u32, (u32, String)> {
        let artifact = self
            .materializer
            .materialize(job)
            .await
            .map_err(|e| (0, e.to_string()))?;
        transient.extend(artifact.transient_paths.iter().cloned());

        let span = tracing::info_span!("transmit", destination = %job.destination);
        retry::send_with_retry(
            self.gateway.as_ref(),
            &artifact.send_path,
            &job.destination,
            self.config.max_attempts,
            self.config.retry_backoff,
        )
        .instrument(span)
        .await
        .map_err(|e| match e {
            GatewayError::Exhausted { attempts, last } => (attempts, last),
            other => (0, other.to_string()),
        })
    }

    async fn record(&self, outcome: &JobOutcome) {
        if !JobStatus::Processing.can_transition_to(outcome.status) {
            log::error!(
                "Refusing transition {} -> {} for job {}",
                JobStatus::Processing,
                outcome.status,
                outcome.job_id
            );
            return;
        }

        for attempt in 1..=RECORD_ATTEMPTS {
            match self.write_outcome(outcome) {
                Ok(()) => return,
                Err(e) => log::error!(
                    "Failed to record {} for job {} (attempt {}/{}): {}",
                    outcome.status,
                    outcome.job_id,
                    attempt,
                    RECORD_ATTEMPTS,
                    e
                ),
            }
            if attempt < RECORD_ATTEMPTS {
                tokio::time::sleep(self.config.store_error_backoff).await;
            }
        }

        log::warn!(
            "Deferring {} for job {} until the store recovers",
            outcome.status,
            outcome.job_id
        );
        *self.unrecorded.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome.clone());
    }

    /// Writes a deferred terminal status. Returns `false` while the store
    /// still refuses it.
    fn flush_unrecorded(&self) -> bool {
        let mut unrecorded = self.unrecorded.lock().unwrap_or_else(|e| e.into_inner());
        let Some(outcome) = unrecorded.as_ref() else {
            return true;
        };

        match self.write_outcome(outcome) {
            Ok(()) => {
                *unrecorded = None;
                true
            }
            Err(e) => {
                log::error!(
                    "Deferred {} for job {} still not recorded: {}",
                    outcome.status,
                    outcome.job_id,
                    e
                );
                false
            }
        }
    }

    fn write_outcome(&self, outcome: &JobOutcome) -> Result<(), StoreError> {
        self.store.update_status(
            &outcome.job_id,
            outcome.status,
            outcome.error_message.as_deref(),
        )?;

        match &outcome.error_message {
            Some(message) => log::warn!(
                "Job {}: {} -> {} ({})",
                outcome.job_id,
                JobStatus::Processing,
                outcome.status,
                message
            ),
            None => log::info!(
                "Job {}: {} -> {} after {} attempt(s)",
                outcome.job_id,
                JobStatus::Processing,
                outcome.status,
                outcome.attempts
            ),
        }
        Ok(())
    }

    async fn relay(&self, job: &Job, outcome: &JobOutcome) {
        let Some(url) = job.callback_url() else {
            return;
        };

        let relayed = match (outcome.status, &outcome.error_message) {
            (JobStatus::Completed, _) => Outcome::Completed,
            (JobStatus::Error, Some(message)) if self.config.notify_on_failure => {
                Outcome::Failed {
                    error_message: message.clone(),
                }
            }
            _ => return,
        };

        self.notifier.notify(job, url, &relayed).await;
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> (u32, String) {
    let detail = if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    };
    log::error!("Job processing panicked: {}", detail);
    (0, format!("Processing panicked: {}", detail))
}
