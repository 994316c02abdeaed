//! Test harness for isolated dispatch runs.
//!
//! Each `TestHarness` owns a temp directory with `input/`, `temp/` and
//! `converted_pdfs/` subdirectories and a fresh job store, and builds
//! engines over them with short intervals.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use faxqueue::db::Database;
use faxqueue::{
    DispatchConfig, DispatchEngine, Job, JobStore, Materializer, MaterializerConfig,
    MemoryJobStore, NewJob, SqliteJobStore, Tick, TransmissionGateway,
};

pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub work_dir: PathBuf,
    pub converted_dir: PathBuf,
    pub store: Arc<dyn JobStore>,
}

impl TestHarness {
    /// In-memory store.
    pub fn new() -> Self {
        Self::with_store(|_| Arc::new(MemoryJobStore::new()))
    }

    /// SQLite store in a file under the temp directory.
    pub fn with_sqlite() -> Self {
        Self::with_store(|base| {
            let db = Database::open(&base.join("data").join("faxqueue.db"))
                .expect("Failed to open test database");
            Arc::new(SqliteJobStore::new(db))
        })
    }

    fn with_store(make_store: impl FnOnce(&Path) -> Arc<dyn JobStore>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let input_dir = base.join("input");
        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");

        let store = make_store(base);
        Self {
            input_dir,
            work_dir: base.join("temp"),
            converted_dir: base.join("converted_pdfs"),
            store,
            temp_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn enqueue(&self, source: impl Into<String>, destination: &str) -> Job {
        self.store
            .create(NewJob::new(source, destination))
            .expect("Failed to create job")
    }

    pub fn job(&self, id: &str) -> Job {
        self.store
            .get(id)
            .expect("Store read failed")
            .expect("Job missing")
    }

    pub fn materializer(&self) -> Arc<Materializer> {
        let config = MaterializerConfig {
            work_dir: self.work_dir.clone(),
            converted_dir: self.converted_dir.clone(),
            fetch_timeout: Duration::from_secs(5),
        };
        Arc::new(Materializer::new(config, self.store.clone()).expect("Failed to build materializer"))
    }

    /// Millisecond pauses so loops finish quickly.
    pub fn fast_config() -> DispatchConfig {
        DispatchConfig {
            max_attempts: 3,
            retry_backoff: Duration::from_millis(20),
            busy_interval: Duration::from_millis(5),
            idle_interval: Duration::from_millis(20),
            store_error_backoff: Duration::from_millis(20),
            cleanup_attempts: 3,
            cleanup_delay: Duration::from_millis(5),
            reclaim_stale_after: None,
            notify_on_failure: false,
        }
    }

    pub fn engine(&self, gateway: Arc<dyn TransmissionGateway>) -> DispatchEngine {
        self.engine_with(gateway, Self::fast_config())
    }

    pub fn engine_with(
        &self,
        gateway: Arc<dyn TransmissionGateway>,
        config: DispatchConfig,
    ) -> DispatchEngine {
        DispatchEngine::new(self.store.clone(), self.materializer(), gateway, config)
    }

    /// Calls `run_once` until the queue is empty; returns the ticks that
    /// dispatched a job.
    pub async fn drain(engine: &DispatchEngine) -> Vec<Tick> {
        let mut ticks = Vec::new();
        loop {
            match engine.run_once().await {
                Tick::Idle => return ticks,
                tick => ticks.push(tick),
            }
        }
    }
}
