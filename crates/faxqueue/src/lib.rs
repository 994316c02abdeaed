pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod job;
pub mod logging;
pub mod materializer;
pub mod notify;
pub mod store;

pub use config::{load_config, Config};
pub use dispatch::{DispatchConfig, DispatchEngine, EngineHandle, JobOutcome, Tick};
pub use error::{
    CleanupWarning, ConfigError, ConversionError, FaxError, FetchError, GatewayError,
    MaterializeError, Result,
};
pub use gateway::{CommandGateway, TransmissionChannel, TransmissionGateway};
pub use job::{Job, JobMetadata, JobStatus, NewJob, QueueStatus};
pub use materializer::{MaterializedArtifact, Materializer, MaterializerConfig};
pub use notify::{CallbackNotifier, Notifier, Outcome};
pub use store::{JobStore, MemoryJobStore, SqliteJobStore, StoreError};
