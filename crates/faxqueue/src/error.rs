use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaxError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Materialization error: {0}")]
    Materialize(#[from] MaterializeError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// The source document could not be obtained.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Local file not found: {0}")]
    LocalNotFound(PathBuf),

    #[error("Failed to read local file '{path}': {source}")]
    ReadLocal {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Remote fetch of '{url}' failed: {source}")]
    Remote {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Remote fetch of '{url}' returned HTTP {status}")]
    RemoteStatus { url: String, status: u16 },

    #[error("Invalid source reference '{0}'")]
    InvalidReference(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// The source document could not be turned into a send-ready PDF.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode image: {0}")]
    MalformedImage(String),

    #[error("Failed to write PDF: {0}")]
    PdfWrite(String),
}

#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("Failed to fetch source: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to convert source: {0}")]
    Conversion(#[from] ConversionError),

    #[error("Failed to write '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to record converted artifact: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Job {0} has no converted artifact (source is already a PDF)")]
    NotConverted(String),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    /// The gateway ran and reported failure.
    #[error("Transmission rejected: {0}")]
    Rejected(String),

    /// The gateway could not run at all.
    #[error("Transmission fault: {0}")]
    Fault(String),

    #[error("Transmission timed out after {0}s")]
    Timeout(u64),

    #[error("Transmission failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: String },
}

/// A transient file that could not be removed after processing.
/// Logged, never propagated.
#[derive(Debug, Clone)]
pub struct CleanupWarning {
    pub path: PathBuf,
    pub attempts: u32,
    pub error: String,
}

impl std::fmt::Display for CleanupWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "could not remove '{}' after {} attempts: {}",
            self.path.display(),
            self.attempts,
            self.error
        )
    }
}

pub type Result<T> = std::result::Result<T, FaxError>;
