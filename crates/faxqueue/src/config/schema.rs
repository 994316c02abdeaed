use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub directories: DirectoriesConfig,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// SQLite file; defaults to `~/.faxqueue/data/faxqueue.db`.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoriesConfig {
    /// Transient working copies, removed after each job.
    #[serde(default = "default_work_dir")]
    pub work: String,
    /// Durable converted PDFs, kept until removed by an operator.
    #[serde(default = "default_converted_dir")]
    pub converted: String,
    /// Daily log files; console only when unset.
    #[serde(default)]
    pub logs: Option<String>,
}

fn default_work_dir() -> String {
    "temp".to_string()
}

fn default_converted_dir() -> String {
    "converted_pdfs".to_string()
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            work: default_work_dir(),
            converted: default_converted_dir(),
            logs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_busy_interval_ms")]
    pub busy_interval_ms: u64,
    #[serde(default = "default_idle_interval_secs")]
    pub idle_interval_secs: u64,
    #[serde(default = "default_store_error_backoff_secs")]
    pub store_error_backoff_secs: u64,
    /// Processing jobs older than this are failed at startup. Off when unset.
    #[serde(default)]
    pub reclaim_stale_after_secs: Option<u64>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff_secs() -> u64 {
    5
}

fn default_busy_interval_ms() -> u64 {
    1000
}

fn default_idle_interval_secs() -> u64 {
    5
}

fn default_store_error_backoff_secs() -> u64 {
    5
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_secs: default_retry_backoff_secs(),
            busy_interval_ms: default_busy_interval_ms(),
            idle_interval_secs: default_idle_interval_secs(),
            store_error_backoff_secs: default_store_error_backoff_secs(),
            reclaim_stale_after_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_cleanup_attempts")]
    pub attempts: u32,
    #[serde(default = "default_cleanup_delay_ms")]
    pub delay_ms: u64,
}

fn default_cleanup_attempts() -> u32 {
    5
}

fn default_cleanup_delay_ms() -> u64 {
    2000
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            attempts: default_cleanup_attempts(),
            delay_ms: default_cleanup_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_fetch_timeout_secs() -> u64 {
    30
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notification_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub notify_on_failure: bool,
}

fn default_notification_timeout_secs() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_notification_timeout_secs(),
            notify_on_failure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Fax program to run for each attempt.
    pub program: String,
    /// Arguments; `{file}` and `{destination}` are substituted.
    #[serde(default = "default_gateway_args")]
    pub args: Vec<String>,
    #[serde(default = "default_gateway_timeout_secs")]
    pub timeout_secs: u64,
    /// Remove `-` and spaces from the destination before sending.
    #[serde(default = "default_true")]
    pub strip_separators: bool,
}

fn default_gateway_args() -> Vec<String> {
    vec![
        "-n".to_string(),
        "-d".to_string(),
        "{destination}".to_string(),
        "{file}".to_string(),
    ]
}

fn default_gateway_timeout_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}
