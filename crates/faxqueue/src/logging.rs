//! Process-wide log setup.
//!
//! Library code logs through the `log` macros and opens `tracing` spans around
//! each job; both end up in the same `tracing_subscriber` registry. An
//! optional second layer writes a daily `fax.YYYY-MM-DD.log` file.

use std::path::Path;
use std::str::FromStr;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::{Layered, SubscriberExt};
use tracing_subscriber::{EnvFilter, Layer, Registry};

const DEFAULT_FILTER: &str = "faxqueue=info";
const LOG_FILE_PREFIX: &str = "fax";
const LOG_FILE_SUFFIX: &str = "log";

type FilteredRegistry = Layered<EnvFilter, Registry>;
type BoxedLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" | "text" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the default filter.
///
/// With `log_dir` set, records are also written to a file rotated daily.
/// The returned guard flushes that file and must be held until exit.
pub fn init(format: LogFormat, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let mut layers: Vec<BoxedLayer> = vec![match format {
        LogFormat::Plain => tracing_subscriber::fmt::layer().with_target(true).boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .boxed(),
    }];

    let guard = match log_dir {
        Some(dir) => {
            let (layer, guard) = file_layer(dir, format)?;
            layers.push(layer);
            Some(guard)
        }
        None => None,
    };

    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(filter).with(layers))
        .map_err(|e| format!("failed to install subscriber: {}", e))?;

    tracing_log::LogTracer::init().map_err(|e| format!("failed to bridge log records: {}", e))?;
    Ok(guard)
}

fn file_appender(dir: &Path) -> Result<RollingFileAppender, String> {
    std::fs::create_dir_all(dir)
        .map_err(|e| format!("failed to create log directory {}: {}", dir.display(), e))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .build(dir)
        .map_err(|e| format!("failed to open log file in {}: {}", dir.display(), e))
}

fn file_layer(dir: &Path, format: LogFormat) -> Result<(BoxedLayer, WorkerGuard), String> {
    let (writer, guard) = tracing_appender::non_blocking(file_appender(dir)?);

    let layer = match format {
        LogFormat::Plain => tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(writer)
            .boxed(),
    };
    Ok((layer, guard))
}
