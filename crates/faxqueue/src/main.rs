//! faxqueue command line: runs the dispatch engine and administers the queue.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use faxqueue::config::{Config, StorageBackend};
use faxqueue::db::{default_database_path, Database};
use faxqueue::logging::LogFormat;
use faxqueue::{
    load_config, CallbackNotifier, CommandGateway, DispatchConfig, DispatchEngine, JobMetadata,
    JobStore, Materializer, MaterializerConfig, MemoryJobStore, NewJob, SqliteJobStore,
    StoreError,
};

#[derive(Parser)]
#[command(name = "faxqueue")]
#[command(about = "Durable fax job queue with a single-channel dispatcher", long_about = None)]
struct Cli {
    /// Path to the JSON config file
    #[arg(long, short, default_value = "faxqueue.json")]
    config: PathBuf,

    /// Log output format (plain or json)
    #[arg(long, default_value = "plain")]
    log_format: LogFormat,

    /// Also write daily log files here (overrides directories.logs)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the dispatch engine until interrupted
    Run {
        /// Exit once no job is pending
        #[arg(long)]
        until_empty: bool,
    },
    /// Queue a document for sending
    Enqueue {
        /// URL or path of the document
        source: String,
        /// Fax number
        destination: String,
        /// URL called once the fax has been sent
        #[arg(long)]
        callback: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        file_name: Option<String>,
        #[arg(long)]
        order_destination: Option<String>,
    },
    /// List all jobs, oldest first
    List,
    /// Show one job
    Show { id: String },
    /// Count jobs per status
    Status,
    /// Put a failed job back in the queue
    Retry { id: String },
    /// Put every failed job back in the queue
    RetryErrors,
    /// Delete completed jobs
    ClearCompleted,
    /// Delete all jobs
    ClearAll,
    /// Print the path of a job's converted PDF, rebuilding it if missing
    ViewConverted { id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| config.directories.logs.as_ref().map(PathBuf::from));

    // A second init (e.g. an embedding host already set one) is harmless.
    let _log_guard = match faxqueue::logging::init(cli.log_format, log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("warning: {}", e);
            None
        }
    };

    if let Err(e) = run(cli, config).await {
        log::error!("{}", e);
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: Config) -> faxqueue::Result<()> {
    let store = open_store(&config)?;

    match cli.command {
        Commands::Run { until_empty } => run_engine(&config, store, until_empty).await?,
        Commands::Enqueue {
            source,
            destination,
            callback,
            user,
            file_name,
            order_destination,
        } => {
            let job = store.create(NewJob::new(source, destination).with_metadata(JobMetadata {
                request_user: user,
                file_name,
                callback_url: callback,
                order_destination,
            }))?;
            println!("{}", job.id);
        }
        Commands::List => println!("{}", serde_json::to_string_pretty(&store.list()?)?),
        Commands::Show { id } => {
            let job = store.get(&id)?.ok_or(StoreError::NotFound(id))?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Commands::Status => {
            println!("{}", serde_json::to_string_pretty(&store.queue_status()?)?)
        }
        Commands::Retry { id } => {
            if store.retry(&id)? {
                println!("Job {} queued again", id);
            } else {
                println!("Job {} is not in error", id);
            }
        }
        Commands::RetryErrors => println!("{} jobs queued again", store.retry_all_errors()?),
        Commands::ClearCompleted => println!("{} jobs removed", store.clear_completed()?),
        Commands::ClearAll => println!("{} jobs removed", store.clear_all()?),
        Commands::ViewConverted { id } => {
            let job = store.get(&id)?.ok_or(StoreError::NotFound(id))?;
            let materializer =
                Materializer::new(MaterializerConfig::from_config(&config), store.clone())?;
            let path = materializer.converted_artifact(&job).await?;
            println!("{}", path.display());
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> faxqueue::Result<Arc<dyn JobStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            log::warn!("Using in-memory job store; jobs are lost on exit");
            Ok(Arc::new(MemoryJobStore::new()))
        }
        StorageBackend::Sqlite => {
            let path = config
                .storage
                .path
                .as_ref()
                .map(PathBuf::from)
                .or_else(default_database_path)
                .unwrap_or_else(|| PathBuf::from("faxqueue.db"));
            log::info!("Opening job database at {}", path.display());
            Ok(Arc::new(SqliteJobStore::new(Database::open(&path)?)))
        }
    }
}

async fn run_engine(
    config: &Config,
    store: Arc<dyn JobStore>,
    until_empty: bool,
) -> faxqueue::Result<()> {
    let materializer = Materializer::new(MaterializerConfig::from_config(config), store.clone())?;
    let notifier =
        CallbackNotifier::new(Duration::from_secs(config.notification.timeout_secs))?;
    let gateway = CommandGateway::from_config(&config.gateway);

    let engine = DispatchEngine::new(
        store,
        Arc::new(materializer),
        Arc::new(gateway),
        DispatchConfig::from_config(config),
    )
    .with_notifier(Arc::new(notifier));
    let engine = if until_empty {
        engine.exit_when_idle()
    } else {
        engine
    };

    let (handle, mut task) = engine.spawn();

    tokio::select! {
        finished = &mut task => {
            if let Err(e) = finished {
                log::error!("Dispatch task ended abnormally: {}", e);
            }
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                log::error!("Failed to listen for interrupt: {}", e);
            }
        }
    }
    log::info!("Interrupt received, finishing current job");
    handle.shutdown();

    if let Err(e) = task.await {
        log::error!("Dispatch task ended abnormally: {}", e);
    }
    Ok(())
}
