//! Turns a job's source reference into a file the gateway can send.
//!
//! Native PDFs are sent as they are (remote ones are first copied into the
//! work directory). Images are rendered onto one A4 page and written to the
//! converted directory, and that path is recorded on the job so it can be
//! viewed later.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::Instrument;

use crate::config::Config;
use crate::error::MaterializeError;
use crate::job::Job;
use crate::store::JobStore;

pub mod pdf;
pub mod source;

pub use source::{detect_kind, DocumentKind, Fetcher, SourceRef};

#[derive(Debug, Clone)]
pub struct MaterializerConfig {
    pub work_dir: PathBuf,
    pub converted_dir: PathBuf,
    pub fetch_timeout: Duration,
}

impl MaterializerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            work_dir: PathBuf::from(&config.directories.work),
            converted_dir: PathBuf::from(&config.directories.converted),
            fetch_timeout: Duration::from_secs(config.fetch.timeout_secs),
        }
    }
}

/// Result of materializing one job.
#[derive(Debug, Clone)]
pub struct MaterializedArtifact {
    /// File to hand to the gateway.
    pub send_path: PathBuf,
    /// Working copies to remove once the job is finished.
    pub transient_paths: Vec<PathBuf>,
    /// Durable converted file, if a conversion happened.
    pub converted_path: Option<PathBuf>,
}

/// A fetched document that still needs a local file.
struct FetchedDocument {
    source: SourceRef,
    bytes: Vec<u8>,
    kind: DocumentKind,
}

pub struct Materializer {
    config: MaterializerConfig,
    fetcher: Fetcher,
    store: Arc<dyn JobStore>,
}

impl Materializer {
    pub fn new(
        config: MaterializerConfig,
        store: Arc<dyn JobStore>,
    ) -> Result<Self, MaterializeError> {
        let fetcher = Fetcher::new(config.fetch_timeout)?;
        Ok(Self {
            config,
            fetcher,
            store,
        })
    }

    pub fn config(&self) -> &MaterializerConfig {
        &self.config
    }

    /// Always starts from the source; earlier artifacts are never reused here.
    pub async fn materialize(&self, job: &Job) -> Result<MaterializedArtifact, MaterializeError> {
        self.materialize_fresh(job)
            .instrument(tracing::info_span!("materialize", job_id = %job.id))
            .await
    }

    async fn materialize_fresh(&self, job: &Job) -> Result<MaterializedArtifact, MaterializeError> {
        let document = self.fetch(job).await?;

        match document.kind {
            DocumentKind::Pdf => {
                if let SourceRef::Local(path) = &document.source {
                    log::debug!("Job {} sends local PDF {} as-is", job.id, path.display());
                    return Ok(MaterializedArtifact {
                        send_path: path.clone(),
                        transient_paths: Vec::new(),
                        converted_path: None,
                    });
                }

                let path = self
                    .config
                    .work_dir
                    .join(format!("fax_{}.{}", job.id, document.kind.extension()));
                write_file(&path, &document.bytes).await?;
                log::debug!("Job {} downloaded PDF to {}", job.id, path.display());

                Ok(MaterializedArtifact {
                    send_path: path.clone(),
                    transient_paths: vec![path],
                    converted_path: None,
                })
            }
            DocumentKind::Image(_) => {
                let converted = self.convert(job, &document).await?;
                Ok(MaterializedArtifact {
                    send_path: converted.clone(),
                    transient_paths: Vec::new(),
                    converted_path: Some(converted),
                })
            }
        }
    }

    /// Returns the job's converted PDF, rebuilding it from the source when
    /// the recorded file has gone missing.
    pub async fn converted_artifact(&self, job: &Job) -> Result<PathBuf, MaterializeError> {
        if let Some(recorded) = job.converted_artifact_path.as_deref() {
            let path = PathBuf::from(recorded);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(path);
            }
            log::warn!(
                "Converted artifact {} for job {} is missing, rebuilding",
                path.display(),
                job.id
            );
        }

        let document = self.fetch(job).await?;
        if document.kind == DocumentKind::Pdf {
            return Err(MaterializeError::NotConverted(job.id.clone()));
        }
        self.convert(job, &document).await
    }

    async fn fetch(&self, job: &Job) -> Result<FetchedDocument, MaterializeError> {
        let source = SourceRef::parse(&job.source_reference)?;
        let bytes = self.fetcher.fetch(&source).await?;
        let kind = detect_kind(&bytes, source.file_name().as_deref())?;
        log::debug!("Job {} source detected as {:?}", job.id, kind);
        Ok(FetchedDocument {
            source,
            bytes,
            kind,
        })
    }

    async fn convert(
        &self,
        job: &Job,
        document: &FetchedDocument,
    ) -> Result<PathBuf, MaterializeError> {
        let DocumentKind::Image(format) = document.kind else {
            return Err(MaterializeError::NotConverted(job.id.clone()));
        };

        let pdf_bytes = pdf::image_to_pdf(&document.bytes, format)?;

        let file_name = format!(
            "converted_{}_{}.pdf",
            job.id,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.config.converted_dir.join(file_name);
        write_file(&path, &pdf_bytes).await?;

        self.store
            .update_artifact_path(&job.id, &path.to_string_lossy())?;
        log::info!("Job {} converted to {}", job.id, path.display());

        self.remove_superseded(job, &path).await;
        Ok(path)
    }

    /// Deletes the conversion recorded before `current`, if it lives in the
    /// converted directory. Failures only log.
    async fn remove_superseded(&self, job: &Job, current: &Path) {
        let Some(previous) = job.converted_artifact_path.as_deref().map(PathBuf::from) else {
            return;
        };
        if previous == current || !previous.starts_with(&self.config.converted_dir) {
            return;
        }

        match tokio::fs::remove_file(&previous).await {
            Ok(()) => log::debug!("Removed superseded conversion {}", previous.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Could not remove superseded conversion {}: {}",
                previous.display(),
                e
            ),
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), MaterializeError> {
    let io_err = |e| MaterializeError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, bytes).await.map_err(io_err)
}
