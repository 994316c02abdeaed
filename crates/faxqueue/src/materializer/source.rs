//! Resolving and fetching job source references.

use std::path::{Path, PathBuf};
use std::time::Duration;

use image::ImageFormat;
use reqwest::Url;

use crate::error::{ConversionError, FetchError};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Where a job's document lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    Remote(Url),
    Local(PathBuf),
}

impl SourceRef {
    pub fn parse(reference: &str) -> Result<Self, FetchError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(FetchError::InvalidReference(reference.to_string()));
        }

        match Url::parse(reference) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(SourceRef::Remote(url)),
                "file" => url
                    .to_file_path()
                    .map(SourceRef::Local)
                    .map_err(|_| FetchError::InvalidReference(reference.to_string())),
                // Drive letters parse as one-letter schemes.
                scheme if scheme.len() == 1 => Ok(SourceRef::Local(PathBuf::from(reference))),
                _ => Err(FetchError::InvalidReference(reference.to_string())),
            },
            Err(_) => Ok(SourceRef::Local(PathBuf::from(reference))),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, SourceRef::Remote(_))
    }

    /// Last path segment, used for extension sniffing.
    pub fn file_name(&self) -> Option<String> {
        match self {
            SourceRef::Remote(url) => url
                .path_segments()
                .and_then(|mut segments| segments.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            SourceRef::Local(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string),
        }
    }
}

/// Fetches source documents into memory.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, source: &SourceRef) -> Result<Vec<u8>, FetchError> {
        match source {
            SourceRef::Remote(url) => self.fetch_remote(url).await,
            SourceRef::Local(path) => read_local(path).await,
        }
    }

    async fn fetch_remote(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        log::debug!("Downloading {}", url);
        let remote_err = |e| FetchError::Remote {
            url: url.to_string(),
            source: e,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(remote_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::RemoteStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(remote_err)?;
        log::debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

async fn read_local(path: &Path) -> Result<Vec<u8>, FetchError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FetchError::LocalNotFound(path.to_path_buf()))
        }
        Err(e) => Err(FetchError::ReadLocal {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// What a fetched document turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Already in the gateway's native format.
    Pdf,
    Image(ImageFormat),
}

impl DocumentKind {
    pub fn extension(self) -> &'static str {
        match self {
            DocumentKind::Pdf => "pdf",
            DocumentKind::Image(format) => format.extensions_str().first().copied().unwrap_or("img"),
        }
    }
}

/// Content first, then the reference's extension.
pub fn detect_kind(bytes: &[u8], file_name: Option<&str>) -> Result<DocumentKind, ConversionError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(DocumentKind::Pdf);
    }

    if let Ok(format) = image::guess_format(bytes) {
        return Ok(DocumentKind::Image(format));
    }

    if let Some(name) = file_name {
        if let Some(mime) = mime_guess::from_path(name).first() {
            if mime.essence_str() == "application/pdf" {
                return Ok(DocumentKind::Pdf);
            }
            if let Some(format) = ImageFormat::from_mime_type(mime.essence_str()) {
                return Ok(DocumentKind::Image(format));
            }
            return Err(ConversionError::UnsupportedFormat(mime.to_string()));
        }
    }

    Err(ConversionError::UnsupportedFormat(
        file_name.unwrap_or("unknown content").to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_remote() {
        let source = SourceRef::parse("https://x/test.png").unwrap();
        assert!(source.is_remote());
        assert_eq!(source.file_name().as_deref(), Some("test.png"));
    }

    #[test]
    fn test_parse_plain_path() {
        let source = SourceRef::parse("uploads/order 12.pdf").unwrap();
        assert_eq!(source, SourceRef::Local(PathBuf::from("uploads/order 12.pdf")));
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_file_url() {
        let source = SourceRef::parse("file:///var/spool/fax/page.png").unwrap();
        assert_eq!(source, SourceRef::Local(PathBuf::from("/var/spool/fax/page.png")));
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        assert!(matches!(
            SourceRef::parse("ftp://host/doc.pdf"),
            Err(FetchError::InvalidReference(_))
        ));
        assert!(matches!(
            SourceRef::parse("   "),
            Err(FetchError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_detect_pdf_by_magic() {
        assert_eq!(
            detect_kind(b"%PDF-1.4\n...", Some("upload.bin")).unwrap(),
            DocumentKind::Pdf
        );
    }

    #[test]
    fn test_detect_png_by_magic() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(
            detect_kind(&png, None).unwrap(),
            DocumentKind::Image(ImageFormat::Png)
        );
    }

    #[test]
    fn test_detect_falls_back_to_extension() {
        assert_eq!(
            detect_kind(b"garbage", Some("scan.jpg")).unwrap(),
            DocumentKind::Image(ImageFormat::Jpeg)
        );
    }

    #[test]
    fn test_detect_unsupported() {
        assert!(matches!(
            detect_kind(b"hello", Some("notes.txt")),
            Err(ConversionError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            detect_kind(b"hello", None),
            Err(ConversionError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_missing_local_file() {
        let fetcher = Fetcher::new(Duration::from_secs(1)).unwrap();
        let source = SourceRef::Local(PathBuf::from("/nonexistent/fax.png"));
        assert!(matches!(
            fetcher.fetch(&source).await,
            Err(FetchError::LocalNotFound(_))
        ));
    }
}
