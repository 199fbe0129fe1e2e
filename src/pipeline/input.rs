//! Input resolution: a user-supplied path or URL → PDF bytes plus a name.
//!
//! Everything downstream works on in-memory bytes, so URLs are downloaded
//! straight into memory and local files are read whole. The PDF magic bytes
//! (`%PDF`) are checked here so callers get a meaningful error instead of an
//! opaque pdfium failure.

use crate::error::InvoiceError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// A named PDF ready for the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedDocument {
    /// File name, URL, or a caller-supplied label.
    pub source: String,
    pub bytes: Vec<u8>,
}

impl LoadedDocument {
    pub fn new(source: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            source: source.into(),
            bytes: bytes.into(),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Load a local file or download a URL.
pub async fn load_input(input: &str, timeout_secs: u64) -> Result<LoadedDocument, InvoiceError> {
    if input.trim().is_empty() {
        return Err(InvoiceError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        load_local(input).await
    }
}

/// Display name for a local path: its file name, or the path as given.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn check_magic(bytes: &[u8], path: PathBuf) -> Result<(), InvoiceError> {
    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(InvoiceError::NotAPdf { path, magic });
    }
    Ok(())
}

async fn load_local(path_str: &str) -> Result<LoadedDocument, InvoiceError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(InvoiceError::PermissionDenied { path });
        }
        Err(_) => return Err(InvoiceError::FileNotFound { path }),
    };
    check_magic(&bytes, path.clone())?;

    debug!("Loaded local PDF: {} ({} bytes)", path.display(), bytes.len());
    Ok(LoadedDocument {
        source: display_name(&path),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<LoadedDocument, InvoiceError> {
    info!("Downloading PDF from: {}", url);

    let failed = |reason: String| InvoiceError::DownloadFailed {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            InvoiceError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
    check_magic(&bytes, PathBuf::from(url))?;

    info!("Downloaded {} bytes from {}", bytes.len(), url);
    Ok(LoadedDocument {
        source: url.to_string(),
        bytes: bytes.to_vec(),
    })
}
