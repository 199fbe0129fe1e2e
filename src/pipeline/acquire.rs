//! Text acquisition: PDF bytes → plain text plus a provenance tag.
//!
//! Invoices come in two flavours. Generated PDFs carry a text layer that can
//! be read directly and cheaply. Scanned PDFs carry only page images, so the
//! pages have to be rasterised and run through OCR. The decision rule is
//! deliberately blunt: if the trimmed native text has more than
//! `native_text_threshold` characters, it is used as-is and OCR never runs.
//!
//! The PDF library and the OCR engine sit behind [`PdfBackend`] and
//! [`PageRecognizer`] so the decision logic can be exercised without either
//! native dependency.

use crate::error::{AcquisitionError, DocumentError};
use crate::output::Provenance;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read access to a PDF's text layer and page rasters.
///
/// Implementations are blocking; the orchestrator calls them from
/// `spawn_blocking`.
pub trait PdfBackend: Send + Sync {
    /// Text of every page, in page order. Pages without text yield `""`.
    fn page_texts(&self, bytes: &[u8], password: Option<&str>)
        -> Result<Vec<String>, AcquisitionError>;

    /// Every page rendered at `dpi`, in page order.
    fn rasterize(
        &self,
        bytes: &[u8],
        dpi: u32,
        password: Option<&str>,
    ) -> Result<Vec<DynamicImage>, AcquisitionError>;
}

/// An OCR engine: one page image in, best-effort text out.
pub trait PageRecognizer: Send + Sync {
    fn recognize(&self, page: &DynamicImage) -> Result<String, AcquisitionError>;
}

/// Text acquired from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquiredText {
    pub text: String,
    pub provenance: Provenance,
}

/// Knobs for one acquisition.
#[derive(Debug, Clone)]
pub struct AcquireOptions {
    pub dpi: u32,
    pub native_text_threshold: usize,
    pub password: Option<String>,
}

/// Concatenate the native text layer: each non-empty page followed by `\n`.
pub fn native_text(
    backend: &dyn PdfBackend,
    bytes: &[u8],
    password: Option<&str>,
) -> Result<String, AcquisitionError> {
    let pages = backend.page_texts(bytes, password)?;
    let mut text = String::new();
    for page in pages.iter().filter(|p| !p.is_empty()) {
        text.push_str(page);
        text.push('\n');
    }
    Ok(text)
}

/// True when native text is long enough to skip OCR.
pub fn has_enough_text(text: &str, threshold: usize) -> bool {
    text.trim().chars().count() > threshold
}

/// Rasterise every page and OCR it; each page's text followed by `\n`.
pub fn recognize_pages(
    backend: &dyn PdfBackend,
    recognizer: &dyn PageRecognizer,
    bytes: &[u8],
    dpi: u32,
    password: Option<&str>,
) -> Result<String, AcquisitionError> {
    let pages = backend.rasterize(bytes, dpi, password)?;
    info!("OCR over {} pages at {} DPI", pages.len(), dpi);

    let mut text = String::new();
    for (i, page) in pages.iter().enumerate() {
        let page_text = recognizer
            .recognize(page)
            .map_err(|e| with_page(e, i + 1))?;
        debug!("Page {}: recognised {} chars", i + 1, page_text.len());
        text.push_str(&page_text);
        text.push('\n');
    }
    Ok(text)
}

/// Stamp a 1-based page number onto a recognition error.
fn with_page(err: AcquisitionError, page: usize) -> AcquisitionError {
    match err {
        AcquisitionError::Recognition { detail, .. } => AcquisitionError::Recognition { page, detail },
        other => other,
    }
}

/// Acquire text from a PDF, preferring the native text layer.
///
/// A failing native pass is not fatal on its own: the document goes to OCR,
/// and only a failing OCR pass is reported. Empty text on both paths is a
/// valid result.
pub fn acquire(
    backend: &dyn PdfBackend,
    recognizer: &dyn PageRecognizer,
    bytes: &[u8],
    opts: &AcquireOptions,
) -> Result<AcquiredText, AcquisitionError> {
    let password = opts.password.as_deref();
    if let Some(text) = try_native(backend, bytes, opts) {
        return Ok(text);
    }
    let text = recognize_pages(backend, recognizer, bytes, opts.dpi, password)?;
    Ok(AcquiredText {
        text,
        provenance: Provenance::Recognized,
    })
}

fn try_native(
    backend: &dyn PdfBackend,
    bytes: &[u8],
    opts: &AcquireOptions,
) -> Option<AcquiredText> {
    match native_text(backend, bytes, opts.password.as_deref()) {
        Ok(text) if has_enough_text(&text, opts.native_text_threshold) => {
            debug!("Native text layer: {} chars", text.len());
            Some(AcquiredText {
                text,
                provenance: Provenance::Native,
            })
        }
        Ok(text) => {
            info!(
                "Native text too short ({} chars), falling back to OCR",
                text.trim().chars().count()
            );
            None
        }
        Err(e) => {
            warn!("Native text extraction failed, falling back to OCR: {}", e);
            None
        }
    }
}

/// Async acquisition for the orchestrator.
///
/// Both passes run on the blocking pool. The OCR pass is bounded by
/// `ocr_timeout`; on timeout the worker thread is abandoned and the document
/// is reported as failed.
pub async fn acquire_document(
    document: usize,
    backend: Arc<dyn PdfBackend>,
    recognizer: Arc<dyn PageRecognizer>,
    bytes: Arc<[u8]>,
    opts: AcquireOptions,
    ocr_timeout: Duration,
) -> Result<AcquiredText, DocumentError> {
    let native = {
        let backend = Arc::clone(&backend);
        let bytes = Arc::clone(&bytes);
        let opts = opts.clone();
        tokio::task::spawn_blocking(move || try_native(backend.as_ref(), &bytes, &opts))
            .await
            .map_err(|e| DocumentError::Internal {
                document,
                detail: format!("Text extraction task panicked: {e}"),
            })?
    };
    if let Some(text) = native {
        return Ok(text);
    }

    let task = tokio::task::spawn_blocking(move || {
        recognize_pages(
            backend.as_ref(),
            recognizer.as_ref(),
            &bytes,
            opts.dpi,
            opts.password.as_deref(),
        )
    });

    match tokio::time::timeout(ocr_timeout, task).await {
        Err(_) => Err(DocumentError::RecognitionTimeout {
            document,
            secs: ocr_timeout.as_secs(),
        }),
        Ok(Err(e)) => Err(DocumentError::Internal {
            document,
            detail: format!("OCR task panicked: {e}"),
        }),
        Ok(Ok(Err(e))) => Err(DocumentError::AcquisitionFailed {
            document,
            detail: e.to_string(),
        }),
        Ok(Ok(Ok(text))) => Ok(AcquiredText {
            text,
            provenance: Provenance::Recognized,
        }),
    }
}
