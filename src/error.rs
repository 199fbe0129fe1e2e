//! Error types for the edgequake-invoice library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`InvoiceError`] — **Fatal**: the run cannot proceed or its result
//!   cannot be delivered (provider not configured, CSV cannot be written,
//!   spreadsheet export rejected). Returned as `Err(InvoiceError)`.
//!
//! * [`DocumentError`] — **Non-fatal**: a single invoice failed (unparsable
//!   PDF, model answered without JSON, provider timeout) but the rest of the
//!   batch is fine. Stored inside [`crate::output::DocumentOutcome`] while the
//!   record itself collapses to a placeholder.
//!
//! Backend seams have their own small error types ([`AcquisitionError`],
//! [`CompletionError`], [`ExportError`]) so that alternative implementations
//! do not need to know about the batch-level types.

use crate::output::ExtractionStatus;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-invoice library.
#[derive(Debug, Error)]
pub enum InvoiceError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// The spreadsheet sink rejected the credentials.
    #[error("Export to '{sink}' was not authorised: {detail}")]
    ExportAuth { sink: String, detail: String },

    /// The spreadsheet sink failed for any other reason (quota, network, …).
    #[error("Export to '{sink}' failed: {detail}")]
    ExportFailed { sink: String, detail: String },

    /// CSV serialisation failed.
    #[error("Failed to write CSV: {0}")]
    Csv(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ExportError> for InvoiceError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Auth { sink, detail } => InvoiceError::ExportAuth { sink, detail },
            ExportError::Provider { sink, detail } => InvoiceError::ExportFailed { sink, detail },
            ExportError::Network { sink, detail } => InvoiceError::ExportFailed {
                sink,
                detail: format!("network: {detail}"),
            },
        }
    }
}

impl From<csv::Error> for InvoiceError {
    fn from(e: csv::Error) -> Self {
        InvoiceError::Csv(e.to_string())
    }
}

/// A non-fatal error for a single document.
///
/// The batch keeps going; the affected record becomes a placeholder with
/// every field absent and status `Needs Review`.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum DocumentError {
    /// The input could not be loaded (missing file, failed download, not a PDF).
    #[error("Document {document}: could not load input: {detail}")]
    InputFailed { document: usize, detail: String },

    /// Neither the text layer nor OCR could read the bytes.
    #[error("Document {document}: text acquisition failed: {detail}")]
    AcquisitionFailed { document: usize, detail: String },

    /// The OCR pass exceeded `ocr_timeout_secs`.
    #[error("Document {document}: OCR timed out after {secs}s")]
    RecognitionTimeout { document: usize, secs: u64 },

    /// The completion call returned an error.
    #[error("Document {document}: completion call failed: {detail}")]
    CompletionFailed { document: usize, detail: String },

    /// The completion call exceeded `api_timeout_secs`.
    #[error("Document {document}: completion call timed out after {secs}s")]
    CompletionTimeout { document: usize, secs: u64 },

    /// The model answered, but no usable JSON object could be recovered.
    #[error("Document {document}: field extraction failed ({status})")]
    ExtractionFailed {
        document: usize,
        status: ExtractionStatus,
    },

    /// A blocking worker panicked.
    #[error("Document {document}: internal error: {detail}")]
    Internal { document: usize, detail: String },
}

impl DocumentError {
    /// 0-based index of the document this error belongs to.
    pub fn document(&self) -> usize {
        match self {
            DocumentError::InputFailed { document, .. }
            | DocumentError::AcquisitionFailed { document, .. }
            | DocumentError::RecognitionTimeout { document, .. }
            | DocumentError::CompletionFailed { document, .. }
            | DocumentError::CompletionTimeout { document, .. }
            | DocumentError::ExtractionFailed { document, .. }
            | DocumentError::Internal { document, .. } => *document,
        }
    }
}

/// Failure raised by a [`crate::pipeline::acquire::PdfBackend`] or
/// [`crate::pipeline::acquire::PageRecognizer`].
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The bytes are not a PDF the backend can open.
    #[error("unparsable PDF: {0}")]
    Unparsable(String),

    /// The PDF is encrypted and no (or a wrong) password was given.
    #[error("PDF is encrypted; provide the correct password")]
    PasswordRequired,

    /// Rendering a page to an image failed.
    #[error("page {page}: rasterisation failed: {detail}")]
    Rasterisation { page: usize, detail: String },

    /// The OCR engine failed on a page.
    #[error("page {page}: recognition failed: {detail}")]
    Recognition { page: usize, detail: String },

    /// The native PDF library could not be loaded.
    #[error(
        "failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide."
    )]
    Binding(String),
}

/// Failure raised by a [`crate::pipeline::llm::TextCompleter`].
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct CompletionError(pub String);

/// Failure raised by a [`crate::export::ExportSink`].
#[derive(Debug, Clone, Error)]
pub enum ExportError {
    /// Credentials missing, expired, or rejected (HTTP 401/403).
    #[error("{sink}: authentication failed: {detail}")]
    Auth { sink: String, detail: String },

    /// The provider answered with an error (quota, bad request, …).
    #[error("{sink}: {detail}")]
    Provider { sink: String, detail: String },

    /// The request never got a response.
    #[error("{sink}: network error: {detail}")]
    Network { sink: String, detail: String },
}
