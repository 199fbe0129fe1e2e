//! # edgequake-invoice
//!
//! Extract structured invoice data from PDFs and export it as CSV or to a
//! spreadsheet.
//!
//! ## Why this crate?
//!
//! Invoices arrive as a mix of generated PDFs with a real text layer and
//! scans that are nothing but page images. This crate reads the text layer
//! when there is one, falls back to OCR when there isn't, and lets an LLM
//! turn the resulting text into seven fields. Dates and amounts are then
//! normalised deterministically, and every record is flagged `OK` or
//! `Needs Review` so a human knows which rows to check.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    resolve local file or download from URL
//!  ├─ 2. Acquire  native text layer via pdfium, else rasterise + tesseract
//!  ├─ 3. Clean    collapse whitespace, drop page markers and footers
//!  ├─ 4. LLM      one completion call, JSON recovered from the answer
//!  ├─ 5. Polish   dates → YYYY-MM-DD, amounts → numbers, review status
//!  └─ 6. Export   CSV file, or a Google Sheets spreadsheet
//! ```
//!
//! A document that fails at any step becomes a placeholder row (all fields
//! empty, `Needs Review`); the batch never aborts on one bad invoice.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_invoice::{run_files, write_csv_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = ExtractionConfig::default();
//!     let batch = run_files(["march.pdf", "april.pdf"], &config).await?;
//!     write_csv_file(&batch, "invoices.csv").await?;
//!     eprintln!("{} ok, {} need review", batch.stats.ok, batch.stats.needs_review);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `invoice2csv` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! edgequake-invoice = { version = "0.1", default-features = false }
//! ```
//!
//! ## Native dependencies
//!
//! Text-layer reading and rasterisation need a pdfium shared library (found
//! via `PDFIUM_LIB_PATH` or the system library path). OCR shells out to the
//! `tesseract` binary. Both sit behind traits ([`PdfBackend`],
//! [`PageRecognizer`]) and can be replaced through [`ExtractionConfig`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod export;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{run, run_files, run_sync};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, DEFAULT_MODEL};
pub use error::{AcquisitionError, CompletionError, DocumentError, ExportError, InvoiceError};
pub use export::{
    default_csv_filename, default_sheet_name, to_csv_string, write_csv, write_csv_file, ExportSink,
    GoogleSheetsSink, Table,
};
pub use output::{
    BatchStats, DocumentOutcome, ExtractionStatus, InvoiceRecord, MalformedField, Provenance,
    ResultBatch, ReviewStatus, COLUMNS,
};
pub use pipeline::acquire::{PageRecognizer, PdfBackend};
pub use pipeline::input::LoadedDocument;
pub use pipeline::llm::{Completion, TextCompleter};
pub use progress::{BatchProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{run_stream, run_stream_documents, OutcomeStream};
