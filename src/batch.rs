//! Batch orchestration: many PDFs in, one ordered [`ResultBatch`] out.
//!
//! Every document goes through the same fixed pipeline:
//!
//! ```text
//! load ─▶ acquire ─▶ clean ─▶ extract ─▶ postprocess
//! ```
//!
//! A failure at any stage collapses that document to a placeholder record
//! (every field absent, `Needs Review`) and the batch moves on. The only
//! fatal error is failing to resolve a completion provider before any work
//! starts.
//!
//! Up to `concurrency` documents are in flight at once. The stream is an
//! ordered `buffered`, never `buffer_unordered`, so outcomes come back in
//! input order whatever order they finish in.

use crate::config::ExtractionConfig;
use crate::error::{DocumentError, InvoiceError};
use crate::output::{DocumentOutcome, ExtractionStatus, ResultBatch};
use crate::pipeline::acquire::{self, AcquireOptions, PageRecognizer, PdfBackend};
use crate::pipeline::input::{self, LoadedDocument};
use crate::pipeline::llm::{self, TextCompleter};
use crate::pipeline::ocr::TesseractRecognizer;
use crate::pipeline::render::PdfiumBackend;
use crate::pipeline::{clean, postprocess};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extract invoices from PDFs already in memory.
///
/// # Returns
/// `Ok(ResultBatch)` with exactly one outcome per input, in input order, even
/// if every document failed (check `batch.stats.failed`).
///
/// # Errors
/// Returns `Err(InvoiceError)` only when no completion provider could be
/// resolved.
pub async fn run(
    documents: Vec<LoadedDocument>,
    config: &ExtractionConfig,
) -> Result<ResultBatch, InvoiceError> {
    let inputs = documents.into_iter().map(DocumentInput::Loaded).collect();
    run_inputs(inputs, config).await
}

/// Extract invoices from local paths and/or HTTP(S) URLs.
///
/// Inputs are loaded inside each document's pipeline, so a missing file or a
/// failed download becomes that document's placeholder rather than an error.
pub async fn run_files<I, S>(inputs: I, config: &ExtractionConfig) -> Result<ResultBatch, InvoiceError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let inputs = inputs
        .into_iter()
        .map(|s| DocumentInput::Locator(s.as_ref().to_string()))
        .collect();
    run_inputs(inputs, config).await
}

/// Synchronous wrapper around [`run_files`].
///
/// Creates a temporary tokio runtime internally.
pub fn run_sync<I, S>(inputs: I, config: &ExtractionConfig) -> Result<ResultBatch, InvoiceError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    tokio::runtime::Runtime::new()
        .map_err(|e| InvoiceError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(run_files(inputs, config))
}

async fn run_inputs(
    inputs: Vec<DocumentInput>,
    config: &ExtractionConfig,
) -> Result<ResultBatch, InvoiceError> {
    let total_start = Instant::now();
    let total = inputs.len();
    info!("Starting batch: {} documents", total);

    let pipeline = Arc::new(Pipeline::new(config)?);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let outcomes: Vec<DocumentOutcome> = stream::iter(inputs.into_iter().enumerate().map(|(index, input)| {
        let pipeline = Arc::clone(&pipeline);
        async move { pipeline.process(index, total, input).await }
    }))
    .buffered(config.concurrency)
    .collect()
    .await;

    let batch = ResultBatch::from_outcomes(outcomes, total_start.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {} ok, {} need review, {} failed, {}ms",
        batch.stats.ok, batch.stats.needs_review, batch.stats.failed, batch.stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, batch.stats.ok);
    }
    Ok(batch)
}

// ── Per-document pipeline ────────────────────────────────────────────────

/// One document waiting to be processed.
pub(crate) enum DocumentInput {
    Loaded(LoadedDocument),
    /// A path or URL, loaded when the document's turn comes.
    Locator(String),
}

impl DocumentInput {
    fn label(&self) -> &str {
        match self {
            DocumentInput::Loaded(doc) => &doc.source,
            DocumentInput::Locator(s) => s,
        }
    }
}

/// Everything a document needs, resolved once per batch.
pub(crate) struct Pipeline {
    completer: Arc<dyn TextCompleter>,
    backend: Arc<dyn PdfBackend>,
    recognizer: Arc<dyn PageRecognizer>,
    config: ExtractionConfig,
}

impl Pipeline {
    pub(crate) fn new(config: &ExtractionConfig) -> Result<Self, InvoiceError> {
        let completer = llm::resolve_completer(config)?;
        let backend: Arc<dyn PdfBackend> = match config.pdf_backend {
            Some(ref b) => Arc::clone(b),
            None => Arc::new(PdfiumBackend::new()),
        };
        let recognizer: Arc<dyn PageRecognizer> = match config.recognizer {
            Some(ref r) => Arc::clone(r),
            None => Arc::new(TesseractRecognizer::new(
                config.tesseract_path.clone(),
                config.ocr_language.clone(),
                config.dpi,
            )),
        };
        Ok(Self {
            completer,
            backend,
            recognizer,
            config: config.clone(),
        })
    }

    /// Run one document end to end. Never fails: errors become placeholders.
    pub(crate) async fn process(&self, index: usize, total: usize, input: DocumentInput) -> DocumentOutcome {
        let start = Instant::now();
        let mut outcome = DocumentOutcome::pending(index, input.label());
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_document_start(index, total, &outcome.source);
        }

        if let Err(e) = self.fill(&mut outcome, input).await {
            warn!("{} ({})", e, outcome.source);
            outcome.fail(e);
        }
        outcome.duration_ms = start.elapsed().as_millis() as u64;

        if let Some(ref cb) = self.config.progress_callback {
            match &outcome.error {
                None => cb.on_document_complete(index, total, outcome.record.status),
                Some(e) => cb.on_document_error(index, total, &e.to_string()),
            }
        }
        outcome
    }

    async fn fill(&self, outcome: &mut DocumentOutcome, input: DocumentInput) -> Result<(), DocumentError> {
        let document = outcome.index;

        let doc = match input {
            DocumentInput::Loaded(doc) => doc,
            DocumentInput::Locator(locator) => {
                input::load_input(&locator, self.config.download_timeout_secs)
                    .await
                    .map_err(|e| DocumentError::InputFailed {
                        document,
                        detail: e.to_string(),
                    })?
            }
        };
        outcome.source = doc.source;

        let acquired = acquire::acquire_document(
            document,
            Arc::clone(&self.backend),
            Arc::clone(&self.recognizer),
            Arc::from(doc.bytes),
            AcquireOptions {
                dpi: self.config.dpi,
                native_text_threshold: self.config.native_text_threshold,
                password: self.config.password.clone(),
            },
            Duration::from_secs(self.config.ocr_timeout_secs),
        )
        .await?;
        outcome.provenance = Some(acquired.provenance);
        debug!(
            "Document {}: {} chars via {}",
            document,
            acquired.text.len(),
            acquired.provenance
        );

        let cleaned = clean::clean(&acquired.text);

        let extraction =
            llm::extract_fields(document, self.completer.as_ref(), &cleaned, &self.config).await?;
        outcome.input_tokens = extraction.input_tokens;
        outcome.output_tokens = extraction.output_tokens;
        outcome.extraction = extraction.status;

        let fields = match (extraction.status, extraction.fields) {
            (ExtractionStatus::Ok, Some(fields)) => fields,
            (status, _) => return Err(DocumentError::ExtractionFailed { document, status }),
        };

        let normalized = postprocess::postprocess_with_diagnostics(&fields);
        for m in &normalized.malformed {
            warn!("Document {}: could not normalise {} = {}", document, m.field, m.value);
        }
        outcome.record = normalized.record;
        outcome.malformed_fields = normalized.malformed;
        Ok(())
    }
}
