//! Streaming API: emit document outcomes as they become available.
//!
//! Large batches take minutes. [`run_stream`] yields each
//! [`DocumentOutcome`] as soon as it and every document before it have
//! finished, so callers can write rows incrementally or show partial results
//! without waiting for the whole batch.
//!
//! Unlike a completion-order stream, items always arrive in input order: a
//! slow document holds back the ones queued after it, bounded by
//! `concurrency`.

use crate::batch::{DocumentInput, Pipeline};
use crate::config::ExtractionConfig;
use crate::error::InvoiceError;
use crate::output::DocumentOutcome;
use crate::pipeline::input::LoadedDocument;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of per-document outcomes, in input order.
pub type OutcomeStream = Pin<Box<dyn Stream<Item = DocumentOutcome> + Send>>;

/// Extract invoices from paths/URLs, streaming outcomes in input order.
///
/// Progress callbacks fire per document exactly as in
/// [`crate::batch::run_files`]. `on_batch_complete` is not called since the
/// caller decides when the stream is done.
///
/// # Errors
/// Returns `Err(InvoiceError)` only when no completion provider could be
/// resolved; nothing has been processed at that point.
///
/// # Example
/// ```rust,no_run
/// use edgequake_invoice::{run_stream, ExtractionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ExtractionConfig::default();
/// let mut outcomes = run_stream(["a.pdf", "b.pdf"], &config).await?;
/// while let Some(o) = outcomes.next().await {
///     println!("{}: {}", o.source, o.record.status);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn run_stream<I, S>(inputs: I, config: &ExtractionConfig) -> Result<OutcomeStream, InvoiceError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let inputs = inputs
        .into_iter()
        .map(|s| DocumentInput::Locator(s.as_ref().to_string()))
        .collect();
    build_stream(inputs, config)
}

/// Streaming equivalent of [`crate::batch::run`] for in-memory PDFs.
pub async fn run_stream_documents(
    documents: Vec<LoadedDocument>,
    config: &ExtractionConfig,
) -> Result<OutcomeStream, InvoiceError> {
    let inputs = documents.into_iter().map(DocumentInput::Loaded).collect();
    build_stream(inputs, config)
}

fn build_stream(inputs: Vec<DocumentInput>, config: &ExtractionConfig) -> Result<OutcomeStream, InvoiceError> {
    let total = inputs.len();
    info!("Starting streaming batch: {} documents", total);

    let pipeline = Arc::new(Pipeline::new(config)?);
    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let s = stream::iter(inputs.into_iter().enumerate())
        .map(move |(index, input)| {
            let pipeline = Arc::clone(&pipeline);
            async move { pipeline.process(index, total, input).await }
        })
        .buffered(config.concurrency);

    Ok(Box::pin(s))
}
