//! Progress-callback trait for per-document batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the orchestrator works through the batch.
//!
//! # Example
//!
//! ```rust
//! use edgequake_invoice::{BatchProgressCallback, ExtractionConfig, ReviewStatus};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     done: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_complete(&self, index: usize, total: usize, status: ReviewStatus) {
//!         let n = self.done.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{n}/{total} done (document {index}: {status})");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { done: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ReviewStatus;
use std::sync::Arc;

/// Called by the orchestrator as it processes each document.
///
/// Documents run concurrently when `concurrency > 1`, so the per-document
/// methods may be called from several tasks at once. All methods default to
/// no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before any document is touched.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document enters the pipeline (`index` is 0-based).
    fn on_document_start(&self, index: usize, total_documents: usize, source: &str) {
        let _ = (index, total_documents, source);
    }

    /// Called when a document produced a record from the model's answer.
    fn on_document_complete(&self, index: usize, total_documents: usize, status: ReviewStatus) {
        let _ = (index, total_documents, status);
    }

    /// Called when a document's pipeline failed and a placeholder was used.
    fn on_document_error(&self, index: usize, total_documents: usize, error: &str) {
        let _ = (index, total_documents, error);
    }

    /// Called once after every document has an outcome.
    fn on_batch_complete(&self, total_documents: usize, ok_count: usize) {
        let _ = (total_documents, ok_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;
