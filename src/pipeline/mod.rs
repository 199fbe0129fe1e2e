//! Pipeline stages for invoice extraction.
//!
//! Each submodule implements one transformation step and is testable on its
//! own. The PDF library, the OCR engine and the LLM sit behind traits
//! ([`acquire::PdfBackend`], [`acquire::PageRecognizer`],
//! [`llm::TextCompleter`]) so the stages around them can be swapped or faked.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ acquire ──▶ clean ──▶ llm ──▶ postprocess
//! (URL/path) (text/OCR)  (regex)  (JSON)  (normalise)
//! ```
//!
//! 1. [`input`]   — read a local file or download a URL into memory
//! 2. [`acquire`] — native text layer via [`render`], or rasterise + [`ocr`]
//!    when the text layer is too thin; blocking, runs in `spawn_blocking`
//! 3. [`clean`]   — collapse whitespace, strip page markers and footers
//! 4. [`llm`]     — one completion call, then JSON recovery; the only stage
//!    with network I/O
//! 5. [`postprocess`] — dates, amounts, strings → an `InvoiceRecord`

pub mod acquire;
pub mod clean;
pub mod input;
pub mod llm;
pub mod ocr;
pub mod postprocess;
pub mod render;
