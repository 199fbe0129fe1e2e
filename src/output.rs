//! Output types: per-invoice records, per-document outcomes, and the batch.
//!
//! [`InvoiceRecord`] is what ends up in the CSV. Everything else on
//! [`DocumentOutcome`] is diagnostics that never leaves the process unless the
//! caller serialises it (the CLI's `--json` mode does).

use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column order of the tabular export. Never reordered.
pub const COLUMNS: [&str; 8] = [
    "vendor_name",
    "invoice_number",
    "invoice_date",
    "total_amount",
    "currency",
    "tax_amount",
    "line_items",
    "status",
];

/// Whether a record can be trusted as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReviewStatus {
    #[serde(rename = "OK")]
    Ok,
    #[default]
    #[serde(rename = "Needs Review")]
    NeedsReview,
}

impl ReviewStatus {
    /// `NeedsReview` unless both the total and the date survived normalisation.
    pub fn assess(total_amount: Option<f64>, invoice_date: Option<&str>) -> Self {
        if total_amount.is_some() && invoice_date.is_some() {
            ReviewStatus::Ok
        } else {
            ReviewStatus::NeedsReview
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Ok => "OK",
            ReviewStatus::NeedsReview => "Needs Review",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured invoice fields for one document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub vendor_name: Option<String>,
    pub invoice_number: Option<String>,
    /// Canonical `YYYY-MM-DD`.
    pub invoice_date: Option<String>,
    pub total_amount: Option<f64>,
    pub currency: Option<String>,
    pub tax_amount: Option<f64>,
    /// Free-form line items exactly as the model returned them.
    pub line_items: Option<serde_json::Value>,
    pub status: ReviewStatus,
}

impl InvoiceRecord {
    /// The fallback record used whenever any stage fails for a document.
    pub fn placeholder() -> Self {
        Self::default()
    }

    /// True when every field is absent (only `status` carries information).
    pub fn is_placeholder(&self) -> bool {
        self.vendor_name.is_none()
            && self.invoice_number.is_none()
            && self.invoice_date.is_none()
            && self.total_amount.is_none()
            && self.currency.is_none()
            && self.tax_amount.is_none()
            && self.line_items.is_none()
            && self.status == ReviewStatus::NeedsReview
    }
}

/// Where the text fed to the model came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// The PDF's own text layer.
    Native,
    /// Rasterised pages run through OCR.
    Recognized,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Native => f.write_str("native"),
            Provenance::Recognized => f.write_str("recognized"),
        }
    }
}

/// Outcome of recovering JSON from the model's answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Ok,
    /// No `{ … }` span in the response.
    NoJsonFound,
    /// A span was found but is not valid JSON.
    JsonParseError,
    /// An earlier stage failed; the model was never asked.
    #[default]
    NotAttempted,
}

impl fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExtractionStatus::Ok => "ok",
            ExtractionStatus::NoJsonFound => "no_json_found",
            ExtractionStatus::JsonParseError => "json_parse_error",
            ExtractionStatus::NotAttempted => "not_attempted",
        };
        f.write_str(s)
    }
}

/// A field the model did return, but in a form that could not be normalised.
///
/// In the record itself the field is simply absent, same as a field the model
/// never produced; this keeps the distinction for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MalformedField {
    pub field: String,
    pub value: serde_json::Value,
}

/// Everything known about one input after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentOutcome {
    /// 0-based position in the input sequence.
    pub index: usize,
    /// Display name of the input (file name, URL, or `document-N`).
    pub source: String,
    pub record: InvoiceRecord,
    /// `None` when text acquisition never succeeded.
    pub provenance: Option<Provenance>,
    pub extraction: ExtractionStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub malformed_fields: Vec<MalformedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<DocumentError>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
}

impl DocumentOutcome {
    /// An outcome for a document nothing has happened to yet.
    pub fn pending(index: usize, source: impl Into<String>) -> Self {
        Self {
            index,
            source: source.into(),
            record: InvoiceRecord::placeholder(),
            provenance: None,
            extraction: ExtractionStatus::NotAttempted,
            malformed_fields: Vec::new(),
            error: None,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        }
    }

    /// Placeholder outcome for a document whose pipeline failed.
    pub fn failed(index: usize, source: impl Into<String>, error: DocumentError) -> Self {
        let mut outcome = Self::pending(index, source);
        outcome.fail(error);
        outcome
    }

    /// Collapse to a placeholder record, keeping provenance and token counts.
    pub fn fail(&mut self, error: DocumentError) {
        if let DocumentError::ExtractionFailed { status, .. } = &error {
            self.extraction = *status;
        }
        self.record = InvoiceRecord::placeholder();
        self.malformed_fields.clear();
        self.error = Some(error);
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Aggregate numbers for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_documents: usize,
    pub ok: usize,
    pub needs_review: usize,
    /// Documents whose pipeline failed outright (placeholders).
    pub failed: usize,
    pub native: usize,
    pub recognized: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
}

/// The ordered result of one run: one outcome per input, in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultBatch {
    pub documents: Vec<DocumentOutcome>,
    pub stats: BatchStats,
}

impl ResultBatch {
    /// Assemble a batch, sorting by input index and computing stats.
    pub fn from_outcomes(mut documents: Vec<DocumentOutcome>, total_duration_ms: u64) -> Self {
        documents.sort_by_key(|d| d.index);
        let stats = BatchStats {
            total_documents: documents.len(),
            ok: documents
                .iter()
                .filter(|d| d.record.status == ReviewStatus::Ok)
                .count(),
            needs_review: documents
                .iter()
                .filter(|d| d.record.status == ReviewStatus::NeedsReview)
                .count(),
            failed: documents.iter().filter(|d| d.error.is_some()).count(),
            native: documents
                .iter()
                .filter(|d| d.provenance == Some(Provenance::Native))
                .count(),
            recognized: documents
                .iter()
                .filter(|d| d.provenance == Some(Provenance::Recognized))
                .count(),
            total_input_tokens: documents.iter().map(|d| d.input_tokens as u64).sum(),
            total_output_tokens: documents.iter().map(|d| d.output_tokens as u64).sum(),
            total_duration_ms,
        };
        Self { documents, stats }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Records in input order.
    pub fn records(&self) -> impl Iterator<Item = &InvoiceRecord> {
        self.documents.iter().map(|d| &d.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assess_requires_total_and_date() {
        assert_eq!(ReviewStatus::assess(Some(10.0), Some("2024-01-02")), ReviewStatus::Ok);
        assert_eq!(ReviewStatus::assess(None, Some("2024-01-02")), ReviewStatus::NeedsReview);
        assert_eq!(ReviewStatus::assess(Some(10.0), None), ReviewStatus::NeedsReview);
        assert_eq!(ReviewStatus::assess(Some(0.0), Some("2024-01-02")), ReviewStatus::Ok);
    }

    #[test]
    fn status_serialises_as_display_text() {
        assert_eq!(serde_json::to_string(&ReviewStatus::Ok).unwrap(), "\"OK\"");
        assert_eq!(
            serde_json::to_string(&ReviewStatus::NeedsReview).unwrap(),
            "\"Needs Review\""
        );
    }

    #[test]
    fn placeholder_is_all_absent() {
        let r = InvoiceRecord::placeholder();
        assert!(r.is_placeholder());
        assert_eq!(r.status, ReviewStatus::NeedsReview);
    }

    #[test]
    fn failed_outcome_carries_extraction_status() {
        let o = DocumentOutcome::failed(
            3,
            "bad.pdf",
            DocumentError::ExtractionFailed {
                document: 3,
                status: ExtractionStatus::JsonParseError,
            },
        );
        assert_eq!(o.extraction, ExtractionStatus::JsonParseError);
        assert!(o.record.is_placeholder());
    }

    #[test]
    fn batch_sorts_by_index_and_counts() {
        let mut ok = DocumentOutcome::failed(
            1,
            "b.pdf",
            DocumentError::Internal {
                document: 1,
                detail: String::new(),
            },
        );
        ok.error = None;
        ok.provenance = Some(Provenance::Native);
        ok.record.total_amount = Some(5.0);
        ok.record.invoice_date = Some("2024-03-01".into());
        ok.record.status = ReviewStatus::Ok;
        ok.input_tokens = 100;

        let bad = DocumentOutcome::failed(
            0,
            "a.pdf",
            DocumentError::AcquisitionFailed {
                document: 0,
                detail: "bad".into(),
            },
        );

        let batch = ResultBatch::from_outcomes(vec![ok, bad], 42);
        assert_eq!(batch.documents[0].source, "a.pdf");
        assert_eq!(batch.documents[1].source, "b.pdf");
        assert_eq!(batch.stats.ok, 1);
        assert_eq!(batch.stats.needs_review, 1);
        assert_eq!(batch.stats.failed, 1);
        assert_eq!(batch.stats.native, 1);
        assert_eq!(batch.stats.total_input_tokens, 100);
        assert_eq!(batch.stats.total_duration_ms, 42);
    }
}
