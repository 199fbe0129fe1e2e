//! CSV output: header plus one row per record, columns in fixed order.
//!
//! Absent fields are empty cells. `line_items` is written as compact JSON.

use super::record_values;
use crate::error::InvoiceError;
use crate::output::{ResultBatch, COLUMNS};
use chrono::NaiveDateTime;
use serde_json::Value;
use std::io;
use std::path::Path;
use tracing::info;

/// `invoices_YYYYMMDD_HHMMSS.csv` for the given local time.
pub fn default_csv_filename(now: &NaiveDateTime) -> String {
    format!("invoices_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

fn csv_cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Write the batch as CSV to any writer.
pub fn write_csv<W: io::Write>(batch: &ResultBatch, writer: W) -> Result<(), InvoiceError> {
    let mut wtr = ::csv::Writer::from_writer(writer);
    wtr.write_record(COLUMNS)?;
    for record in batch.records() {
        wtr.write_record(record_values(record).iter().map(csv_cell))?;
    }
    wtr.flush().map_err(|e| InvoiceError::Csv(e.to_string()))?;
    Ok(())
}

/// Render the batch as a CSV string.
pub fn to_csv_string(batch: &ResultBatch) -> Result<String, InvoiceError> {
    let mut buf = Vec::new();
    write_csv(batch, &mut buf)?;
    String::from_utf8(buf).map_err(|e| InvoiceError::Csv(e.to_string()))
}

/// Write the batch to a CSV file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_csv_file(batch: &ResultBatch, path: impl AsRef<Path>) -> Result<(), InvoiceError> {
    let path = path.as_ref();
    let contents = to_csv_string(batch)?;
    let write_failed = |e: io::Error| InvoiceError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    tokio::fs::write(&tmp_path, contents).await.map_err(write_failed)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_failed)?;

    info!("Wrote {} rows to {}", batch.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentError;
    use crate::output::{DocumentOutcome, InvoiceRecord, ReviewStatus};
    use chrono::NaiveDate;
    use serde_json::json;

    fn batch() -> ResultBatch {
        let mut ok = DocumentOutcome::pending(0, "a.pdf");
        ok.record = InvoiceRecord {
            vendor_name: Some("ACME, Inc.".into()),
            invoice_number: Some("INV-7".into()),
            invoice_date: Some("2024-03-15".into()),
            total_amount: Some(1234.5),
            currency: Some("USD".into()),
            tax_amount: None,
            line_items: Some(json!(["Widget", 2])),
            status: ReviewStatus::Ok,
        };
        let failed = DocumentOutcome::failed(
            1,
            "b.pdf",
            DocumentError::AcquisitionFailed {
                document: 1,
                detail: "bad".into(),
            },
        );
        ResultBatch::from_outcomes(vec![ok, failed], 0)
    }

    #[test]
    fn writes_header_rows_and_quotes() {
        let csv = to_csv_string(&batch()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines[0],
            "vendor_name,invoice_number,invoice_date,total_amount,currency,tax_amount,line_items,status"
        );
        assert_eq!(
            lines[1],
            r#""ACME, Inc.",INV-7,2024-03-15,1234.5,USD,,"[""Widget"",2]",OK"#
        );
        assert_eq!(lines[2], ",,,,,,,Needs Review");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_batch_is_header_only() {
        let csv = to_csv_string(&ResultBatch::default()).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }

    #[test]
    fn default_filename_format() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();
        assert_eq!(default_csv_filename(&now), "invoices_20240102_030405.csv");
    }

    #[tokio::test]
    async fn file_write_is_complete_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("invoices.csv");
        write_csv_file(&batch(), &path).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("vendor_name,"));
        assert!(!path.with_extension("csv.tmp").exists());
    }
}
