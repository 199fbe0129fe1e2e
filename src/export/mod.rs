//! Tabular export: CSV files and spreadsheet sinks.
//!
//! The CSV writer works on records directly and keeps `line_items` as
//! compact JSON so the file can be re-parsed. Spreadsheet sinks get a
//! [`Table`] of already-flattened text cells instead, where line items read
//! as `Widget (10), Gadget (5)`.

pub mod csv;
pub mod sheets;

use crate::error::ExportError;
use crate::output::{InvoiceRecord, ResultBatch, COLUMNS};
use chrono::NaiveDateTime;
use futures::future::BoxFuture;
use serde_json::{Number, Value};

pub use self::csv::{default_csv_filename, to_csv_string, write_csv, write_csv_file};
pub use self::sheets::GoogleSheetsSink;

/// Prefix of the default spreadsheet display name.
pub const DEFAULT_SHEET_PREFIX: &str = "Invoice Extraction";

/// `Invoice Extraction YYYY-MM-DD HH:MM` for the given local time.
pub fn default_sheet_name(now: &NaiveDateTime) -> String {
    format!("{} {}", DEFAULT_SHEET_PREFIX, now.format("%Y-%m-%d %H:%M"))
}

/// A destination that accepts a table and returns a URL for it.
pub trait ExportSink: Send + Sync {
    /// Short identifier used in error messages, e.g. `google-sheets`.
    fn name(&self) -> &str;

    /// Create a new document called `name` holding `table`; returns its URL.
    fn export<'a>(&'a self, table: &'a Table, name: &'a str) -> BoxFuture<'a, Result<String, ExportError>>;
}

/// Header plus rows of flattened text cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// One row per record, columns in [`COLUMNS`] order, cells flattened.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a InvoiceRecord>) -> Self {
        Self {
            header: COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows: records
                .into_iter()
                .map(|r| record_values(r).iter().map(flatten_cell).collect())
                .collect(),
        }
    }

    pub fn from_batch(batch: &ResultBatch) -> Self {
        Self::from_records(batch.records())
    }

    /// Header first, then the data rows.
    pub fn to_rows(&self) -> Vec<Vec<String>> {
        std::iter::once(self.header.clone())
            .chain(self.rows.iter().cloned())
            .collect()
    }
}

/// A record's cells in [`COLUMNS`] order, absent fields as `null`.
pub fn record_values(record: &InvoiceRecord) -> [Value; 8] {
    let text = |s: &Option<String>| s.clone().map(Value::String).unwrap_or(Value::Null);
    let amount = |n: Option<f64>| {
        n.and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    };
    [
        text(&record.vendor_name),
        text(&record.invoice_number),
        text(&record.invoice_date),
        amount(record.total_amount),
        text(&record.currency),
        amount(record.tax_amount),
        record.line_items.clone().unwrap_or(Value::Null),
        Value::String(record.status.to_string()),
    ]
}

/// Plain text for a scalar: strings unquoted, `null` empty, the rest as JSON.
fn scalar_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Flatten a cell for a spreadsheet.
///
/// Sequences of objects become comma-joined `product (amount)`; other
/// sequence items are stringified; objects become JSON text; `null` is empty.
pub fn flatten_cell(v: &Value) -> String {
    match v {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => format!(
                    "{} ({})",
                    map.get("product").map(scalar_text).unwrap_or_default(),
                    map.get("amount").map(scalar_text).unwrap_or_default()
                ),
                other => scalar_text(other),
            })
            .collect::<Vec<_>>()
            .join(", "),
        other => scalar_text(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::ReviewStatus;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn flattens_line_items() {
        let items = json!([
            {"product": "Widget", "amount": 10},
            {"product": "Gadget", "amount": "5.50"},
            {"sku": "X1"},
            "freight",
        ]);
        assert_eq!(
            flatten_cell(&items),
            "Widget (10), Gadget (5.50),  (), freight"
        );
    }

    #[test]
    fn flattens_scalars_and_objects() {
        assert_eq!(flatten_cell(&Value::Null), "");
        assert_eq!(flatten_cell(&json!("ACME")), "ACME");
        assert_eq!(flatten_cell(&json!(12.5)), "12.5");
        assert_eq!(flatten_cell(&json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn table_rows_follow_column_order() {
        let record = InvoiceRecord {
            vendor_name: Some("ACME".into()),
            invoice_date: Some("2024-03-15".into()),
            total_amount: Some(99.5),
            line_items: Some(json!([{"product": "Widget", "amount": 99.5}])),
            status: ReviewStatus::Ok,
            ..Default::default()
        };
        let table = Table::from_records([&record, &InvoiceRecord::placeholder()]);
        assert_eq!(table.header, COLUMNS);
        assert_eq!(
            table.rows[0],
            ["ACME", "", "2024-03-15", "99.5", "", "", "Widget (99.5)", "OK"]
        );
        assert_eq!(table.rows[1], ["", "", "", "", "", "", "", "Needs Review"]);
        assert_eq!(table.to_rows().len(), 3);
    }

    #[test]
    fn default_sheet_name_uses_minutes() {
        let now = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 7, 59)
            .unwrap();
        assert_eq!(default_sheet_name(&now), "Invoice Extraction 2024-03-05 09:07");
    }
}
