//! Post-processing: raw model fields → a normalised [`InvoiceRecord`].
//!
//! Every rule is total. A value that cannot be normalised becomes an absent
//! field and never an error; [`postprocess_with_diagnostics`] additionally
//! reports which present values were thrown away.
//!
//! ## Rules
//!
//! - `invoice_date` → `YYYY-MM-DD` (see [`normalize_date`])
//! - `total_amount`, `tax_amount` → `f64` (see [`normalize_amount`])
//! - other scalar fields → trimmed strings, empty meaning absent
//! - `line_items` → kept verbatim unless `null`
//! - `status` → [`ReviewStatus::assess`] on the normalised total and date

use crate::output::{InvoiceRecord, MalformedField, ReviewStatus};
use crate::pipeline::llm::RawFields;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// A record plus the present-but-unusable values dropped while building it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Normalized {
    pub record: InvoiceRecord,
    pub malformed: Vec<MalformedField>,
}

/// Normalise raw fields into a record.
pub fn postprocess(raw: &RawFields) -> InvoiceRecord {
    postprocess_with_diagnostics(raw).record
}

/// Normalise raw fields, keeping track of malformed values.
pub fn postprocess_with_diagnostics(raw: &RawFields) -> Normalized {
    let mut malformed = Vec::new();

    let vendor_name = take(raw, "vendor_name", &mut malformed, coerce_string);
    let invoice_number = take(raw, "invoice_number", &mut malformed, coerce_string);
    let invoice_date = take(raw, "invoice_date", &mut malformed, date_from_value);
    let total_amount = take(raw, "total_amount", &mut malformed, normalize_amount);
    let currency = take(raw, "currency", &mut malformed, coerce_string);
    let tax_amount = take(raw, "tax_amount", &mut malformed, normalize_amount);
    let line_items = raw.get("line_items").filter(|v| !v.is_null()).cloned();

    let status = ReviewStatus::assess(total_amount, invoice_date.as_deref());

    Normalized {
        record: InvoiceRecord {
            vendor_name,
            invoice_number,
            invoice_date,
            total_amount,
            currency,
            tax_amount,
            line_items,
            status,
        },
        malformed,
    }
}

/// Normalise one field; a present value that fails is recorded as malformed.
fn take<T>(
    raw: &RawFields,
    key: &str,
    malformed: &mut Vec<MalformedField>,
    normalize: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    let value = raw.get(key).filter(|v| !is_blank(v))?;
    let normalized = normalize(value);
    if normalized.is_none() {
        malformed.push(MalformedField {
            field: key.to_string(),
            value: value.clone(),
        });
    }
    normalized
}

/// `null`, `""` and whitespace-only strings all mean "the model didn't know".
fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Strings are trimmed, numbers stringified; anything else has no text form.
pub fn coerce_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ── Amounts ──────────────────────────────────────────────────────────────

/// Parse a monetary amount.
///
/// JSON numbers are taken as-is. Strings have thousands separators (`,`)
/// removed and surrounding whitespace trimmed, then must parse as a decimal.
/// Non-finite results are rejected.
pub fn normalize_amount(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.replace(',', "").trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

// ── Dates ────────────────────────────────────────────────────────────────

static RE_ORDINAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").unwrap());
static RE_NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,4})[/.\-](\d{1,2})[/.\-](\d{1,4})$").unwrap());
static RE_COMPACT_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})$").unwrap());
static RE_ISO_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})[T ]\d").unwrap());
static RE_DATE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[,./\-\s]+").unwrap());
static RE_TRAILING_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[ T]\d{1,2}:\d{2}(?::\d{2})?(?:\s*[ap]m)?$").unwrap());

/// Month-name layouts, tried after punctuation is folded to single spaces.
const NAMED_MONTH_FORMATS: &[&str] = &[
    "%B %d %Y",
    "%d %B %Y",
    "%Y %B %d",
    "%A %B %d %Y",
    "%A %d %B %Y",
];

fn date_from_value(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => normalize_date(s),
        Value::Number(n) => normalize_date(&n.to_string()),
        _ => None,
    }
}

/// Parse a date written in any common layout and render it as `YYYY-MM-DD`.
///
/// Numeric dates with the year last are read month-first, then day-first
/// when month-first is impossible (`03/04/2024` is March 4th, `13/04/2024`
/// is April 13th). Two-digit years are taken as 20xx in every layout. A
/// trailing time of day is ignored.
pub fn normalize_date(input: &str) -> Option<String> {
    let s = input.trim();
    if s.is_empty() {
        return None;
    }
    parse_date(s).map(|d| d.format("%Y-%m-%d").to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Some(c) = RE_ISO_PREFIX.captures(s) {
        return ymd(&c[1], &c[2], &c[3]);
    }
    let s = RE_TRAILING_TIME.replace(s, "");
    let s = s.trim();
    if let Some(c) = RE_COMPACT_DATE.captures(s) {
        return ymd(&c[1], &c[2], &c[3]);
    }
    if let Some(c) = RE_NUMERIC_DATE.captures(s) {
        return numeric_date(&c[1], &c[2], &c[3]);
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return named_month_date(s);
    }
    None
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

fn numeric_date(a: &str, b: &str, c: &str) -> Option<NaiveDate> {
    if a.len() == 4 {
        return ymd(a, b, c);
    }
    if a.len() > 2 {
        return None;
    }
    let year: i32 = match c.len() {
        2 => 2000 + c.parse::<i32>().ok()?,
        4 => c.parse().ok()?,
        _ => return None,
    };
    let (a, b): (u32, u32) = (a.parse().ok()?, b.parse().ok()?);
    NaiveDate::from_ymd_opt(year, a, b).or_else(|| NaiveDate::from_ymd_opt(year, b, a))
}

fn named_month_date(s: &str) -> Option<NaiveDate> {
    let s = RE_ORDINAL.replace_all(s, "$1");
    let s = RE_DATE_PUNCT.replace_all(&s, " ");
    let s = expand_short_year(s.trim());
    NAMED_MONTH_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&s, fmt).ok())
}

/// `Mar 15 24` → `Mar 15 2024`: a trailing two-digit number is the year
/// when another number (the day) precedes it and no four-digit year exists.
fn expand_short_year(s: &str) -> String {
    let tokens: Vec<&str> = s.split(' ').collect();
    let numeric: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| t.chars().all(|c| c.is_ascii_digit()))
        .collect();
    match tokens.last() {
        Some(last)
            if last.len() <= 2
                && numeric.len() == 2
                && numeric.iter().all(|t| t.len() <= 2)
                && last.chars().all(|c| c.is_ascii_digit()) =>
        {
            let head = &tokens[..tokens.len() - 1];
            format!("{} 20{:0>2}", head.join(" "), last)
        }
        _ => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> RawFields {
        match v {
            Value::Object(m) => m,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn dates_in_common_layouts() {
        let cases = [
            ("2024-03-15", "2024-03-15"),
            ("2024/3/5", "2024-03-05"),
            ("20240315", "2024-03-15"),
            ("2024-03-15T10:30:00Z", "2024-03-15"),
            ("2024-03-15 10:30:00", "2024-03-15"),
            ("03/15/2024", "2024-03-15"),
            ("15/03/2024", "2024-03-15"),
            ("15.03.2024", "2024-03-15"),
            ("03-04-24", "2024-03-04"),
            ("March 15, 2024", "2024-03-15"),
            ("15 Mar 2024", "2024-03-15"),
            ("15-Mar-2024", "2024-03-15"),
            ("March 1st, 2024", "2024-03-01"),
            ("Friday, March 15, 2024", "2024-03-15"),
            ("15/03/2024 10:30", "2024-03-15"),
            ("03/15/2024 10:30:45", "2024-03-15"),
            ("March 15, 2024 9:05 pm", "2024-03-15"),
        ];
        for (input, want) in cases {
            let got = normalize_date(input).unwrap_or_default();
            assert_eq!(got, want, "input {input:?}");
        }
    }

    #[test]
    fn two_digit_years_are_this_century_with_month_names() {
        for input in ["15-Mar-24", "Mar 15, 24", "15 March 24", "March 15th, 24"] {
            assert_eq!(normalize_date(input).as_deref(), Some("2024-03-15"), "input {input:?}");
        }
        assert_eq!(normalize_date("2024 March 5").as_deref(), Some("2024-03-05"));
        assert_eq!(normalize_date("03/15/24").as_deref(), Some("2024-03-15"));
    }

    #[test]
    fn canonical_dates_are_fixed_points() {
        for d in ["2024-01-31", "1999-12-01", "2024-02-29"] {
            assert_eq!(normalize_date(d).as_deref(), Some(d));
        }
    }

    #[test]
    fn unparseable_dates_are_absent() {
        for d in ["N/A", "", "   ", "soon", "2024-02-30", "13/13/2024", "99/99/99"] {
            assert_eq!(normalize_date(d), None, "input {d:?}");
        }
    }

    #[test]
    fn amounts() {
        assert_eq!(normalize_amount(&json!("1,234.50")), Some(1234.5));
        assert_eq!(normalize_amount(&json!(" 42 ")), Some(42.0));
        assert_eq!(normalize_amount(&json!(99.9)), Some(99.9));
        assert_eq!(normalize_amount(&json!(0)), Some(0.0));
        assert_eq!(normalize_amount(&json!("abc")), None);
        assert_eq!(normalize_amount(&json!("$10")), None);
        assert_eq!(normalize_amount(&json!("NaN")), None);
        assert_eq!(normalize_amount(&json!("inf")), None);
        assert_eq!(normalize_amount(&Value::Null), None);
        assert_eq!(normalize_amount(&json!([1])), None);
    }

    #[test]
    fn string_coercion() {
        assert_eq!(coerce_string(&json!("  ACME  ")).as_deref(), Some("ACME"));
        assert_eq!(coerce_string(&json!(1042)).as_deref(), Some("1042"));
        assert_eq!(coerce_string(&json!("")), None);
        assert_eq!(coerce_string(&json!({"a": 1})), None);
        assert_eq!(coerce_string(&json!(true)), None);
    }

    #[test]
    fn full_record_is_ok() {
        let rec = postprocess(&raw(json!({
            "vendor_name": "ACME Corp",
            "invoice_number": 1042,
            "invoice_date": "March 15, 2024",
            "total_amount": "1,234.50",
            "currency": "USD",
            "tax_amount": 12.5,
            "line_items": [{"product": "Widget", "amount": 10}],
        })));
        assert_eq!(rec.vendor_name.as_deref(), Some("ACME Corp"));
        assert_eq!(rec.invoice_number.as_deref(), Some("1042"));
        assert_eq!(rec.invoice_date.as_deref(), Some("2024-03-15"));
        assert_eq!(rec.total_amount, Some(1234.5));
        assert_eq!(rec.tax_amount, Some(12.5));
        assert_eq!(rec.line_items, Some(json!([{"product": "Widget", "amount": 10}])));
        assert_eq!(rec.status, ReviewStatus::Ok);
    }

    #[test]
    fn zero_total_still_counts_as_present() {
        let rec = postprocess(&raw(json!({"total_amount": 0, "invoice_date": "2024-01-01"})));
        assert_eq!(rec.status, ReviewStatus::Ok);
    }

    #[test]
    fn missing_date_needs_review() {
        let rec = postprocess(&raw(json!({"total_amount": 10, "invoice_date": null})));
        assert_eq!(rec.status, ReviewStatus::NeedsReview);
        assert_eq!(rec.total_amount, Some(10.0));
    }

    #[test]
    fn malformed_values_are_absent_and_reported() {
        let out = postprocess_with_diagnostics(&raw(json!({
            "vendor_name": "",
            "invoice_date": "N/A",
            "total_amount": "about ten",
            "currency": ["USD"],
            "tax_amount": null,
        })));
        assert_eq!(out.record.invoice_date, None);
        assert_eq!(out.record.total_amount, None);
        assert_eq!(out.record.currency, None);
        assert_eq!(out.record.status, ReviewStatus::NeedsReview);

        let fields: Vec<&str> = out.malformed.iter().map(|m| m.field.as_str()).collect();
        assert_eq!(fields, ["invoice_date", "total_amount", "currency"]);
        assert_eq!(out.malformed[0].value, json!("N/A"));
    }

    #[test]
    fn null_line_items_are_absent_unknown_keys_ignored() {
        let rec = postprocess(&raw(json!({"line_items": null, "po_number": "X"})));
        assert_eq!(rec.line_items, None);
        assert!(rec.is_placeholder());
    }
}
