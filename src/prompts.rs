//! Prompt for LLM-based invoice field extraction.
//!
//! The prompt lives here, not in [`crate::pipeline::llm`], so it can be
//! inspected by tests and changed without touching the call/recovery logic.
//! Callers can override it via [`crate::config::ExtractionConfig::prompt_template`].

/// Placeholder replaced with the (truncated) cleaned invoice text.
pub const INVOICE_TEXT_PLACEHOLDER: &str = "{invoice_text}";

/// Keys the model is asked to return, in prompt order.
pub const FIELD_KEYS: [&str; 7] = [
    "vendor_name",
    "invoice_number",
    "invoice_date",
    "total_amount",
    "currency",
    "tax_amount",
    "line_items",
];

/// Default extraction prompt. `{invoice_text}` is substituted at call time.
pub const DEFAULT_PROMPT_TEMPLATE: &str = r#"Extract invoice data and return ONLY valid JSON with these keys:

{
  "vendor_name": "",
  "invoice_number": "",
  "invoice_date": "",
  "total_amount": "",
  "currency": "",
  "tax_amount": "",
  "line_items": ""
}

Rules:
- If value not found, use null.
- Do not add commentary.
- Output must be pure JSON.

Invoice text:
{invoice_text}
"#;

/// Cut `text` to at most `max_chars` characters (not bytes).
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Build the prompt for one invoice.
pub fn build_prompt(template: Option<&str>, cleaned_text: &str, max_chars: usize) -> String {
    let template = template.unwrap_or(DEFAULT_PROMPT_TEMPLATE);
    template.replace(
        INVOICE_TEXT_PLACEHOLDER,
        truncate_chars(cleaned_text, max_chars),
    )
}
