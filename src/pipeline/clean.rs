//! Text normalisation: collapse whitespace and strip invoice boilerplate.
//!
//! Rules run in a fixed order. Whitespace is collapsed first, so the whole
//! document is a single line by the time the noise patterns run: a pattern
//! that removes "the rest of the line" removes the rest of the text.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Boilerplate removed case-insensitively, in order.
static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)Page \d+ of \d+",
        r"(?i)Invoice generated on.*",
        r"(?i)Thank you for your business.*",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Normalise acquired text for the prompt.
pub fn clean(text: &str) -> String {
    let mut s = RE_WHITESPACE.replace_all(text, " ").into_owned();
    for re in NOISE_PATTERNS.iter() {
        s = re.replace_all(&s, "").into_owned();
    }
    s.trim().to_string()
}
