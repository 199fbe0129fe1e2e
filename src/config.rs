//! Configuration types for invoice extraction.
//!
//! All run behaviour is controlled through [`ExtractionConfig`], built via its
//! [`ExtractionConfigBuilder`]. Backends (PDF library, OCR engine, completion
//! capability) are injectable here so tests and embedders can swap them out
//! without touching the pipeline.

use crate::error::InvoiceError;
use crate::pipeline::acquire::{PageRecognizer, PdfBackend};
use crate::pipeline::llm::TextCompleter;
use crate::progress::ProgressCallback;
use crate::prompts::INVOICE_TEXT_PLACEHOLDER;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for an invoice extraction run.
///
/// # Example
/// ```rust
/// use edgequake_invoice::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(300)
///     .concurrency(2)
///     .model("gpt-4o-mini")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_prompt_chars, 6000);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rasterisation DPI for the OCR fallback. Range: 72–400. Default: 200.
    pub dpi: u32,

    /// Native text must exceed this many characters (after trimming) to be
    /// used instead of OCR. Default: 50.
    pub native_text_threshold: usize,

    /// Cleaned text is cut to this many characters before it goes into the
    /// prompt. Default: 6000.
    ///
    /// Fields that only appear after the cut are missed.
    pub max_prompt_chars: usize,

    /// Documents processed at once. Default: 4. `1` is strictly sequential.
    ///
    /// This is also the ceiling on concurrent completion calls.
    pub concurrency: usize,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed completion capability. Takes precedence over `provider`.
    pub completer: Option<Arc<dyn TextCompleter>>,

    /// PDF backend. If None, pdfium is bound at run time.
    pub pdf_backend: Option<Arc<dyn PdfBackend>>,

    /// OCR engine. If None, the tesseract CLI is used.
    pub recognizer: Option<Arc<dyn PageRecognizer>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per invoice. Default: 1024.
    pub max_tokens: usize,

    /// Prompt template override; must contain `{invoice_text}`.
    pub prompt_template: Option<String>,

    /// PDF user password for encrypted invoices.
    pub password: Option<String>,

    /// Tesseract language code(s), e.g. "eng" or "eng+deu". Default: "eng".
    pub ocr_language: String,

    /// Path to the tesseract binary. Default: "tesseract" (looked up on PATH).
    pub tesseract_path: String,

    /// Per-completion-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Per-document OCR pass timeout in seconds. Default: 120.
    pub ocr_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Receives batch and per-document events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 200,
            native_text_threshold: 50,
            max_prompt_chars: 6000,
            concurrency: 4,
            model: None,
            provider_name: None,
            provider: None,
            completer: None,
            pdf_backend: None,
            recognizer: None,
            temperature: 0.0,
            max_tokens: 1024,
            prompt_template: None,
            password: None,
            ocr_language: "eng".to_string(),
            tesseract_path: "tesseract".to_string(),
            api_timeout_secs: 60,
            ocr_timeout_secs: 120,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("native_text_threshold", &self.native_text_threshold)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("completer", &self.completer.as_ref().map(|_| "<dyn TextCompleter>"))
            .field("pdf_backend", &self.pdf_backend.as_ref().map(|_| "<dyn PdfBackend>"))
            .field("recognizer", &self.recognizer.as_ref().map(|_| "<dyn PageRecognizer>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("ocr_language", &self.ocr_language)
            .field("tesseract_path", &self.tesseract_path)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn native_text_threshold(mut self, chars: usize) -> Self {
        self.config.native_text_threshold = chars;
        self
    }

    pub fn max_prompt_chars(mut self, chars: usize) -> Self {
        self.config.max_prompt_chars = chars;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn completer(mut self, completer: Arc<dyn TextCompleter>) -> Self {
        self.config.completer = Some(completer);
        self
    }

    pub fn pdf_backend(mut self, backend: Arc<dyn PdfBackend>) -> Self {
        self.config.pdf_backend = Some(backend);
        self
    }

    pub fn recognizer(mut self, recognizer: Arc<dyn PageRecognizer>) -> Self {
        self.config.recognizer = Some(recognizer);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<String>) -> Self {
        self.config.tesseract_path = path.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, InvoiceError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 400 {
            return Err(InvoiceError::InvalidConfig(format!(
                "DPI must be 72–400, got {}",
                c.dpi
            )));
        }
        if c.concurrency == 0 {
            return Err(InvoiceError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.max_prompt_chars == 0 {
            return Err(InvoiceError::InvalidConfig(
                "max_prompt_chars must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 || c.ocr_timeout_secs == 0 {
            return Err(InvoiceError::InvalidConfig(
                "Timeouts must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref t) = c.prompt_template {
            if !t.contains(INVOICE_TEXT_PLACEHOLDER) {
                return Err(InvoiceError::InvalidConfig(format!(
                    "Prompt template must contain {INVOICE_TEXT_PLACEHOLDER}"
                )));
            }
        }
        if c.ocr_language.trim().is_empty() {
            return Err(InvoiceError::InvalidConfig(
                "OCR language must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ExtractionConfig::default();
        assert_eq!(c.dpi, 200);
        assert_eq!(c.native_text_threshold, 50);
        assert_eq!(c.max_prompt_chars, 6000);
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.model_or_default(), "gpt-4o-mini");
    }

    #[test]
    fn builder_clamps_dpi_and_concurrency() {
        let c = ExtractionConfig::builder()
            .dpi(1000)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.dpi, 400);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let err = ExtractionConfig::builder()
            .prompt_template("Extract the invoice.")
            .build()
            .unwrap_err();
        assert!(matches!(err, InvoiceError::InvalidConfig(_)));
    }

    #[test]
    fn zero_prompt_chars_is_rejected() {
        assert!(ExtractionConfig::builder().max_prompt_chars(0).build().is_err());
    }

    #[test]
    fn debug_hides_trait_objects() {
        let s = format!("{:?}", ExtractionConfig::default());
        assert!(s.contains("ExtractionConfig"));
        assert!(s.contains("completer: None"));
    }
}
