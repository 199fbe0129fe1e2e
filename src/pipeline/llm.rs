//! Field extraction: one prompt, one completion, best-effort JSON recovery.
//!
//! The model is asked for a bare JSON object but frequently wraps it in
//! prose or code fences. Recovery takes the widest `{ … }` span (first `{` to
//! last `}`) and parses it strictly. The two ways this can fail are kept
//! apart: no span at all ([`RecoveryError::NoJsonFound`]) versus a span that
//! is not JSON ([`RecoveryError::ParseError`]).
//!
//! There are no retries. A transport error or timeout fails the document,
//! which the orchestrator turns into a placeholder record.

use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::error::{CompletionError, DocumentError, InvoiceError};
use crate::output::ExtractionStatus;
use crate::prompts::build_prompt;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Key/value pairs recovered from the model's answer, before normalisation.
pub type RawFields = Map<String, Value>;

/// A single text completion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Text-in/text-out completion capability.
pub trait TextCompleter: Send + Sync {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<Completion, CompletionError>>;
}

/// [`TextCompleter`] backed by an `edgequake_llm` provider.
pub struct LlmCompleter {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
}

impl LlmCompleter {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
        }
    }
}

impl TextCompleter for LlmCompleter {
    fn complete<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<Completion, CompletionError>> {
        Box::pin(async move {
            let messages = vec![ChatMessage::user(prompt)];
            let response = self
                .provider
                .chat(&messages, Some(&self.options))
                .await
                .map_err(|e| CompletionError(e.to_string()))?;
            Ok(Completion {
                text: response.content,
                input_tokens: response.prompt_tokens,
                output_tokens: response.completion_tokens,
            })
        })
    }
}

/// Build `CompletionOptions` from the extraction config.
fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Why no JSON object could be recovered.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecoveryError {
    #[error("no JSON object found in response")]
    NoJsonFound,
    #[error("JSON parse error: {0}")]
    ParseError(String),
}

impl RecoveryError {
    pub fn status(&self) -> ExtractionStatus {
        match self {
            RecoveryError::NoJsonFound => ExtractionStatus::NoJsonFound,
            RecoveryError::ParseError(_) => ExtractionStatus::JsonParseError,
        }
    }
}

/// The widest `{ … }` span: first `{` through the last `}` after it.
pub fn json_span(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Recover a JSON object from a free-text model answer.
pub fn recover_json(response: &str) -> Result<RawFields, RecoveryError> {
    let span = json_span(response).ok_or(RecoveryError::NoJsonFound)?;
    serde_json::from_str::<RawFields>(span).map_err(|e| RecoveryError::ParseError(e.to_string()))
}

/// Result of asking the model about one invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    /// Present only when `status` is [`ExtractionStatus::Ok`].
    pub fields: Option<RawFields>,
    pub status: ExtractionStatus,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

/// Prompt the model once with the cleaned text and recover its JSON.
///
/// Recovery failures are reported through [`Extraction::status`]; only a
/// failing or timed-out completion call is an `Err`.
pub async fn extract_fields(
    document: usize,
    completer: &dyn TextCompleter,
    cleaned_text: &str,
    config: &ExtractionConfig,
) -> Result<Extraction, DocumentError> {
    let start = Instant::now();
    let prompt = build_prompt(
        config.prompt_template.as_deref(),
        cleaned_text,
        config.max_prompt_chars,
    );

    let timeout = Duration::from_secs(config.api_timeout_secs);
    let completion = match tokio::time::timeout(timeout, completer.complete(&prompt)).await {
        Err(_) => {
            return Err(DocumentError::CompletionTimeout {
                document,
                secs: config.api_timeout_secs,
            })
        }
        Ok(Err(e)) => {
            return Err(DocumentError::CompletionFailed {
                document,
                detail: e.to_string(),
            })
        }
        Ok(Ok(c)) => c,
    };
    debug!(
        "Document {}: {} input tokens, {} output tokens, {:?}",
        document,
        completion.input_tokens,
        completion.output_tokens,
        start.elapsed()
    );

    let (fields, status) = match recover_json(&completion.text) {
        Ok(fields) => (Some(fields), ExtractionStatus::Ok),
        Err(e) => {
            warn!("Document {}: {}", document, e);
            (None, e.status())
        }
    };

    Ok(Extraction {
        fields,
        status,
        input_tokens: completion.input_tokens,
        output_tokens: completion.output_tokens,
    })
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, InvoiceError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        InvoiceError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the completion capability, from most-specific to least-specific:
///
/// 1. `config.completer` as-is.
/// 2. `config.provider` wrapped in [`LlmCompleter`].
/// 3. `config.provider_name` + model.
/// 4. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL` when both are set.
/// 5. OpenAI when `OPENAI_API_KEY` is set.
/// 6. `ProviderFactory::from_env()` auto-detection.
pub fn resolve_completer(config: &ExtractionConfig) -> Result<Arc<dyn TextCompleter>, InvoiceError> {
    if let Some(ref completer) = config.completer {
        return Ok(Arc::clone(completer));
    }

    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmCompleter::new(provider, config)))
}

fn resolve_provider(config: &ExtractionConfig) -> Result<Arc<dyn LLMProvider>, InvoiceError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| InvoiceError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider \
                (default model: {DEFAULT_MODEL}).\n\
                Error: {e}"
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Canned(&'static str);

    impl TextCompleter for Canned {
        fn complete<'a>(
            &'a self,
            _prompt: &'a str,
        ) -> BoxFuture<'a, Result<Completion, CompletionError>> {
            Box::pin(async move {
                Ok(Completion {
                    text: self.0.to_string(),
                    input_tokens: 12,
                    output_tokens: 3,
                })
            })
        }
    }

    struct Failing;

    impl TextCompleter for Failing {
        fn complete<'a>(
            &'a self,
            _prompt: &'a str,
        ) -> BoxFuture<'a, Result<Completion, CompletionError>> {
            Box::pin(async { Err(CompletionError("HTTP 500".into())) })
        }
    }

    struct Slow;

    impl TextCompleter for Slow {
        fn complete<'a>(
            &'a self,
            _prompt: &'a str,
        ) -> BoxFuture<'a, Result<Completion, CompletionError>> {
            Box::pin(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Completion::default())
            })
        }
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ExtractionConfig::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(1024));
    }

    #[test]
    fn recovers_object_after_commentary() {
        let fields =
            recover_json(r#"Sure! {"vendor_name": "Acme", "total_amount": "10"}"#).unwrap();
        assert_eq!(fields["vendor_name"], json!("Acme"));
        assert_eq!(fields["total_amount"], json!("10"));
    }

    #[test]
    fn recovers_object_inside_code_fence() {
        let fields = recover_json("```json\n{\"currency\": \"EUR\", \"line_items\": [{\"product\": \"A\"}]}\n```")
            .unwrap();
        assert_eq!(fields["currency"], json!("EUR"));
    }

    #[test]
    fn no_braces_is_no_json_found() {
        assert_eq!(
            recover_json("I could not find an invoice."),
            Err(RecoveryError::NoJsonFound)
        );
        assert_eq!(recover_json("} backwards {"), Err(RecoveryError::NoJsonFound));
    }

    #[test]
    fn span_that_is_not_json_is_parse_error() {
        let err = recover_json("{vendor_name: Acme}").unwrap_err();
        assert_eq!(err.status(), ExtractionStatus::JsonParseError);
    }

    #[test]
    fn greedy_span_over_two_objects_is_parse_error() {
        let err = recover_json(r#"{"a": 1} and {"b": 2}"#).unwrap_err();
        assert!(matches!(err, RecoveryError::ParseError(_)));
    }

    #[tokio::test]
    async fn extract_fields_reports_status_and_tokens() {
        let config = ExtractionConfig::default();
        let got = extract_fields(0, &Canned(r#"{"vendor_name": null}"#), "text", &config)
            .await
            .unwrap();
        assert_eq!(got.status, ExtractionStatus::Ok);
        assert_eq!(got.input_tokens, 12);

        let got = extract_fields(0, &Canned("nothing here"), "text", &config)
            .await
            .unwrap();
        assert_eq!(got.status, ExtractionStatus::NoJsonFound);
        assert!(got.fields.is_none());
    }

    #[tokio::test]
    async fn provider_error_fails_the_document() {
        let err = extract_fields(2, &Failing, "text", &ExtractionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentError::CompletionFailed { document: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_completion_times_out() {
        let config = ExtractionConfig::builder().api_timeout_secs(5).build().unwrap();
        let err = extract_fields(1, &Slow, "text", &config).await.unwrap_err();
        assert_eq!(
            err,
            DocumentError::CompletionTimeout {
                document: 1,
                secs: 5
            }
        );
    }

    #[test]
    fn injected_completer_wins() {
        let config = ExtractionConfig::builder()
            .completer(Arc::new(Canned("{}")))
            .provider_name("definitely-not-a-provider")
            .build()
            .unwrap();
        assert!(resolve_completer(&config).is_ok());
    }
}
