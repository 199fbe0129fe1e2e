//! CLI binary for edgequake-invoice.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, writes the CSV, and optionally exports to Google
//! Sheets.

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use edgequake_invoice::{
    default_csv_filename, default_sheet_name, run_files, to_csv_string, write_csv_file,
    BatchProgressCallback, ExportSink, ExtractionConfig, GoogleSheetsSink, ProgressCallback,
    ResultBatch, ReviewStatus, Table,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Shorten to `max` chars, appending an ellipsis when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per finished invoice. Documents may
/// finish out of order when `--concurrency > 1`.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time and source name per in-flight document.
    in_flight: Mutex<HashMap<usize, (Instant, String)>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} invoices  \
             ⏱ {elapsed_precise}  ETA {eta_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Remove a finished document, returning its source and elapsed seconds.
    fn finish(&self, index: usize) -> (String, f64) {
        self.in_flight
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&index))
            .map(|(t, source)| (source, t.elapsed().as_secs_f64()))
            .unwrap_or_else(|| (format!("document {}", index + 1), 0.0))
    }
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_documents: usize) {
        self.bar.set_length(total_documents as u64);
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Extracting {total_documents} invoices…"))
        ));
    }

    fn on_document_start(&self, index: usize, _total: usize, source: &str) {
        if let Ok(mut m) = self.in_flight.lock() {
            m.insert(index, (Instant::now(), source.to_string()));
        }
        self.bar.set_message(truncate(source, 40));
    }

    fn on_document_complete(&self, index: usize, total: usize, status: ReviewStatus) {
        let (source, secs) = self.finish(index);
        let mark = match status {
            ReviewStatus::Ok => green("✓"),
            ReviewStatus::NeedsReview => yellow("?"),
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {:<12}  {}",
            mark,
            index + 1,
            total,
            truncate(&source, 40),
            status.as_str(),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        let (source, secs) = self.finish(index);
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {:<40}  {}  {}",
            red("✗"),
            index + 1,
            total,
            truncate(&source, 40),
            red(&truncate(error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total: usize, _ok_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract a folder of invoices to invoices_<timestamp>.csv
  invoice2csv invoices/*.pdf

  # Choose the output file
  invoice2csv march.pdf april.pdf -o q1.csv

  # Print CSV to stdout
  invoice2csv --stdout invoice.pdf > invoice.csv

  # Full per-document diagnostics as JSON (CSV still written)
  invoice2csv --json invoices/*.pdf > report.json

  # Also export to a new Google Sheets spreadsheet
  GOOGLE_SHEETS_ACCESS_TOKEN=$(gcloud auth print-access-token) \
    invoice2csv --sheets --sheet-name "March invoices" invoices/*.pdf

  # Use a specific model
  invoice2csv --provider anthropic --model claude-3-5-haiku-latest invoice.pdf

  # Invoice from URL
  invoice2csv https://example.com/invoice-1042.pdf

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY              OpenAI API key
  ANTHROPIC_API_KEY           Anthropic API key
  GEMINI_API_KEY              Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER      Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL             Override model ID
  GOOGLE_SHEETS_ACCESS_TOKEN  OAuth bearer token for --sheets
  PDFIUM_LIB_PATH             Path to libpdfium (file or directory)
  RUST_LOG                    Tracing filter, e.g. edgequake_invoice=debug

SETUP:
  1. Install pdfium (or set PDFIUM_LIB_PATH) and tesseract-ocr.
  2. Set API key:     export OPENAI_API_KEY=sk-...
  3. Extract:         invoice2csv invoice.pdf
"#;

/// Extract structured invoice data from PDFs into CSV.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2csv",
    version,
    about = "Extract structured invoice data from PDFs into CSV",
    long_about = "Extract vendor, number, date, totals, currency, tax and line items from \
invoice PDFs (local files or URLs). Text-layer PDFs are read directly; scans go through \
tesseract OCR. An LLM turns the text into fields, which are normalised and flagged \
OK / Needs Review. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any \
OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file paths or HTTP/HTTPS URLs.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Write CSV to this file (default: invoices_<YYYYMMDD_HHMMSS>.csv).
    #[arg(short, long, env = "INVOICE2CSV_OUTPUT", conflicts_with = "stdout")]
    output: Option<PathBuf>,

    /// Print CSV to stdout instead of writing a file.
    #[arg(long, env = "INVOICE2CSV_STDOUT")]
    stdout: bool,

    /// Print the full result batch (records + diagnostics) as JSON to stdout.
    #[arg(long, env = "INVOICE2CSV_JSON", conflicts_with = "stdout")]
    json: bool,

    /// Also export the table to a new Google Sheets spreadsheet.
    #[arg(long, env = "INVOICE2CSV_SHEETS")]
    sheets: bool,

    /// Spreadsheet title (default: "Invoice Extraction YYYY-MM-DD HH:MM").
    #[arg(long, env = "INVOICE2CSV_SHEET_NAME", requires = "sheets")]
    sheet_name: Option<String>,

    /// LLM model ID (e.g. gpt-4o-mini, gpt-4.1, claude-3-5-haiku-latest).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_LLM_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Rasterisation DPI for OCR (72–400).
    #[arg(long, env = "INVOICE2CSV_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Number of invoices processed concurrently.
    #[arg(short, long, env = "INVOICE2CSV_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Native text must exceed this many characters to skip OCR.
    #[arg(long, env = "INVOICE2CSV_NATIVE_TEXT_THRESHOLD", default_value_t = 50)]
    native_text_threshold: usize,

    /// Characters of cleaned text sent to the model.
    #[arg(long, env = "INVOICE2CSV_MAX_CHARS", default_value_t = 6000)]
    max_chars: usize,

    /// OCR language(s) passed to tesseract, e.g. eng or eng+deu.
    #[arg(long, env = "INVOICE2CSV_OCR_LANG", default_value = "eng")]
    ocr_lang: String,

    /// tesseract binary name or path.
    #[arg(long, env = "INVOICE2CSV_TESSERACT", default_value = "tesseract")]
    tesseract: String,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "INVOICE2CSV_PASSWORD")]
    password: Option<String>,

    /// Path to a text file with a custom prompt (must contain {invoice_text}).
    #[arg(long, env = "INVOICE2CSV_PROMPT")]
    prompt: Option<PathBuf>,

    /// Max LLM output tokens per invoice.
    #[arg(long, env = "INVOICE2CSV_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "INVOICE2CSV_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Disable progress bar.
    #[arg(long, env = "INVOICE2CSV_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE2CSV_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "INVOICE2CSV_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-invoice LLM call timeout in seconds.
    #[arg(long, env = "INVOICE2CSV_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Per-invoice OCR timeout in seconds.
    #[arg(long, env = "INVOICE2CSV_OCR_TIMEOUT", default_value_t = 120)]
    ocr_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.stdout && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let batch = run_files(&cli.inputs, &config)
        .await
        .context("Extraction failed")?;

    // ── CSV ──────────────────────────────────────────────────────────────
    if cli.stdout {
        let csv = to_csv_string(&batch).context("Failed to render CSV")?;
        io::stdout()
            .lock()
            .write_all(csv.as_bytes())
            .context("Failed to write to stdout")?;
    } else {
        let path = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_csv_filename(&Local::now().naive_local())));
        write_csv_file(&batch, &path)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{}  CSV  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&batch).context("Failed to serialise output")?;
        println!("{json}");
    }

    if !cli.quiet {
        print_summary(&batch);
    }

    // ── Sheets export ────────────────────────────────────────────────────
    // Runs last so the CSV is on disk even if the export is rejected.
    if cli.sheets {
        let name = cli
            .sheet_name
            .clone()
            .unwrap_or_else(|| default_sheet_name(&Local::now().naive_local()));
        let sink = GoogleSheetsSink::from_env(cli.api_timeout)
            .context("Google Sheets export is not configured")?;
        let url = sink
            .export(&Table::from_batch(&batch), &name)
            .await
            .context("Google Sheets export failed")?;
        if !cli.quiet {
            eprintln!("{}  Sheet  →  {}", green("✔"), bold(&url));
        }
    }

    Ok(())
}

fn print_summary(batch: &ResultBatch) {
    let s = &batch.stats;
    let mark = if s.failed > 0 {
        red("✘")
    } else if s.needs_review > 0 {
        cyan("⚠")
    } else {
        green("✔")
    };
    eprintln!(
        "{}  {} invoices: {} OK, {} need review, {} failed  {}ms",
        mark,
        s.total_documents,
        bold(&s.ok.to_string()),
        s.needs_review,
        s.failed,
        s.total_duration_ms,
    );
    eprintln!(
        "   {} native / {} OCR  —  {} tokens in  /  {} tokens out",
        s.native,
        s.recognized,
        dim(&s.total_input_tokens.to_string()),
        dim(&s.total_output_tokens.to_string()),
    );
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(cli.dpi)
        .concurrency(cli.concurrency)
        .native_text_threshold(cli.native_text_threshold)
        .max_prompt_chars(cli.max_chars)
        .ocr_language(cli.ocr_lang.clone())
        .tesseract_path(cli.tesseract.clone())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .ocr_timeout_secs(cli.ocr_timeout);

    if let Some(ref path) = cli.prompt {
        let template = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt_template(template);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn env_of(id: &str) -> Option<String> {
        Cli::command()
            .get_arguments()
            .find(|a| a.get_id() == id)
            .and_then(|a| a.get_env())
            .map(|e| e.to_string_lossy().into_owned())
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn llm_env_vars_match_the_library() {
        assert_eq!(env_of("provider").as_deref(), Some("EDGEQUAKE_LLM_PROVIDER"));
        assert_eq!(env_of("model").as_deref(), Some("EDGEQUAKE_MODEL"));
        assert!(AFTER_HELP.contains("EDGEQUAKE_LLM_PROVIDER"));
    }
}
