//! CLI binary for docparse-ingest.
//!
//! A thin shim over the library crate: each file becomes an ingest document
//! (base64 bytes in the input field, file name in `source`), the processor
//! runs over all of them, and the enriched documents are printed.

use anyhow::{Context, Result};
use clap::Parser;
use docparse_ingest::{
    BatchProgressCallback, IngestDocument, IngestError, IngestProcessor, NoopBatchProgress,
    ProcessorConfig, DEFAULT_BASE_URL,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

/// Field holding the input bytes of every CLI document.
const INPUT_FIELD: &str = "data";

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text from one PDF
  docparse-ingest report.pdf

  # Several files at once, full documents as JSON
  docparse-ingest --json scans/*.pdf > docs.json

  # OCR with a fixed threshold and table structure
  docparse-ingest --threshold 0.35 --text-mode standard_ocr --table-mode standard invoice.pdf

  # Property extraction with a schema file
  docparse-ingest --schema-path real_estate_schema.json --json listing.pdf

ENVIRONMENT VARIABLES:
  ARYN_API_KEY     Bearer credential for the partitioning service
  ARYN_URL         Service base URL (default: https://api.aryn.ai)
  RUST_LOG         Overrides --verbose/--quiet log filtering
"#;

/// Partition documents through DocParse and print the extracted text.
#[derive(Parser, Debug)]
#[command(
    name = "docparse-ingest",
    version,
    about = "Partition documents through DocParse and print the extracted text and properties",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Documents to partition (PDF, image, ...).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Partitioning service API key.
    #[arg(long, env = "ARYN_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Partitioning service base URL.
    #[arg(long, env = "ARYN_URL", default_value = DEFAULT_BASE_URL)]
    url: String,

    /// Detection threshold: "auto" or a number between 0 and 1.
    #[arg(long, env = "DOCPARSE_THRESHOLD", default_value = "auto")]
    threshold: String,

    /// Text extraction mode (service default if unset).
    #[arg(long, env = "DOCPARSE_TEXT_MODE")]
    text_mode: Option<String>,

    /// Table extraction mode (service default if unset).
    #[arg(long, env = "DOCPARSE_TABLE_MODE")]
    table_mode: Option<String>,

    /// OCR language hint, e.g. "english" (service default if unset).
    #[arg(long, env = "DOCPARSE_OCR_LANGUAGE")]
    ocr_language: Option<String>,

    /// Extract embedded images.
    #[arg(long)]
    extract_images: bool,

    /// Summarise extracted images.
    #[arg(long)]
    summarize_images: bool,

    /// Inline property-extraction schema (JSON). Wins over --schema-path.
    #[arg(long)]
    schema: Option<String>,

    /// Path to a property-extraction schema file.
    #[arg(long)]
    schema_path: Option<PathBuf>,

    /// Document field receiving the extracted text.
    #[arg(long, default_value = "parsed_data")]
    output_field: String,

    /// Documents partitioned at once.
    #[arg(short, long, env = "DOCPARSE_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Retries per document on transient failures.
    #[arg(long, env = "DOCPARSE_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call timeout in seconds.
    #[arg(long, env = "DOCPARSE_TIMEOUT", default_value_t = 300)]
    timeout: u64,

    /// Print the enriched documents as JSON instead of plain text.
    #[arg(long)]
    json: bool,

    /// Disable the progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && cli.files.len() > 1;
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

    // ── Build processor ──────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let processor = IngestProcessor::new(config).context("Invalid processor configuration")?;

    // ── Load documents ───────────────────────────────────────────────────
    let mut documents = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut doc = IngestDocument::new();
        doc.set_field("source", path.display().to_string());
        doc.set_field_bytes(INPUT_FIELD, &bytes);
        documents.push(doc);
    }

    // ── Partition ────────────────────────────────────────────────────────
    let start = Instant::now();
    let results = if show_progress {
        let progress = BarProgress {
            bar: progress_bar(documents.len()),
            sources: cli.files.iter().map(|p| p.display().to_string()).collect(),
        };
        let results = processor
            .execute_batch_with_progress(&mut documents, &progress)
            .await;
        progress.bar.finish_and_clear();
        results
    } else {
        processor
            .execute_batch_with_progress(&mut documents, &NoopBatchProgress)
            .await
    };

    // ── Output ───────────────────────────────────────────────────────────
    let mut failures = 0;
    let mut succeeded = Vec::new();
    for (path, (doc, result)) in cli.files.iter().zip(documents.into_iter().zip(results)) {
        match result {
            Ok(()) => succeeded.push(doc),
            Err(e) => {
                failures += 1;
                if !show_progress {
                    eprintln!("{} {}: {e}", red("✗"), path.display());
                }
            }
        }
    }

    if cli.json {
        let docs: Vec<Value> = succeeded
            .into_iter()
            .map(|doc| {
                let mut source = doc.into_source();
                source.remove(INPUT_FIELD);
                Value::Object(source)
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&docs).context("Failed to serialise documents")?
        );
    } else {
        let many = cli.files.len() > 1;
        for doc in &succeeded {
            print_document(doc, &cli.output_field, many);
        }
    }

    if !cli.quiet {
        let total = cli.files.len();
        eprintln!(
            "{} {}/{} documents partitioned  {}",
            if failures == 0 { green("✔") } else { red("✘") },
            bold(&(total - failures).to_string()),
            total,
            dim(&format!("{}ms", start.elapsed().as_millis())),
        );
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {} documents failed", cli.files.len());
    }
    Ok(())
}

/// Map CLI args to `ProcessorConfig`.
fn build_config(cli: &Cli) -> Result<ProcessorConfig> {
    let mut builder = ProcessorConfig::builder()
        .api_key(cli.api_key.clone())
        .base_url(cli.url.clone())
        .input_field(INPUT_FIELD)
        .output_field(cli.output_field.clone())
        .threshold(cli.threshold.clone())
        .extract_images(cli.extract_images)
        .summarize_images(cli.summarize_images)
        .concurrency(cli.concurrency)
        .max_retries(cli.max_retries)
        .timeout_secs(cli.timeout);

    if let Some(ref mode) = cli.text_mode {
        builder = builder.text_mode(mode.clone());
    }
    if let Some(ref mode) = cli.table_mode {
        builder = builder.table_mode(mode.clone());
    }
    if let Some(ref language) = cli.ocr_language {
        builder = builder.ocr_language(language.clone());
    }
    if let Some(ref schema) = cli.schema {
        builder = builder.schema(schema.clone());
    }
    if let Some(ref path) = cli.schema_path {
        builder = builder.schema_path(path.clone());
    }

    builder.build().context("Invalid configuration")
}

/// Prints one line per finished document above an indicatif bar.
struct BarProgress {
    bar: ProgressBar,
    sources: Vec<String>,
}

impl BarProgress {
    fn source(&self, index: usize) -> &str {
        self.sources.get(index).map(String::as_str).unwrap_or("?")
    }
}

impl BatchProgressCallback for BarProgress {
    fn on_document_complete(&self, index: usize, _total: usize, _document: &IngestDocument) {
        self.bar
            .println(format!("  {} {}", green("✓"), self.source(index)));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, _total: usize, error: &IngestError) {
        self.bar.println(format!(
            "  {} {}  {}",
            red("✗"),
            self.source(index),
            red(&error.to_string())
        ));
        self.bar.inc(1);
    }
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} documents  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.set_prefix("Partitioning");
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Print the extracted text, then any other field the processor added.
fn print_document(doc: &IngestDocument, output_field: &str, with_header: bool) {
    if with_header {
        let source = doc.get("source").and_then(Value::as_str).unwrap_or("?");
        println!("{}", bold(&format!("==> {source} <==")));
    }
    if let Some(text) = doc.get(output_field).and_then(Value::as_str) {
        println!("{text}");
    }
    for (key, value) in doc.source() {
        if key == INPUT_FIELD || key == "source" || key == output_field {
            continue;
        }
        println!("{}: {}", dim(key), value);
    }
}
