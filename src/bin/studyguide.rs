//! CLI binary for edgequake-studyguide.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `StudyGuideConfig` and prints the guide as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_studyguide::{
    build_study_guide, build_study_guide_to_file, generate_study_guide_with_images, inspect,
    ImageIndex, PipelineOutcome, ProgressCallback, StudyGuideConfig, SynthesisProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the run plus a log line per part.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    retries: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_synthesis_start` tells us how many parts there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Extracting document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            retries: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, chunk_num: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&chunk_num))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl SynthesisProgressCallback for CliProgressCallback {
    fn on_synthesis_start(&self, total_chunks: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} parts  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_chunks as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Generating");
        self.bar.reset_eta();
    }

    fn on_chunk_start(&self, chunk_num: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(chunk_num, Instant::now());
        }
        self.bar.set_message(format!("part {chunk_num}"));
    }

    fn on_chunk_retry(&self, chunk_num: usize, attempt: u32, error: String) {
        self.retries.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} Part {:>3}  attempt {}  {}",
            yellow("↻"),
            chunk_num,
            attempt,
            dim(&truncate(&error, 80)),
        ));
    }

    fn on_chunk_complete(&self, chunk_num: usize, total: usize, section_count: usize) {
        let secs = self.elapsed_secs(chunk_num);
        self.bar.println(format!(
            "  {} Part {:>3}/{:<3}  {:<12}  {}",
            green("✓"),
            chunk_num,
            total,
            dim(&format!("{section_count:>3} sections")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_chunk_error(&self, chunk_num: usize, total: usize, error: String) {
        let secs = self.elapsed_secs(chunk_num);
        self.bar.println(format!(
            "  {} Part {:>3}/{:<3}  {}  {}",
            red("✗"),
            chunk_num,
            total,
            red(&truncate(&error, 80)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_synthesis_complete(&self, total_chunks: usize, failed_chunks: usize, total_sections: usize) {
        self.bar.finish_and_clear();
        let ok = total_chunks.saturating_sub(failed_chunks);
        let mark = if failed_chunks == 0 {
            green("✔")
        } else if ok == 0 {
            red("✘")
        } else {
            yellow("⚠")
        };
        eprintln!(
            "{} {}/{} parts  →  {} sections  {}",
            mark,
            bold(&ok.to_string()),
            total_chunks,
            bold(&total_sections.to_string()),
            dim(&format!("({} retries)", self.retries.load(Ordering::SeqCst))),
        );
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let head: String = s.chars().take(max - 1).collect();
        format!("{head}\u{2026}")
    } else {
        s.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Study guide as JSON on stdout
  studyguide lecture.pptx

  # Write to a file
  studyguide lecture.pdf -o guide.json

  # Use a specific model
  studyguide --provider anthropic --model claude-sonnet-4-20250514 deck.pptx

  # From a URL
  studyguide https://example.edu/biology/week3.pdf -o week3.json

  # Already-extracted text (page markers like "--- Slide 3 ---" recommended)
  studyguide --text notes.txt

  # Inspect extraction only (no API key needed)
  studyguide --inspect-only deck.pptx

  # Full run report: guide, per-part attempts, token counts
  studyguide --report lecture.pdf > report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory), for PDF input
  STUDYGUIDE_*            Every flag below has a STUDYGUIDE_ variable
"#;

/// Turn PDF and PPTX documents into bilingual study guides using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "studyguide",
    version,
    about = "Turn PDF and PPTX documents into bilingual study guides using LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/PPTX path or HTTP/HTTPS URL (a text file with --text).
    input: String,

    /// Write the guide JSON to this file instead of stdout.
    #[arg(short, long, env = "STUDYGUIDE_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Treat the input as already-extracted plain text.
    #[arg(long, env = "STUDYGUIDE_TEXT")]
    text: bool,

    /// Maximum characters per generation request.
    #[arg(long, env = "STUDYGUIDE_MAX_CHUNK_CHARS", default_value_t = 12_000)]
    max_chunk_chars: usize,

    /// Minimum extracted characters required to attempt generation.
    #[arg(long, env = "STUDYGUIDE_MIN_TEXT_CHARS", default_value_t = 50)]
    min_text_chars: usize,

    /// Pause between consecutive parts, in milliseconds.
    #[arg(long, env = "STUDYGUIDE_REQUEST_INTERVAL_MS", default_value_t = 1_000)]
    request_interval_ms: u64,

    /// Base backoff after a failed attempt, in milliseconds (doubles per retry).
    #[arg(long, env = "STUDYGUIDE_RETRY_BACKOFF_MS", default_value_t = 2_000)]
    retry_backoff_ms: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "STUDYGUIDE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "STUDYGUIDE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Max LLM output tokens per part.
    #[arg(long, env = "STUDYGUIDE_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "STUDYGUIDE_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Drop images smaller than this many pixels on either side.
    #[arg(long, env = "STUDYGUIDE_MIN_IMAGE_SIDE", default_value_t = 32)]
    min_image_side: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "STUDYGUIDE_PASSWORD")]
    password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "STUDYGUIDE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Print the full run report (guide, per-part results, stats) instead of the guide.
    #[arg(long, env = "STUDYGUIDE_REPORT")]
    report: bool,

    /// Disable progress bar.
    #[arg(long, env = "STUDYGUIDE_NO_PROGRESS")]
    no_progress: bool,

    /// Print what extraction finds, no generation.
    #[arg(long)]
    inspect_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STUDYGUIDE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STUDYGUIDE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.inspect_only;
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

    // ── Inspect-only mode ────────────────────────────────────────────────
    if cli.inspect_only {
        let summary = inspect(&cli.input).await.context("Failed to inspect document")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn SynthesisProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    if let (Some(output_path), false, false) = (&cli.output, cli.text, cli.report) {
        let stats = build_study_guide_to_file(&cli.input, output_path, &config)
            .await
            .context("Study guide generation failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {} pages  {}ms  →  {}",
                green("✔"),
                stats.page_count,
                stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&stats.total_input_tokens.to_string()),
                dim(&stats.total_output_tokens.to_string()),
            );
        }
        return Ok(());
    }

    let outcome = if cli.text {
        let text = tokio::fs::read_to_string(&cli.input)
            .await
            .with_context(|| format!("Failed to read text from {}", cli.input))?;
        generate_study_guide_with_images(&text, &ImageIndex::new(), &config)
            .await
            .context("Study guide generation failed")?
    } else {
        build_study_guide(&cli.input, &config)
            .await
            .context("Study guide generation failed")?
    };

    let json = if cli.report {
        serde_json::to_string_pretty(&outcome)
    } else {
        serde_json::to_string_pretty(&outcome.document)
    }
    .context("Failed to serialise output")?;

    match cli.output {
        Some(ref path) => tokio::fs::write(path, json.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(json.as_bytes())
                .and_then(|_| handle.write_all(b"\n"))
                .context("Failed to write to stdout")?;
        }
    }

    if !cli.quiet {
        print_summary(&outcome);
    }
    Ok(())
}

fn print_summary(outcome: &PipelineOutcome) {
    let questions = outcome.document.questions().count();
    eprintln!(
        "   {} sections, {} questions  —  {} tokens in / {} out  —  {}ms",
        outcome.document.len(),
        questions,
        dim(&outcome.stats.total_input_tokens.to_string()),
        dim(&outcome.stats.total_output_tokens.to_string()),
        outcome.stats.total_duration_ms,
    );
    if outcome.is_partial() {
        eprintln!(
            "   {} {} of {} parts failed; their content is missing",
            yellow("⚠"),
            outcome.chunks_failed,
            outcome.chunks_attempted
        );
    }
}

/// Map CLI args to `StudyGuideConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<StudyGuideConfig> {
    let mut builder = StudyGuideConfig::builder()
        .max_chunk_chars(cli.max_chunk_chars)
        .min_text_chars(cli.min_text_chars)
        .request_interval_ms(cli.request_interval_ms)
        .retry_backoff_ms(cli.retry_backoff_ms)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .min_image_side(cli.min_image_side);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref pwd) = cli.password {
        builder = builder.password(pwd.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
