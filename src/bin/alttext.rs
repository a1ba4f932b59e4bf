//! CLI binary for pptx-alttext.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ModelConfig` / `BackfillConfig`, builds the single vision model, and
//! prints run statistics.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pptx_alttext::pipeline::input::{is_url, resolve_input};
use pptx_alttext::{
    inspect, process, BackfillConfig, BackfillProgressCallback, DocumentSummary, ModelConfig,
    ProgressCallback, RunStats, VisionModel,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
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
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over all pictures, one log line per picture
/// that was captioned or failed.
struct CliProgressCallback {
    bar: ProgressBar,
    failed: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports how many pictures there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening presentation…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failed: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pictures  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Describing");
        self.bar.reset_eta();
    }
}

impl BackfillProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_slides: usize, total_images: usize) {
        self.activate_bar(total_images);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "Checking {total_images} pictures on {total_slides} slides…"
            ))
        ));
    }

    fn on_slide_start(&self, slide: usize, total_slides: usize) {
        self.bar.set_message(format!("slide {slide}/{total_slides}"));
    }

    fn on_image_skipped(&self, _slide: usize, _image: usize) {
        self.bar.inc(1);
    }

    fn on_image_updated(&self, slide: usize, image: usize, caption_len: usize) {
        self.bar.println(format!(
            "  {} Slide {:>3}  image {:<3}  {}",
            green("✓"),
            slide,
            image,
            dim(&format!("{caption_len:>4} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_image_failed(&self, slide: usize, image: usize, error: &str) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Slide {:>3}  image {:<3}  {}",
            red("✗"),
            slide,
            image,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, stats: &RunStats) {
        self.bar.finish_and_clear();
        let failed = self.failed.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} pictures updated",
                green("✔"),
                bold(&stats.images_updated.to_string())
            );
        } else {
            eprintln!(
                "{} {} pictures updated  ({} failed)",
                cyan("⚠"),
                bold(&stats.images_updated.to_string()),
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Add alt text to every picture that lacks it → decks/updated_q3.pptx
  alttext run decks/q3.pptx

  # Choose the output file and model
  alttext run q3.pptx -o q3-accessible.pptx --provider openai --model gpt-4.1-mini

  # Keep a copy of every image that was sent to the model
  alttext run q3.pptx --extract-images extracted/

  # Machine-readable statistics
  alttext run q3.pptx --json > stats.json

  # Which pictures still need alt text? (no API key needed)
  alttext inspect q3.pptx

  # HTTP API on port 5001
  alttext serve --bind 0.0.0.0:5001

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Log filter, e.g. pptx_alttext=debug
"#;

/// Backfill missing alt text in PowerPoint decks using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "alttext",
    version,
    about = "Backfill missing alt text in PowerPoint decks using Vision LLMs",
    long_about = "Find every picture in a .pptx that has no alternative text, describe it with a \
Vision Language Model, and save an updated copy of the deck. Supports OpenAI, Anthropic, Google \
Gemini, Azure OpenAI, and any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ALTTEXT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ALTTEXT_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Describe pictures without alt text and save an updated copy.
    Run(RunArgs),
    /// Print slide and picture counts and current alt text.
    Inspect(InspectArgs),
    /// Serve the HTTP API.
    #[cfg(feature = "server")]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct ModelArgs {
    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "ALTTEXT_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "ALTTEXT_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "ALTTEXT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens per picture.
    #[arg(long, env = "ALTTEXT_MAX_TOKENS", default_value_t = 512)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "ALTTEXT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Longest edge in pixels of the image sent to the model.
    #[arg(long, env = "ALTTEXT_MAX_IMAGE_DIMENSION", default_value_t = 1024)]
    max_image_dimension: u32,

    /// Per-picture LLM call timeout in seconds.
    #[arg(long, env = "ALTTEXT_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, env = "ALTTEXT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Also write every described image into this directory.
    #[arg(long, env = "ALTTEXT_EXTRACT_IMAGES")]
    extract_images: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Local .pptx path or HTTP/HTTPS URL.
    input: String,

    /// Output .pptx path. Default: updated_<name> next to the input.
    #[arg(short, long, env = "ALTTEXT_OUTPUT")]
    output: Option<PathBuf>,

    #[command(flatten)]
    model: ModelArgs,

    /// Print run statistics as JSON.
    #[arg(long, env = "ALTTEXT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "ALTTEXT_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct InspectArgs {
    /// Local .pptx path or HTTP/HTTPS URL.
    input: String,

    /// Print the summary as JSON.
    #[arg(long, env = "ALTTEXT_JSON")]
    json: bool,

    /// HTTP download timeout in seconds (URL inputs).
    #[arg(long, env = "ALTTEXT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[cfg(feature = "server")]
#[derive(Args, Debug)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, env = "ALTTEXT_BIND", default_value = "0.0.0.0:5001")]
    bind: std::net::SocketAddr,

    /// Directory for uploads while they are processed.
    #[arg(long, env = "ALTTEXT_UPLOAD_DIR", default_value = "uploads")]
    upload_dir: PathBuf,

    /// Directory for processed decks.
    #[arg(long, env = "ALTTEXT_OUTPUT_DIR", default_value = "processed")]
    output_dir: PathBuf,

    #[command(flatten)]
    model: ModelArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; verbose always wins.
    let show_progress = match &cli.command {
        Command::Run(args) => !cli.quiet && !args.no_progress && !args.json,
        _ => false,
    };
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

    match cli.command {
        Command::Run(args) => run(args, cli.quiet, show_progress).await,
        Command::Inspect(args) => inspect_cmd(args).await,
        #[cfg(feature = "server")]
        Command::Serve(args) => serve_cmd(args).await,
    }
}

async fn run(args: RunArgs, quiet: bool, show_progress: bool) -> Result<()> {
    // Fail on a bad local path before a provider is built.
    if !is_url(&args.input) {
        resolve_input(&args.input, args.model.download_timeout)
            .await
            .context("Cannot read input presentation")?;
    }

    let model = build_model(&args.model).await?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn BackfillProgressCallback>)
    } else {
        None
    };
    let config = build_backfill_config(&args.model, progress_cb)?;

    let stats = process(&args.input, args.output.as_deref(), &model, &config)
        .await
        .context("Alt-text backfill failed")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&stats).context("Failed to serialise statistics")?
        );
        return Ok(());
    }

    if !quiet {
        print_stats(&stats);
    }
    Ok(())
}

fn print_stats(stats: &RunStats) {
    println!("Slides processed:  {}", stats.slides_processed);
    println!("Images found:      {}", stats.images_found);
    println!("Images updated:    {}", stats.images_updated);
    println!("Images skipped:    {}", stats.images_skipped);
    println!("Images failed:     {}", stats.images_failed);
    if let Some(ref path) = stats.output_path {
        println!("Output:            {}", path.display());
    }
    println!("Duration:          {}ms", stats.duration_ms);
    for failure in &stats.failures {
        eprintln!("  {} {}", red("✗"), failure);
    }
}

async fn inspect_cmd(args: InspectArgs) -> Result<()> {
    let summary = inspect(&args.input, args.download_timeout)
        .await
        .context("Failed to inspect presentation")?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else {
        print_summary(&args.input, &summary);
    }
    Ok(())
}

fn print_summary(input: &str, summary: &DocumentSummary) {
    println!("File:               {}", input);
    println!("Slides:             {}", summary.total_slides);
    println!("Pictures:           {}", summary.total_images);
    println!("With alt text:      {}", summary.images_with_alt);
    println!("Without alt text:   {}", summary.images_without_alt);
    for pic in &summary.pictures {
        let alt = match pic.alt_text {
            Some(ref t) => dim(t),
            None => red("(missing)"),
        };
        println!("  slide {:>3}  image {:<3}  {:<24}  {}", pic.slide, pic.image, pic.shape_name, alt);
    }
}

#[cfg(feature = "server")]
async fn serve_cmd(args: ServeArgs) -> Result<()> {
    use pptx_alttext::server::{serve, ServerConfig};

    let model = build_model(&args.model).await?;
    let backfill = build_backfill_config(&args.model, None)?;
    let config = ServerConfig {
        bind: args.bind,
        upload_dir: args.upload_dir,
        output_dir: args.output_dir,
        ..Default::default()
    };

    serve(config, Arc::new(model), backfill)
        .await
        .context("HTTP server failed")
}

/// Build the process's single vision model from CLI flags.
async fn build_model(args: &ModelArgs) -> Result<VisionModel> {
    let mut builder = ModelConfig::builder()
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_image_dimension(args.max_image_dimension);

    if let Some(ref path) = args.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }

    let config = builder.build().context("Invalid model configuration")?;
    VisionModel::from_config(&config).context("Failed to initialise vision model")
}

fn build_backfill_config(args: &ModelArgs, progress: Option<ProgressCallback>) -> Result<BackfillConfig> {
    let mut builder = BackfillConfig::builder()
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout);

    if let Some(ref dir) = args.extract_images {
        builder = builder.extract_images_dir(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
