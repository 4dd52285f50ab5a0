//! CLI binary for nutrivisual.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `AnalysisConfig`, runs one analysis per input and prints the results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use nutrivisual::config::default_model;
use nutrivisual::{
    palette_color, write_pie_chart, AnalysisConfig, AnalysisProgressCallback, AnalysisResult,
    AnalysisStage, Analyzer, Condition, Credentials, Notice, ProgressCallback,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
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
fn truecolor([r, g, b]: [u8; 3], s: &str) -> String {
    format!("\x1b[38;2;{r};{g};{b}m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

/// Terminal spinner showing the current stage of each request.
///
/// A fresh spinner is created when a file is accepted and cleared when the
/// request reaches `Done` or `Failed`, so the same callback serves every
/// input in turn.
struct CliProgressCallback {
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            bar: Mutex::new(None),
        })
    }

    fn spinner() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Analysing");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: &AnalysisStage) {
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };
        match stage {
            AnalysisStage::FileSelected => {
                let bar = Self::spinner();
                bar.set_message("loading document…");
                *slot = Some(bar);
            }
            AnalysisStage::Loaded => {
                if let Some(bar) = slot.as_ref() {
                    bar.set_message("asking the vision model…");
                }
            }
            AnalysisStage::Generated => {
                if let Some(bar) = slot.as_ref() {
                    bar.set_message("parsing composition…");
                }
            }
            AnalysisStage::Done | AnalysisStage::Failed(_) => {
                if let Some(bar) = slot.take() {
                    bar.finish_and_clear();
                }
            }
            AnalysisStage::Idle | AnalysisStage::Parsed => {}
        }
    }

    fn on_generation_attempt(&self, attempt: u32, max_attempts: u32) {
        if attempt < 2 {
            return;
        }
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.set_message(format!("retrying ({attempt}/{max_attempts})…"));
            }
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Analyse a meal plan for general health
  nutrivisual meal-plan.pdf

  # Tailor the recommendation and save the pie chart
  nutrivisual --condition diabetes --chart chart.png week1.docx

  # Photo from a URL, JSON output
  nutrivisual --json https://example.com/plans/lunch.jpg

  # Several files at once (charts become chart-1.png, chart-2.png, …)
  nutrivisual --chart chart.png monday.png tuesday.png

  # List supported health conditions
  nutrivisual --list-conditions

SUPPORTED INPUTS:
  PDF, DOC, DOCX, JPG, JPEG, PNG (local path or HTTP/HTTPS URL)

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (default provider)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  MISTRAL_API_KEY         Mistral API key
  NUTRIVISUAL_PROVIDER    Override provider (gemini, openai, anthropic, ollama, …)
  NUTRIVISUAL_MODEL       Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium when it is not on the loader path

  Variables can also be placed in a .env file in the working directory.
"#;

/// Analyse diet plans with Vision LLMs and chart their composition.
#[derive(Parser, Debug)]
#[command(
    name = "nutrivisual",
    version,
    about = "Analyse diet plans with Vision LLMs and chart their food-category composition",
    long_about = "Analyse diet plans (PDF, Word documents or photos, local or by URL) with a \
Vision Language Model. The model's description is parsed into food-category percentages, \
optionally drawn as a pie chart, and paired with a recommendation for the selected health \
condition.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present = "list_conditions")]
    inputs: Vec<String>,

    /// Health condition the recommendation is tailored to.
    #[arg(short = 'c', long, env = "NUTRIVISUAL_CONDITION", default_value = "general",
          value_parser = parse_condition)]
    condition: Condition,

    /// Write the pie chart as PNG to this path.
    #[arg(long, env = "NUTRIVISUAL_CHART")]
    chart: Option<PathBuf>,

    /// Pie chart edge length in pixels.
    #[arg(long, env = "NUTRIVISUAL_CHART_SIZE", default_value_t = 480,
          value_parser = clap::value_parser!(u32).range(16..=4096))]
    chart_size: u32,

    /// Output structured JSON (AnalysisResult) instead of a report.
    #[arg(long, env = "NUTRIVISUAL_JSON")]
    json: bool,

    /// Print the supported health conditions and exit.
    #[arg(long)]
    list_conditions: bool,

    /// LLM provider: gemini, openai, anthropic, mistral, azure, openrouter, ollama, lmstudio.
    #[arg(long, env = "NUTRIVISUAL_PROVIDER", default_value = "gemini")]
    provider: String,

    /// LLM model ID. Defaults to a vision model suited to the provider.
    #[arg(long, env = "NUTRIVISUAL_MODEL")]
    model: Option<String>,

    /// Rendering DPI for PDF pages (72–400).
    #[arg(long, env = "NUTRIVISUAL_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Max LLM output tokens.
    #[arg(long, env = "NUTRIVISUAL_MAX_TOKENS", default_value_t = 1024)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "NUTRIVISUAL_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries on LLM failure.
    #[arg(long, env = "NUTRIVISUAL_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// Per-attempt LLM call timeout in seconds.
    #[arg(long, env = "NUTRIVISUAL_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "NUTRIVISUAL_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Path to a text file replacing the built-in analysis prompt.
    #[arg(long, env = "NUTRIVISUAL_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "NUTRIVISUAL_VERBOSE")]
    verbose: bool,

    /// Suppress all output except results and errors.
    #[arg(short, long, env = "NUTRIVISUAL_QUIET")]
    quiet: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "NUTRIVISUAL_NO_PROGRESS")]
    no_progress: bool,
}

fn parse_condition(s: &str) -> Result<Condition, String> {
    Condition::from_name(s).ok_or_else(|| {
        let known: Vec<&str> = Condition::ALL.iter().map(|c| c.slug()).collect();
        format!("unknown condition '{s}'. Known: {}", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is the normal case.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
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

    if cli.list_conditions {
        print_conditions();
        return Ok(());
    }

    // ── Credentials & config ─────────────────────────────────────────────
    let credentials = Credentials::from_env(&cli.provider)?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;
    let analyzer = Analyzer::from_config(config, &credentials)?;

    // ── Run analyses ─────────────────────────────────────────────────────
    let total = cli.inputs.len();
    let mut failures = 0usize;

    for (i, input) in cli.inputs.iter().enumerate() {
        match analyzer.analyze_input(input, cli.condition).await {
            Ok(result) => {
                let chart = match cli.chart {
                    Some(ref base) => {
                        let path = chart_path_for(base, i, total);
                        match write_pie_chart(&result.composition, &path, cli.chart_size) {
                            Ok(true) => Some(path),
                            Ok(false) => None,
                            Err(e) => {
                                eprintln!("{} {}", red("✘"), e);
                                failures += 1;
                                None
                            }
                        }
                    }
                    None => None,
                };

                if cli.json {
                    let json = serde_json::to_string_pretty(&result)
                        .context("Failed to serialise result")?;
                    println!("{json}");
                } else {
                    print_report(&result, chart.as_deref(), cli.quiet);
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{} {}  {}", red("✘"), bold(input), red(&e.to_string()));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} of {total} input(s) failed");
    }
    Ok(())
}

/// Map CLI args to `AnalysisConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<AnalysisConfig> {
    let model = cli
        .model
        .clone()
        .unwrap_or_else(|| default_model(&cli.provider).to_string());

    let mut builder = AnalysisConfig::builder()
        .dpi(cli.dpi)
        .provider_name(cli.provider.clone())
        .model(model)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt_override(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `chart.png` for a single input; `chart-1.png`, `chart-2.png`, … otherwise.
fn chart_path_for(base: &Path, index: usize, total: usize) -> PathBuf {
    if total <= 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chart".to_string());
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| "png".to_string());
    base.with_file_name(format!("{stem}-{}.{ext}", index + 1))
}

fn print_conditions() {
    for condition in Condition::ALL {
        println!("  {:<20} {}", cyan(condition.slug()), condition.name());
    }
}

const NOTHING_TO_CHART: &str =
    "Every parsed category is zero or negative, so there is no chart.";

/// The warning printed above the composition, if any.
fn composition_warning(result: &AnalysisResult) -> Option<&'static str> {
    if result.is_empty_composition() {
        Some(Notice::EmptyComposition.message())
    } else if result.composition.chart_slices().is_empty() {
        Some(NOTHING_TO_CHART)
    } else {
        None
    }
}

fn print_report(result: &AnalysisResult, chart: Option<&Path>, quiet: bool) {
    println!(
        "{} {}  {}",
        cyan("◆"),
        bold(&result.file_name),
        dim(&format!("{} · {}", result.file_kind, result.condition_name))
    );

    if !quiet && !result.cleaned_text.is_empty() {
        println!();
        for line in result.cleaned_text.lines() {
            println!("  {}", dim(line));
        }
    }

    println!();
    if let Some(warning) = composition_warning(result) {
        println!("{} {}", yellow("⚠"), warning);
    }
    let slices = result.composition.chart_slices();
    let width = result
        .composition
        .iter()
        .map(|e| e.label.chars().count())
        .max()
        .unwrap_or(0);
    if slices.is_empty() {
        for entry in result.composition.iter() {
            println!("  {:<width$}  {:>6.1}%", entry.label, entry.percentage);
        }
    } else {
        println!("{}", bold("Composition"));
        for (i, slice) in slices.iter().enumerate() {
            let blocks = (slice.fraction * 30.0).round() as usize;
            println!(
                "  {} {:<width$}  {:>6.1}%  {}",
                truecolor(palette_color(i), "●"),
                slice.label,
                slice.percentage,
                truecolor(palette_color(i), &"█".repeat(blocks.max(1))),
            );
        }
        let skipped = result.composition.len() - slices.len();
        if skipped > 0 {
            println!("  {}", dim(&format!("({skipped} non-positive entries not charted)")));
        }
    }

    for notice in &result.notices {
        if *notice != Notice::EmptyComposition {
            println!("{} {}", yellow("⚠"), notice.message());
        }
    }

    println!();
    println!("{} {}", bold("Recommendation:"), result.recommendation);

    if let Some(path) = chart {
        println!("{} chart saved to {}", green("✔"), bold(&path.display().to_string()));
    }
    if !quiet {
        println!(
            "{}",
            dim(&format!(
                "   {} tokens in  /  {} tokens out  —  {}ms",
                result.stats.input_tokens, result.stats.output_tokens, result.stats.duration_ms
            ))
        );
    }
    println!();
}
