//! Building permit table extraction CLI
//!
//! Extract Census building permit tables from scanned PDFs with Gemini and
//! audit the extracted rows.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use permit_core::{render_json, render_text, save_rows, TolerancePolicy, Validator};
use permit_extract::{
    default_trial_output, BatchRunner, ExtractionConfig, GeminiClient, GeminiExtractor, PagePair,
    PairTrial,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Tolerance applied by `audit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
enum Policy {
    /// Sums must match within ±1
    Strict,
    /// max(5, 1%) for units, max(10, 1%) for valuations
    Lenient,
}

impl Policy {
    const fn tolerance(self) -> TolerancePolicy {
        match self {
            Self::Strict => TolerancePolicy::strict(),
            Self::Lenient => TolerancePolicy::lenient(),
        }
    }

    const fn title(self) -> &'static str {
        match self {
            Self::Strict => "STRICT VALIDATION REPORT",
            Self::Lenient => "LENIENT VALIDATION REPORT",
        }
    }
}

/// Report format for `audit`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
enum Format {
    /// Human-readable sections
    Text,
    /// Machine-readable report
    Json,
}

#[derive(Parser)]
#[command(name = "permit-ocr")]
#[command(about = "Extract and validate building permit tables from scanned Census reports")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract every page pair of every scanned PDF
    Extract {
        /// Directory containing the scanned PDFs
        #[arg(long)]
        scans: Option<PathBuf>,

        /// Output directory for page pair JSON files
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Gemini model id
        #[arg(long)]
        model: Option<String>,

        /// Delay between extraction calls in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Extract a single page pair and report on it
    ExtractPair {
        /// Path to the scanned PDF
        #[arg(short, long)]
        pdf: PathBuf,

        /// First page of the pair (1-based); the pair is FIRST and FIRST+1
        #[arg(long, default_value = "1")]
        first_page: u32,

        /// Where to save the extracted rows
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Gemini model id
        #[arg(long)]
        model: Option<String>,
    },

    /// Re-validate all extracted page pairs
    Audit {
        /// Directory containing the page pair JSON files
        #[arg(short, long, default_value = "raw_ocr")]
        output: PathBuf,

        /// Tolerance for the sum checks
        #[arg(long, value_enum, default_value = "strict")]
        policy: Policy,

        /// Report format
        #[arg(long, value_enum, default_value = "text")]
        format: Format,

        /// Report file (default: OUTPUT/second_look_validation.log)
        #[arg(long)]
        log: Option<PathBuf>,
    },

    /// Check the API key and model with a short text request
    Ping {
        /// Gemini model id
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env first so RUST_LOG from it applies; a missing .env is fine
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "permit_ocr=info,permit_extract=info".into()),
        )
        .init();

    let args = Args::parse();
    let mut config = ExtractionConfig::from_env();

    match args.command {
        Command::Extract {
            scans,
            output,
            model,
            delay_ms,
        } => {
            if let Some(scans) = scans {
                config.scans_dir = scans;
            }
            if let Some(output) = output {
                config.output_dir = output;
            }
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(delay_ms) = delay_ms {
                config.request_delay = Duration::from_millis(delay_ms);
            }
            extract(&config).await?;
        }
        Command::ExtractPair {
            pdf,
            first_page,
            output,
            model,
        } => {
            if let Some(model) = model {
                config.model = model;
            }
            let pair = PagePair::starting_at(first_page);
            let output = output.unwrap_or_else(|| default_trial_output(&pdf, pair));
            extract_pair(&config, &pdf, pair, &output).await?;
        }
        Command::Audit {
            output,
            policy,
            format,
            log,
        } => {
            let log = log.unwrap_or_else(|| output.join("second_look_validation.log"));
            audit(&output, policy, format, &log)?;
        }
        Command::Ping { model } => {
            if let Some(model) = model {
                config.model = model;
            }
            ping(&config).await?;
        }
    }

    Ok(())
}

/// Run the batch extraction and print its summary
async fn extract(config: &ExtractionConfig) -> Result<()> {
    let extractor = GeminiExtractor::from_config(config)?;
    info!("Model: {}", extractor.client().model());

    let summary = BatchRunner::new(extractor, config).run().await?;
    if summary.reports.is_empty() {
        println!("No PDF files found in {}", config.scans_dir.display());
        return Ok(());
    }

    println!("\n{summary}");
    Ok(())
}

/// Extract one page pair, print the trial report and save the rows
async fn extract_pair(
    config: &ExtractionConfig,
    pdf: &Path,
    pair: PagePair,
    output: &Path,
) -> Result<()> {
    let extractor = GeminiExtractor::from_config(config)?;
    if !pdf.exists() {
        anyhow::bail!("PDF not found at {}", pdf.display());
    }

    let rule = "=".repeat(60);
    println!("{rule}");
    println!("Testing Gemini PDF Extraction");
    println!("{rule}");
    println!("Model: {}", config.model);
    println!("PDF: {}", pdf.display());
    println!("Pages: {pair}");
    println!("{rule}");

    let trial = PairTrial::run(&extractor, pdf, pair).await?;
    println!("\n{}", trial.render());

    if trial.rows.is_empty() {
        return Ok(());
    }

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    save_rows(output, &trial.rows)?;
    println!("\nFull output saved to: {}", output.display());
    println!("Total rows extracted: {}", trial.rows.len());
    Ok(())
}

/// Validate every page pair file and write the report
fn audit(dir: &Path, policy: Policy, format: Format, log: &Path) -> Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("Output directory not found: {}", dir.display());
    }
    if is_json(log) && is_inside(dir, log) {
        anyhow::bail!(
            "Refusing to write {}: a .json report inside {} would be audited as a row file",
            log.display(),
            dir.display()
        );
    }

    let report = Validator::new(policy.tolerance()).check_directory(dir)?;
    if report.files.is_empty() {
        println!("No JSON files found");
        return Ok(());
    }

    let rendered = match format {
        Format::Text => render_text(&report, policy.title()),
        Format::Json => render_json(&report).context("Failed to serialize report")?,
    };

    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }
    fs::write(log, &rendered).with_context(|| format!("Failed to write {}", log.display()))?;
    println!("\nLog written to: {}", log.display());
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Whether `path` (which may not exist yet) would land under `dir`
fn is_inside(dir: &Path, path: &Path) -> bool {
    let Ok(dir) = dir.canonicalize() else {
        return false;
    };
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    parent.canonicalize().is_ok_and(|p| p.starts_with(&dir))
}

/// Basic text round trip with the configured model
async fn ping(config: &ExtractionConfig) -> Result<()> {
    let client = GeminiClient::new(config)?;
    info!("Running basic Gemini text test with {}", client.model());

    let reply = client
        .generate_text("Say 'hello from Gemini' and nothing else.")
        .await?;
    println!("Raw response: {}", reply.text.trim());
    println!(
        "Tokens: {} in / {} out, {}ms",
        reply.input_tokens, reply.output_tokens, reply.latency_ms
    );
    Ok(())
}
