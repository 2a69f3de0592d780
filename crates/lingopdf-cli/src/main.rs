//! lingopdf CLI - layout-preserving PDF translation from the shell.
//!
//! Commands:
//! - `translate`: run the full pipeline on one document and wait
//! - `validate`: pre-flight check a PDF without translating it
//! - `quality`: compare an original against a reconstructed document
//! - `choices export` / `choices import`: move user decisions between
//!   installations
//! - `choices terminology`: seed a term → translation map as global
//!   choices
//!
//! Configuration comes from the environment (`OCR_ENDPOINT`,
//! `TRANSLATION_API_KEY`, …); see the library's `core::config` docs for
//! every key. Logging is controlled via `RUST_LOG`.

#![deny(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use lingopdf::choices::{HeuristicTagger, NeologismTagger, UserChoiceStore};
use lingopdf::core::config::PipelineConfig;
use lingopdf::jobs::{JobOrchestrator, PipelineClients};
use lingopdf::ocr::OcrClient;
use lingopdf::pdf::PdfiumRasterizer;
use lingopdf::quality::{QualityThresholds, validate_reconstruction};
use lingopdf::translation::HttpTranslator;
use lingopdf::types::JobStatus;

/// lingopdf layout-preserving PDF translation CLI
#[derive(Parser)]
#[command(name = "lingopdf")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a PDF document, preserving its layout
    Translate {
        /// Path to the source PDF
        path: PathBuf,

        /// Source language (ISO 639-1, e.g. "de")
        #[arg(short = 'f', long)]
        from: String,

        /// Target language (ISO 639-1, e.g. "en")
        #[arg(short = 't', long)]
        to: String,

        /// Attach the user-choice store so terminology decisions apply
        #[arg(long)]
        with_choices: bool,

        /// Output format (text or json)
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Validate a PDF without translating it
    Validate {
        /// Path to the PDF
        path: PathBuf,
    },

    /// Compare an original document against its reconstruction
    Quality {
        /// The original PDF
        original: PathBuf,
        /// The reconstructed PDF
        reconstructed: PathBuf,

        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Manage the user-choice store
    Choices {
        #[command(subcommand)]
        command: ChoicesCommands,
    },
}

#[derive(Subcommand)]
enum ChoicesCommands {
    /// Export choices as JSON
    Export {
        /// Restrict to one session
        #[arg(long)]
        session: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import choices from a JSON export
    Import {
        /// The export file
        path: PathBuf,

        /// Attach imported choices to a session
        #[arg(long)]
        session: Option<String>,
    },

    /// Seed a terminology map (JSON object of term → translation)
    Terminology {
        /// JSON file with the map
        path: PathBuf,

        /// Source language of the terms
        #[arg(short = 'f', long)]
        from: String,

        /// Target language of the translations
        #[arg(short = 't', long)]
        to: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Translate {
            path,
            from,
            to,
            with_choices,
            format,
        } => translate(path, &from, &to, with_choices, format).await,
        Commands::Validate { path } => validate(path),
        Commands::Quality {
            original,
            reconstructed,
            format,
        } => quality(original, reconstructed, format),
        Commands::Choices { command } => choices(command),
    }
}

async fn translate(
    path: PathBuf,
    from: &str,
    to: &str,
    with_choices: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = PipelineConfig::from_env().context("invalid configuration")?;

    let store = if with_choices {
        Some(Arc::new(
            UserChoiceStore::open(config.choices.clone()).context("failed to open choice store")?,
        ))
    } else {
        None
    };

    let clients = PipelineClients {
        rasterizer: Arc::new(PdfiumRasterizer),
        ocr: Arc::new(OcrClient::new(config.ocr.clone()).context("failed to build OCR client")?),
        translator: Arc::new(
            HttpTranslator::new(config.translation.clone())
                .context("failed to build translation client")?,
        ),
        tagger: store
            .as_ref()
            .map(|_| Arc::new(HeuristicTagger) as Arc<dyn NeologismTagger>),
        choices: store,
    };

    let orchestrator = JobOrchestrator::new(config, clients);
    let job_id = orchestrator.submit(&path, from, to)?;

    let mut last_progress = 0u8;
    let job = loop {
        let job = orchestrator.status(&job_id)?;
        if job.progress != last_progress {
            last_progress = job.progress;
            eprintln!("  {}%", job.progress);
        }
        if job.status.is_terminal() {
            break job;
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    };

    orchestrator.shutdown().await;

    match job.status {
        JobStatus::Completed => {
            let output = job.output_path.clone().context("missing output path")?;
            match format {
                OutputFormat::Text => println!("{}", output.display()),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&job)?),
            }
            Ok(())
        }
        _ => {
            let reason = job.error.unwrap_or_else(|| "unknown failure".to_string());
            bail!("translation failed: {reason}");
        }
    }
}

fn validate(path: PathBuf) -> Result<()> {
    let config = PipelineConfig::from_env().context("invalid configuration")?;
    match lingopdf::pdf::validate(&path, config.pdf.max_file_size_mb) {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(err) => bail!("{}", err.user_message()),
    }
}

fn quality(original: PathBuf, reconstructed: PathBuf, format: OutputFormat) -> Result<()> {
    let report =
        validate_reconstruction(&original, &reconstructed, &QualityThresholds::default())?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => {
            println!(
                "text coverage:    {:.2} ({})",
                report.text_coverage_ratio,
                pass(report.text_coverage_pass)
            );
            println!(
                "layout similarity: {:.2} ({})",
                report.layout_hash_similarity,
                pass(report.layout_pass)
            );
            println!(
                "font preservation: {:.2} ({})",
                report.font_preservation_ratio,
                pass(report.font_pass)
            );
            for warning in &report.warnings {
                println!("warning: {warning}");
            }
        }
    }

    if report.passed() {
        Ok(())
    } else {
        bail!("quality gates failed");
    }
}

fn pass(ok: bool) -> &'static str {
    if ok { "pass" } else { "FAIL" }
}


fn choices(command: ChoicesCommands) -> Result<()> {
    let config = PipelineConfig::from_env().context("invalid configuration")?;
    let store = UserChoiceStore::open(config.choices).context("failed to open choice store")?;

    match command {
        ChoicesCommands::Export { session, out } => {
            let bytes = store.export(session.as_deref())?;
            match out {
                Some(path) => std::fs::write(&path, &bytes)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => println!("{}", String::from_utf8_lossy(&bytes)),
            }
            Ok(())
        }
        ChoicesCommands::Import { path, session } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let imported = store.import(&bytes, session.as_deref())?;
            println!("imported {imported} choices");
            Ok(())
        }
        ChoicesCommands::Terminology { path, from, to } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let map: std::collections::BTreeMap<String, String> = serde_json::from_slice(&bytes)
                .context("terminology file must be a JSON object of term → translation")?;
            let seeded = store.bootstrap_terminology(
                map.iter().map(|(k, v)| (k.as_str(), v.as_str())),
                &from,
                &to,
            )?;
            println!("seeded {seeded} terminology entries");
            Ok(())
        }
    }
}
