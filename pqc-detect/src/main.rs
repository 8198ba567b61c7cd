//! pqc-detect - PepperQC detection command line
//!
//! Thin collaborator around the library: loads materialized analyzer output
//! (frame tags, detector logs, OCR samples) from files, runs the analysis
//! and prints the JSON report.
//!
//! Logs go to stderr (or the configured log file); stdout carries only JSON.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pqc_common::config::{resolve_cache_dir, resolve_config_path, LoggingConfig, TomlConfig};
use pqc_common::{Catalog, DetectorKind};
use pqc_detect::analysis::{analyze, analyze_concurrently, AnalysisInput};
use pqc_detect::cache::{JsonFileCache, OverlayCache};
use pqc_detect::input::{load_frames, load_issues, load_log, load_ocr_batches, load_preset_value};
use pqc_detect::preset::{default_preset, resolve, ResolvedPreset};
use serde::Serialize;
use tracing::{info, Dispatch};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// Command-line arguments for pqc-detect
#[derive(Parser, Debug)]
#[command(name = "pqc-detect")]
#[command(about = "PepperQC detection core: presets, thresholds and issue aggregation")]
#[command(version)]
struct Args {
    /// TOML config file (falls back to PQC_CONFIG, then the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze one source from its materialized analyzer output
    Analyze(AnalyzeArgs),

    /// Print the fully resolved preset
    ResolvePreset {
        /// Preset JSON (defaults to the config's preset, then the catalog defaults)
        #[arg(long, value_name = "FILE")]
        preset: Option<PathBuf>,
    },

    /// Print the compiled-in filter and detector catalog
    Catalog,
}

#[derive(clap::Args, Debug)]
struct AnalyzeArgs {
    /// Per-frame tag stream (JSON)
    #[arg(long, value_name = "FILE")]
    frames: Option<PathBuf>,

    /// blackdetect log text
    #[arg(long, value_name = "FILE")]
    blackdetect_log: Option<PathBuf>,

    /// freezedetect log text
    #[arg(long, value_name = "FILE")]
    freezedetect_log: Option<PathBuf>,

    /// silencedetect log text
    #[arg(long, value_name = "FILE")]
    silencedetect_log: Option<PathBuf>,

    /// OCR samples (JSON)
    #[arg(long, value_name = "FILE")]
    ocr: Option<PathBuf>,

    /// Issues recorded by other tools (JSON), merged into the report
    #[arg(long, value_name = "FILE")]
    issues: Option<PathBuf>,

    /// Preset JSON
    #[arg(long, value_name = "FILE")]
    preset: Option<PathBuf>,

    /// Source identity used for overlay caching (defaults to the first input path)
    #[arg(long)]
    source_id: Option<String>,

    /// Overlay cache directory (falls back to PQC_CACHE_DIR, config, platform cache dir)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(long, short, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Run producers on parallel workers
    #[arg(long)]
    concurrent: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config loading logs through the bootstrap subscriber
    let config = tracing::dispatcher::with_default(&bootstrap_dispatch(std::io::stderr), || {
        load_config(args.config.as_deref())
    })?;

    init_tracing(&config.logging)?;

    info!(
        "Starting pqc-detect v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match args.command {
        Command::Analyze(analyze_args) => run_analyze(analyze_args, &config).await,
        Command::ResolvePreset { preset } => {
            let resolved = load_preset(preset.as_deref().or(config.preset.as_deref()))?;
            let value = resolved.to_value().context("Failed to serialize preset")?;
            emit(&value, None)
        }
        Command::Catalog => emit(Catalog::builtin(), None),
    }
}

/// Subscriber used until the configured one is installed
fn bootstrap_dispatch<W>(writer: W) -> Dispatch
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    Dispatch::new(
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .finish(),
    )
}

fn load_config(cli_arg: Option<&Path>) -> Result<TomlConfig> {
    match resolve_config_path(cli_arg) {
        Some(path) => TomlConfig::load(&path).with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(TomlConfig::default()),
    }
}

/// RUST_LOG wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn load_preset(path: Option<&Path>) -> Result<ResolvedPreset> {
    let catalog = Catalog::builtin();
    match path {
        Some(path) => {
            let raw = load_preset_value(path)
                .with_context(|| format!("Failed to load preset {}", path.display()))?;
            info!("Resolving preset {}", path.display());
            Ok(resolve(&raw, catalog))
        }
        None => {
            info!("No preset given, using catalog defaults");
            Ok(default_preset(catalog))
        }
    }
}

async fn run_analyze(args: AnalyzeArgs, config: &TomlConfig) -> Result<()> {
    let preset = load_preset(args.preset.as_deref().or(config.preset.as_deref()))?;

    let source_id = args
        .source_id
        .clone()
        .or_else(|| {
            [&args.frames, &args.ocr, &args.blackdetect_log, &args.freezedetect_log, &args.silencedetect_log]
                .into_iter()
                .flatten()
                .next()
                .map(|p| p.display().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string());

    let mut input = AnalysisInput::new(source_id);
    if let Some(path) = &args.frames {
        input.frames = load_frames(path).context("Failed to load frame stream")?;
    }
    for (kind, path) in [
        (DetectorKind::BlackDetect, &args.blackdetect_log),
        (DetectorKind::FreezeDetect, &args.freezedetect_log),
        (DetectorKind::SilenceDetect, &args.silencedetect_log),
    ] {
        if let Some(path) = path {
            let text = load_log(path).with_context(|| format!("Failed to load {} log", kind))?;
            input.detector_logs.insert(kind, text);
        }
    }
    if let Some(path) = &args.ocr {
        input.ocr_batches = Some(load_ocr_batches(path).context("Failed to load OCR samples")?);
    }
    if let Some(path) = &args.issues {
        input.external_issues = load_issues(path).context("Failed to load external issues")?;
    }

    let cache_dir = resolve_cache_dir(args.cache_dir.as_deref(), config);
    info!("Overlay cache: {}", cache_dir.display());
    let cache: Arc<dyn OverlayCache> = Arc::new(JsonFileCache::new(cache_dir));

    let report = if args.concurrent {
        analyze_concurrently(Arc::new(preset), Arc::new(input), Some(cache))
            .await
            .context("Concurrent analysis failed")?
    } else {
        analyze(&preset, &input, Some(&*cache))
    };

    info!(
        "Overall status {:?}: {} critical, {} non-critical, {} informational",
        report.severity_summary.overall,
        report.severity_summary.counts.critical,
        report.severity_summary.counts.non_critical,
        report.severity_summary.counts.informational
    );

    emit(&report, args.output.as_deref())
}

fn emit<T: Serialize + ?Sized>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
