//! Background removal invoker CLI
//!
//! Reads one image from stdin, writes the cutout to stdout. Diagnostics go
//! to stderr only.

use super::config::CliConfigBuilder;
use crate::{
    cache::{format_size, ModelCache, CACHE_DIR_ENV},
    download::ModelDownloader,
    invoker,
    models::{ModelSource, ModelSpec, PretrainedModel},
    processor::BackgroundRemovalProcessor,
    tracing_config::init_cli_tracing,
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

/// Remove the background from an image read on stdin and write the result to stdout
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-invoker")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Refine edges with alpha matting
    #[arg(long = "alpha_matting")]
    pub alpha_matting: bool,

    /// Mask values above this become definite foreground in the trimap
    #[arg(long = "alpha_matting_foreground_threshold", default_value_t = 240)]
    pub foreground_threshold: u8,

    /// Mask values below this become definite background in the trimap
    #[arg(long = "alpha_matting_background_threshold", default_value_t = 10)]
    pub background_threshold: u8,

    /// Side of the square used to erode the trimap regions
    #[arg(long = "alpha_matting_erode_size", default_value_t = 10)]
    pub erode_size: u32,

    /// Pretrained model name
    #[arg(short, long, env = "BGREMOVE_MODEL", default_value = "isnet-general-use")]
    pub model: String,

    /// Use a local ONNX model file instead of a named model
    #[arg(long, value_name = "FILE")]
    pub model_path: Option<PathBuf>,

    /// Output the mask instead of the cutout
    #[arg(long)]
    pub only_mask: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = CliOutputFormat::Png)]
    pub format: CliOutputFormat,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Number of intra-op threads (0 = auto)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Verbose logging on stderr (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit log lines as JSON
    #[arg(long)]
    pub log_json: bool,

    /// List known models with their cache status and exit
    #[arg(long)]
    pub list_models: bool,

    /// Print the model cache directory and exit
    #[arg(long)]
    pub show_cache_dir: bool,

    /// List backends and execution providers and exit
    #[arg(long)]
    pub list_providers: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliOutputFormat {
    Png,
    Webp,
}

/// CLI entry point; returns the process exit status
pub async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            // Help and version requests are not failures
            return if err.exit_code() == 0 {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        },
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_cli_tracing(cli.verbose, cli.log_json).context("Failed to initialize tracing")?;

    if cli.list_providers {
        show_providers();
        return Ok(());
    }
    if cli.list_models {
        return list_models();
    }
    if cli.show_cache_dir {
        let cache_dir = ModelCache::resolve_cache_dir().context("Failed to resolve cache directory")?;
        println!("{}", cache_dir.display());
        return Ok(());
    }

    let config = CliConfigBuilder::from_cli(&cli).context("Invalid arguments")?;
    debug!(
        config = %serde_json::to_string(&config).unwrap_or_default(),
        "Resolved configuration"
    );

    let env_value = std::env::var_os(CACHE_DIR_ENV);
    info!(
        "{CACHE_DIR_ENV}={}",
        env_value
            .as_deref()
            .map_or_else(|| "<unset>".into(), |v| v.to_string_lossy())
    );

    ensure_model_available(&config.model, cli.verbose > 0)
        .await
        .context("Failed to load model")?;

    let mut processor = BackgroundRemovalProcessor::new(config)
        .context("Failed to create background removal processor")?;

    let report = invoker::invoke(&mut processor, io::stdin().lock(), io::stdout().lock())
        .map_err(|failure| failure.error)
        .context("Background removal failed")?;

    debug!(
        report = %serde_json::to_string(&report).unwrap_or_default(),
        "Invocation finished"
    );
    Ok(())
}

/// Download a pretrained model into the cache when it is missing
async fn ensure_model_available(spec: &ModelSpec, show_progress: bool) -> Result<()> {
    if let ModelSource::Pretrained(model) = &spec.source {
        let downloader = ModelDownloader::new().context("Failed to open model cache")?;
        let path = downloader
            .ensure_model(*model, show_progress)
            .await
            .with_context(|| format!("Model '{model}' is not available"))?;
        debug!(path = %path.display(), "Model weights ready");
    }
    Ok(())
}

fn list_models() -> Result<()> {
    let cache = ModelCache::new().context("Failed to open model cache")?;
    let cached = cache
        .scan_cached_models()
        .context("Failed to scan model cache")?;
    println!("Models (cache: {})", cache.cache_dir().display());

    for model in PretrainedModel::ALL {
        let status = cached
            .iter()
            .find(|info| info.model == model)
            .map_or_else(
                || "not downloaded".to_string(),
                |info| format!("cached, {}", format_size(info.size_bytes)),
            );
        let marker = if model == PretrainedModel::default() {
            " (default)"
        } else {
            ""
        };
        println!(
            "  {}{marker}: {} [{status}]",
            model.name(),
            model.description()
        );
    }
    Ok(())
}

fn show_providers() {
    println!("Backends and execution providers:");
    for provider in ExecutionProviderManager::list_all_providers() {
        let status = if provider.available {
            "available"
        } else {
            "not available"
        };
        println!("  {} ({status}): {}", provider.name, provider.description);
    }
}
