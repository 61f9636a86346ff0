//! Server launcher
//!
//! Resolves the configuration, makes sure the model is cached, probes the
//! inference runtime once and then serves HTTP until shutdown.

use super::config::CliConfigBuilder;
use crate::{
    backends::BackendType,
    config::{BackendPreference, ExecutionProvider},
    prepare_pipeline,
    remover::RemoverProvider,
    server,
    services::find_default_image,
    tracing_config::{TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

/// Background removal web studio
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-studio")]
pub struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address to listen on [default: 127.0.0.1:8501]
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Directory holding the default images (zebra.jpg, wallaby.png)
    #[arg(long, value_name = "DIR")]
    pub asset_dir: Option<PathBuf>,

    /// Upload limit in bytes [default: 10485760]
    #[arg(long, value_name = "BYTES")]
    pub max_file_size: Option<u64>,

    /// Longest edge after resizing, in pixels [default: 2000]
    #[arg(long, value_name = "PIXELS")]
    pub max_dimension: Option<u32>,

    /// Model preset (u2net, isnet-general), URL or path to an .onnx file [default: u2net]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Inference runtime (auto, onnx, tract)
    #[arg(long)]
    pub backend: Option<BackendPreference>,

    /// ONNX Runtime execution provider (auto, cpu, cuda, coreml)
    #[arg(short, long)]
    pub execution_provider: Option<ExecutionProvider>,

    /// Number of threads (0 = auto-detect optimal threading)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Use custom model cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[cfg(feature = "tracing-json")]
    #[arg(long)]
    pub json_logs: bool,

    /// Show runtime and execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    let config = CliConfigBuilder::from_cli(&cli).context("Invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        model = %config.remover.model.source.display_name(),
        backend = %config.remover.backend,
        provider = %config.remover.execution_provider,
        "Starting background removal studio"
    );

    let pipeline = prepare_pipeline(&config)
        .await
        .context("Failed to prepare the background remover")?;

    if let Err(e) = find_default_image(&config.asset_dir) {
        warn!(error = %e, "Requests without an upload will fail");
    }

    server::serve(config, pipeline).await
}

fn init_tracing(cli: &Cli) -> Result<()> {
    #[allow(unused_mut)]
    let mut format = TracingFormat::Console;
    #[cfg(feature = "tracing-json")]
    if cli.json_logs {
        format = TracingFormat::Json;
    }

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(format)
        .with_env_override()
        .init()
}

fn show_provider_diagnostics() {
    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("System: {cpu_count} CPU cores detected");

    println!("\nCompiled-in runtimes (probe order):");
    for backend in RemoverProvider::available_backends() {
        let description = match backend {
            BackendType::Onnx => "ONNX Runtime, optional GPU acceleration",
            BackendType::Tract => "pure Rust, used when ONNX Runtime cannot start",
        };
        println!("  {backend}: {description}");
    }

    #[cfg(feature = "onnx")]
    {
        println!("\nONNX Runtime execution providers:");
        for (name, available, description) in crate::backends::OnnxBackend::list_providers() {
            let status = if available { "available" } else { "not available" };
            println!("  {name}: {status} - {description}");
        }
    }

    if BackendType::available().is_empty() {
        println!("\nNo inference runtime compiled in; rebuild with --features onnx or tract");
    }
}
