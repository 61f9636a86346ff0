#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # Background Removal Studio
//!
//! Upload an image, get it back with the background removed.
//!
//! Each request runs one linear pipeline:
//!
//! 1. validate the upload size (10 MB cap, inclusive)
//! 2. decode the bytes (PNG or JPEG)
//! 3. resize so the longest edge is at most 2000 px (Lanczos3, aspect preserved)
//! 4. remove the background with a segmentation model
//! 5. encode the cutout as `background_removed.png`
//!
//! Requests without an upload fall back to the first default image that
//! exists in the asset directory (`zebra.jpg`, then `wallaby.png`).
//!
//! ## Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with optional GPU acceleration
//! - `tract` (default): pure Rust backend, used when ONNX Runtime cannot start
//! - `cli` (default): the `bgremove-studio` launcher and subscriber setup
//! - `tracing-json`: JSON log output for the launcher
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use bgremove_studio::{
//!     prepare_pipeline, ImageSource, StudioConfig, TracingObserver,
//! };
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let config = StudioConfig::builder().asset_dir("assets").build()?;
//! let pipeline = prepare_pipeline(&config).await?;
//!
//! let source = ImageSource::upload(Some("portrait.jpg".to_string()), upload);
//! let output = pipeline.run_source(source, &TracingObserver)?;
//! std::fs::write("background_removed.png", output.download.as_slice())?;
//! println!("{}", output.status_text());
//! # Ok(())
//! # }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod remover;
pub mod server;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::BackendType;
#[cfg(feature = "onnx")]
pub use backends::OnnxBackend;
#[cfg(feature = "tract")]
pub use backends::TractBackend;
pub use config::{
    BackendPreference, ExecutionProvider, RemoverConfig, ServerConfig, StudioConfig,
    StudioConfigBuilder,
};
pub use download::ModelDownloader;
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelPreset, ModelSource, ModelSpec, PreprocessingConfig};
pub use processor::{BackgroundRemovalPipeline, PipelineOutput};
pub use remover::{BackgroundRemover, RemoverProvider, SegmentationRemover};
pub use services::{
    ImageSource, NoOpObserver, OutputFormatHandler, PipelineStage, PipelineState,
    RequestLifecycle, StageObserver, TracingObserver,
};
pub use types::{ImageBytes, RasterImage};

#[cfg(feature = "cli")]
pub use tracing_config::{TracingConfig, TracingFormat};

/// Resolve the configured model and probe an inference runtime for it.
///
/// Downloads the model into the cache on first use. The model is loaded
/// into the runtime lazily, on the first request.
///
/// # Errors
/// - Model cannot be found or downloaded
/// - No compiled-in runtime can start
pub async fn prepare_pipeline(config: &StudioConfig) -> Result<BackgroundRemovalPipeline> {
    let downloader = ModelDownloader::new(config.remover.cache_dir.as_deref())?;
    let model_path = downloader.ensure_model(&config.remover.model).await?;
    let remover = RemoverProvider::probe(&config.remover, &model_path)?;
    Ok(BackgroundRemovalPipeline::new(config, remover))
}
