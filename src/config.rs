//! Configuration types for the studio server and its background remover

use crate::error::{BgRemovalError, Result};
use crate::models::ModelSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Largest accepted upload in bytes (10 MiB, inclusive)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Longest edge an image keeps before it is downsampled
pub const DEFAULT_MAX_DIMENSION: u32 = 2000;

/// Address the server listens on when nothing else is configured
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8501";

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    #[serde(rename = "coreml")]
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            "coreml" => Ok(Self::CoreMl),
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown execution provider '{other}' (expected auto, cpu, cuda or coreml)"
            ))),
        }
    }
}

/// Which inference runtime hosts the segmentation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendPreference {
    /// ONNX Runtime when it initialises, Tract otherwise
    #[default]
    Auto,
    /// ONNX Runtime only
    Onnx,
    /// Pure-Rust Tract only
    Tract,
}

impl std::fmt::Display for BackendPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

impl FromStr for BackendPreference {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "onnx" => Ok(Self::Onnx),
            "tract" => Ok(Self::Tract),
            other => Err(BgRemovalError::invalid_config(format!(
                "Unknown backend '{other}' (expected auto, onnx or tract)"
            ))),
        }
    }
}

/// Settings for the background remover and its inference runtime
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoverConfig {
    pub backend: BackendPreference,
    pub execution_provider: ExecutionProvider,
    pub model: ModelSpec,
    /// Intra-op threads (0 = all available cores)
    pub intra_threads: usize,
    /// Inter-op threads (0 = a quarter of the cores, at least one)
    pub inter_threads: usize,
    /// Model cache directory (`None` = per-user cache dir)
    pub cache_dir: Option<PathBuf>,
}

impl RemoverConfig {
    /// Intra-op thread count with `0` resolved against the machine
    #[must_use]
    pub fn resolved_intra_threads(&self) -> usize {
        if self.intra_threads > 0 {
            self.intra_threads
        } else {
            available_cores()
        }
    }

    /// Inter-op thread count with `0` resolved against the machine
    #[must_use]
    pub fn resolved_inter_threads(&self) -> usize {
        if self.inter_threads > 0 {
            self.inter_threads
        } else {
            (available_cores() / 4).max(1)
        }
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(8)
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Upload cap in bytes (inclusive)
    pub max_file_size: u64,
    /// Longest edge after resizing
    pub max_dimension: u32,
    /// Directory that holds the fallback demo images
    pub asset_dir: PathBuf,
    pub server: ServerConfig,
    pub remover: RemoverConfig,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_dimension: DEFAULT_MAX_DIMENSION,
            asset_dir: PathBuf::from("."),
            server: ServerConfig::default(),
            remover: RemoverConfig::default(),
        }
    }
}

impl StudioConfig {
    /// Create a new configuration builder
    #[must_use]
    pub fn builder() -> StudioConfigBuilder {
        StudioConfigBuilder::default()
    }

    /// Load a JSON configuration file; missing keys keep their defaults
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON for this structure
    /// - Values fail [`StudioConfig::validate`]
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BgRemovalError::file_io_error("read config file", path, &e))?;
        let config: Self = serde_json::from_str(&contents).map_err(|e| {
            BgRemovalError::invalid_config(format!(
                "Failed to parse '{}': {e}",
                path.display()
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration parameters
    ///
    /// # Errors
    /// - Zero upload cap or zero maximum dimension
    /// - Empty bind address
    /// - Invalid model preprocessing parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(BgRemovalError::invalid_config(
                "max_file_size must be greater than zero",
            ));
        }
        if self.max_dimension == 0 {
            return Err(BgRemovalError::invalid_config(
                "max_dimension must be greater than zero",
            ));
        }
        if self.server.bind_address.trim().is_empty() {
            return Err(BgRemovalError::invalid_config(
                "server.bind_address must not be empty",
            ));
        }
        self.remover.model.preprocessing_config().validate()
    }

    /// Upload cap in megabytes, as shown to users
    #[must_use]
    pub fn max_file_size_mb(&self) -> f64 {
        self.max_file_size as f64 / 1024.0 / 1024.0
    }
}

/// Builder for [`StudioConfig`]
#[derive(Debug, Default)]
pub struct StudioConfigBuilder {
    config: StudioConfig,
}

impl StudioConfigBuilder {
    /// Start from an existing configuration (e.g. one loaded from disk)
    #[must_use]
    pub fn from_config(config: StudioConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.config.max_file_size = bytes;
        self
    }

    #[must_use]
    pub fn max_dimension(mut self, pixels: u32) -> Self {
        self.config.max_dimension = pixels;
        self
    }

    #[must_use]
    pub fn asset_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.asset_dir = dir.into();
        self
    }

    #[must_use]
    pub fn bind_address<S: Into<String>>(mut self, address: S) -> Self {
        self.config.server.bind_address = address.into();
        self
    }

    #[must_use]
    pub fn backend(mut self, backend: BackendPreference) -> Self {
        self.config.remover.backend = backend;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.remover.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn model(mut self, model: ModelSpec) -> Self {
        self.config.remover.model = model;
        self
    }

    /// Set both intra- and inter-op thread counts (0 = auto)
    #[must_use]
    pub fn threads(mut self, intra: usize, inter: usize) -> Self {
        self.config.remover.intra_threads = intra;
        self.config.remover.inter_threads = inter;
        self
    }

    #[must_use]
    pub fn cache_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.remover.cache_dir = Some(dir.into());
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// Returns [`BgRemovalError::InvalidConfig`] when validation fails
    pub fn build(self) -> Result<StudioConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
