//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{StudioConfig, StudioConfigBuilder},
    models::ModelSpec,
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a [`StudioConfig`]
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Start from the config file (or defaults) and apply every flag that was given
    pub(crate) fn from_cli(cli: &Cli) -> Result<StudioConfig> {
        let base = match &cli.config {
            Some(path) => StudioConfig::from_json_file(path)
                .with_context(|| format!("Failed to load {}", path.display()))?,
            None => StudioConfig::default(),
        };

        let mut builder = StudioConfigBuilder::from_config(base);

        if let Some(bind) = &cli.bind {
            builder = builder.bind_address(bind.as_str());
        }
        if let Some(dir) = &cli.asset_dir {
            builder = builder.asset_dir(dir);
        }
        if let Some(bytes) = cli.max_file_size {
            builder = builder.max_file_size(bytes);
        }
        if let Some(pixels) = cli.max_dimension {
            builder = builder.max_dimension(pixels);
        }
        if let Some(model) = &cli.model {
            builder = builder.model(ModelSpec::parse(model));
        }
        if let Some(backend) = cli.backend {
            builder = builder.backend(backend);
        }
        if let Some(provider) = cli.execution_provider {
            builder = builder.execution_provider(provider);
        }
        if let Some(threads) = cli.threads {
            // Same count for intra and inter operations
            builder = builder.threads(threads, threads);
        }
        if let Some(dir) = &cli.cache_dir {
            builder = builder.cache_dir(dir);
        }

        Ok(builder.build()?)
    }
}
