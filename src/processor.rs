//! Background removal pipeline
//!
//! `validate → decode → resize → remove background → encode`, run once per
//! request with no retries. Every stage is announced to a [`StageObserver`]
//! and recorded in a [`RequestLifecycle`].

use crate::{
    config::StudioConfig,
    error::Result,
    remover::BackgroundRemover,
    services::{
        ImageSource, OutputFormatHandler, PipelineStage, PipelineState, RequestLifecycle,
        StageObserver,
    },
    types::{ImageBytes, RasterImage},
    utils::{InputValidator, Resizer},
};
use instant::Duration;
use std::sync::Arc;
use tracing::{instrument, span, Level};

/// Everything a frontend needs to show both panels and offer the download
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Input after resizing, shown as the "Original" panel
    pub original: RasterImage,
    /// Remover output with alpha
    pub processed: RasterImage,
    /// `processed` encoded as PNG
    pub download: ImageBytes,
    pub elapsed: Duration,
}

impl PipelineOutput {
    /// Status line shown once processing finished
    #[must_use]
    pub fn status_text(&self) -> String {
        format!("Completed in {:.2} seconds", self.elapsed.as_secs_f64())
    }
}

/// The linear request pipeline
pub struct BackgroundRemovalPipeline {
    validator: InputValidator,
    resizer: Resizer,
    remover: Arc<dyn BackgroundRemover>,
}

impl std::fmt::Debug for BackgroundRemovalPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalPipeline")
            .field("validator", &self.validator)
            .field("resizer", &self.resizer)
            .field("remover", &self.remover.name())
            .finish()
    }
}

impl BackgroundRemovalPipeline {
    #[must_use]
    pub fn new(config: &StudioConfig, remover: Arc<dyn BackgroundRemover>) -> Self {
        Self {
            validator: InputValidator::new(config.max_file_size),
            resizer: Resizer::new(config.max_dimension),
            remover,
        }
    }

    #[must_use]
    pub fn remover(&self) -> &Arc<dyn BackgroundRemover> {
        &self.remover
    }

    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.validator.max_file_size()
    }

    /// Resolve `source` to bytes, then [`run`](Self::run) the pipeline
    ///
    /// Uploads are held to the size cap before their file name is checked.
    ///
    /// # Errors
    /// Source resolution errors, then any error from [`run`](Self::run)
    pub fn run_source(
        &self,
        source: ImageSource,
        observer: &dyn StageObserver,
    ) -> Result<PipelineOutput> {
        tracing::debug!(source = %source.display_name(), "Resolving image source");
        if let ImageSource::InMemory { data, .. } = &source {
            self.validator.validate_size(data.len() as u64)?;
        }
        let bytes = source.resolve()?;
        self.run(&bytes, observer)
    }

    /// Run every stage on `bytes`.
    ///
    /// Either both panels are produced or an error is returned; the remover
    /// is never called for input that fails validation or decoding.
    ///
    /// # Errors
    /// - [`Oversize`](crate::BgRemovalError::Oversize) above the upload cap
    /// - [`Decode`](crate::BgRemovalError::Decode) for bytes that are not an image
    /// - [`Processing`](crate::BgRemovalError::Processing) when the remover or encoder fails
    #[instrument(skip_all, fields(size = bytes.len(), remover = self.remover.name()))]
    pub fn run(&self, bytes: &ImageBytes, observer: &dyn StageObserver) -> Result<PipelineOutput> {
        let mut lifecycle = RequestLifecycle::new();
        observer.on_stage_started(PipelineStage::Received);

        match self.run_stages(bytes, &mut lifecycle, observer) {
            Ok(output) => {
                observer.on_completed(output.elapsed);
                Ok(output)
            },
            Err(error) => {
                let attempted = match lifecycle.state() {
                    PipelineState::Stage(stage) => stage.next().unwrap_or(*stage),
                    PipelineState::Failed { from, .. } => *from,
                };
                lifecycle.fail(error.to_string());
                observer.on_failed(attempted, &error);
                Err(error)
            },
        }
    }

    fn run_stages(
        &self,
        bytes: &ImageBytes,
        lifecycle: &mut RequestLifecycle,
        observer: &dyn StageObserver,
    ) -> Result<PipelineOutput> {
        stage(lifecycle, observer, PipelineStage::Validated, || {
            self.validator.validate_size(bytes.len() as u64)
        })?;

        let decoded = stage(lifecycle, observer, PipelineStage::Decoded, || {
            Resizer::decode(bytes.as_slice())
        })?;

        let original = stage(lifecycle, observer, PipelineStage::Resized, || {
            Ok(self.resizer.resize(&decoded).into_owned())
        })?;
        drop(decoded);

        let processed = stage(lifecycle, observer, PipelineStage::BackgroundRemoved, || {
            self.remover.remove_background(&original)
        })?;

        let download = stage(lifecycle, observer, PipelineStage::Encoded, || {
            OutputFormatHandler::encode_png(&processed)
        })?;

        Ok(PipelineOutput {
            original,
            processed,
            download,
            elapsed: lifecycle.elapsed(),
        })
    }
}

/// Announce `next`, run its work inside a span, then record the transition
fn stage<T>(
    lifecycle: &mut RequestLifecycle,
    observer: &dyn StageObserver,
    next: PipelineStage,
    work: impl FnOnce() -> Result<T>,
) -> Result<T> {
    observer.on_stage_started(next);
    let value = {
        let _span = span!(Level::DEBUG, "stage", stage = %next).entered();
        work()?
    };
    lifecycle.advance(next)?;
    Ok(value)
}
