//! Background remover boundary
//!
//! The pipeline only sees [`BackgroundRemover`]. The concrete
//! [`SegmentationRemover`] wraps an [`InferenceBackend`], and
//! [`RemoverProvider::probe`] picks the runtime once at startup.

use crate::{
    backends::BackendType,
    config::{BackendPreference, RemoverConfig},
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    models::PreprocessingConfig,
    types::RasterImage,
    utils::ImagePreprocessor,
};
use image::{DynamicImage, GrayImage, RgbaImage};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, instrument, warn};

/// External collaborator that cuts the subject out of an image
pub trait BackgroundRemover: Send + Sync {
    /// Name shown in health output and logs
    fn name(&self) -> &str;

    /// Return a copy of `image` with an alpha channel where the background
    /// is fully transparent and the subject keeps its colour.
    ///
    /// # Errors
    /// Any failure is reported as [`BgRemovalError::Processing`]
    fn remove_background(&self, image: &RasterImage) -> Result<RasterImage>;
}

/// Remover backed by a segmentation model
pub struct SegmentationRemover {
    backend: Mutex<Box<dyn InferenceBackend + Send>>,
    preprocessing: PreprocessingConfig,
    name: String,
}

impl std::fmt::Debug for SegmentationRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationRemover")
            .field("name", &self.name)
            .field("preprocessing", &self.preprocessing)
            .finish_non_exhaustive()
    }
}

impl SegmentationRemover {
    /// Wrap a backend; its session is created on the first removal
    #[must_use]
    pub fn new(backend: Box<dyn InferenceBackend + Send>, preprocessing: PreprocessingConfig) -> Self {
        let name = format!("segmentation-{}", backend.name());
        Self {
            backend: Mutex::new(backend),
            preprocessing,
            name,
        }
    }

    fn predict(&self, image: &DynamicImage) -> Result<GrayImage> {
        let tensor = ImagePreprocessor::preprocess_for_inference(image, &self.preprocessing)?;

        let prediction = {
            let mut backend = self.backend.lock().unwrap_or_else(|poisoned| {
                warn!("Inference backend panicked on an earlier request, reloading session");
                self.backend.clear_poison();
                let mut backend = PoisonError::into_inner(poisoned);
                backend.reset();
                backend
            });
            if let Some(load_time) = backend.initialize()? {
                info!(
                    backend = backend.name(),
                    "Model session created in {}ms",
                    load_time.as_millis()
                );
            }
            backend.infer(&tensor)?
        };

        ImagePreprocessor::prediction_to_matte(&prediction, image.width(), image.height())
    }

    /// Write `matte` into the alpha channel of `image`.
    ///
    /// Existing transparency is kept by multiplying both alphas; pixels that
    /// end up fully transparent are cleared to `[0, 0, 0, 0]`.
    #[must_use]
    pub fn apply_matte(image: &DynamicImage, matte: &GrayImage) -> RgbaImage {
        let mut rgba = image.to_rgba8();
        for (pixel, mask) in rgba.pixels_mut().zip(matte.pixels()) {
            let alpha = (u16::from(pixel[3]) * u16::from(mask[0]) + 127) / 255;
            if alpha == 0 {
                pixel.0 = [0, 0, 0, 0];
            } else {
                pixel[3] = alpha as u8;
            }
        }
        rgba
    }
}

impl BackgroundRemover for SegmentationRemover {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn remove_background(&self, image: &RasterImage) -> Result<RasterImage> {
        let matte = self
            .predict(image.image())
            .map_err(BgRemovalError::into_processing)?;
        let cutout = Self::apply_matte(image.image(), &matte);
        image
            .derive(DynamicImage::ImageRgba8(cutout))
            .map_err(BgRemovalError::into_processing)
    }
}

/// One-time selection of the inference runtime
pub struct RemoverProvider;

impl RemoverProvider {
    /// Build the remover for `model_path`.
    ///
    /// With [`BackendPreference::Auto`] ONNX Runtime is tried first and Tract
    /// is used when the native runtime cannot start. The model itself is
    /// loaded lazily on the first request.
    ///
    /// # Errors
    /// - No compiled-in runtime satisfies the preference
    /// - The model file does not exist
    /// - Invalid preprocessing configuration
    pub fn probe(
        config: &RemoverConfig,
        model_path: &Path,
    ) -> Result<Arc<dyn BackgroundRemover>> {
        if !model_path.is_file() {
            return Err(BgRemovalError::model(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }

        let preprocessing = config.model.preprocessing_config();
        preprocessing.validate()?;

        let candidates: Vec<BackendType> = match config.backend {
            BackendPreference::Auto => vec![BackendType::Onnx, BackendType::Tract],
            BackendPreference::Onnx => vec![BackendType::Onnx],
            BackendPreference::Tract => vec![BackendType::Tract],
        };

        let mut last_error = None;
        for backend_type in candidates {
            match Self::create_backend(backend_type, config, model_path, &preprocessing) {
                Ok(backend) => {
                    info!(backend = %backend_type, model = %model_path.display(), "Selected inference runtime");
                    return Ok(Arc::new(SegmentationRemover::new(backend, preprocessing)));
                },
                Err(e) => {
                    warn!(backend = %backend_type, error = %e, "Inference runtime unavailable");
                    last_error = Some(e);
                },
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BgRemovalError::invalid_config("No inference runtime candidates")
        }))
    }

    /// Runtimes compiled into this build, primary first
    #[must_use]
    pub fn available_backends() -> Vec<BackendType> {
        BackendType::available()
    }

    #[allow(unused_variables)]
    fn create_backend(
        backend_type: BackendType,
        config: &RemoverConfig,
        model_path: &Path,
        preprocessing: &PreprocessingConfig,
    ) -> Result<Box<dyn InferenceBackend + Send>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => {
                crate::backends::OnnxBackend::probe_runtime()?;
                debug!(provider = %config.execution_provider, "ONNX Runtime available");
                Ok(Box::new(crate::backends::OnnxBackend::new(model_path, config)))
            },
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::new(
                model_path,
                preprocessing.target_size,
            ))),
            #[allow(unreachable_patterns)]
            other => Err(BgRemovalError::invalid_config(format!(
                "Backend '{other}' is not compiled into this build"
            ))),
        }
    }
}
