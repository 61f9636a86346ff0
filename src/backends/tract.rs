//! Tract backend implementation for segmentation models
//!
//! Tract is a pure Rust inference engine. It is slower than ONNX Runtime but
//! needs no native library, which makes it the fallback runtime.

use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use ndarray::Array4;
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model_path: PathBuf,
    /// Model input `[width, height]`, pinned so Tract can fully optimise the graph
    input_size: [u32; 2],
    model: Option<TractModel>,
}

impl TractBackend {
    /// Create a backend for the model at `model_path`; nothing is loaded yet
    #[must_use]
    pub fn new(model_path: &Path, input_size: [u32; 2]) -> Self {
        Self {
            model_path: model_path.to_path_buf(),
            input_size,
            model: None,
        }
    }

    /// Load and initialize the model using Tract
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();
        let [width, height] = self.input_size;

        let model = onnx()
            .model_for_path(&self.model_path)
            .map_err(|e| {
                BgRemovalError::model(format!(
                    "Failed to load ONNX model '{}': {e}",
                    self.model_path.display()
                ))
            })?
            .with_input_fact(0, f32::fact([1, 3, height as usize, width as usize]).into())
            .map_err(|e| BgRemovalError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| BgRemovalError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);

        let model_load_time = model_load_start.elapsed();
        tracing::info!(
            model = %self.model_path.display(),
            "Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );

        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| BgRemovalError::internal("Tract model not initialized"))?;

        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgRemovalError::processing(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::processing("No output tensor found"))?
            .into_arc_tensor();

        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            BgRemovalError::processing(format!("Failed to convert output tensor: {e}"))
        })?;

        let [batch, channels, height, width] = output_data.shape()[..] else {
            return Err(BgRemovalError::processing(format!(
                "Expected 4D output tensor, got {}D",
                output_data.ndim()
            )));
        };

        let output_array = Array4::from_shape_vec(
            (batch, channels, height, width),
            output_data.iter().copied().collect(),
        )
        .map_err(|e| BgRemovalError::processing(format!("Failed to reshape output tensor: {e}")))?;

        tracing::debug!(
            output = ?output_array.dim(),
            "Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );

        Ok(output_array)
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    fn reset(&mut self) {
        self.model = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tract_backend_creation() {
        let backend = TractBackend::new(Path::new("u2net.onnx"), [320, 320]);
        assert!(!backend.is_initialized());
        assert_eq!(backend.name(), "tract");
    }

    #[test]
    fn test_missing_model_fails_initialization() {
        let mut backend = TractBackend::new(Path::new("/nonexistent/u2net.onnx"), [320, 320]);
        let err = backend.initialize().unwrap_err();
        assert!(matches!(err, BgRemovalError::Model(_)));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_infer_requires_initialization() {
        let mut backend = TractBackend::new(Path::new("u2net.onnx"), [320, 320]);
        let input = Array4::<f32>::zeros((1, 3, 320, 320));
        let err = backend.infer(&input).unwrap_err();
        assert!(matches!(err, BgRemovalError::Internal(_)));
    }

    #[test]
    fn test_garbage_model_fails_initialization() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"not an onnx model").unwrap();

        let mut backend = TractBackend::new(file.path(), [320, 320]);
        assert!(backend.initialize().is_err());
    }
}
