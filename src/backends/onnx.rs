//! ONNX Runtime backend implementation for segmentation models
//!
//! Runs the model through ONNX Runtime with CPU, CUDA or `CoreML`
//! execution providers. This is the primary runtime; see
//! [`crate::remover::RemoverProvider`] for the fallback to Tract.

use crate::config::{ExecutionProvider, RemoverConfig};
use crate::error::{BgRemovalError, Result};
use crate::inference::InferenceBackend;
use instant::{Duration, Instant};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use ort::{self, value::Value};
use std::path::{Path, PathBuf};

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    model_path: PathBuf,
    execution_provider: ExecutionProvider,
    intra_threads: usize,
    inter_threads: usize,
    session: Option<Session>,
}

impl OnnxBackend {
    /// List ONNX Runtime execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        tracing::debug!(
            os = std::env::consts::OS,
            arch = std::env::consts::ARCH,
            "Checking ONNX Runtime execution providers"
        );

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available(),
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available(),
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Check that the ONNX Runtime environment can be created.
    ///
    /// This does not load a model; it only proves the native runtime is usable.
    ///
    /// # Errors
    /// Returns [`BgRemovalError::Model`] when the runtime cannot start
    pub fn probe_runtime() -> Result<()> {
        Session::builder()
            .map(|_| ())
            .map_err(|e| BgRemovalError::model(format!("ONNX Runtime unavailable: {e}")))
    }

    /// Create a backend for the model at `model_path`; nothing is loaded yet
    #[must_use]
    pub fn new(model_path: &Path, config: &RemoverConfig) -> Self {
        Self {
            model_path: model_path.to_path_buf(),
            execution_provider: config.execution_provider,
            intra_threads: config.resolved_intra_threads(),
            inter_threads: config.resolved_inter_threads(),
            session: None,
        }
    }

    fn configure_providers(&self, builder: SessionBuilder) -> Result<SessionBuilder> {
        let providers: Vec<ExecutionProviderDispatch> = match self.execution_provider {
            ExecutionProvider::Auto => {
                let mut providers = Vec::new();
                if cuda_available() {
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    tracing::info!("No hardware acceleration available, using CPU");
                }
                providers
            },
            ExecutionProvider::Cpu => Vec::new(),
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    vec![CUDAExecutionProvider::default().build()]
                } else {
                    tracing::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    vec![CoreMLExecutionProvider::default().with_subgraphs(true).build()]
                } else {
                    tracing::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                    Vec::new()
                }
            },
        };

        if providers.is_empty() {
            return Ok(builder);
        }
        builder.with_execution_providers(providers).map_err(|e| {
            BgRemovalError::model(format!(
                "Failed to set {} execution providers: {e}",
                self.execution_provider
            ))
        })
    }

    /// Load and initialize the ONNX model
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        if !self.model_path.is_file() {
            return Err(BgRemovalError::model(format!(
                "Model file not found: {}",
                self.model_path.display()
            )));
        }

        let session_builder = Session::builder()
            .map_err(|e| BgRemovalError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| BgRemovalError::model(format!("Failed to set optimization level: {e}")))?;

        let session = self
            .configure_providers(session_builder)?
            .with_intra_threads(self.intra_threads)
            .map_err(|e| BgRemovalError::model(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(self.inter_threads)
            .map_err(|e| BgRemovalError::model(format!("Failed to set inter threads: {e}")))?
            .commit_from_file(&self.model_path)
            .map_err(|e| {
                BgRemovalError::model(format!(
                    "Failed to create session from '{}': {e}",
                    self.model_path.display()
                ))
            })?;

        self.session = Some(session);

        let model_load_time = model_load_start.elapsed();
        tracing::info!(
            model = %self.model_path.display(),
            provider = %self.execution_provider,
            intra_threads = self.intra_threads,
            inter_threads = self.inter_threads,
            "ONNX Runtime session ready in {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );

        Ok(model_load_time)
    }
}

fn cuda_available() -> bool {
    OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
}

fn coreml_available() -> bool {
    OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
}

impl InferenceBackend for OnnxBackend {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }

        let model_load_time = self.load_model()?;
        Ok(Some(model_load_time))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::internal("ONNX session not initialized"))?;

        let inference_start = Instant::now();

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            BgRemovalError::processing(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs avoid depending on the model's tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::processing(format!("ONNX inference failed: {e}")))?;

        let output_tensor = {
            let keys: Vec<_> = outputs.keys().collect();
            let first_key = keys
                .first()
                .ok_or_else(|| BgRemovalError::processing("No output tensors found"))?;
            outputs
                .get(first_key)
                .ok_or_else(|| BgRemovalError::processing("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    BgRemovalError::processing(format!("Failed to extract output tensor: {e}"))
                })?
        };

        let output_shape = output_tensor.shape().to_vec();
        let [batch, channels, height, width] = output_shape[..] else {
            return Err(BgRemovalError::processing(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        };

        let output_array = Array4::from_shape_vec(
            (batch, channels, height, width),
            output_tensor.iter().copied().collect(),
        )
        .map_err(|e| BgRemovalError::processing(format!("Failed to reshape output tensor: {e}")))?;

        tracing::debug!(
            input = ?input.dim(),
            output = ?output_array.dim(),
            "ONNX inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(output_array)
    }

    fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    fn reset(&mut self) {
        self.session = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_always_listed() {
        let providers = OnnxBackend::list_providers();
        assert_eq!(providers.len(), 3);
        assert!(providers
            .iter()
            .any(|(name, available, _)| name == "CPU" && *available));
    }

    #[test]
    fn test_backend_starts_uninitialized() {
        let backend = OnnxBackend::new(Path::new("missing.onnx"), &RemoverConfig::default());
        assert!(!backend.is_initialized());
        assert_eq!(backend.name(), "onnx");
        assert!(backend.intra_threads >= 1);
    }

    #[test]
    fn test_missing_model_fails_initialization() {
        let mut backend =
            OnnxBackend::new(Path::new("/nonexistent/u2net.onnx"), &RemoverConfig::default());
        let err = backend.initialize().unwrap_err();
        assert!(matches!(err, BgRemovalError::Model(_)));
        assert!(!backend.is_initialized());
    }

    #[test]
    fn test_infer_requires_initialization() {
        let mut backend = OnnxBackend::new(Path::new("u2net.onnx"), &RemoverConfig::default());
        let input = Array4::<f32>::zeros((1, 3, 8, 8));
        assert!(backend.infer(&input).is_err());
    }
}
