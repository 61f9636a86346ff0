//! Inference backend abstraction

use crate::error::Result;
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Trait for inference backends
///
/// A backend owns one model session. Sessions are expensive to create, so
/// callers initialize lazily and keep the backend for the life of the process.
pub trait InferenceBackend {
    /// Short runtime name for logs and health output
    fn name(&self) -> &'static str;

    /// Load the model and build the session; a no-op once initialized
    ///
    /// Returns the model load time on the call that actually loaded it.
    ///
    /// # Errors
    /// - Model file missing or unreadable
    /// - Runtime rejects the model
    fn initialize(&mut self) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor and return the first output
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Output is not a 4D `f32` tensor
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Check if backend is initialized
    fn is_initialized(&self) -> bool;

    /// Drop the session so the next [`initialize`](Self::initialize) loads it again
    fn reset(&mut self);
}
