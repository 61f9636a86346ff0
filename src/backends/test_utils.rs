//! Test utilities and mock backends for testing inference functionality
//!
//! Mock implementations of [`InferenceBackend`] and [`BackgroundRemover`]
//! that exercise the pipeline without model files or native runtimes.

use crate::{
    error::{BgRemovalError, Result},
    inference::InferenceBackend,
    remover::BackgroundRemover,
    types::RasterImage,
};
use image::{DynamicImage, Rgba};
use instant::Duration;
use ndarray::Array4;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Mock backend that predicts a soft circle centred in the input
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
    panic_next_inference: bool,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            initialized: false,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
            panic_next_inference: false,
        }
    }

    /// Create a mock backend that will fail during initialization
    #[must_use]
    pub fn new_failing_init() -> Self {
        Self {
            should_fail_init: true,
            ..Self::new()
        }
    }

    /// Create a mock backend that will fail during inference
    #[must_use]
    pub fn new_failing_inference() -> Self {
        Self {
            should_fail_inference: true,
            ..Self::new()
        }
    }

    /// Create a mock backend whose first inference panics mid-call
    #[must_use]
    pub fn new_panicking_once() -> Self {
        Self {
            panic_next_inference: true,
            ..Self::new()
        }
    }

    /// Shared handle to the call history, usable after the backend is boxed
    #[must_use]
    pub fn call_history_handle(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    /// Circular mask with soft edges, one channel, same spatial size as the input
    fn generate_mock_output(input: &Array4<f32>) -> Array4<f32> {
        let (batch_size, _, height, width) = input.dim();
        let mut output = Array4::<f32>::zeros((batch_size, 1, height, width));

        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius = (width.min(height) as f32 / 3.0).max(1.0);

        for ((_, _, y, x), value) in output.indexed_iter_mut() {
            let dx = x as f32 - center_x;
            let dy = y as f32 - center_y;
            let distance = (dx * dx + dy * dy).sqrt();
            *value = ((radius - distance) / radius).clamp(0.0, 1.0);
        }

        output
    }
}

impl InferenceBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn initialize(&mut self) -> Result<Option<Duration>> {
        if self.should_fail_init {
            self.record_call("initialize:failed");
            return Err(BgRemovalError::model("Mock backend initialization failed"));
        }
        if self.initialized {
            self.record_call("initialize");
            return Ok(None);
        }

        self.record_call("initialize:load");
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");

        if !self.initialized {
            return Err(BgRemovalError::internal("Backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgRemovalError::processing("Mock backend inference failed"));
        }
        if self.panic_next_inference {
            self.panic_next_inference = false;
            panic!("Mock backend panicked during inference");
        }

        Ok(Self::generate_mock_output(input))
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn reset(&mut self) {
        self.record_call("reset");
        self.initialized = false;
    }
}

/// Remover that keeps the left half of the image and clears the right half
#[derive(Debug, Default)]
pub struct MockRemover {
    calls: AtomicUsize,
}

impl MockRemover {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `remove_background` calls so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BackgroundRemover for MockRemover {
    fn name(&self) -> &str {
        "mock"
    }

    fn remove_background(&self, image: &RasterImage) -> Result<RasterImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut rgba = image.image().to_rgba8();
        let half = rgba.width() / 2;
        for (x, _, pixel) in rgba.enumerate_pixels_mut() {
            if x >= half {
                *pixel = Rgba([0, 0, 0, 0]);
            }
        }
        image.derive(DynamicImage::ImageRgba8(rgba))
    }
}

/// Remover that always fails the way a crashed runtime would
#[derive(Debug, Default)]
pub struct FailingRemover {
    calls: AtomicUsize,
}

impl FailingRemover {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BackgroundRemover for FailingRemover {
    fn name(&self) -> &str {
        "failing"
    }

    fn remove_background(&self, _image: &RasterImage) -> Result<RasterImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(BgRemovalError::processing("model unavailable"))
    }
}
