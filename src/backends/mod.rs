//! Backend implementations for different inference engines
//!
//! - ONNX Runtime backend (native runtime, optional GPU acceleration)
//! - Tract backend (pure Rust, used when ONNX Runtime cannot start)

#[cfg(feature = "onnx")]
pub mod onnx;

#[cfg(feature = "tract")]
pub mod tract;

// Mock backends and removers shared by unit and integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::onnx::OnnxBackend;

#[cfg(feature = "tract")]
pub use self::tract::TractBackend;

use serde::{Deserialize, Serialize};

/// Inference runtimes this build can host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime through `ort`
    Onnx,
    /// Pure-Rust Tract
    Tract,
}

impl BackendType {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Onnx => "onnx",
            Self::Tract => "tract",
        }
    }

    /// Whether support for this runtime was compiled in
    #[must_use]
    pub fn is_compiled_in(self) -> bool {
        match self {
            Self::Onnx => cfg!(feature = "onnx"),
            Self::Tract => cfg!(feature = "tract"),
        }
    }

    /// Runtimes compiled into this build, primary first
    #[must_use]
    pub fn available() -> Vec<Self> {
        [Self::Onnx, Self::Tract]
            .into_iter()
            .filter(|backend| backend.is_compiled_in())
            .collect()
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
