//! Error types for background removal operations

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Every way a request can fail, from the upload boundary down to the model
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Upload is larger than the configured cap
    #[error("Upload of {actual} bytes exceeds the {limit} byte limit")]
    Oversize {
        /// Configured maximum in bytes
        limit: u64,
        /// Size of the rejected upload in bytes
        actual: u64,
    },

    /// Bytes are not an image the decoder recognises
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The background remover failed or raised
    #[error("Processing error: {0}")]
    Processing(String),

    /// None of the fallback images exist on disk
    #[error("No default image found (searched: {})", display_paths(.searched))]
    MissingDefaultImage {
        /// Paths that were checked, in order
        searched: Vec<PathBuf>,
    },

    /// Declared upload type is not one of the accepted extensions
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Model download failures
    #[error("Network error: {0}")]
    Network(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

/// User-facing rejection text for uploads above `limit` bytes
#[must_use]
pub fn oversize_message(limit: u64) -> String {
    format!(
        "File too large! Please upload under {:.1}MB.",
        limit as f64 / 1024.0 / 1024.0
    )
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl BgRemovalError {
    /// Create a new oversize error
    #[must_use]
    pub fn oversize(limit: u64, actual: u64) -> Self {
        Self::Oversize { limit, actual }
    }

    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new processing error
    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    /// Create a new unsupported format error
    pub fn unsupported_format<S: Into<String>>(format: S) -> Self {
        Self::UnsupportedFormat(format.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<Path>>(operation: &str, path: P, error: &std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            error.kind(),
            format!(
                "Failed to {} '{}': {}",
                operation,
                path.as_ref().display(),
                error
            ),
        ))
    }

    /// Create network error with the request that failed
    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {}", context.into(), error))
    }

    /// Collapse any failure into a single `Processing` error.
    ///
    /// The remover boundary reports exactly one error kind no matter what
    /// went wrong inside the runtime.
    #[must_use]
    pub fn into_processing(self) -> Self {
        match self {
            Self::Processing(_) => self,
            Self::Internal(msg)
            | Self::Model(msg)
            | Self::Decode(msg)
            | Self::InvalidConfig(msg)
            | Self::Network(msg)
            | Self::UnsupportedFormat(msg) => Self::Processing(msg),
            other => Self::Processing(other.to_string()),
        }
    }

    /// Short machine-readable name of the error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Oversize { .. } => "oversize",
            Self::Decode(_) => "decode",
            Self::Processing(_) => "processing",
            Self::MissingDefaultImage { .. } => "missing_default_image",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Model(_) => "model",
            Self::Network(_) => "network",
            Self::Io(_) => "io",
            Self::Internal(_) => "internal",
        }
    }

    /// Message suitable for showing to the person who uploaded the image
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Oversize { limit, .. } => oversize_message(*limit),
            Self::Decode(detail) | Self::Processing(detail) => {
                format!("Error processing image: {detail}")
            },
            Self::MissingDefaultImage { .. } => "Please upload an image to start!".to_string(),
            Self::UnsupportedFormat(format) => format!(
                "Unsupported file type '{format}'. Please upload a PNG, JPG or JPEG image."
            ),
            _ => "An unexpected error occurred.".to_string(),
        }
    }
}
