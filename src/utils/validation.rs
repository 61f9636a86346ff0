//! Upload validation
//!
//! Checks that run on raw upload metadata before any decoding happens.

use crate::config::DEFAULT_MAX_FILE_SIZE;
use crate::error::{BgRemovalError, Result};
use image::ImageFormat;
use std::path::Path;

/// File extensions the upload boundary accepts (case-insensitive)
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Validator for upload size and declared type
#[derive(Debug, Clone, Copy)]
pub struct InputValidator {
    max_file_size: u64,
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl InputValidator {
    #[must_use]
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Accept uploads up to and including the configured cap
    ///
    /// # Errors
    /// Returns [`BgRemovalError::Oversize`] when `len` exceeds the cap
    pub fn validate_size(&self, len: u64) -> Result<()> {
        if len > self.max_file_size {
            return Err(BgRemovalError::oversize(self.max_file_size, len));
        }
        Ok(())
    }

    /// Check a declared file name against [`ACCEPTED_EXTENSIONS`]
    ///
    /// # Errors
    /// Returns [`BgRemovalError::UnsupportedFormat`] for missing or unknown extensions
    pub fn validate_extension(file_name: &str) -> Result<ImageFormat> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| BgRemovalError::unsupported_format(file_name))?;

        match extension.as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            other => Err(BgRemovalError::unsupported_format(other)),
        }
    }
}
