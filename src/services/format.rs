//! Output format handling service
//!
//! Results always leave the pipeline as PNG so the alpha channel survives.

use crate::error::{BgRemovalError, Result};
use crate::types::{ImageBytes, RasterImage};
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

/// File name offered for the downloaded result
pub const DOWNLOAD_FILE_NAME: &str = "background_removed.png";

/// MIME type of the downloaded result
pub const DOWNLOAD_MIME_TYPE: &str = "image/png";

/// `Content-Disposition` header value for the downloaded result
pub const DOWNLOAD_CONTENT_DISPOSITION: &str =
    "attachment; filename=\"background_removed.png\"";

/// How a client should save the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadDescriptor {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
}

impl DownloadDescriptor {
    /// Descriptor for PNG bytes produced by [`OutputFormatHandler::encode_png`]
    #[must_use]
    pub fn for_png(bytes: &ImageBytes) -> Self {
        Self {
            file_name: DOWNLOAD_FILE_NAME.to_string(),
            mime_type: DOWNLOAD_MIME_TYPE.to_string(),
            size_bytes: bytes.len(),
        }
    }
}

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Encode a raster losslessly as PNG, keeping any alpha channel
    ///
    /// # Errors
    /// Returns [`BgRemovalError::Processing`] if the encoder fails
    pub fn encode_png(image: &RasterImage) -> Result<ImageBytes> {
        let mut buffer = Vec::new();
        image
            .image()
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| BgRemovalError::processing(format!("Failed to encode PNG: {e}")))?;
        Ok(ImageBytes::new(buffer).with_format(ImageFormat::Png))
    }

    /// PNG `data:` URL for displaying a raster in a browser
    ///
    /// # Errors
    /// Returns [`BgRemovalError::Processing`] if the encoder fails
    pub fn to_data_url(image: &RasterImage) -> Result<String> {
        Ok(Self::encode_png(image)?.data_url())
    }
}
