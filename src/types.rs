//! Image values that flow through the pipeline

use crate::error::{BgRemovalError, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GenericImageView, ImageFormat};

/// Decoded raster with non-zero dimensions
///
/// Transforms never mutate a `RasterImage`; they return a new one.
#[derive(Debug, Clone)]
pub struct RasterImage {
    image: DynamicImage,
    format: Option<ImageFormat>,
}

impl RasterImage {
    /// Wrap a decoded image
    ///
    /// # Errors
    /// Returns [`BgRemovalError::Decode`] when either dimension is zero
    pub fn new(image: DynamicImage, format: Option<ImageFormat>) -> Result<Self> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(BgRemovalError::decode(format!(
                "Image has empty dimensions {width}x{height}"
            )));
        }
        Ok(Self { image, format })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// `(width, height)`
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Encoding the pixels were decoded from, if known
    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    #[must_use]
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    #[must_use]
    pub fn into_inner(self) -> DynamicImage {
        self.image
    }

    /// Whether the pixel buffer carries an alpha channel
    #[must_use]
    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    /// New raster with different pixels but the same source format
    ///
    /// # Errors
    /// Returns [`BgRemovalError::Decode`] when the new pixels are empty
    pub fn derive(&self, image: DynamicImage) -> Result<Self> {
        Self::new(image, self.format)
    }
}

/// Encoded image bytes with an optional format tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes {
    data: Vec<u8>,
    format: Option<ImageFormat>,
}

impl ImageBytes {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, format: None }
    }

    #[must_use]
    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.format = Some(format);
        self
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// MIME type of the tagged format (`application/octet-stream` when untagged)
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        self.format
            .map_or("application/octet-stream", |f| f.to_mime_type())
    }

    /// `data:` URL embedding the bytes in base64
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type(), STANDARD.encode(&self.data))
    }
}

impl From<Vec<u8>> for ImageBytes {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn test_raster_rejects_empty_dimensions() {
        let empty = DynamicImage::ImageRgb8(RgbImage::new(0, 10));
        let err = RasterImage::new(empty, None).unwrap_err();
        assert!(matches!(err, BgRemovalError::Decode(_)));
    }

    #[test]
    fn test_raster_accessors() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(30, 20, Rgb([1, 2, 3])));
        let raster = RasterImage::new(img, Some(ImageFormat::Jpeg)).unwrap();

        assert_eq!(raster.width(), 30);
        assert_eq!(raster.height(), 20);
        assert_eq!(raster.dimensions(), (30, 20));
        assert_eq!(raster.format(), Some(ImageFormat::Jpeg));
        assert!(!raster.has_alpha());
    }

    #[test]
    fn test_derive_keeps_format() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(4, 4));
        let raster = RasterImage::new(img, Some(ImageFormat::Png)).unwrap();

        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 0])));
        let derived = raster.derive(rgba).unwrap();

        assert_eq!(derived.format(), Some(ImageFormat::Png));
        assert!(derived.has_alpha());
        assert_eq!(raster.dimensions(), (4, 4));
    }

    #[test]
    fn test_image_bytes_data_url() {
        let bytes = ImageBytes::new(vec![1, 2, 3]).with_format(ImageFormat::Png);
        assert_eq!(bytes.mime_type(), "image/png");
        assert_eq!(bytes.data_url(), "data:image/png;base64,AQID");

        let untagged = ImageBytes::from(vec![0u8; 4]);
        assert_eq!(untagged.mime_type(), "application/octet-stream");
        assert_eq!(untagged.len(), 4);
        assert!(!untagged.is_empty());
    }
}
