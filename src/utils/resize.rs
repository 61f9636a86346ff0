//! Decoding and bounded downsampling

use crate::config::DEFAULT_MAX_DIMENSION;
use crate::error::{BgRemovalError, Result};
use crate::types::RasterImage;
use image::imageops::FilterType;
use image::ImageReader;
use std::borrow::Cow;
use std::io::Cursor;

/// Decodes uploads and shrinks them so neither edge exceeds a bound
#[derive(Debug, Clone, Copy)]
pub struct Resizer {
    max_dimension: u32,
    filter: FilterType,
}

impl Default for Resizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION)
    }
}

impl Resizer {
    /// A zero bound is raised to one pixel
    #[must_use]
    pub fn new(max_dimension: u32) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            filter: FilterType::Lanczos3,
        }
    }

    #[must_use]
    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    /// Decode encoded bytes, sniffing the format from the content
    ///
    /// # Errors
    /// Returns [`BgRemovalError::Decode`] for unrecognised or corrupt data
    pub fn decode(data: &[u8]) -> Result<RasterImage> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| BgRemovalError::decode(format!("Failed to read image data: {e}")))?;

        let format = reader.format();
        if format.is_none() {
            return Err(BgRemovalError::decode("Unrecognised image format"));
        }

        let image = reader
            .decode()
            .map_err(|e| BgRemovalError::decode(e.to_string()))?;
        RasterImage::new(image, format)
    }

    /// Size a `width × height` image should be scaled to, or `None` when it already fits.
    ///
    /// The longer edge becomes `max`; the shorter edge keeps the aspect ratio,
    /// rounded to the nearest pixel and never below one. A `max` of zero
    /// is treated as one.
    #[must_use]
    pub fn target_dimensions(width: u32, height: u32, max: u32) -> Option<(u32, u32)> {
        let max = max.max(1);
        if width <= max && height <= max {
            return None;
        }

        let scale_edge = |shorter: u32, longer: u32| -> u32 {
            let scaled = (f64::from(shorter) * f64::from(max) / f64::from(longer)).round();
            (scaled as u32).clamp(1, max)
        };

        if width >= height {
            Some((max, scale_edge(height, width)))
        } else {
            Some((scale_edge(width, height), max))
        }
    }

    /// Downsample with Lanczos3 when the image exceeds the bound.
    ///
    /// Images that already fit are borrowed back unchanged.
    #[must_use]
    pub fn resize<'a>(&self, image: &'a RasterImage) -> Cow<'a, RasterImage> {
        let (width, height) = image.dimensions();
        match Self::target_dimensions(width, height, self.max_dimension) {
            None => Cow::Borrowed(image),
            Some((new_width, new_height)) => {
                tracing::debug!(
                    from_width = width,
                    from_height = height,
                    to_width = new_width,
                    to_height = new_height,
                    "Downsampling image"
                );
                let resized = image
                    .image()
                    .resize_exact(new_width, new_height, self.filter);
                // Target edges are clamped to at least 1, so this cannot be empty
                match image.derive(resized) {
                    Ok(raster) => Cow::Owned(raster),
                    Err(_) => Cow::Borrowed(image),
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

    fn raster(width: u32, height: u32) -> RasterImage {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 20, 30]));
        RasterImage::new(DynamicImage::ImageRgb8(img), None).unwrap()
    }

    #[test]
    fn test_within_bound_is_identity() {
        assert_eq!(Resizer::target_dimensions(1200, 800, 2000), None);
        assert_eq!(Resizer::target_dimensions(2000, 2000, 2000), None);
        assert_eq!(Resizer::target_dimensions(1, 1, 2000), None);

        let image = raster(1200, 800);
        let resized = Resizer::default().resize(&image);
        assert!(matches!(resized, Cow::Borrowed(_)));
        assert_eq!(resized.dimensions(), (1200, 800));
    }

    #[test]
    fn test_landscape_downscale() {
        assert_eq!(Resizer::target_dimensions(4000, 2000, 2000), Some((2000, 1000)));
        assert_eq!(Resizer::target_dimensions(3000, 2001, 2000), Some((2000, 1334)));
    }

    #[test]
    fn test_portrait_and_square_downscale() {
        assert_eq!(Resizer::target_dimensions(1000, 4000, 2000), Some((500, 2000)));
        assert_eq!(Resizer::target_dimensions(2500, 2500, 2000), Some((2000, 2000)));
    }

    #[test]
    fn test_extreme_aspect_keeps_one_pixel() {
        assert_eq!(Resizer::target_dimensions(100_000, 1, 2000), Some((2000, 1)));
        assert_eq!(Resizer::target_dimensions(1, 100_000, 2000), Some((1, 2000)));
    }

    #[test]
    fn test_zero_bound_behaves_as_one_pixel() {
        assert_eq!(Resizer::target_dimensions(10, 5, 0), Some((1, 1)));
        assert_eq!(Resizer::target_dimensions(1, 1, 0), None);

        let resizer = Resizer::new(0);
        assert_eq!(resizer.max_dimension(), 1);
        assert_eq!(resizer.resize(&raster(10, 5)).dimensions(), (1, 1));
    }

    #[test]
    fn test_never_upscales_and_preserves_aspect() {
        for (w, h) in [(2001, 17), (4096, 3072), (2050, 2049), (7000, 2100), (999, 5000)] {
            let (nw, nh) = Resizer::target_dimensions(w, h, 2000).unwrap();
            assert_eq!(nw.max(nh), 2000);
            assert!(nw <= w && nh <= h);

            let expected = f64::from(h) * f64::from(nw) / f64::from(w);
            assert!((f64::from(nh) - expected).abs() <= 1.0, "{w}x{h} -> {nw}x{nh}");
        }
    }

    #[test]
    fn test_resize_produces_new_image() {
        let image = raster(4000, 2000);
        let resized = Resizer::default().resize(&image);
        assert!(matches!(resized, Cow::Owned(_)));
        assert_eq!(resized.dimensions(), (2000, 1000));
        assert_eq!(image.dimensions(), (4000, 2000));
    }

    #[test]
    fn test_decode_png() {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(8, 6))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();

        let decoded = Resizer::decode(&buf).unwrap();
        assert_eq!(decoded.dimensions(), (8, 6));
        assert_eq!(decoded.format(), Some(ImageFormat::Png));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = Resizer::decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, BgRemovalError::Decode(_)));

        let err = Resizer::decode(&[]).unwrap_err();
        assert!(matches!(err, BgRemovalError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_png() {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(64, 64))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf.truncate(buf.len() / 2);

        let err = Resizer::decode(&buf).unwrap_err();
        assert!(matches!(err, BgRemovalError::Decode(_)));
    }
}
