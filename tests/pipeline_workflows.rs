//! Integration tests for complete background removal workflows
//!
//! These tests drive the pipeline end to end without model files, using the
//! mock inference backend behind the real segmentation remover.

use bgremove_studio::{
    backends::test_utils::{MockBackend, MockRemover},
    error::{BgRemovalError, Result},
    models::ModelPreset,
    services::{default_source, ImageSource, PipelineStage, RecordingObserver, StageEvent},
    utils::Resizer,
    BackgroundRemovalPipeline, BackgroundRemover, SegmentationRemover, StudioConfig,
};
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

/// Encode a gradient test image
fn create_test_image(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let dynamic_image = match format {
        ImageFormat::Jpeg => {
            let mut image = RgbImage::new(width, height);
            for (x, y, pixel) in image.enumerate_pixels_mut() {
                let intensity = ((x + y) % 100) as u8;
                *pixel = image::Rgb([intensity, 128, 255 - intensity]);
            }
            DynamicImage::ImageRgb8(image)
        },
        _ => {
            let mut image = RgbaImage::new(width, height);
            for (x, y, pixel) in image.enumerate_pixels_mut() {
                let intensity = ((x * 3 + y) % 200) as u8;
                *pixel = image::Rgba([intensity, 64, 255 - intensity, 255]);
            }
            DynamicImage::ImageRgba8(image)
        },
    };

    let mut buffer = Vec::new();
    dynamic_image
        .write_to(&mut Cursor::new(&mut buffer), format)
        .unwrap();
    buffer
}

fn upload(file_name: &str, bytes: Vec<u8>) -> ImageSource {
    ImageSource::upload(Some(file_name.to_string()), bytes)
}

fn segmentation_pipeline() -> BackgroundRemovalPipeline {
    let remover = SegmentationRemover::new(
        Box::new(MockBackend::new()),
        ModelPreset::U2Net.preprocessing(),
    );
    BackgroundRemovalPipeline::new(&StudioConfig::default(), Arc::new(remover))
}

#[test]
fn test_upload_to_png_download() -> Result<()> {
    let pipeline = segmentation_pipeline();
    let observer = RecordingObserver::new();
    let source = ImageSource::upload(
        Some("portrait.jpg".to_string()),
        create_test_image(300, 200, ImageFormat::Jpeg),
    );

    let output = pipeline.run_source(source, &observer)?;

    assert_eq!(output.original.dimensions(), (300, 200));
    assert_eq!(output.processed.dimensions(), (300, 200));
    assert_eq!(output.download.mime_type(), "image/png");
    assert_eq!(observer.started_stages(), PipelineStage::ALL.to_vec());

    // Centre kept, corners cleared by the circular mock mask
    let cutout = image::load_from_memory_with_format(output.download.as_slice(), ImageFormat::Png)
        .unwrap()
        .to_rgba8();
    assert!(cutout.get_pixel(150, 100)[3] > 200);
    assert_eq!(cutout.get_pixel(0, 0).0, [0, 0, 0, 0]);
    Ok(())
}

#[test]
fn test_portrait_resize_preserves_aspect_ratio() -> Result<()> {
    let pipeline = BackgroundRemovalPipeline::new(
        &StudioConfig::default(),
        Arc::new(MockRemover::new()),
    );
    let bytes = create_test_image(1500, 3000, ImageFormat::Png);

    let output = pipeline.run_source(upload("photo.png", bytes), &RecordingObserver::new())?;

    assert_eq!(output.original.dimensions(), (1000, 2000));
    assert_eq!(output.processed.dimensions(), (1000, 2000));
    Ok(())
}

#[test]
fn test_exact_limit_dimension_is_untouched() -> Result<()> {
    let pipeline = BackgroundRemovalPipeline::new(
        &StudioConfig::default(),
        Arc::new(MockRemover::new()),
    );
    let bytes = create_test_image(2000, 40, ImageFormat::Png);

    let output = pipeline.run_source(upload("photo.png", bytes), &RecordingObserver::new())?;

    assert_eq!(output.original.dimensions(), (2000, 40));
    Ok(())
}

#[test]
fn test_default_image_fallback_order() -> Result<()> {
    let assets = TempDir::new().unwrap();
    std::fs::write(
        assets.path().join("wallaby.png"),
        create_test_image(64, 48, ImageFormat::Png),
    )
    .unwrap();

    let pipeline = segmentation_pipeline();
    let source = default_source(assets.path())?;
    assert_eq!(source, ImageSource::FilePath(assets.path().join("wallaby.png")));

    let output = pipeline.run_source(source, &RecordingObserver::new())?;
    assert_eq!(output.original.dimensions(), (64, 48));

    std::fs::write(
        assets.path().join("zebra.jpg"),
        create_test_image(80, 60, ImageFormat::Jpeg),
    )
    .unwrap();
    let output = pipeline.run_source(default_source(assets.path())?, &RecordingObserver::new())?;
    assert_eq!(output.original.dimensions(), (80, 60));
    Ok(())
}

#[test]
fn test_missing_default_images() {
    let assets = TempDir::new().unwrap();
    let err = default_source(assets.path()).unwrap_err();

    match err {
        BgRemovalError::MissingDefaultImage { searched } => {
            assert_eq!(
                searched,
                vec![assets.path().join("zebra.jpg"), assets.path().join("wallaby.png")]
            );
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_model_is_loaded_once_across_requests() -> Result<()> {
    let backend = MockBackend::new();
    let history = backend.call_history_handle();
    let remover = SegmentationRemover::new(Box::new(backend), ModelPreset::U2Net.preprocessing());
    let pipeline = BackgroundRemovalPipeline::new(&StudioConfig::default(), Arc::new(remover));

    for _ in 0..3 {
        let bytes = create_test_image(32, 32, ImageFormat::Png);
        pipeline.run_source(upload("photo.png", bytes), &RecordingObserver::new())?;
    }

    let calls = history.lock().unwrap().clone();
    assert_eq!(calls.iter().filter(|c| *c == "initialize:load").count(), 1);
    assert_eq!(calls.iter().filter(|c| *c == "infer").count(), 3);
    Ok(())
}

#[test]
fn test_inference_failure_surfaces_as_processing_error() {
    let remover = SegmentationRemover::new(
        Box::new(MockBackend::new_failing_inference()),
        ModelPreset::U2Net.preprocessing(),
    );
    let pipeline = BackgroundRemovalPipeline::new(&StudioConfig::default(), Arc::new(remover));
    let observer = RecordingObserver::new();

    let err = pipeline
        .run_source(
            upload("photo.png", create_test_image(16, 16, ImageFormat::Png)),
            &observer,
        )
        .unwrap_err();

    assert!(matches!(err, BgRemovalError::Processing(_)));
    assert!(err.user_message().starts_with("Error processing image: "));
    assert_eq!(
        observer.events().last(),
        Some(&StageEvent::Failed {
            stage: PipelineStage::BackgroundRemoved,
            kind: "processing"
        })
    );
}

#[test]
fn test_remover_sees_resized_image() -> Result<()> {
    struct SizeCheckingRemover;

    impl BackgroundRemover for SizeCheckingRemover {
        fn name(&self) -> &str {
            "size-check"
        }

        fn remove_background(
            &self,
            image: &bgremove_studio::RasterImage,
        ) -> Result<bgremove_studio::RasterImage> {
            assert!(image.width().max(image.height()) <= 2000);
            image.derive(DynamicImage::ImageRgba8(image.image().to_rgba8()))
        }
    }

    let pipeline =
        BackgroundRemovalPipeline::new(&StudioConfig::default(), Arc::new(SizeCheckingRemover));
    let bytes = create_test_image(2500, 2500, ImageFormat::Jpeg);
    let output = pipeline.run_source(upload("photo.jpg", bytes), &RecordingObserver::new())?;

    let decoded = Resizer::decode(output.download.as_slice())?;
    assert_eq!(decoded.dimensions(), (2000, 2000));
    Ok(())
}
