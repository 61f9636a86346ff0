//! Request handlers

use super::{error::ApiError, AppState};
use crate::{
    config::StudioConfig,
    error::BgRemovalError,
    processor::PipelineOutput,
    services::{
        default_source, DownloadDescriptor, ImageSource, OutputFormatHandler, TracingObserver,
        DOWNLOAD_CONTENT_DISPOSITION, DOWNLOAD_MIME_TYPE, DEFAULT_IMAGES,
    },
    types::RasterImage,
    utils::ACCEPTED_EXTENSIONS,
};
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

/// Multipart field carrying the upload
pub const UPLOAD_FIELD: &str = "image";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub remover: String,
}

/// Upload rules shown next to the uploader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuidelinesResponse {
    pub max_file_size_bytes: u64,
    pub max_file_size_mb: f64,
    pub max_dimension: u32,
    pub accepted_formats: Vec<String>,
    pub default_images: Vec<String>,
    pub tips: Vec<String>,
}

impl GuidelinesResponse {
    fn from_config(config: &StudioConfig) -> Self {
        let formats = ACCEPTED_EXTENSIONS
            .iter()
            .map(|ext| ext.to_ascii_uppercase())
            .collect::<Vec<_>>();
        Self {
            max_file_size_bytes: config.max_file_size,
            max_file_size_mb: config.max_file_size_mb(),
            max_dimension: config.max_dimension,
            tips: vec![
                format!("Max size: {}MB", config.max_file_size_mb().round()),
                format!("Large images auto-resized to {}px", config.max_dimension),
                format!("Formats: {}", formats.join(", ")),
            ],
            accepted_formats: ACCEPTED_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            default_images: DEFAULT_IMAGES.iter().map(|e| (*e).to_string()).collect(),
        }
    }
}

/// One side of the before/after display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePanel {
    pub caption: String,
    pub width: u32,
    pub height: u32,
    /// PNG `data:` URL
    pub data_url: String,
}

impl ImagePanel {
    fn render(caption: &str, image: &RasterImage) -> Result<Self, BgRemovalError> {
        Ok(Self {
            caption: caption.to_string(),
            width: image.width(),
            height: image.height(),
            data_url: OutputFormatHandler::to_data_url(image)?,
        })
    }
}

/// Successful removal, with both panels present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalResponse {
    pub request_id: String,
    pub original: ImagePanel,
    pub processed: ImagePanel,
    pub download: DownloadDescriptor,
    pub elapsed_ms: u64,
    /// `Completed in N.NN seconds`
    pub status: String,
}

impl RemovalResponse {
    fn from_output(request_id: Uuid, output: &PipelineOutput) -> Result<Self, BgRemovalError> {
        Ok(Self {
            request_id: request_id.to_string(),
            original: ImagePanel::render("Original Image", &output.original)?,
            processed: ImagePanel {
                caption: "Processed Image".to_string(),
                width: output.processed.width(),
                height: output.processed.height(),
                data_url: output.download.data_url(),
            },
            download: DownloadDescriptor::for_png(&output.download),
            elapsed_ms: output.elapsed.as_millis() as u64,
            status: output.status_text(),
        })
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        remover: state.pipeline.remover().name().to_string(),
    })
}

pub async fn guidelines(State(state): State<AppState>) -> Json<GuidelinesResponse> {
    Json(GuidelinesResponse::from_config(&state.config))
}

/// Process an upload (or the default image) and return both panels
pub async fn remove_background(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<RemovalResponse>, ApiError> {
    let upload = read_upload(multipart, state.config.max_file_size).await?;
    let (request_id, output) = process(&state, upload).await?;
    Ok(Json(RemovalResponse::from_output(request_id, &output)?))
}

/// Process an upload (or the default image) and return the PNG as an attachment
pub async fn download(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(multipart, state.config.max_file_size).await?;
    let (_, output) = process(&state, upload).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, DOWNLOAD_MIME_TYPE),
            (header::CONTENT_DISPOSITION, DOWNLOAD_CONTENT_DISPOSITION),
        ],
        output.download.into_vec(),
    )
        .into_response())
}

/// Process the first default image that exists
pub async fn default_image(
    State(state): State<AppState>,
) -> Result<Json<RemovalResponse>, ApiError> {
    let (request_id, output) = process(&state, None).await?;
    Ok(Json(RemovalResponse::from_output(request_id, &output)?))
}

/// Pull the `image` field out of the form; an empty file input counts as no upload
async fn read_upload(
    mut multipart: Multipart,
    max_file_size: u64,
) -> Result<Option<ImageSource>, ApiError> {
    let map_err = |e: MultipartError| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::BodyTooLarge {
                limit: max_file_size,
            }
        } else {
            ApiError::BadRequest(e.body_text())
        }
    };

    while let Some(field) = multipart.next_field().await.map_err(map_err)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let data = field.bytes().await.map_err(map_err)?;

        if data.is_empty() && file_name.is_none() {
            return Ok(None);
        }
        return Ok(Some(ImageSource::upload(file_name, data.to_vec())));
    }

    Ok(None)
}

/// Run the pipeline off the async runtime
async fn process(
    state: &AppState,
    upload: Option<ImageSource>,
) -> Result<(Uuid, PipelineOutput), ApiError> {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("remove_background", %request_id);

    let source = match upload {
        Some(source) => source,
        None => default_source(&state.config.asset_dir)?,
    };

    let pipeline = state.pipeline.clone();
    let blocking_span = span.clone();
    let output = tokio::task::spawn_blocking(move || {
        let _guard = blocking_span.enter();
        pipeline.run_source(source, &TracingObserver)
    })
    .instrument(span)
    .await
    .map_err(|e| BgRemovalError::internal(format!("Pipeline task failed: {e}")))??;

    Ok((request_id, output))
}
