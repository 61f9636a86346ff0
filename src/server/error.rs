//! HTTP error responses

use crate::error::{oversize_message, BgRemovalError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable kind, e.g. `oversize`
    pub error: String,
    /// Text to show the user
    pub message: String,
}

/// Failure of a request handler
#[derive(Debug)]
pub enum ApiError {
    Pipeline(BgRemovalError),
    /// The multipart body itself could not be read
    BadRequest(String),
    /// Body exceeded the transport limit before it could be measured
    BodyTooLarge { limit: u64 },
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::BodyTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Pipeline(err) => match err {
                BgRemovalError::Oversize { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                BgRemovalError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                BgRemovalError::Decode(_) => StatusCode::UNPROCESSABLE_ENTITY,
                BgRemovalError::MissingDefaultImage { .. } => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            Self::BadRequest(detail) => ErrorBody {
                error: "bad_request".to_string(),
                message: format!("Invalid upload: {detail}"),
            },
            Self::BodyTooLarge { limit } => ErrorBody {
                error: "oversize".to_string(),
                message: oversize_message(*limit),
            },
            Self::Pipeline(err) => ErrorBody {
                error: err.kind().to_string(),
                message: err.user_message(),
            },
        }
    }
}

impl From<BgRemovalError> for ApiError {
    fn from(err: BgRemovalError) -> Self {
        Self::Pipeline(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Pipeline(err) if status.is_server_error() => {
                tracing::error!(kind = err.kind(), error = %err, "Request failed");
            },
            Self::Pipeline(err) => {
                tracing::warn!(kind = err.kind(), error = %err, "Request rejected");
            },
            Self::BadRequest(detail) => {
                tracing::warn!(error = %detail, "Malformed upload");
            },
            Self::BodyTooLarge { limit } => {
                tracing::warn!(limit, "Upload body over transport limit");
            },
        }
        (status, Json(self.body())).into_response()
    }
}
