//! HTTP front end
//!
//! Thin axum layer over [`BackgroundRemovalPipeline`]. Handlers read the
//! multipart upload, run the pipeline on the blocking pool and translate
//! [`BgRemovalError`](crate::BgRemovalError) into JSON error bodies.

pub mod error;
pub mod handlers;

use crate::{config::StudioConfig, processor::BackgroundRemovalPipeline};
use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub use error::{ApiError, ErrorBody};
pub use handlers::{
    GuidelinesResponse, HealthResponse, ImagePanel, RemovalResponse, UPLOAD_FIELD,
};

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub pipeline: Arc<BackgroundRemovalPipeline>,
    pub config: Arc<StudioConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: StudioConfig, pipeline: BackgroundRemovalPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }
}

/// Multipart framing allowance on top of the upload cap.
///
/// The pipeline enforces the real limit so oversize uploads get the
/// friendly message instead of a transport error.
fn body_limit(max_file_size: u64) -> usize {
    usize::try_from(max_file_size.saturating_mul(2).saturating_add(64 * 1024))
        .unwrap_or(usize::MAX)
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let limit = body_limit(state.config.max_file_size);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/guidelines", get(handlers::guidelines))
        .route("/api/default", get(handlers::default_image))
        .route("/api/remove", post(handlers::remove_background))
        .route("/api/remove/download", post(handlers::download))
        .layer(DefaultBodyLimit::max(limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until Ctrl+C or SIGTERM
pub async fn serve(config: StudioConfig, pipeline: BackgroundRemovalPipeline) -> anyhow::Result<()> {
    let address = config.server.bind_address.clone();
    let app = router(AppState::new(config, pipeline));

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;

    info!(address = %listener.local_addr().context("No local address")?, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received terminate signal, shutting down"),
    }
}
