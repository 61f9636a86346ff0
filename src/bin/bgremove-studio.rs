//! Background removal studio server
//!
//! Serves the upload / remove / download flow over HTTP using ONNX Runtime
//! or Tract for inference.

use bgremove_studio::cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}
