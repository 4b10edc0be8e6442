//! vocalise-web - Vocal practice coach web service
//!
//! Session pipeline: upload a song, segment it into practice sections,
//! record a section, and get scored feedback.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vocalise_web::config::Settings;
use vocalise_web::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting vocalise-web");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load()?;
    settings.ensure_directories()?;
    info!(
        upload_dir = %settings.upload_dir.display(),
        recording_dir = %settings.recording_dir.display(),
        max_upload_bytes = settings.max_upload_bytes,
        "storage ready"
    );

    let bind_addr = settings.bind_addr.clone();
    let state = AppState::new(settings);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on http://{bind_addr}");
    info!("Health check: http://{bind_addr}/health");

    axum::serve(listener, app).await?;

    Ok(())
}
