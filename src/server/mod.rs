//! Gateway HTTP server in front of the upstream speech and code models.
//!
//! This module provides the endpoints the desktop client calls:
//! - POST /transcribe    - multipart `audio` upload → `{ "text" }`
//! - POST /generate-code - `{ "text" }` → normalized `{ "generatedCode" }`
//! - GET  /health        - liveness probe
//!
//! ```text
//! desktop gateway ──HTTP──▶ axum Router ──▶ handlers ──▶ UpstreamClient
//!                                              │             (reqwest)
//!                                              └─ Credentials (env, per request)
//! ```

mod error;
mod handlers;
pub mod prompt;
mod routes;
mod state;
mod upstream;

use anyhow::Result;

use crate::config::ServerConfig;

pub use error::ServerError;
pub use routes::{create_router, MAX_UPLOAD_BYTES};
pub use state::{Credentials, ServerState};
pub use upstream::{UploadedAudio, UpstreamClient};

/// Bind `config.bind_addr` and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig) -> Result<()> {
    let app = create_router(ServerState::new(config, Credentials::Environment));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("Gateway server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            log::info!("Shutting down gateway server");
        })
        .await?;
    Ok(())
}
