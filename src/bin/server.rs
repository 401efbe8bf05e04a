//! Gateway server entry point.
//!
//! Serves `/transcribe`, `/generate-code` and `/health` on
//! `server.bind_addr` from the shared config file.  Upstream keys are read
//! from `TRANSCRIPTION_API_KEY` / `SYNTHESIS_API_KEY`, falling back to
//! `OPENAI_API_KEY`.

use anyhow::Context;
use voice_to_ui::config::AppConfig;
use voice_to_ui::gateway::Service;
use voice_to_ui::server::{self, Credentials};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().context("loading config")?;

    for service in [Service::Transcription, Service::Synthesis] {
        if let Err(e) = Credentials::Environment.api_key(service) {
            log::warn!("{service}: {e}; requests will fail until a key is exported");
        }
    }

    log::info!(
        "Upstream: {} (models: {}, {})",
        config.server.upstream_base_url,
        config.server.transcription_model,
        config.server.synthesis_model
    );
    server::serve(&config.server).await
}
