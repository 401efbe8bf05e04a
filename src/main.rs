//! Application entry point: Voice-to-UI desktop client.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Create the shared state and the command channel.
//! 4. Spawn the "pipeline" thread: a current-thread tokio runtime running
//!    [`PipelineOrchestrator::run`] with the cpal microphone and the HTTP
//!    gateways.
//! 5. Run [`eframe::run_native`]; blocks the main thread until the window
//!    is closed.

use std::sync::Arc;

use eframe::egui;
use tokio::sync::mpsc;
use voice_to_ui::{
    app::VoiceToUiApp,
    audio::CpalInput,
    config::AppConfig,
    gateway::{HttpSynthesisGateway, HttpTranscriptionGateway},
    pipeline::{new_shared_state, PipelineCommand, PipelineOrchestrator, SharedState},
};

/// Commands queued between the window and the orchestrator.
const COMMAND_QUEUE: usize = 32;

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}), using defaults");
        AppConfig::default()
    });
    log::info!(
        "Voice-to-UI starting (gateway: {})",
        config.gateway.base_url
    );

    let state = new_shared_state();
    let (command_tx, command_rx) = mpsc::channel::<PipelineCommand>(COMMAND_QUEUE);
    spawn_pipeline(state.clone(), command_rx, &config);

    let app = VoiceToUiApp::new(state, command_tx, &config);
    eframe::run_native(
        "Voice-to-UI",
        native_options(&config),
        Box::new(move |_cc| Ok(Box::new(app))),
    )
}

// ---------------------------------------------------------------------------
// Pipeline thread
// ---------------------------------------------------------------------------

/// The cpal stream is not `Send` on every platform, so the orchestrator gets
/// a dedicated thread with its own current-thread runtime.
fn spawn_pipeline(
    state: SharedState,
    command_rx: mpsc::Receiver<PipelineCommand>,
    config: &AppConfig,
) {
    let config = config.clone();
    let spawned = std::thread::Builder::new()
        .name("pipeline".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start the pipeline runtime: {e}");
                    return;
                }
            };
            let orchestrator = PipelineOrchestrator::new(
                state,
                Arc::new(CpalInput::new()),
                Arc::new(HttpTranscriptionGateway::from_config(&config.gateway)),
                Arc::new(HttpSynthesisGateway::from_config(&config.gateway)),
                &config.audio,
            )
            .with_waveform_bars(config.ui.waveform_bars);
            runtime.block_on(orchestrator.run(command_rx));
            log::info!("Pipeline thread finished");
        });
    if let Err(e) = spawned {
        log::error!("Failed to spawn the pipeline thread: {e}");
    }
}

// ---------------------------------------------------------------------------
// Window options
// ---------------------------------------------------------------------------

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Voice-to-UI")
            .with_inner_size([width, height])
            .with_min_inner_size([720.0, 480.0]),
        ..Default::default()
    }
}
