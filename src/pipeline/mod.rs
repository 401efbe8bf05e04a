//! Pipeline orchestrator module for Voice-to-UI.
//!
//! This module sequences one utterance through capture, transcription and
//! code synthesis, and exposes the shared state that the UI reads every
//! frame.
//!
//! # Architecture
//!
//! ```text
//! UI thread ── PipelineCommand (mpsc) ──▶ PipelineOrchestrator::run()
//!                                          (current-thread runtime on the
//!                                           "pipeline" thread)
//!                                                │
//!                      ┌─────────────────────────┼─────────────────────┐
//!                      ▼                         ▼                     ▼
//!                MediaCapture          TranscriptionGateway   CodeSynthesisGateway
//!                                                │
//!                                                ▼
//!                                  normalize → HistoryLedger::record
//!
//! SharedState (Arc<Mutex<AppState>>) ◀── written by the orchestrator,
//!                                        read by egui update() each frame
//! ```

pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use runner::{PipelineCommand, PipelineError, PipelineOrchestrator};
pub use state::{
    lock_state, new_shared_state, AppState, PipelineRun, PipelineState, RunPhase, SharedState,
};
