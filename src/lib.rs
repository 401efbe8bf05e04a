//! Voice-to-UI: speak a description, get a working UI component.
//!
//! ```text
//! microphone ─▶ audio ─▶ gateway::transcribe ─▶ gateway::generate ─▶ artifact
//!                 ▲                                                    │
//!            pipeline (orchestrator, SharedState)        history ◀─────┤
//!                 ▲                                                    ▼
//!               app (egui window) ◀───────────── sandbox (interpret + draw)
//! ```
//!
//! The `server` module is the HTTP gateway the desktop client talks to; it
//! ships as the `voice-to-ui-server` binary.

pub mod app;
pub mod artifact;
pub mod audio;
pub mod config;
pub mod gateway;
pub mod history;
pub mod pipeline;
pub mod sandbox;
pub mod server;
