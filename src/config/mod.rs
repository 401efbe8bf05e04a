//! Configuration module.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for the gateway
//! client, the gateway server, audio capture and the UI, `AppPaths` for the
//! platform config directory, and TOML persistence via `AppConfig::load` /
//! `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{AppConfig, AudioConfig, GatewayConfig, ServerConfig, UiConfig};
