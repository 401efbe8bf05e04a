//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.
//! Every section is `#[serde(default)]`, so a settings file written by an
//! older build (or edited by hand) only needs the keys it wants to override.
//!
//! API credentials are deliberately **not** part of this file: the gateway
//! server reads them from the process environment at request time.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

/// Where the desktop client sends `/transcribe` and `/generate-code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the gateway server, without a trailing slash.
    pub base_url: String,
    /// Maximum seconds to wait for either endpoint before the call is
    /// reported as "no response received".
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".into(),
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Settings for the `voice-to-ui-server` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address the server listens on.
    pub bind_addr: String,
    /// Base URL of the OpenAI-compatible upstream.
    ///
    /// - OpenAI: `https://api.openai.com`
    pub upstream_base_url: String,
    /// Model used by `/v1/audio/transcriptions`.
    pub transcription_model: String,
    /// Model used by `/v1/chat/completions`.
    pub synthesis_model: String,
    /// Sampling temperature for code synthesis.
    pub temperature: f32,
    /// Completion token limit for code synthesis.
    pub max_tokens: u32,
    /// Upstream request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            upstream_base_url: "https://api.openai.com".into(),
            transcription_model: "whisper-1".into(),
            synthesis_model: "gpt-4".into(),
            temperature: 0.7,
            max_tokens: 4000,
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for microphone capture and the uploaded payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate of the uploaded WAV payload in Hz.
    pub sample_rate: u32,
    /// Recording stops automatically after this many seconds.
    pub max_recording_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            max_recording_secs: 120.0,
        }
    }
}

// ---------------------------------------------------------------------------
// UiConfig
// ---------------------------------------------------------------------------

/// egui window appearance and behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Initial window size `(width, height)` in logical pixels.
    pub window_size: (f32, f32),
    /// Show the editable source view under the preview.
    pub show_editor: bool,
    /// Number of bars in the recording level meter.
    pub waveform_bars: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            window_size: (1200.0, 800.0),
            show_editor: true,
            waveform_bars: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voice_to_ui::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Gateway client settings (desktop app).
    pub gateway: GatewayConfig,
    /// Gateway server settings (`voice-to-ui-server`).
    pub server: ServerConfig,
    /// Audio capture settings.
    pub audio: AudioConfig,
    /// UI / window settings.
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let original = AppConfig::default();
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(original.gateway.base_url, loaded.gateway.base_url);
        assert_eq!(original.gateway.timeout_secs, loaded.gateway.timeout_secs);
        assert_eq!(original.server.bind_addr, loaded.server.bind_addr);
        assert_eq!(original.server.synthesis_model, loaded.server.synthesis_model);
        assert_eq!(original.server.max_tokens, loaded.server.max_tokens);
        assert_eq!(original.audio.sample_rate, loaded.audio.sample_rate);
        assert_eq!(original.ui.window_size, loaded.ui.window_size);
        assert_eq!(original.ui.show_editor, loaded.ui.show_editor);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        let default = AppConfig::default();

        assert_eq!(config.gateway.base_url, default.gateway.base_url);
        assert_eq!(config.server.transcription_model, default.server.transcription_model);
        assert_eq!(config.audio.sample_rate, default.audio.sample_rate);
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert_eq!(cfg.gateway.base_url, "http://127.0.0.1:3000");
        assert_eq!(cfg.gateway.timeout_secs, 120);
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:3000");
        assert_eq!(cfg.server.upstream_base_url, "https://api.openai.com");
        assert_eq!(cfg.server.transcription_model, "whisper-1");
        assert_eq!(cfg.server.synthesis_model, "gpt-4");
        assert!((cfg.server.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(cfg.server.max_tokens, 4000);
        assert_eq!(cfg.audio.sample_rate, 16_000);
        assert!(cfg.ui.show_editor);
    }

    /// A partial file only overrides what it names.
    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(
            &path,
            "[gateway]\nbase_url = \"http://10.0.0.5:8080\"\n\n[server]\nsynthesis_model = \"gpt-4o\"\n",
        )
        .expect("write");

        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.gateway.base_url, "http://10.0.0.5:8080");
        assert_eq!(loaded.gateway.timeout_secs, 120);
        assert_eq!(loaded.server.synthesis_model, "gpt-4o");
        assert_eq!(loaded.server.transcription_model, "whisper-1");
        assert_eq!(loaded.audio.sample_rate, 16_000);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[gateway\nbase_url = 3").expect("write");

        assert!(AppConfig::load_from(&path).is_err());
    }
}
