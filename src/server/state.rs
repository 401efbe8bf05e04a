use std::sync::Arc;

use crate::config::ServerConfig;
use crate::gateway::Service;

use super::error::ServerError;
use super::upstream::UpstreamClient;

/// Shared key for both services.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const TRANSCRIPTION_API_KEY: &str = "TRANSCRIPTION_API_KEY";
pub const SYNTHESIS_API_KEY: &str = "SYNTHESIS_API_KEY";

/// Where upstream API keys come from.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Looked up in the process environment on every request, so a key
    /// exported after startup is picked up without a restart.
    Environment,
    /// Fixed keys, one per service.
    Static {
        transcription: Option<String>,
        synthesis: Option<String>,
    },
}

impl Credentials {
    /// Key for `service`; blank values count as missing.
    pub fn api_key(&self, service: Service) -> Result<String, ServerError> {
        let key = match self {
            Credentials::Environment => {
                let specific = match service {
                    Service::Transcription => TRANSCRIPTION_API_KEY,
                    Service::Synthesis => SYNTHESIS_API_KEY,
                };
                env_key(specific).or_else(|| env_key(OPENAI_API_KEY))
            }
            Credentials::Static {
                transcription,
                synthesis,
            } => match service {
                Service::Transcription => transcription.clone(),
                Service::Synthesis => synthesis.clone(),
            },
        };
        key.filter(|k| !k.trim().is_empty())
            .ok_or(ServerError::MissingApiKey)
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct ServerState {
    pub upstream: Arc<UpstreamClient>,
    pub credentials: Credentials,
}

impl ServerState {
    pub fn new(config: &ServerConfig, credentials: Credentials) -> Self {
        Self {
            upstream: Arc::new(UpstreamClient::from_config(config)),
            credentials,
        }
    }
}
