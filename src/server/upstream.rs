//! `UpstreamClient`: the OpenAI-compatible service behind the gateway.
//!
//! * `/v1/audio/transcriptions` turns the uploaded recording into text.
//! * `/v1/chat/completions` turns a description into component source.
//!
//! Connection details (`upstream_base_url`, models, sampling) come from
//! [`ServerConfig`]; the API key is passed per call because it is read from
//! the environment at request time.

use std::time::Duration;

use crate::config::ServerConfig;

use super::error::ServerError;
use super::prompt::build_chat;

/// Recording received on `/transcribe`, forwarded as-is.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: String,
}

pub struct UpstreamClient {
    client: reqwest::Client,
    config: ServerConfig,
}

impl UpstreamClient {
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.
    pub fn from_config(config: &ServerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            config: config.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.upstream_base_url.trim_end_matches('/'))
    }

    /// Speech-to-text for one recording.
    pub async fn transcribe(&self, api_key: &str, audio: UploadedAudio) -> Result<String, ServerError> {
        let size = audio.bytes.len();
        let part = reqwest::multipart::Part::bytes(audio.bytes)
            .file_name(audio.file_name)
            .mime_str(&audio.mime)
            .map_err(|e| ServerError::BadRequest(format!("invalid audio content type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("model", self.config.transcription_model.clone());

        log::debug!(
            "upstream: transcribing {size} bytes with {}",
            self.config.transcription_model
        );
        let response = self
            .client
            .post(self.url("/v1/audio/transcriptions"))
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        let json = read_json(response).await?;
        json["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ServerError::Internal("transcription response has no text".into()))
    }

    /// Raw model output for `description`; callers normalize it.
    pub async fn generate(&self, api_key: &str, description: &str) -> Result<String, ServerError> {
        let (system_msg, user_msg) = build_chat(description);

        let body = serde_json::json!({
            "model":       self.config.synthesis_model,
            "messages": [
                { "role": "system", "content": system_msg },
                { "role": "user",   "content": user_msg   }
            ],
            "temperature": self.config.temperature,
            "max_tokens":  self.config.max_tokens
        });

        log::debug!(
            "upstream: generating with {} ({} chars of description)",
            self.config.synthesis_model,
            description.len()
        );
        let response = self
            .client
            .post(self.url("/v1/chat/completions"))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let json = read_json(response).await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        if content.is_empty() {
            return Err(ServerError::Internal("The model returned an empty response".into()));
        }
        Ok(content)
    }
}

/// Parse a JSON body, mapping non-2xx to [`ServerError::Upstream`].
async fn read_json(response: reqwest::Response) -> Result<serde_json::Value, ServerError> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        return Err(ServerError::Upstream {
            status: status.as_u16(),
            message: upstream_message(&text).unwrap_or_else(|| {
                format!(
                    "Upstream returned {} {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("error")
                )
            }),
        });
    }
    serde_json::from_str(&text)
        .map_err(|e| ServerError::Internal(format!("failed to parse upstream response: {e}")))
}

/// `{"error": {"message": …}}` (OpenAI) or `{"error": "…"}`.
fn upstream_message(body: &str) -> Option<String> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let error = &json["error"];
    error["message"]
        .as_str()
        .or_else(|| error.as_str())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
