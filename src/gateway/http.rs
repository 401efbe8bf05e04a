//! HTTP gateway clients for `POST /transcribe` and `POST /generate-code`.
//!
//! Both clients talk to the gateway server configured in [`GatewayConfig`];
//! nothing is hardcoded.  Each call is a single request/response; there is no
//! retry and no streaming.

use std::time::Duration;

use async_trait::async_trait;

use crate::audio::AudioPayload;
use crate::config::GatewayConfig;

use super::error::{GatewayError, Service};
use super::wire::{GenerateCodeRequest, GenerateCodeResponse, TranscribeResponse, AUDIO_FIELD};
use super::{CodeSynthesisGateway, TranscriptionGateway};

/// Build the shared `reqwest` client with the configured timeout.
fn build_client(config: &GatewayConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

/// Read the body of a response, mapping non-2xx to [`GatewayError::Remote`].
async fn read_success_body(
    service: Service,
    response: reqwest::Response,
) -> Result<String, GatewayError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| GatewayError::NoResponse {
            service,
            detail: format!("connection dropped while reading the response ({e})"),
        })?;

    if !status.is_success() {
        return Err(GatewayError::from_error_body(service, status.as_u16(), &body));
    }
    Ok(body)
}

// ---------------------------------------------------------------------------
// HttpTranscriptionGateway
// ---------------------------------------------------------------------------

/// Uploads the recording as `multipart/form-data` with a single `audio` field.
pub struct HttpTranscriptionGateway {
    client: reqwest::Client,
    url: String,
}

impl HttpTranscriptionGateway {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            client: build_client(config),
            url: endpoint(&config.base_url, "/transcribe"),
        }
    }
}

#[async_trait]
impl TranscriptionGateway for HttpTranscriptionGateway {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, GatewayError> {
        let service = Service::Transcription;

        let part = reqwest::multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(audio.mime)
            .map_err(|e| GatewayError::InvalidResponse {
                service,
                detail: format!("invalid audio MIME type: {e}"),
            })?;
        let form = reqwest::multipart::Form::new().part(AUDIO_FIELD, part);

        log::debug!("gateway: POST {} ({} bytes)", self.url, audio.bytes.len());
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| GatewayError::from_send(service, e))?;

        let body = read_success_body(service, response).await?;
        let parsed: TranscribeResponse =
            serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse {
                service,
                detail: e.to_string(),
            })?;
        Ok(parsed.text)
    }
}

// ---------------------------------------------------------------------------
// HttpSynthesisGateway
// ---------------------------------------------------------------------------

/// Sends the transcript as `{ "text": … }` and returns `generatedCode`.
pub struct HttpSynthesisGateway {
    client: reqwest::Client,
    url: String,
}

impl HttpSynthesisGateway {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            client: build_client(config),
            url: endpoint(&config.base_url, "/generate-code"),
        }
    }
}

#[async_trait]
impl CodeSynthesisGateway for HttpSynthesisGateway {
    async fn synthesize(&self, prompt: &str) -> Result<String, GatewayError> {
        let service = Service::Synthesis;

        log::debug!("gateway: POST {} ({} chars)", self.url, prompt.len());
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateCodeRequest {
                text: prompt.to_string(),
            })
            .send()
            .await
            .map_err(|e| GatewayError::from_send(service, e))?;

        let body = read_success_body(service, response).await?;
        let parsed: GenerateCodeResponse =
            serde_json::from_str(&body).map_err(|e| GatewayError::InvalidResponse {
                service,
                detail: e.to_string(),
            })?;
        Ok(parsed.generated_code)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn config(base_url: String) -> GatewayConfig {
        GatewayConfig {
            base_url,
            timeout_secs: 5,
        }
    }

    fn payload() -> AudioPayload {
        AudioPayload {
            bytes: crate::audio::encode_wav(&[0.0; 1_600], 16_000).unwrap(),
            file_name: "recording.wav".into(),
            mime: "audio/wav",
            sample_rate: 16_000,
            duration_secs: 0.1,
        }
    }

    #[tokio::test]
    async fn transcribe_posts_multipart_and_returns_text() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transcribe")
            .match_header("content-type", Matcher::Regex("^multipart/form-data".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"text":"a counter with increment button"}"#)
            .create_async()
            .await;

        let gateway = HttpTranscriptionGateway::from_config(&config(server.url()));
        let text = gateway.transcribe(&payload()).await.unwrap();

        assert_eq!(text, "a counter with increment button");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn transcribe_surfaces_remote_error_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transcribe")
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":"No audio file provided"}"#)
            .create_async()
            .await;

        let gateway = HttpTranscriptionGateway::from_config(&config(server.url()));
        let err = gateway.transcribe(&payload()).await.unwrap_err();

        assert_eq!(
            err,
            GatewayError::Remote {
                service: Service::Transcription,
                status: 400,
                message: "No audio file provided".into(),
            }
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn transcribe_rejects_malformed_success_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/transcribe")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let gateway = HttpTranscriptionGateway::from_config(&config(server.url()));
        let err = gateway.transcribe(&payload()).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_no_response() {
        // Port 1 is reserved and closed on any sane test host.
        let gateway = HttpTranscriptionGateway::from_config(&config("http://127.0.0.1:1".into()));
        let err = gateway.transcribe(&payload()).await.unwrap_err();
        assert!(err.is_no_response(), "got {err:?}");
        assert_eq!(err.service(), Service::Transcription);
    }

    #[tokio::test]
    async fn synthesize_sends_text_and_returns_generated_code() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/generate-code")
            .match_body(Matcher::Json(serde_json::json!({ "text": "a red button" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"generatedCode":"function render() { return <button>Red</button>; }"}"#)
            .create_async()
            .await;

        let gateway = HttpSynthesisGateway::from_config(&config(format!("{}/", server.url())));
        let code = gateway.synthesize("a red button").await.unwrap();

        assert_eq!(code, "function render() { return <button>Red</button>; }");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn synthesize_surfaces_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/generate-code")
            .with_status(500)
            .with_body(r#"{"error":"OPENAI_API_KEY is not configured"}"#)
            .create_async()
            .await;

        let gateway = HttpSynthesisGateway::from_config(&config(server.url()));
        let err = gateway.synthesize("x").await.unwrap_err();
        assert_eq!(err.to_string(), "OPENAI_API_KEY is not configured");
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(endpoint("http://h:1/", "/transcribe"), "http://h:1/transcribe");
        assert_eq!(endpoint("http://h:1", "/generate-code"), "http://h:1/generate-code");
    }
}
