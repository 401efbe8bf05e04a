use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::response::Json;

use crate::artifact::normalize;
use crate::audio::WAV_MIME;
use crate::gateway::wire::{GenerateCodeRequest, GenerateCodeResponse, TranscribeResponse, AUDIO_FIELD};
use crate::gateway::Service;

use super::error::ServerError;
use super::state::ServerState;
use super::upstream::UploadedAudio;

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health() -> &'static str {
    "ok"
}

/// POST /transcribe
/// Multipart upload with a single `audio` field; returns `{ "text": … }`.
pub async fn transcribe(
    State(state): State<ServerState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<TranscribeResponse>, ServerError> {
    let result = async {
        let api_key = state.credentials.api_key(Service::Transcription)?;
        let audio = match multipart {
            Ok(multipart) => read_audio_field(multipart).await?,
            Err(rejection) => {
                log::debug!("transcribe: not a multipart request ({rejection})");
                None
            }
        };
        let audio = audio.ok_or(ServerError::NoAudio)?;
        log::info!(
            "POST /transcribe: {} bytes ({})",
            audio.bytes.len(),
            audio.mime
        );
        state.upstream.transcribe(&api_key, audio).await
    }
    .await;

    match result {
        Ok(text) => {
            log::info!("POST /transcribe -> {} chars", text.len());
            Ok(Json(TranscribeResponse { text }))
        }
        Err(e) => {
            log::error!("Transcription error: {e}");
            Err(e)
        }
    }
}

/// POST /generate-code
/// `{ "text": … }` in, normalized `{ "generatedCode": … }` out.
pub async fn generate_code(
    State(state): State<ServerState>,
    body: Result<Json<GenerateCodeRequest>, JsonRejection>,
) -> Result<Json<GenerateCodeResponse>, ServerError> {
    let result = async {
        let Json(request) = body.map_err(|rejection| ServerError::BadRequest(rejection.body_text()))?;
        let api_key = state.credentials.api_key(Service::Synthesis)?;
        log::info!("POST /generate-code: {:?}", request.text);
        let raw = state.upstream.generate(&api_key, &request.text).await?;
        Ok::<_, ServerError>(normalize(&raw))
    }
    .await;

    match result {
        Ok(generated_code) => {
            log::info!("POST /generate-code -> {} chars", generated_code.len());
            Ok(Json(GenerateCodeResponse { generated_code }))
        }
        Err(e) => {
            log::error!("Code generation error: {e}");
            Err(e)
        }
    }
}

/// First non-empty `audio` field, if any.
async fn read_audio_field(mut multipart: Multipart) -> Result<Option<UploadedAudio>, ServerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.body_text()))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("audio.wav").to_string();
        let mime = field.content_type().unwrap_or(WAV_MIME).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(e.body_text()))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        return Ok(Some(UploadedAudio {
            bytes: bytes.to_vec(),
            file_name,
            mime,
        }));
    }
    Ok(None)
}
