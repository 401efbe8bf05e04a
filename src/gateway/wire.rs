//! JSON bodies exchanged with `/transcribe` and `/generate-code`.
//!
//! Shared by the HTTP gateway clients and the gateway server so both sides
//! agree on field names.

use serde::{Deserialize, Serialize};

/// Multipart field carrying the recording.
pub const AUDIO_FIELD: &str = "audio";

/// `200` body of `POST /transcribe`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Request body of `POST /generate-code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateCodeRequest {
    pub text: String,
}

/// `200` body of `POST /generate-code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateCodeResponse {
    #[serde(rename = "generatedCode")]
    pub generated_code: String,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
