//! Failures of the gateway server, rendered as `{ "error": message }`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use thiserror::Error;

use crate::gateway::wire::ErrorBody;

#[derive(Debug, Error)]
pub enum ServerError {
    /// No upstream credential in the environment.
    #[error("OPENAI_API_KEY is not configured")]
    MissingApiKey,

    /// `/transcribe` without an `audio` field.
    #[error("No audio file provided")]
    NoAudio,

    /// The request body could not be read.
    #[error("{0}")]
    BadRequest(String),

    /// The upstream answered with an error payload.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// The upstream did not answer in time.
    #[error("The upstream service timed out")]
    UpstreamTimeout,

    /// The upstream could not be reached, or its answer was unusable.
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::NoAudio | ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::MissingApiKey | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServerError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ServerError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServerError::UpstreamTimeout
        } else {
            ServerError::Internal(format!("upstream request failed: {e}"))
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_mistakes_are_400() {
        assert_eq!(ServerError::NoAudio.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServerError::BadRequest("missing field `text`".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn upstream_message_is_passed_through() {
        let e = ServerError::Upstream {
            status: 401,
            message: "Incorrect API key provided".into(),
        };
        assert_eq!(e.to_string(), "Incorrect API key provided");
        assert_eq!(e.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn response_body_has_error_field() {
        let response = ServerError::MissingApiKey.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "OPENAI_API_KEY is not configured");
    }
}
