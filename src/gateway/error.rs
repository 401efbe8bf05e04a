//! Gateway failure taxonomy.
//!
//! Every remote-call failure is one of three shapes, and the shape is kept
//! all the way to the user-visible message:
//!
//! * [`GatewayError::NoResponse`]: the request never produced an HTTP
//!   response (timeout, refused connection, DNS failure).
//! * [`GatewayError::Remote`]: the service answered with a non-2xx status.
//!   Its `Display` is the service's own `error` string, verbatim.
//! * [`GatewayError::InvalidResponse`]: a 2xx whose body does not match the
//!   wire types in [`super::wire`].

use std::fmt;

use thiserror::Error;

use super::wire::ErrorBody;

/// Which remote service a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Transcription,
    Synthesis,
}

impl Service {
    /// Message used when an error response carries no `error` field.
    pub fn fallback_message(self) -> &'static str {
        match self {
            Service::Transcription => "Transcription failed",
            Service::Synthesis => "Code generation failed",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Transcription => f.write_str("transcription service"),
            Service::Synthesis => f.write_str("code generation service"),
        }
    }
}

/// Errors returned by [`TranscriptionGateway`](super::TranscriptionGateway)
/// and [`CodeSynthesisGateway`](super::CodeSynthesisGateway).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// No HTTP response was received.
    #[error("No response from the {service}: {detail}")]
    NoResponse { service: Service, detail: String },

    /// The service returned an error payload.
    #[error("{message}")]
    Remote {
        service: Service,
        status: u16,
        message: String,
    },

    /// A success status with a body that does not match the contract.
    #[error("Unexpected response from the {service}: {detail}")]
    InvalidResponse { service: Service, detail: String },
}

impl GatewayError {
    pub fn service(&self) -> Service {
        match self {
            GatewayError::NoResponse { service, .. }
            | GatewayError::Remote { service, .. }
            | GatewayError::InvalidResponse { service, .. } => *service,
        }
    }

    /// `true` when nothing came back from the network.
    pub fn is_no_response(&self) -> bool {
        matches!(self, GatewayError::NoResponse { .. })
    }

    /// A transport failure while sending the request.
    pub fn from_send(service: Service, e: reqwest::Error) -> Self {
        let detail = if e.is_timeout() {
            "request timed out".to_string()
        } else if e.is_connect() {
            format!("could not connect ({e})")
        } else {
            e.to_string()
        };
        GatewayError::NoResponse { service, detail }
    }

    /// Build a [`GatewayError::Remote`] from a non-2xx status and raw body.
    ///
    /// The `error` field of a JSON body is used verbatim.  A JSON body
    /// without it yields the service's generic message; a non-JSON body also
    /// reports the status code.
    pub fn from_error_body(service: Service, status: u16, body: &str) -> Self {
        let message = match serde_json::from_str::<serde_json::Value>(body) {
            Ok(json) => match serde_json::from_value::<ErrorBody>(json) {
                Ok(ErrorBody { error }) if !error.is_empty() => error,
                _ => service.fallback_message().to_string(),
            },
            Err(_) => format!("{} (HTTP {status})", service.fallback_message()),
        };
        GatewayError::Remote {
            service,
            status,
            message,
        }
    }
}
