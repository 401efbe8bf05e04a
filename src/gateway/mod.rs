//! Remote service boundaries of the pipeline.
//!
//! This module provides:
//! * [`TranscriptionGateway`]: async trait, audio payload in, transcript out.
//! * [`CodeSynthesisGateway`]: async trait, description in, UI source out.
//! * [`HttpTranscriptionGateway`] / [`HttpSynthesisGateway`]: `reqwest`
//!   clients for the gateway server's `/transcribe` and `/generate-code`.
//! * [`GatewayError`]: no response, remote error, or malformed success body.
//! * [`wire`]: JSON bodies shared with [`crate::server`].
//!
//! # Quick start
//!
//! ```rust,no_run
//! use voice_to_ui::config::AppConfig;
//! use voice_to_ui::gateway::{CodeSynthesisGateway, HttpSynthesisGateway};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let synth = HttpSynthesisGateway::from_config(&config.gateway);
//!
//!     match synth.synthesize("a red button").await {
//!         Ok(code) => println!("{code}"),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! ```

pub mod error;
pub mod http;
pub mod wire;

use async_trait::async_trait;

use crate::audio::AudioPayload;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use error::{GatewayError, Service};
pub use http::{HttpSynthesisGateway, HttpTranscriptionGateway};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Turns one recorded utterance into text.
///
/// Implementors must be `Send + Sync` so the orchestrator can hold them as
/// `Arc<dyn TranscriptionGateway>` and call them from spawned tasks.
#[async_trait]
pub trait TranscriptionGateway: Send + Sync {
    async fn transcribe(&self, audio: &AudioPayload) -> Result<String, GatewayError>;
}

/// Turns a free-text description into UI source text.
///
/// The returned text is raw service output; callers normalize it with
/// [`crate::artifact::normalize`] before use.
#[async_trait]
pub trait CodeSynthesisGateway: Send + Sync {
    async fn synthesize(&self, prompt: &str) -> Result<String, GatewayError>;
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// Replies with a fixed result and counts calls.
    #[derive(Clone)]
    pub struct ScriptedTranscription {
        reply: Result<String, GatewayError>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedTranscription {
        pub fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn failing(err: GatewayError) -> Self {
            Self {
                reply: Err(err),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TranscriptionGateway for ScriptedTranscription {
        async fn transcribe(&self, audio: &AudioPayload) -> Result<String, GatewayError> {
            assert!(!audio.bytes.is_empty(), "transcription called with no audio");
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    /// Replies from a script and records every prompt it was given.  The
    /// last scripted reply repeats once the others are used up.
    #[derive(Clone)]
    pub struct ScriptedSynthesis {
        replies: Arc<Mutex<Vec<Result<String, GatewayError>>>>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedSynthesis {
        pub fn ok(code: &str) -> Self {
            Self::script(vec![Ok(code.to_string())])
        }

        pub fn ok_sequence(codes: &[&str]) -> Self {
            Self::script(codes.iter().map(|c| Ok(c.to_string())).collect())
        }

        pub fn failing(err: GatewayError) -> Self {
            Self::script(vec![Err(err)])
        }

        fn script(replies: Vec<Result<String, GatewayError>>) -> Self {
            assert!(!replies.is_empty());
            Self {
                replies: Arc::new(Mutex::new(replies)),
                prompts: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CodeSynthesisGateway for ScriptedSynthesis {
        async fn synthesize(&self, prompt: &str) -> Result<String, GatewayError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.remove(0)
            } else {
                replies[0].clone()
            }
        }
    }
}
