//! Microphone capture → finalized upload payload.
//!
//! # Pipeline
//!
//! ```text
//! AudioInput::open ─▶ CaptureStream (cpal callback → AudioChunk mpsc)
//!        │
//!        ▼
//! MediaCapture::poll  ─▶ RecordingSession.chunks (append-only)
//! MediaCapture::end   ─▶ downmix → resample → encode_wav ─▶ AudioPayload
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use voice_to_ui::audio::{CpalInput, MediaCapture};
//!
//! let mut capture = MediaCapture::new(Arc::new(CpalInput::new()), 16_000);
//! capture.begin().unwrap();
//! std::thread::sleep(std::time::Duration::from_secs(2));
//! capture.poll();
//! let payload = capture.end().unwrap().unwrap(); // device released here
//! println!("{} bytes of WAV", payload.bytes.len());
//! ```

pub mod capture;
pub mod encode;
pub mod resample;
pub mod session;
pub mod waveform;

pub use capture::{AudioChunk, AudioInput, CaptureError, CaptureStream, CpalInput, CpalStream};
pub use encode::{encode_wav, WAV_MIME};
pub use resample::{downmix, resample};
pub use session::{AudioPayload, MediaCapture, RecordingSession, RecordingStatus};
pub use waveform::level_bars;
