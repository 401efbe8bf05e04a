//! One microphone session from `begin()` to `end()`.
//!
//! [`MediaCapture`] is what the orchestrator talks to.  It owns at most one
//! [`RecordingSession`]; the session owns the open [`CaptureStream`] and the
//! append-only list of chunks received so far.  The device is held exactly
//! as long as the session exists:
//!
//! ```text
//! begin()  ── AudioInput::open ──▶ RecordingSession { Recording }
//! poll()   ── drain_chunks     ──▶ chunks.extend(..)
//! end()    ── Stopping → release device → downmix → resample → WAV
//! abort()  ── release device, discard chunks
//! drop     ── release device, discard chunks
//! ```

use std::sync::Arc;
use std::time::Instant;

use super::capture::{AudioChunk, AudioInput, CaptureError, CaptureStream};
use super::encode::{encode_wav, WAV_MIME};
use super::resample::{downmix, resample};
use super::waveform::level_bars;

/// File name attached to the multipart `audio` field.
pub const RECORDING_FILE_NAME: &str = "recording.wav";

// ---------------------------------------------------------------------------
// RecordingStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingStatus {
    /// No device held.
    #[default]
    Idle,
    /// Device open, chunks accumulating.
    Recording,
    /// `end()` in progress: no more chunks are accepted.
    Stopping,
}

// ---------------------------------------------------------------------------
// AudioPayload
// ---------------------------------------------------------------------------

/// The finalized utterance, ready for the transcription gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPayload {
    /// Complete WAV file.
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: &'static str,
    pub sample_rate: u32,
    pub duration_secs: f32,
}

// ---------------------------------------------------------------------------
// RecordingSession
// ---------------------------------------------------------------------------

/// An open device plus the chunks it has produced.
pub struct RecordingSession {
    status: RecordingStatus,
    stream: Box<dyn CaptureStream>,
    chunks: Vec<AudioChunk>,
    started: Instant,
}

impl RecordingSession {
    fn new(stream: Box<dyn CaptureStream>) -> Self {
        Self {
            status: RecordingStatus::Recording,
            stream,
            chunks: Vec::new(),
            started: Instant::now(),
        }
    }

    pub fn status(&self) -> RecordingStatus {
        self.status
    }

    /// Chunks received so far, in arrival order.
    pub fn chunks(&self) -> &[AudioChunk] {
        &self.chunks
    }

    /// Pull pending chunks from the device.  Returns how many were appended.
    fn collect(&mut self) -> usize {
        if self.status != RecordingStatus::Recording {
            return 0;
        }
        let fresh = self.stream.drain_chunks();
        let n = fresh.len();
        self.chunks.extend(fresh);
        n
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.stream.release();
    }
}

// ---------------------------------------------------------------------------
// MediaCapture
// ---------------------------------------------------------------------------

/// Scoped microphone access for the pipeline.
pub struct MediaCapture {
    input: Arc<dyn AudioInput>,
    target_rate: u32,
    session: Option<RecordingSession>,
}

impl MediaCapture {
    /// `target_rate` is the sample rate of the WAV produced by [`end`](Self::end).
    pub fn new(input: Arc<dyn AudioInput>, target_rate: u32) -> Self {
        Self {
            input,
            target_rate,
            session: None,
        }
    }

    /// Acquire the device and start a new session.
    ///
    /// # Errors
    ///
    /// [`CaptureError::AlreadyActive`] if a session is open; otherwise
    /// whatever the [`AudioInput`] reports (no device, permission denied, …).
    pub fn begin(&mut self) -> Result<(), CaptureError> {
        if self.session.is_some() {
            return Err(CaptureError::AlreadyActive);
        }
        let stream = self.input.open()?;
        self.session = Some(RecordingSession::new(stream));
        log::debug!("capture: session started");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn status(&self) -> RecordingStatus {
        self.session
            .as_ref()
            .map(RecordingSession::status)
            .unwrap_or_default()
    }

    /// Move any chunks the device has delivered into the session.
    pub fn poll(&mut self) -> usize {
        self.session.as_mut().map(RecordingSession::collect).unwrap_or(0)
    }

    /// Seconds since `begin()`, or `0.0` without a session.
    pub fn elapsed_secs(&self) -> f32 {
        self.session
            .as_ref()
            .map(|s| s.started.elapsed().as_secs_f32())
            .unwrap_or(0.0)
    }

    /// Level bars over roughly the last half second of audio.
    pub fn level(&self, num_bars: usize) -> Vec<f32> {
        let Some(session) = &self.session else {
            return vec![0.0; num_bars];
        };

        let want = (session.stream.sample_rate() / 2) as usize;
        let mut tail: Vec<f32> = Vec::with_capacity(want);
        for chunk in session.chunks.iter().rev() {
            let mut mono = downmix(&chunk.samples, chunk.channels);
            mono.extend_from_slice(&tail);
            tail = mono;
            if tail.len() >= want {
                break;
            }
        }
        let start = tail.len().saturating_sub(want);
        level_bars(&tail[start..], num_bars)
    }

    /// Finalize the session into a single WAV payload and release the device.
    ///
    /// Returns `Ok(None)` when no session is active.  The device is released
    /// before encoding, and the session's chunks are discarded whether or not
    /// encoding succeeds.
    pub fn end(&mut self) -> Result<Option<AudioPayload>, CaptureError> {
        let Some(mut session) = self.session.take() else {
            return Ok(None);
        };

        session.collect();
        session.status = RecordingStatus::Stopping;
        session.stream.release();

        let source_rate = session.stream.sample_rate();
        let mono: Vec<f32> = session
            .chunks
            .iter()
            .flat_map(|c| downmix(&c.samples, c.channels))
            .collect();
        drop(session);

        let samples = resample(&mono, source_rate, self.target_rate);
        let bytes = encode_wav(&samples, self.target_rate)?;
        let duration_secs = samples.len() as f32 / self.target_rate.max(1) as f32;

        log::debug!(
            "capture: finalized {:.2}s of audio ({} bytes)",
            duration_secs,
            bytes.len()
        );

        Ok(Some(AudioPayload {
            bytes,
            file_name: RECORDING_FILE_NAME.to_string(),
            mime: WAV_MIME,
            sample_rate: self.target_rate,
            duration_secs,
        }))
    }

    /// Release the device and throw the session away.  No-op when idle.
    pub fn abort(&mut self) {
        if self.session.take().is_some() {
            log::debug!("capture: session aborted");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::capture::testing::ScriptedInput;

    fn capture(input: &ScriptedInput) -> MediaCapture {
        MediaCapture::new(Arc::new(input.clone()), 16_000)
    }

    #[test]
    fn end_without_session_is_noop() {
        let input = ScriptedInput::tone();
        let mut mc = capture(&input);
        assert!(mc.end().unwrap().is_none());
        assert_eq!(input.opened(), 0);
    }

    #[test]
    fn begin_end_produces_mono_wav_and_releases() {
        let input = ScriptedInput::tone();
        let mut mc = capture(&input);

        mc.begin().unwrap();
        assert_eq!(mc.status(), RecordingStatus::Recording);
        assert_eq!(input.held(), 1);

        let payload = mc.end().unwrap().expect("payload");
        assert_eq!(input.held(), 0);
        assert_eq!(mc.status(), RecordingStatus::Idle);
        assert!(!mc.is_active());

        assert_eq!(payload.mime, "audio/wav");
        assert_eq!(payload.file_name, "recording.wav");
        // 10 chunks × 4800 frames @ 48 kHz = 1 s → 16 000 samples @ 16 kHz.
        assert!((payload.duration_secs - 1.0).abs() < 0.01);

        let reader = hound::WavReader::new(std::io::Cursor::new(payload.bytes)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 16_000);
    }

    #[test]
    fn begin_twice_is_rejected() {
        let input = ScriptedInput::tone();
        let mut mc = capture(&input);
        mc.begin().unwrap();
        assert!(matches!(mc.begin(), Err(CaptureError::AlreadyActive)));
        assert_eq!(input.opened(), 1);
    }

    #[test]
    fn refused_device_leaves_capture_idle() {
        let input = ScriptedInput::refusing("permission denied");
        let mut mc = capture(&input);
        assert!(mc.begin().is_err());
        assert!(!mc.is_active());
        assert!(mc.end().unwrap().is_none());
    }

    #[test]
    fn abort_releases_device() {
        let input = ScriptedInput::tone();
        let mut mc = capture(&input);
        mc.begin().unwrap();
        mc.abort();
        assert_eq!(input.held(), 0);
        assert!(mc.end().unwrap().is_none());
    }

    #[test]
    fn dropping_capture_releases_device() {
        let input = ScriptedInput::tone();
        {
            let mut mc = capture(&input);
            mc.begin().unwrap();
            mc.poll();
        }
        assert_eq!(input.held(), 0);
    }

    #[test]
    fn new_session_starts_empty() {
        let input = ScriptedInput::tone();
        let mut mc = capture(&input);
        mc.begin().unwrap();
        assert_eq!(mc.poll(), 10);
        assert_eq!(mc.poll(), 0);
        mc.end().unwrap();

        mc.begin().unwrap();
        assert_eq!(mc.poll(), 10);
        let payload = mc.end().unwrap().unwrap();
        assert!((payload.duration_secs - 1.0).abs() < 0.01);
    }

    #[test]
    fn level_reflects_recent_audio() {
        let input = ScriptedInput::tone();
        let mut mc = capture(&input);
        assert_eq!(mc.level(5), vec![0.0; 5]);

        mc.begin().unwrap();
        mc.poll();
        let bars = mc.level(5);
        assert_eq!(bars.len(), 5);
        assert!(bars.iter().any(|&b| b > 0.0));
    }
}
