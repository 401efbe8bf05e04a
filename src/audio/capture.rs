//! Microphone access via `cpal`.
//!
//! [`AudioInput`] is the seam between the pipeline and the hardware: opening
//! it acquires the input device and returns a [`CaptureStream`] that yields
//! [`AudioChunk`]s until it is released.  [`CpalInput`] is the production
//! implementation.
//!
//! `cpal::Stream` is not `Send` on every platform, so [`CpalInput`] keeps the
//! stream on a dedicated `audio-capture` thread for its whole lifetime.  The
//! returned [`CpalStream`] only holds channel endpoints and the thread handle,
//! which lets the orchestrator keep it across `.await` points.  Releasing (or
//! dropping) the stream tells that thread to drop the `cpal::Stream` and
//! joins it, so the device is closed before `release` returns.

use std::sync::mpsc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the device callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while acquiring or finalizing a capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("failed to query default input config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported input sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio capture thread failed: {0}")]
    Thread(String),

    #[error("a capture session is already active")]
    AlreadyActive,

    #[error("failed to encode recording: {0}")]
    Encode(#[from] hound::Error),

    /// Generic "device refused" for inputs that are not backed by cpal.
    #[error("audio input unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A source of microphone sessions.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn AudioInput>` by the orchestrator.
pub trait AudioInput: Send + Sync {
    /// Acquire the input device and start delivering chunks.
    fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// An open device.  Chunks accumulate until [`release`](Self::release).
pub trait CaptureStream: Send {
    /// Native sample rate of the delivered chunks.
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels in each chunk.
    fn channels(&self) -> u16;

    /// Return every chunk delivered since the previous call, oldest first.
    /// Never blocks.
    fn drain_chunks(&mut self) -> Vec<AudioChunk>;

    /// Stop the stream and give the device back.  Idempotent.
    fn release(&mut self);
}

// ---------------------------------------------------------------------------
// CpalInput
// ---------------------------------------------------------------------------

/// Default-host, default-device microphone.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalInput;

impl CpalInput {
    pub fn new() -> Self {
        Self
    }
}

impl AudioInput for CpalInput {
    fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let (chunk_tx, chunk_rx) = mpsc::channel::<AudioChunk>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(u32, u16), CaptureError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || {
                let stream = match open_default_stream(chunk_tx) {
                    Ok((stream, sample_rate, channels)) => {
                        let _ = ready_tx.send(Ok((sample_rate, channels)));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                // Returns on an explicit stop or when the handle is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("audio-capture: input stream closed");
            })
            .map_err(|e| CaptureError::Thread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok((sample_rate, channels))) => {
                log::info!("Microphone opened ({sample_rate} Hz, {channels} ch)");
                Ok(Box::new(CpalStream {
                    chunk_rx,
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                    sample_rate,
                    channels,
                }))
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(CaptureError::Thread(
                    "capture thread exited before the device was opened".into(),
                ))
            }
        }
    }
}

/// Build and start an input stream on the default device, converting
/// whatever sample format the device prefers to `f32`.
fn open_default_stream(
    tx: mpsc::Sender<AudioChunk>,
) -> Result<(cpal::Stream, u32, u16), CaptureError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

    let supported = device.default_input_config()?;
    let format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    let stream = match format {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, tx)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, tx)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, tx)?,
        other => return Err(CaptureError::UnsupportedFormat(format!("{other:?}"))),
    };

    stream.play()?;
    Ok((stream, config.sample_rate.0, config.channels))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<AudioChunk>,
) -> Result<cpal::Stream, CaptureError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let chunk = AudioChunk {
                samples: to_f32(data),
                sample_rate,
                channels,
            };
            // Receiver gone means the session already ended.
            let _ = tx.send(chunk);
        },
        |err: cpal::StreamError| {
            log::error!("cpal stream error: {err}");
        },
        None,
    )?;

    Ok(stream)
}

/// Convert one callback buffer of device samples to `f32` in `[-1, 1]`.
fn to_f32<T>(data: &[T]) -> Vec<f32>
where
    T: Sample,
    f32: FromSample<T>,
{
    data.iter().map(|&s| s.to_sample::<f32>()).collect()
}

// ---------------------------------------------------------------------------
// CpalStream
// ---------------------------------------------------------------------------

/// Handle to an open cpal input stream living on the `audio-capture` thread.
pub struct CpalStream {
    chunk_rx: mpsc::Receiver<AudioChunk>,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
    channels: u16,
}

impl CaptureStream for CpalStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn drain_chunks(&mut self) -> Vec<AudioChunk> {
        self.chunk_rx.try_iter().collect()
    }

    fn release(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("audio-capture thread panicked while closing the device");
            }
            log::info!("Microphone released");
        }
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// In-memory [`AudioInput`] used by the pipeline tests.
#[cfg(test)]
pub mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Hands out streams that replay a fixed list of chunks, or refuses to
    /// open.  Counts opens and releases so tests can check the device was
    /// given back on every path.
    #[derive(Clone)]
    pub struct ScriptedInput {
        chunks: Vec<AudioChunk>,
        refuse: Option<String>,
        pub opened: Arc<AtomicUsize>,
        pub released: Arc<AtomicUsize>,
    }

    impl ScriptedInput {
        /// One second of a quiet 440 Hz-ish tone at 48 kHz stereo, in 10 chunks.
        pub fn tone() -> Self {
            let chunk = AudioChunk {
                samples: (0..9_600).map(|i| ((i / 2) as f32 * 0.057).sin() * 0.2).collect(),
                sample_rate: 48_000,
                channels: 2,
            };
            Self::with_chunks(vec![chunk; 10])
        }

        pub fn with_chunks(chunks: Vec<AudioChunk>) -> Self {
            Self {
                chunks,
                refuse: None,
                opened: Arc::new(AtomicUsize::new(0)),
                released: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn refusing(reason: &str) -> Self {
            Self {
                refuse: Some(reason.to_string()),
                ..Self::with_chunks(Vec::new())
            }
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn released(&self) -> usize {
            self.released.load(Ordering::SeqCst)
        }

        /// Opened streams that have not been released yet.
        pub fn held(&self) -> usize {
            self.opened() - self.released()
        }
    }

    impl AudioInput for ScriptedInput {
        fn open(&self) -> Result<Box<dyn CaptureStream>, CaptureError> {
            if let Some(reason) = &self.refuse {
                return Err(CaptureError::Unavailable(reason.clone()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            let (sample_rate, channels) = self
                .chunks
                .first()
                .map(|c| (c.sample_rate, c.channels))
                .unwrap_or((16_000, 1));
            Ok(Box::new(ScriptedStream {
                pending: self.chunks.clone(),
                sample_rate,
                channels,
                released: Some(Arc::clone(&self.released)),
            }))
        }
    }

    struct ScriptedStream {
        pending: Vec<AudioChunk>,
        sample_rate: u32,
        channels: u16,
        released: Option<Arc<AtomicUsize>>,
    }

    impl CaptureStream for ScriptedStream {
        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn channels(&self) -> u16 {
            self.channels
        }

        fn drain_chunks(&mut self) -> Vec<AudioChunk> {
            std::mem::take(&mut self.pending)
        }

        fn release(&mut self) {
            if let Some(counter) = self.released.take() {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    impl Drop for ScriptedStream {
        fn drop(&mut self) {
            self.release();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
