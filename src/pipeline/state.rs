//! Pipeline state machine and shared application state.
//!
//! [`PipelineState`] drives the orchestrator's state machine.  The UI reads
//! it via [`SharedState`] to decide which controls are enabled.
//!
//! [`AppState`] is the snapshot the UI renders each frame: pipeline phase,
//! the current run, the artifact being previewed, history, recording level
//! and any error message.  Only the orchestrator writes it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::artifact::GeneratedArtifact;
use crate::history::{EntryId, HistoryEntry};

use super::runner::PipelineError;

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// States of the voice-to-UI pipeline.
///
/// ```text
/// Idle ──start──▶ Recording ──stop──▶ AwaitingTranscription
///                                      ──text──▶ AwaitingSynthesis
///                                                 ──code──▶ Ready
/// Recording / Awaiting* ──failure──▶ Errored
/// Idle / Errored / Ready ──start──▶ Recording   (or Errored if no device)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Nothing has run yet.
    #[default]
    Idle,

    /// Microphone is held; chunks are accumulating.
    Recording,

    /// Audio has been handed to the transcription service.
    AwaitingTranscription,

    /// Transcript has been handed to the code synthesis service.
    AwaitingSynthesis,

    /// The last run published an artifact.
    Ready,

    /// The last run failed.  A new run may be started.
    Errored,
}

impl PipelineState {
    /// `true` from `Recording` until the run reaches `Ready` or `Errored`.
    ///
    /// ```
    /// use voice_to_ui::pipeline::PipelineState;
    ///
    /// assert!(!PipelineState::Idle.is_busy());
    /// assert!(PipelineState::Recording.is_busy());
    /// assert!(PipelineState::AwaitingSynthesis.is_busy());
    /// assert!(!PipelineState::Errored.is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::Recording
                | PipelineState::AwaitingTranscription
                | PipelineState::AwaitingSynthesis
        )
    }

    /// Whether a `Start` command would be accepted.
    pub fn can_start(&self) -> bool {
        !self.is_busy()
    }

    /// A short human-readable label for the status bar.
    pub fn label(&self) -> &'static str {
        match self {
            PipelineState::Idle => "Idle",
            PipelineState::Recording => "Recording",
            PipelineState::AwaitingTranscription => "Transcribing",
            PipelineState::AwaitingSynthesis => "Generating code",
            PipelineState::Ready => "Ready",
            PipelineState::Errored => "Error",
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineRun
// ---------------------------------------------------------------------------

/// Phase of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Capturing,
    Transcribing,
    Synthesizing,
    Succeeded,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Failed)
    }
}

/// One end-to-end attempt, from `Start` to a published artifact or an error.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineRun {
    pub id: u64,
    pub phase: RunPhase,
    /// Set once transcription completes.
    pub transcript: Option<String>,
    /// Set once synthesis completes.
    pub artifact: Option<GeneratedArtifact>,
    pub error: Option<PipelineError>,
}

impl PipelineRun {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            phase: RunPhase::Capturing,
            transcript: None,
            artifact: None,
            error: None,
        }
    }

    /// `true` while the run is capturing or waiting on a gateway.
    pub fn is_live(&self) -> bool {
        !self.phase.is_terminal()
    }

    pub(crate) fn fail(&mut self, err: PipelineError) {
        self.phase = RunPhase::Failed;
        self.error = Some(err);
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// Shared application state, held behind [`SharedState`].
///
/// The orchestrator writes it; the egui update loop reads it each frame.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    /// Current phase of the pipeline.
    pub pipeline: PipelineState,

    /// The most recent run, live or finished.
    pub run: Option<PipelineRun>,

    /// Artifact text the preview should show.
    ///
    /// `None` until the first success.  Kept across later runs until another
    /// success or a history selection replaces it.
    pub current_artifact: Option<String>,

    /// Bumped every time `current_artifact` is (re)published, so the UI
    /// rebuilds its renderer even when the text is unchanged.
    pub artifact_revision: u64,

    /// History entry currently shown, if the preview came from history.
    pub selected_entry: Option<EntryId>,

    /// Successful generations, newest first.
    pub history: Vec<HistoryEntry>,

    /// Message to display when `pipeline == PipelineState::Errored`.
    pub error_message: Option<String>,

    /// Level bars for the live recording indicator.
    pub waveform: Vec<f32>,

    /// Length of the current recording in seconds.
    pub recording_secs: f32,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`AppState`].
///
/// Lock for a short critical section with [`lock_state`]; do **not** hold
/// the guard across `.await` points.
pub type SharedState = Arc<Mutex<AppState>>;

/// Construct a new [`SharedState`] wrapping a default [`AppState`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(AppState::new()))
}

/// Lock the shared state, recovering the data if a previous holder panicked.
pub fn lock_state(state: &SharedState) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- PipelineState ---

    #[test]
    fn busy_states() {
        assert!(PipelineState::Recording.is_busy());
        assert!(PipelineState::AwaitingTranscription.is_busy());
        assert!(PipelineState::AwaitingSynthesis.is_busy());
    }

    #[test]
    fn startable_states() {
        for s in [PipelineState::Idle, PipelineState::Ready, PipelineState::Errored] {
            assert!(s.can_start(), "{s:?} should accept start");
        }
    }

    #[test]
    fn labels() {
        assert_eq!(PipelineState::Idle.label(), "Idle");
        assert_eq!(PipelineState::AwaitingTranscription.label(), "Transcribing");
        assert_eq!(PipelineState::AwaitingSynthesis.label(), "Generating code");
        assert_eq!(PipelineState::Errored.label(), "Error");
    }

    #[test]
    fn default_pipeline_state_is_idle() {
        assert_eq!(PipelineState::default(), PipelineState::Idle);
    }

    // ---- PipelineRun ---

    #[test]
    fn new_run_is_live_until_terminal() {
        let mut run = PipelineRun::new(1);
        assert!(run.is_live());
        run.phase = RunPhase::Synthesizing;
        assert!(run.is_live());
        run.fail(PipelineError::Busy);
        assert!(!run.is_live());
        assert_eq!(run.error, Some(PipelineError::Busy));
    }

    // ---- AppState / SharedState ---

    #[test]
    fn app_state_default_is_empty() {
        let state = AppState::default();
        assert_eq!(state.pipeline, PipelineState::Idle);
        assert!(state.current_artifact.is_none());
        assert!(state.history.is_empty());
        assert!(state.error_message.is_none());
    }

    #[test]
    fn shared_state_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SharedState>();
    }

    #[test]
    fn lock_state_recovers_from_poison() {
        let state = new_shared_state();
        let poisoner = Arc::clone(&state);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison");
        })
        .join();

        assert!(state.is_poisoned());
        lock_state(&state).pipeline = PipelineState::Ready;
        assert_eq!(lock_state(&state).pipeline, PipelineState::Ready);
    }
}
