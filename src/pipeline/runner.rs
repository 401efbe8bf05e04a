//! Pipeline orchestrator: capture → transcription → synthesis → publish.
//!
//! [`PipelineOrchestrator`] is the single owner of the microphone session,
//! the current [`PipelineRun`] and the [`HistoryLedger`].  It consumes
//! [`PipelineCommand`]s from a `tokio::sync::mpsc` channel and publishes a
//! snapshot into [`SharedState`] after every transition.
//!
//! # Pipeline flow
//!
//! ```text
//! Start  ─▶ MediaCapture::begin                         [Recording]
//!   (tick) poll chunks, update level, auto-stop at max length
//! Stop   ─▶ MediaCapture::end → spawn(transcribe)       [AwaitingTranscription]
//!   Transcribed(Ok)  ─▶ spawn(synthesize)               [AwaitingSynthesis]
//!   Synthesized(Ok)  ─▶ normalize → ledger.record       [Ready]
//!   any Err          ─▶ release device, record error    [Errored]
//! ```
//!
//! Gateway calls run as tasks in a `JoinSet`, so commands keep being handled
//! while a call is outstanding and a `Start` in that window is rejected with
//! [`PipelineError::Busy`].  A task that panics fails its run like any other
//! gateway error.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;

use crate::artifact::GeneratedArtifact;
use crate::audio::{AudioInput, MediaCapture};
use crate::config::AudioConfig;
use crate::gateway::{CodeSynthesisGateway, GatewayError, Service, TranscriptionGateway};
use crate::history::{EntryId, HistoryLedger};

use super::state::{lock_state, PipelineRun, PipelineState, RunPhase, SharedState};

/// How often chunks are pulled from the device while recording.
const TICK_INTERVAL: Duration = Duration::from_millis(50);

const DEFAULT_WAVEFORM_BARS: usize = 30;

// ---------------------------------------------------------------------------
// PipelineError
// ---------------------------------------------------------------------------

/// Errors that can surface inside the pipeline.
///
/// `Display` is what the user sees.  Gateway failures show the gateway's
/// message unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The microphone could not be opened or the recording finalized.
    #[error("Microphone unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("{0}")]
    TranscriptionFailed(GatewayError),

    #[error("{0}")]
    SynthesisFailed(GatewayError),

    /// `Start` while a run is in flight.  Not terminal; nothing changes.
    #[error("a run is already in progress")]
    Busy,
}

// ---------------------------------------------------------------------------
// PipelineCommand
// ---------------------------------------------------------------------------

/// User intents sent from the UI thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    Start,
    Stop,
    /// Show a history entry in the preview.
    SelectHistory(EntryId),
    /// Release the device and stop the orchestrator.
    Shutdown,
}

/// Completion of a spawned gateway call.
#[derive(Debug)]
enum RunEvent {
    Transcribed {
        run_id: u64,
        result: Result<String, GatewayError>,
    },
    Synthesized {
        run_id: u64,
        result: Result<String, GatewayError>,
    },
}

impl RunEvent {
    fn run_id(&self) -> u64 {
        match self {
            RunEvent::Transcribed { run_id, .. } | RunEvent::Synthesized { run_id, .. } => *run_id,
        }
    }
}

enum Step {
    Command(Option<PipelineCommand>),
    Joined(Result<RunEvent, JoinError>),
    Tick,
}

// ---------------------------------------------------------------------------
// PipelineOrchestrator
// ---------------------------------------------------------------------------

/// Drives the voice-to-UI pipeline.
///
/// Create with [`PipelineOrchestrator::new`], then call [`run`](Self::run)
/// inside a tokio runtime.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use voice_to_ui::audio::CpalInput;
/// use voice_to_ui::config::AppConfig;
/// use voice_to_ui::gateway::{HttpSynthesisGateway, HttpTranscriptionGateway};
/// use voice_to_ui::pipeline::{new_shared_state, PipelineCommand, PipelineOrchestrator};
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let state = new_shared_state();
/// let (tx, rx) = tokio::sync::mpsc::channel(16);
///
/// let orchestrator = PipelineOrchestrator::new(
///     state.clone(),
///     Arc::new(CpalInput::new()),
///     Arc::new(HttpTranscriptionGateway::from_config(&config.gateway)),
///     Arc::new(HttpSynthesisGateway::from_config(&config.gateway)),
///     &config.audio,
/// );
/// tx.send(PipelineCommand::Start).await.unwrap();
/// orchestrator.run(rx).await;
/// # }
/// ```
pub struct PipelineOrchestrator {
    state: SharedState,
    capture: MediaCapture,
    transcriber: Arc<dyn TranscriptionGateway>,
    synthesizer: Arc<dyn CodeSynthesisGateway>,
    ledger: HistoryLedger,
    max_recording_secs: f32,
    waveform_bars: usize,

    phase: PipelineState,
    run: Option<PipelineRun>,
    next_run_id: u64,
    error_message: Option<String>,
    current_artifact: Option<String>,
    artifact_revision: u64,
    selected_entry: Option<EntryId>,

    calls: JoinSet<RunEvent>,
}

impl PipelineOrchestrator {
    /// Create a new orchestrator.
    ///
    /// # Arguments
    ///
    /// * `state`       : shared application state (also read by the UI).
    /// * `input`       : microphone source (e.g. `CpalInput`).
    /// * `transcriber` : speech-to-text gateway.
    /// * `synthesizer` : code generation gateway.
    /// * `audio`       : payload sample rate and maximum recording length.
    pub fn new(
        state: SharedState,
        input: Arc<dyn AudioInput>,
        transcriber: Arc<dyn TranscriptionGateway>,
        synthesizer: Arc<dyn CodeSynthesisGateway>,
        audio: &AudioConfig,
    ) -> Self {
        Self {
            state,
            capture: MediaCapture::new(input, audio.sample_rate),
            transcriber,
            synthesizer,
            ledger: HistoryLedger::new(),
            max_recording_secs: audio.max_recording_secs,
            waveform_bars: DEFAULT_WAVEFORM_BARS,
            phase: PipelineState::Idle,
            run: None,
            next_run_id: 0,
            error_message: None,
            current_artifact: None,
            artifact_revision: 0,
            selected_entry: None,
            calls: JoinSet::new(),
        }
    }

    /// Number of level bars published while recording.
    pub fn with_waveform_bars(mut self, bars: usize) -> Self {
        self.waveform_bars = bars;
        self
    }

    pub fn phase(&self) -> PipelineState {
        self.phase
    }

    pub fn ledger(&self) -> &HistoryLedger {
        &self.ledger
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until [`PipelineCommand::Shutdown`] arrives, or until `commands`
    /// is closed and any outstanding gateway call has completed.
    pub async fn run(mut self, mut commands: mpsc::Receiver<PipelineCommand>) {
        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;

        loop {
            let in_flight = !self.calls.is_empty();
            if !commands_open && !in_flight {
                break;
            }
            let recording = self.phase == PipelineState::Recording;

            let step = tokio::select! {
                cmd = commands.recv(), if commands_open => Step::Command(cmd),
                Some(joined) = self.calls.join_next(), if in_flight => Step::Joined(joined),
                _ = ticker.tick(), if recording => Step::Tick,
                else => break,
            };

            match step {
                Step::Command(Some(PipelineCommand::Shutdown)) => {
                    self.shutdown();
                    break;
                }
                Step::Command(Some(cmd)) => {
                    if let Err(e) = self.handle(cmd) {
                        log::warn!("pipeline: {cmd:?} rejected: {e}");
                    }
                }
                Step::Command(None) => {
                    log::info!("pipeline: command channel closed");
                    commands_open = false;
                    if self.capture.is_active() {
                        self.shutdown();
                    }
                }
                Step::Joined(joined) => self.joined(joined),
                Step::Tick => self.tick(),
            }
        }

        log::info!("pipeline: orchestrator stopped");
    }

    // -----------------------------------------------------------------------
    // Command handlers
    // -----------------------------------------------------------------------

    /// Apply one command.
    ///
    /// Only rejections are returned as errors.  Failures of an accepted
    /// command (no microphone, gateway errors) end the run in `Errored` and
    /// are reported through [`SharedState`].
    pub fn handle(&mut self, cmd: PipelineCommand) -> Result<(), PipelineError> {
        match cmd {
            PipelineCommand::Start => self.start(),
            PipelineCommand::Stop => {
                self.stop();
                Ok(())
            }
            PipelineCommand::SelectHistory(id) => {
                self.select_history(id);
                Ok(())
            }
            PipelineCommand::Shutdown => {
                self.shutdown();
                Ok(())
            }
        }
    }

    fn start(&mut self) -> Result<(), PipelineError> {
        if self.phase.is_busy() {
            return Err(PipelineError::Busy);
        }

        self.next_run_id += 1;
        let mut run = PipelineRun::new(self.next_run_id);
        self.error_message = None;

        match self.capture.begin() {
            Ok(()) => {
                log::debug!("pipeline: run {} → Recording", run.id);
                self.run = Some(run);
                self.phase = PipelineState::Recording;
                let bars = self.waveform_bars;
                self.publish_with(|st| {
                    st.recording_secs = 0.0;
                    st.waveform = vec![0.0; bars];
                });
            }
            Err(e) => {
                let err = PipelineError::DeviceUnavailable(e.to_string());
                run.fail(err.clone());
                self.run = Some(run);
                self.enter_errored(err);
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        if self.phase != PipelineState::Recording {
            log::debug!("pipeline: stop ignored in {:?}", self.phase);
            return;
        }

        let payload = match self.capture.end() {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.fail(PipelineError::DeviceUnavailable(
                    "the recording session was lost".into(),
                ));
                return;
            }
            Err(e) => {
                self.fail(PipelineError::DeviceUnavailable(format!(
                    "could not finalize the recording: {e}"
                )));
                return;
            }
        };

        let Some(run) = self.run.as_mut() else {
            return;
        };
        run.phase = RunPhase::Transcribing;
        let run_id = run.id;
        self.phase = PipelineState::AwaitingTranscription;
        log::debug!(
            "pipeline: run {run_id} → AwaitingTranscription ({:.1}s of audio)",
            payload.duration_secs
        );
        self.publish();

        let gateway = Arc::clone(&self.transcriber);
        self.calls.spawn(async move {
            let result = gateway.transcribe(&payload).await;
            RunEvent::Transcribed { run_id, result }
        });
    }

    fn select_history(&mut self, id: EntryId) {
        let Some(text) = self.ledger.select_for_display(id) else {
            log::warn!("pipeline: no history entry with id {id}");
            return;
        };
        self.current_artifact = Some(text.to_string());
        self.artifact_revision += 1;
        self.selected_entry = Some(id);
        self.publish();
    }

    fn shutdown(&mut self) {
        if self.capture.is_active() {
            self.capture.abort();
            self.run = None;
            self.phase = PipelineState::Idle;
            self.publish();
        }
        log::info!("pipeline: shutdown, device released");
    }

    // -----------------------------------------------------------------------
    // Run events
    // -----------------------------------------------------------------------

    /// Wait for the outstanding gateway call and apply its result.
    /// Returns `false` when nothing was outstanding.
    #[cfg(test)]
    async fn settle(&mut self) -> bool {
        match self.calls.join_next().await {
            Some(joined) => {
                self.joined(joined);
                true
            }
            None => false,
        }
    }

    fn joined(&mut self, joined: Result<RunEvent, JoinError>) {
        match joined {
            Ok(event) => self.apply(event),
            Err(e) => {
                log::error!("pipeline: gateway task failed: {e}");
                if let Some(event) = self.abandoned(&e) {
                    self.apply(event);
                }
            }
        }
    }

    /// The result a run receives when its gateway task died before reporting.
    fn abandoned(&self, err: &JoinError) -> Option<RunEvent> {
        let run = self.run.as_ref()?;
        let detail = if err.is_panic() {
            "the request task panicked".to_string()
        } else {
            "the request task was cancelled".to_string()
        };
        match run.phase {
            RunPhase::Transcribing => Some(RunEvent::Transcribed {
                run_id: run.id,
                result: Err(GatewayError::NoResponse {
                    service: Service::Transcription,
                    detail,
                }),
            }),
            RunPhase::Synthesizing => Some(RunEvent::Synthesized {
                run_id: run.id,
                result: Err(GatewayError::NoResponse {
                    service: Service::Synthesis,
                    detail,
                }),
            }),
            _ => None,
        }
    }

    fn apply(&mut self, event: RunEvent) {
        if self.run.as_ref().map(|r| r.id) != Some(event.run_id()) {
            log::warn!("pipeline: dropping result for stale run {}", event.run_id());
            return;
        }

        match event {
            RunEvent::Transcribed { result: Ok(text), run_id } => {
                log::debug!("pipeline: run {run_id} transcript = {text:?}");
                if let Some(run) = self.run.as_mut() {
                    run.transcript = Some(text.clone());
                    run.phase = RunPhase::Synthesizing;
                }
                self.phase = PipelineState::AwaitingSynthesis;
                self.publish();

                let gateway = Arc::clone(&self.synthesizer);
                self.calls.spawn(async move {
                    let result = gateway.synthesize(&text).await;
                    RunEvent::Synthesized { run_id, result }
                });
            }
            RunEvent::Transcribed { result: Err(e), .. } => {
                self.fail(PipelineError::TranscriptionFailed(e));
            }
            RunEvent::Synthesized { result: Ok(raw), run_id } => {
                let artifact = GeneratedArtifact::from_raw(&raw);
                let prompt = self
                    .run
                    .as_ref()
                    .and_then(|r| r.transcript.clone())
                    .unwrap_or_default();
                let entry = self.ledger.record(&prompt, &artifact);

                self.current_artifact = Some(artifact.as_str().to_string());
                self.artifact_revision += 1;
                self.selected_entry = Some(entry.id);
                if let Some(run) = self.run.as_mut() {
                    run.artifact = Some(artifact);
                    run.phase = RunPhase::Succeeded;
                }
                self.phase = PipelineState::Ready;
                log::info!("pipeline: run {run_id} → Ready (history entry {})", entry.id);
                self.publish();
            }
            RunEvent::Synthesized { result: Err(e), .. } => {
                self.fail(PipelineError::SynthesisFailed(e));
            }
        }
    }

    /// Pull pending chunks, refresh the level meter and enforce the maximum
    /// recording length.
    fn tick(&mut self) {
        if self.phase != PipelineState::Recording {
            return;
        }
        self.capture.poll();
        let secs = self.capture.elapsed_secs();
        let bars = self.capture.level(self.waveform_bars);
        self.publish_with(|st| {
            st.recording_secs = secs;
            st.waveform = bars;
        });

        if secs >= self.max_recording_secs {
            log::info!("pipeline: maximum recording length reached, stopping");
            self.stop();
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn fail(&mut self, err: PipelineError) {
        if let Some(run) = self.run.as_mut() {
            run.fail(err.clone());
        }
        self.enter_errored(err);
    }

    fn enter_errored(&mut self, err: PipelineError) {
        self.capture.abort();
        log::error!("pipeline error: {err}");
        self.error_message = Some(err.to_string());
        self.phase = PipelineState::Errored;
        self.publish();
    }

    fn publish(&self) {
        self.publish_with(|_| {});
    }

    /// Copy the orchestrator's view into [`SharedState`] in one critical
    /// section, then let `extra` adjust recording-only fields.
    fn publish_with(&self, extra: impl FnOnce(&mut super::state::AppState)) {
        let mut st = lock_state(&self.state);
        st.pipeline = self.phase;
        st.run = self.run.clone();
        st.error_message = self.error_message.clone();
        st.current_artifact = self.current_artifact.clone();
        st.artifact_revision = self.artifact_revision;
        st.selected_entry = self.selected_entry;
        // The ledger only grows, so a length change means new entries.
        if st.history.len() != self.ledger.len() {
            st.history = self.ledger.newest_first().cloned().collect();
        }
        if self.phase != PipelineState::Recording {
            st.waveform.clear();
        }
        extra(&mut st);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::FACTORY_SIGNATURE;
    use crate::audio::capture::testing::ScriptedInput;
    use crate::gateway::testing::{ScriptedSynthesis, ScriptedTranscription};
    use crate::gateway::Service;
    use crate::pipeline::state::new_shared_state;
    use crate::sandbox::SandboxRenderer;

    const COUNTER: &str = "function render() {\n  function MyComponent() {\n    const [count, setCount] = React.useState(0);\n    return <div><p>Count: {count}</p><button onClick={() => setCount(count + 1)}>Increment</button></div>;\n  }\n  return <MyComponent />;\n}";

    struct Harness {
        orc: PipelineOrchestrator,
        state: SharedState,
        input: ScriptedInput,
        stt: ScriptedTranscription,
        synth: ScriptedSynthesis,
    }

    fn harness(
        input: ScriptedInput,
        stt: ScriptedTranscription,
        synth: ScriptedSynthesis,
    ) -> Harness {
        let state = new_shared_state();
        let orc = PipelineOrchestrator::new(
            Arc::clone(&state),
            Arc::new(input.clone()),
            Arc::new(stt.clone()),
            Arc::new(synth.clone()),
            &AudioConfig::default(),
        )
        .with_waveform_bars(8);
        Harness {
            orc,
            state,
            input,
            stt,
            synth,
        }
    }

    fn default_harness() -> Harness {
        harness(
            ScriptedInput::tone(),
            ScriptedTranscription::ok("a counter with increment button"),
            ScriptedSynthesis::ok(COUNTER),
        )
    }

    fn no_audio_error() -> GatewayError {
        GatewayError::Remote {
            service: Service::Transcription,
            status: 400,
            message: "No audio file provided".into(),
        }
    }

    /// Start, stop, and let both gateway calls finish.
    async fn complete_run(h: &mut Harness) {
        h.orc.handle(PipelineCommand::Start).unwrap();
        h.orc.handle(PipelineCommand::Stop).unwrap();
        while h.orc.settle().await {}
    }

    // ---- Start / Stop ---

    #[tokio::test]
    async fn start_enters_recording_and_holds_device() {
        let mut h = default_harness();
        h.orc.handle(PipelineCommand::Start).unwrap();

        assert_eq!(h.orc.phase(), PipelineState::Recording);
        assert_eq!(h.input.held(), 1);
        let st = lock_state(&h.state);
        assert_eq!(st.pipeline, PipelineState::Recording);
        assert_eq!(st.run.as_ref().map(|r| r.phase), Some(RunPhase::Capturing));
    }

    #[tokio::test]
    async fn stop_while_idle_is_noop() {
        let mut h = default_harness();
        h.orc.handle(PipelineCommand::Stop).unwrap();

        assert_eq!(h.orc.phase(), PipelineState::Idle);
        assert_eq!(h.stt.calls(), 0);
        assert!(!h.orc.settle().await);
    }

    #[tokio::test]
    async fn start_is_rejected_while_busy() {
        let mut h = default_harness();

        h.orc.handle(PipelineCommand::Start).unwrap();
        assert_eq!(h.orc.handle(PipelineCommand::Start), Err(PipelineError::Busy));
        assert_eq!(h.input.opened(), 1);

        h.orc.handle(PipelineCommand::Stop).unwrap();
        assert_eq!(h.orc.phase(), PipelineState::AwaitingTranscription);
        assert_eq!(h.orc.handle(PipelineCommand::Start), Err(PipelineError::Busy));

        assert!(h.orc.settle().await);
        assert_eq!(h.orc.phase(), PipelineState::AwaitingSynthesis);
        assert_eq!(h.orc.handle(PipelineCommand::Start), Err(PipelineError::Busy));

        assert!(h.orc.settle().await);
        assert_eq!(h.orc.phase(), PipelineState::Ready);
        assert_eq!(h.input.opened(), 1);
        assert!(h.orc.handle(PipelineCommand::Start).is_ok());
        assert_eq!(h.orc.phase(), PipelineState::Recording);
    }

    #[tokio::test]
    async fn stop_is_ignored_after_it_was_accepted() {
        let mut h = default_harness();
        h.orc.handle(PipelineCommand::Start).unwrap();
        h.orc.handle(PipelineCommand::Stop).unwrap();
        h.orc.handle(PipelineCommand::Stop).unwrap();
        while h.orc.settle().await {}

        assert_eq!(h.stt.calls(), 1);
        assert_eq!(h.orc.ledger().len(), 1);
    }

    /// Every interleaving of start/stop/settle of length 5: a start is only
    /// ever accepted when the previous run is terminal.
    #[tokio::test]
    async fn at_most_one_live_run() {
        #[derive(Clone, Copy)]
        enum Op {
            Start,
            Stop,
            Settle,
        }
        const OPS: [Op; 3] = [Op::Start, Op::Stop, Op::Settle];

        for mut code in 0..3usize.pow(5) {
            let mut h = default_harness();
            for _ in 0..5 {
                let op = OPS[code % 3];
                code /= 3;
                match op {
                    Op::Start => {
                        let before = h.orc.run.clone();
                        let accepted = h.orc.handle(PipelineCommand::Start).is_ok();
                        if let Some(prev) = before {
                            assert_eq!(accepted, !prev.is_live());
                        }
                    }
                    Op::Stop => h.orc.handle(PipelineCommand::Stop).unwrap(),
                    Op::Settle => {
                        h.orc.settle().await;
                    }
                }
                assert!(h.input.held() <= 1);
            }
        }
    }

    // ---- End-to-end ---

    #[tokio::test]
    async fn successful_run_reaches_ready_with_one_history_entry() {
        let mut h = default_harness();
        complete_run(&mut h).await;

        assert_eq!(h.orc.phase(), PipelineState::Ready);
        assert_eq!(h.input.held(), 0);
        assert_eq!(h.synth.prompts(), vec!["a counter with increment button"]);

        let st = lock_state(&h.state);
        assert_eq!(st.pipeline, PipelineState::Ready);
        assert_eq!(st.history.len(), 1);
        assert_eq!(st.history[0].prompt_text, "a counter with increment button");
        assert!(st.error_message.is_none());

        let artifact = st.current_artifact.clone().unwrap();
        assert_eq!(artifact, COUNTER);
        let renderer = SandboxRenderer::new(&artifact);
        assert!(renderer.error().is_none(), "{:?}", renderer.error());
    }

    #[tokio::test]
    async fn transcription_error_is_surfaced_verbatim() {
        let mut h = harness(
            ScriptedInput::tone(),
            ScriptedTranscription::failing(no_audio_error()),
            ScriptedSynthesis::ok(COUNTER),
        );
        complete_run(&mut h).await;

        assert_eq!(h.orc.phase(), PipelineState::Errored);
        assert_eq!(h.input.held(), 0);
        assert!(h.synth.prompts().is_empty());
        assert!(h.orc.ledger().is_empty());

        let st = lock_state(&h.state);
        assert_eq!(st.error_message.as_deref(), Some("No audio file provided"));
        assert!(st.history.is_empty());
        let run = st.run.as_ref().unwrap();
        assert_eq!(run.phase, RunPhase::Failed);
        assert_eq!(
            run.error,
            Some(PipelineError::TranscriptionFailed(no_audio_error()))
        );
    }

    #[tokio::test]
    async fn synthesis_result_is_normalized() {
        let mut h = harness(
            ScriptedInput::tone(),
            ScriptedTranscription::ok("a red button"),
            ScriptedSynthesis::ok("```jsx\nfunction MyComponent() {\n  return <button className=\"bg-red-500\">Red</button>;\n}\n```"),
        );
        complete_run(&mut h).await;

        let st = lock_state(&h.state);
        let artifact = st.current_artifact.as_deref().unwrap();
        assert!(artifact.starts_with(FACTORY_SIGNATURE));
        assert!(!artifact.contains("```"));
        assert_eq!(st.history[0].artifact_text, artifact);
    }

    #[tokio::test]
    async fn synthesis_failure_keeps_transcript_and_history() {
        let mut h = harness(
            ScriptedInput::tone(),
            ScriptedTranscription::ok("a login form"),
            ScriptedSynthesis::failing(GatewayError::NoResponse {
                service: Service::Synthesis,
                detail: "request timed out".into(),
            }),
        );
        complete_run(&mut h).await;

        assert_eq!(h.orc.phase(), PipelineState::Errored);
        assert!(h.orc.ledger().is_empty());
        let st = lock_state(&h.state);
        let run = st.run.as_ref().unwrap();
        assert_eq!(run.transcript.as_deref(), Some("a login form"));
        assert!(matches!(run.error, Some(PipelineError::SynthesisFailed(_))));
        assert!(st.error_message.as_deref().unwrap().contains("request timed out"));
    }

    #[tokio::test]
    async fn failed_run_state_does_not_leak_into_next_run() {
        let mut h = harness(
            ScriptedInput::tone(),
            ScriptedTranscription::failing(no_audio_error()),
            ScriptedSynthesis::ok(COUNTER),
        );
        complete_run(&mut h).await;
        assert_eq!(h.orc.phase(), PipelineState::Errored);

        h.orc.handle(PipelineCommand::Start).unwrap();
        assert_eq!(h.orc.phase(), PipelineState::Recording);
        let st = lock_state(&h.state);
        assert!(st.error_message.is_none());
        let run = st.run.as_ref().unwrap();
        assert_eq!(run.id, 2);
        assert!(run.error.is_none() && run.transcript.is_none());
    }

    #[tokio::test]
    async fn missing_device_enters_errored() {
        let mut h = harness(
            ScriptedInput::refusing("permission denied"),
            ScriptedTranscription::ok("x"),
            ScriptedSynthesis::ok(COUNTER),
        );
        h.orc.handle(PipelineCommand::Start).unwrap();

        assert_eq!(h.orc.phase(), PipelineState::Errored);
        let st = lock_state(&h.state);
        assert!(matches!(
            st.run.as_ref().and_then(|r| r.error.clone()),
            Some(PipelineError::DeviceUnavailable(_))
        ));
        assert!(st.error_message.as_deref().unwrap().contains("permission denied"));
    }

    #[tokio::test]
    async fn previous_artifact_stays_visible_during_next_run() {
        let mut h = default_harness();
        complete_run(&mut h).await;
        h.orc.handle(PipelineCommand::Start).unwrap();

        let st = lock_state(&h.state);
        assert_eq!(st.pipeline, PipelineState::Recording);
        assert_eq!(st.current_artifact.as_deref(), Some(COUNTER));
    }

    // ---- History selection ---

    #[tokio::test]
    async fn selecting_history_republishes_exact_text() {
        let first = "function render() {\n  return <p>  first\tone </p>;\n}";
        let mut h = harness(
            ScriptedInput::tone(),
            ScriptedTranscription::ok("first"),
            ScriptedSynthesis::ok_sequence(&[first, "function render() { return <p>second</p>; }"]),
        );
        complete_run(&mut h).await;
        complete_run(&mut h).await;
        complete_run(&mut h).await;
        assert_eq!(h.orc.ledger().len(), 3);

        let first_id = lock_state(&h.state).history.last().unwrap().id;
        let revision = lock_state(&h.state).artifact_revision;
        h.orc.handle(PipelineCommand::SelectHistory(first_id)).unwrap();

        let st = lock_state(&h.state);
        assert_eq!(st.current_artifact.as_deref().unwrap().as_bytes(), first.as_bytes());
        assert_eq!(st.selected_entry, Some(first_id));
        assert_eq!(st.artifact_revision, revision + 1);
        assert_eq!(st.history.len(), 3);
        assert_eq!(st.pipeline, PipelineState::Ready);
    }

    #[tokio::test]
    async fn selecting_unknown_history_is_ignored() {
        let mut h = default_harness();
        h.orc.handle(PipelineCommand::SelectHistory(42)).unwrap();
        assert!(lock_state(&h.state).current_artifact.is_none());
    }

    // ---- Render failures stay in the sandbox ---

    #[tokio::test]
    async fn throwing_artifact_does_not_affect_pipeline() {
        let mut h = harness(
            ScriptedInput::tone(),
            ScriptedTranscription::ok("a broken widget"),
            ScriptedSynthesis::ok("function render() {\n  const x = null;\n  return <p>{x.missing.field}</p>;\n}"),
        );
        complete_run(&mut h).await;

        let artifact = lock_state(&h.state).current_artifact.clone().unwrap();
        let renderer = SandboxRenderer::new(&artifact);
        assert!(renderer.error().is_some());

        assert_eq!(h.orc.phase(), PipelineState::Ready);
        assert_eq!(h.orc.ledger().len(), 1);
        assert!(lock_state(&h.state).error_message.is_none());
    }

    // ---- Recording tick ---

    #[tokio::test]
    async fn tick_publishes_level_and_duration() {
        let mut h = default_harness();
        h.orc.handle(PipelineCommand::Start).unwrap();
        h.orc.tick();

        let st = lock_state(&h.state);
        assert_eq!(st.waveform.len(), 8);
        assert!(st.waveform.iter().any(|&b| b > 0.0));
    }

    #[tokio::test]
    async fn tick_stops_at_maximum_length() {
        let state = new_shared_state();
        let input = ScriptedInput::tone();
        let audio = AudioConfig {
            max_recording_secs: 0.0,
            ..AudioConfig::default()
        };
        let mut orc = PipelineOrchestrator::new(
            state,
            Arc::new(input.clone()),
            Arc::new(ScriptedTranscription::ok("x")),
            Arc::new(ScriptedSynthesis::ok(COUNTER)),
            &audio,
        );

        orc.handle(PipelineCommand::Start).unwrap();
        orc.tick();
        assert_eq!(orc.phase(), PipelineState::AwaitingTranscription);
        assert_eq!(input.held(), 0);
    }

    // ---- Shutdown / run loop ---

    #[tokio::test]
    async fn shutdown_releases_device() {
        let mut h = default_harness();
        h.orc.handle(PipelineCommand::Start).unwrap();
        h.orc.handle(PipelineCommand::Shutdown).unwrap();

        assert_eq!(h.input.held(), 0);
        assert_eq!(h.orc.phase(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn run_loop_completes_outstanding_work_after_channel_closes() {
        let h = default_harness();
        let (tx, rx) = mpsc::channel(4);

        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();
        drop(tx);

        h.orc.run(rx).await;

        let st = lock_state(&h.state);
        assert_eq!(st.pipeline, PipelineState::Ready);
        assert_eq!(st.history.len(), 1);
        assert_eq!(h.input.held(), 0);
    }

    #[tokio::test]
    async fn run_loop_releases_device_when_channel_closes_mid_recording() {
        let h = default_harness();
        let (tx, rx) = mpsc::channel(4);

        tx.send(PipelineCommand::Start).await.unwrap();
        drop(tx);

        h.orc.run(rx).await;

        assert_eq!(h.input.held(), 0);
        assert_eq!(lock_state(&h.state).pipeline, PipelineState::Idle);
    }

    #[tokio::test]
    async fn run_loop_exits_on_shutdown() {
        let h = default_harness();
        let (tx, rx) = mpsc::channel(4);

        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Shutdown).await.unwrap();

        // tx stays open: only Shutdown can end the loop.
        h.orc.run(rx).await;
        assert_eq!(h.input.held(), 0);
        drop(tx);
    }

    struct PanickingTranscription;

    #[async_trait::async_trait]
    impl TranscriptionGateway for PanickingTranscription {
        async fn transcribe(
            &self,
            _audio: &crate::audio::AudioPayload,
        ) -> Result<String, GatewayError> {
            panic!("transcription backend crashed");
        }
    }

    #[tokio::test]
    async fn panicking_gateway_task_fails_the_run() {
        let state = new_shared_state();
        let input = ScriptedInput::tone();
        let synth = ScriptedSynthesis::ok(COUNTER);
        let orc = PipelineOrchestrator::new(
            Arc::clone(&state),
            Arc::new(input.clone()),
            Arc::new(PanickingTranscription),
            Arc::new(synth.clone()),
            &AudioConfig::default(),
        );
        let (tx, rx) = mpsc::channel(4);

        tx.send(PipelineCommand::Start).await.unwrap();
        tx.send(PipelineCommand::Stop).await.unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(3), orc.run(rx))
            .await
            .expect("the run loop must finish once the task is gone");

        let st = lock_state(&state);
        assert_eq!(st.pipeline, PipelineState::Errored);
        let error = st.error_message.clone().unwrap_or_default();
        assert!(error.contains("panicked"), "{error}");
        assert!(st.history.is_empty());
        assert!(synth.prompts().is_empty());
        assert_eq!(input.held(), 0);
    }

    #[tokio::test]
    async fn next_run_starts_after_a_panicked_call() {
        let state = new_shared_state();
        let mut orc = PipelineOrchestrator::new(
            Arc::clone(&state),
            Arc::new(ScriptedInput::tone()),
            Arc::new(PanickingTranscription),
            Arc::new(ScriptedSynthesis::ok(COUNTER)),
            &AudioConfig::default(),
        );

        orc.handle(PipelineCommand::Start).unwrap();
        orc.handle(PipelineCommand::Stop).unwrap();
        assert!(orc.settle().await);
        assert_eq!(orc.phase(), PipelineState::Errored);

        assert_eq!(orc.handle(PipelineCommand::Start), Ok(()));
        assert_eq!(orc.phase(), PipelineState::Recording);
    }
}
