//! Voice-to-UI desktop window: egui/eframe application.
//!
//! # Architecture
//!
//! [`VoiceToUiApp`] is the top-level [`eframe::App`].  It never talks to the
//! network or the microphone itself:
//!
//! * `command_tx` sends [`PipelineCommand`]s to the orchestrator thread.
//! * `state` ([`SharedState`]) is read once per frame for the phase, the
//!   current artifact, history and the recording level.
//!
//! The preview is owned by the UI thread: a [`SandboxRenderer`] is rebuilt
//! whenever the orchestrator bumps `artifact_revision`, and re-parsed when
//! the user edits the source.
//!
//! # Layout
//!
//! | Region | Content |
//! |--------|---------|
//! | Top    | Title, record button, status / waveform, error banner |
//! | Right  | Component history, newest first |
//! | Centre | Transcript, live preview, editable source, copy button |

use std::time::{Duration, Instant};

use eframe::egui;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::history::EntryId;
use crate::pipeline::{lock_state, PipelineCommand, PipelineState, SharedState};
use crate::sandbox::SandboxRenderer;

const TOAST_DURATION: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Frame snapshot
// ---------------------------------------------------------------------------

/// What one frame needs from [`SharedState`], copied out under a short lock.
struct View {
    pipeline: PipelineState,
    error_message: Option<String>,
    waveform: Vec<f32>,
    recording_secs: f32,
    transcript: Option<String>,
    /// `(revision, text)` when the published artifact changed since the
    /// last frame.
    new_artifact: Option<(u64, String)>,
    selected_entry: Option<EntryId>,
    history: Vec<HistoryRow>,
}

struct HistoryRow {
    id: EntryId,
    timestamp: String,
    prompt: String,
}

/// Label, fill and command of the record button for `state`.
fn record_button(state: PipelineState) -> (&'static str, egui::Color32, Option<PipelineCommand>) {
    match state {
        PipelineState::Recording => (
            "Stop Recording",
            egui::Color32::from_rgb(239, 68, 68),
            Some(PipelineCommand::Stop),
        ),
        s if s.is_busy() => ("Generating Code...", egui::Color32::from_rgb(107, 114, 128), None),
        _ => (
            "Start Speaking",
            egui::Color32::from_rgb(59, 130, 246),
            Some(PipelineCommand::Start),
        ),
    }
}

// ---------------------------------------------------------------------------
// VoiceToUiApp
// ---------------------------------------------------------------------------

pub struct VoiceToUiApp {
    // ── Pipeline ─────────────────────────────────────────────────────────
    state: SharedState,
    command_tx: mpsc::Sender<PipelineCommand>,

    // ── Preview ──────────────────────────────────────────────────────────
    preview: Option<SandboxRenderer>,
    /// Revision of the artifact loaded into `preview`.
    preview_revision: u64,
    /// Source view contents; may differ from the published artifact.
    editor_text: String,
    show_editor: bool,

    // ── UI state ─────────────────────────────────────────────────────────
    spinner_phase: f32,
    toast: Option<(String, Instant)>,
    waveform_bars: usize,
}

impl VoiceToUiApp {
    pub fn new(
        state: SharedState,
        command_tx: mpsc::Sender<PipelineCommand>,
        config: &AppConfig,
    ) -> Self {
        Self {
            state,
            command_tx,
            preview: None,
            preview_revision: 0,
            editor_text: String::new(),
            show_editor: config.ui.show_editor,
            spinner_phase: 0.0,
            toast: None,
            waveform_bars: config.ui.waveform_bars,
        }
    }

    fn send(&self, cmd: PipelineCommand) {
        if let Err(e) = self.command_tx.try_send(cmd) {
            log::warn!("Failed to send {cmd:?} to the pipeline: {e}");
        }
    }

    // ── State polling ────────────────────────────────────────────────────

    fn snapshot(&self) -> View {
        let state = lock_state(&self.state);
        let new_artifact = match &state.current_artifact {
            Some(text) if state.artifact_revision != self.preview_revision => {
                Some((state.artifact_revision, text.clone()))
            }
            _ => None,
        };
        // Outside a live or failed run, the prompt shown belongs to the
        // artifact in the preview.
        let selected_prompt = match state.selected_entry {
            Some(id) if !state.pipeline.is_busy() && state.pipeline != PipelineState::Errored => {
                state
                    .history
                    .iter()
                    .find(|e| e.id == id)
                    .map(|e| e.prompt_text.clone())
            }
            _ => None,
        };
        View {
            pipeline: state.pipeline,
            error_message: state.error_message.clone(),
            waveform: state.waveform.clone(),
            recording_secs: state.recording_secs,
            transcript: selected_prompt
                .or_else(|| state.run.as_ref().and_then(|r| r.transcript.clone())),
            new_artifact,
            selected_entry: state.selected_entry,
            history: state
                .history
                .iter()
                .map(|e| HistoryRow {
                    id: e.id,
                    timestamp: e.timestamp_label(),
                    prompt: e.prompt_text.clone(),
                })
                .collect(),
        }
    }

    /// Load a newly published artifact into a fresh renderer.
    fn sync_preview(&mut self, view: &mut View) {
        let Some((revision, text)) = view.new_artifact.take() else {
            return;
        };
        log::debug!("Loading artifact revision {revision} into the preview");
        self.preview = Some(SandboxRenderer::new(&text));
        self.editor_text = text;
        self.preview_revision = revision;
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_controls(&mut self, ui: &mut egui::Ui, view: &View) {
        ui.add_space(8.0);
        ui.vertical_centered(|ui| {
            ui.label(
                egui::RichText::new("Speech-to-React Component")
                    .size(26.0)
                    .strong(),
            );
            ui.label(
                egui::RichText::new(
                    "Describe the component you want using your voice, for example \
                     \"a counter with increment and decrement buttons\".",
                )
                .color(egui::Color32::from_rgb(156, 163, 175))
                .size(12.0),
            );
            ui.add_space(6.0);

            if let Some(message) = view
                .error_message
                .as_deref()
                .filter(|_| view.pipeline == PipelineState::Errored)
            {
                egui::Frame::new()
                    .fill(egui::Color32::from_rgb(239, 68, 68))
                    .corner_radius(egui::CornerRadius::same(8))
                    .inner_margin(egui::Margin::same(10))
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new(message).color(egui::Color32::WHITE));
                    });
                ui.add_space(6.0);
            }

            let (label, fill, command) = record_button(view.pipeline);
            let button = egui::Button::new(
                egui::RichText::new(label)
                    .color(egui::Color32::WHITE)
                    .size(16.0)
                    .strong(),
            )
            .fill(fill)
            .min_size(egui::vec2(200.0, 40.0));
            if ui.add_enabled(command.is_some(), button).clicked() {
                if let Some(cmd) = command {
                    self.send(cmd);
                }
            }

            ui.add_space(4.0);
            match view.pipeline {
                PipelineState::Recording => {
                    ui.label(
                        egui::RichText::new(format!("Recording {:.1}s", view.recording_secs))
                            .color(egui::Color32::from_rgb(255, 80, 80))
                            .size(12.0),
                    );
                    self.draw_waveform(ui, &view.waveform);
                }
                PipelineState::AwaitingTranscription => {
                    self.draw_busy(ui, "Transcribing your speech...");
                }
                PipelineState::AwaitingSynthesis => {
                    self.draw_busy(ui, "AI is generating your component... one sec");
                }
                _ => {}
            }
        });
        ui.add_space(8.0);
    }

    fn draw_busy(&self, ui: &mut egui::Ui, text: &str) {
        ui.label(
            egui::RichText::new(format!("{} {text}", self.spinner_char()))
                .color(egui::Color32::from_rgb(250, 204, 21))
                .size(13.0),
        );
    }

    fn draw_history(&mut self, ui: &mut egui::Ui, view: &View) {
        ui.add_space(6.0);
        ui.label(egui::RichText::new("Component History").size(18.0).strong());
        ui.separator();

        if view.history.is_empty() {
            ui.add_space(12.0);
            ui.vertical_centered(|ui| {
                ui.label(
                    egui::RichText::new("No components generated yet")
                        .color(egui::Color32::from_rgb(107, 114, 128)),
                );
            });
            return;
        }

        let mut clicked = None;
        egui::ScrollArea::vertical().show(ui, |ui| {
            for row in &view.history {
                let selected = view.selected_entry == Some(row.id);
                let fill = if selected {
                    egui::Color32::from_rgb(75, 85, 99)
                } else {
                    egui::Color32::from_rgb(55, 65, 81)
                };
                let response = egui::Frame::new()
                    .fill(fill)
                    .corner_radius(egui::CornerRadius::same(8))
                    .inner_margin(egui::Margin::same(10))
                    .show(ui, |ui| {
                        ui.set_min_width(ui.available_width());
                        ui.label(
                            egui::RichText::new(&row.timestamp)
                                .color(egui::Color32::from_rgb(156, 163, 175))
                                .size(11.0),
                        );
                        ui.label(egui::RichText::new(&row.prompt).strong());
                    })
                    .response
                    .interact(egui::Sense::click())
                    .on_hover_cursor(egui::CursorIcon::PointingHand);
                if response.clicked() {
                    clicked = Some(row.id);
                }
                ui.add_space(6.0);
            }
        });

        if let Some(id) = clicked {
            self.send(PipelineCommand::SelectHistory(id));
        }
    }

    fn draw_workspace(&mut self, ui: &mut egui::Ui, view: &View) {
        let Some(preview) = self.preview.as_mut() else {
            ui.centered_and_justified(|ui| {
                ui.label(
                    egui::RichText::new("Your component will appear here")
                        .color(egui::Color32::from_rgb(107, 114, 128)),
                );
            });
            return;
        };

        egui::ScrollArea::vertical().show(ui, |ui| {
            if let Some(transcript) = &view.transcript {
                ui.label(
                    egui::RichText::new(format!("\u{201c}{transcript}\u{201d}"))
                        .color(egui::Color32::from_rgb(156, 163, 175))
                        .italics(),
                );
                ui.add_space(4.0);
            }

            ui.label(egui::RichText::new("Preview").size(16.0).strong());
            preview.draw(ui);

            let logs = preview.logs();
            if !logs.is_empty() {
                egui::CollapsingHeader::new(format!("Console ({})", logs.len()))
                    .id_salt("console")
                    .show(ui, |ui| {
                        for line in logs {
                            ui.label(egui::RichText::new(line).monospace().size(11.0));
                        }
                    });
            }

            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.checkbox(&mut self.show_editor, "Show code");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let copy = egui::Button::new(
                        egui::RichText::new("Copy Code").color(egui::Color32::WHITE),
                    )
                    .fill(egui::Color32::from_rgb(34, 197, 94));
                    if ui.add(copy).clicked() {
                        ui.ctx().copy_text(self.editor_text.clone());
                        self.toast = Some(("Code copied to clipboard".into(), Instant::now()));
                    }
                });
            });

            if self.show_editor {
                ui.add_space(4.0);
                let editor = egui::TextEdit::multiline(&mut self.editor_text)
                    .code_editor()
                    .desired_width(f32::INFINITY)
                    .desired_rows(16);
                if ui.add(editor).changed() {
                    preview.set_source(&self.editor_text);
                }
            }
        });
    }

    fn draw_toast(&mut self, ctx: &egui::Context) {
        let Some((message, shown_at)) = &self.toast else {
            return;
        };
        if shown_at.elapsed() >= TOAST_DURATION {
            self.toast = None;
            return;
        }
        egui::Area::new(egui::Id::new("toast"))
            .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-16.0, -16.0))
            .show(ctx, |ui| {
                egui::Frame::new()
                    .fill(egui::Color32::from_rgb(51, 65, 85))
                    .corner_radius(egui::CornerRadius::same(8))
                    .inner_margin(egui::Margin::symmetric(14, 8))
                    .show(ui, |ui| {
                        ui.label(egui::RichText::new(message).color(egui::Color32::WHITE));
                    });
            });
    }

    // ── Waveform helper ───────────────────────────────────────────────────

    /// Draw the amplitude bar chart used while recording.
    fn draw_waveform(&self, ui: &mut egui::Ui, bars: &[f32]) {
        let (rect, _) = ui.allocate_exact_size(
            egui::vec2(ui.available_width().min(360.0), 28.0),
            egui::Sense::hover(),
        );

        let painter = ui.painter();
        let num_bars = bars.len().max(self.waveform_bars).max(1);
        let bar_width = rect.width() / num_bars as f32;

        for (i, &amplitude) in bars.iter().enumerate() {
            let x = rect.left() + i as f32 * bar_width;
            let bar_height = (amplitude * rect.height()).max(2.0);

            painter.rect_filled(
                egui::Rect::from_center_size(
                    egui::pos2(x + bar_width / 2.0, rect.center().y),
                    egui::vec2((bar_width * 0.65).max(1.0), bar_height),
                ),
                1.0,
                egui::Color32::from_rgb(239, 68, 68),
            );
        }
    }

    /// A simple rotating ASCII spinner character driven by `spinner_phase`.
    fn spinner_char(&self) -> char {
        let chars = ['|', '/', '-', '\\'];
        let idx = (self.spinner_phase as usize) % chars.len();
        chars[idx]
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for VoiceToUiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let mut view = self.snapshot();
        self.sync_preview(&mut view);

        self.spinner_phase += 0.08;
        if self.spinner_phase >= 4.0 {
            self.spinner_phase = 0.0;
        }

        // The orchestrator writes state from its own thread; poll while it
        // has something in flight.
        match view.pipeline {
            PipelineState::Recording => ctx.request_repaint_after(Duration::from_millis(33)),
            s if s.is_busy() => ctx.request_repaint_after(Duration::from_millis(66)),
            _ if self.toast.is_some() => ctx.request_repaint_after(Duration::from_millis(200)),
            _ => {}
        }

        egui::TopBottomPanel::top("controls").show(ctx, |ui| self.draw_controls(ui, &view));
        egui::SidePanel::right("history")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.draw_history(ui, &view));
        egui::CentralPanel::default().show(ctx, |ui| self.draw_workspace(ui, &view));
        self.draw_toast(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        log::info!("Voice-to-UI window closing");
        self.send(PipelineCommand::Shutdown);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
