//! egui rendering of a [`UiNode`] tree.
//!
//! ```text
//!   UiNode tree ──► Painter ──► egui widgets
//!                     │
//!                     └─ (HandlerId, UiEvent) queue ──► dispatch_all ──► re-render
//! ```
//!
//! Painting never calls back into the interpreter.  Interactions are queued
//! while the frame is laid out and delivered once painting is done, so the
//! tree being drawn never changes underneath the painter.

use std::collections::HashMap;

use super::renderer::{RenderError, SandboxRenderer};
use super::style::{self, BoxStyle, Flow, TextStyle};
use super::tree::{HandlerId, UiElement, UiEvent, UiNode};
use super::value::number_to_string;

/// Tags whose content flows like a paragraph.
const INLINE_TAGS: &[&str] = &[
    "p", "span", "label", "a", "strong", "b", "em", "i", "u", "small", "code", "kbd", "pre",
    "h1", "h2", "h3", "h4", "h5", "h6", "td", "th", "dt", "dd", "figcaption", "blockquote",
];

/// Tags that have nothing meaningful to show without a browser.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "svg", "canvas", "video", "audio", "iframe", "object", "head", "meta",
];

const SURFACE: egui::Color32 = egui::Color32::WHITE;
const BUTTON_FILL: egui::Color32 = egui::Color32::from_rgb(229, 231, 235);
const ERROR_FILL: egui::Color32 = egui::Color32::from_rgb(254, 226, 226);
const ERROR_INK: egui::Color32 = egui::Color32::from_rgb(185, 28, 28);

impl SandboxRenderer {
    /// Paint the preview into `ui` and deliver any interactions.
    pub fn draw(&mut self, ui: &mut egui::Ui) {
        if let Some(error) = self.error() {
            draw_error(ui, error);
            return;
        }

        let mut painter = Painter {
            uncontrolled: &mut self.uncontrolled,
            events: Vec::new(),
            submit: None,
        };
        egui::Frame::default()
            .fill(SURFACE)
            .inner_margin(egui::Margin::same(12))
            .corner_radius(egui::CornerRadius::same(6))
            .show(ui, |ui| {
                ui.set_min_width(ui.available_width());
                for node in &self.tree {
                    painter.node(ui, node, TextStyle::default());
                }
            });

        let events = painter.events;
        if !events.is_empty() {
            log::debug!("Delivering {} preview event(s)", events.len());
            self.dispatch_all(&events);
            ui.ctx().request_repaint();
        }
    }
}

fn draw_error(ui: &mut egui::Ui, error: &RenderError) {
    egui::Frame::default()
        .fill(ERROR_FILL)
        .stroke(egui::Stroke::new(1.0, ERROR_INK))
        .inner_margin(egui::Margin::same(10))
        .corner_radius(egui::CornerRadius::same(6))
        .show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            ui.label(
                egui::RichText::new(error.to_string())
                    .color(ERROR_INK)
                    .monospace(),
            );
        });
}

// ---------------------------------------------------------------------------
// Painter
// ---------------------------------------------------------------------------

struct Painter<'a> {
    uncontrolled: &'a mut HashMap<String, String>,
    events: Vec<(HandlerId, UiEvent)>,
    /// `onSubmit` of the innermost enclosing form.
    submit: Option<HandlerId>,
}

impl Painter<'_> {
    fn emit(&mut self, handler: Option<HandlerId>, event: UiEvent) {
        if let Some(handler) = handler {
            self.events.push((handler, event));
        }
    }

    fn node(&mut self, ui: &mut egui::Ui, node: &UiNode, inherited: TextStyle) {
        match node {
            UiNode::Text(text) => {
                ui.label(inherited.rich(text.as_str()));
            }
            UiNode::Element(el) => self.element(ui, el, inherited),
        }
    }

    fn children(&mut self, ui: &mut egui::Ui, el: &UiElement, text: TextStyle) {
        for child in &el.children {
            self.node(ui, child, text);
        }
    }

    fn element(&mut self, ui: &mut egui::Ui, el: &UiElement, inherited: TextStyle) {
        let (text, boxed) = style::resolve(el, inherited);
        if boxed.hidden || SKIPPED_TAGS.contains(&el.tag.as_str()) {
            return;
        }

        let response = match el.tag.as_str() {
            "button" => {
                self.button(ui, el, text, boxed);
                return;
            }
            "input" => {
                ui.push_id(&el.path, |ui| self.input(ui, el, text));
                return;
            }
            "textarea" => {
                ui.push_id(&el.path, |ui| self.text_edit(ui, el, true));
                return;
            }
            "select" => {
                self.select(ui, el, text);
                return;
            }
            "br" => {
                ui.add_space(4.0);
                return;
            }
            "hr" => {
                ui.separator();
                return;
            }
            "img" => {
                let alt = el.text_prop("alt").unwrap_or_else(|| "image".into());
                ui.label(TextStyle { italic: true, ..text }.rich(format!("[{alt}]")))
            }
            "ul" | "ol" => self.list(ui, el, text, boxed),
            "table" => self.table(ui, el, text, boxed),
            "form" => {
                let saved = self.submit;
                if let Some(submit) = el.handler("onSubmit") {
                    self.submit = Some(submit);
                }
                let response = self.container(ui, el, text, boxed);
                self.submit = saved;
                response
            }
            tag if INLINE_TAGS.contains(&tag) => self.inline(ui, el, text, boxed),
            _ => self.container(ui, el, text, boxed),
        };

        if let Some(handler) = el.handler("onClick") {
            if response.interact(egui::Sense::click()).clicked() {
                self.emit(Some(handler), UiEvent::Click);
            }
        }
    }

    // ---- layout ---

    fn container(
        &mut self,
        ui: &mut egui::Ui,
        el: &UiElement,
        text: TextStyle,
        boxed: BoxStyle,
    ) -> egui::Response {
        let body = |painter: &mut Self, ui: &mut egui::Ui| {
            if let Some(gap) = boxed.gap {
                ui.spacing_mut().item_spacing = egui::vec2(gap, gap);
            }
            match (boxed.flow, boxed.centered) {
                (Flow::Row, _) => {
                    ui.horizontal(|ui| painter.children(ui, el, text));
                }
                (Flow::Wrap, _) => {
                    ui.horizontal_wrapped(|ui| painter.children(ui, el, text));
                }
                (Flow::Column, true) => {
                    ui.vertical_centered(|ui| painter.children(ui, el, text));
                }
                (Flow::Column, false) => {
                    ui.vertical(|ui| painter.children(ui, el, text));
                }
            }
        };
        if boxed.is_plain() {
            ui.scope(|ui| body(self, ui)).response
        } else {
            boxed.frame().show(ui, |ui| body(self, ui)).response
        }
    }

    fn inline(
        &mut self,
        ui: &mut egui::Ui,
        el: &UiElement,
        text: TextStyle,
        boxed: BoxStyle,
    ) -> egui::Response {
        let only_text = el.children.iter().all(|c| matches!(c, UiNode::Text(_)));
        let body = |painter: &mut Self, ui: &mut egui::Ui| {
            if only_text {
                let content = el.text_content();
                if content.is_empty() {
                    ui.label("")
                } else if boxed.centered {
                    ui.vertical_centered(|ui| ui.label(text.rich(content))).inner
                } else {
                    ui.label(text.rich(content))
                }
            } else {
                ui.horizontal_wrapped(|ui| painter.children(ui, el, text))
                    .response
            }
        };
        if boxed.is_plain() {
            body(self, ui)
        } else {
            boxed.frame().show(ui, |ui| body(self, ui)).response
        }
    }

    fn list(
        &mut self,
        ui: &mut egui::Ui,
        el: &UiElement,
        text: TextStyle,
        boxed: BoxStyle,
    ) -> egui::Response {
        let ordered = el.tag == "ol";
        let body = |painter: &mut Self, ui: &mut egui::Ui| {
            ui.vertical(|ui| {
                let mut n = 0;
                for child in &el.children {
                    match child {
                        UiNode::Element(li) if li.tag == "li" => {
                            n += 1;
                            let (li_text, li_box) = style::resolve(li, text);
                            if li_box.hidden {
                                continue;
                            }
                            let marker = if ordered {
                                format!("{n}.")
                            } else {
                                "•".to_string()
                            };
                            let row = ui.horizontal_wrapped(|ui| {
                                ui.label(li_text.rich(marker));
                                painter.children(ui, li, li_text);
                            });
                            if let Some(handler) = li.handler("onClick") {
                                if row.response.interact(egui::Sense::click()).clicked() {
                                    painter.emit(Some(handler), UiEvent::Click);
                                }
                            }
                        }
                        other => painter.node(ui, other, text),
                    }
                }
            })
            .response
        };
        if boxed.is_plain() {
            body(self, ui)
        } else {
            boxed.frame().show(ui, |ui| body(self, ui)).response
        }
    }

    fn table(
        &mut self,
        ui: &mut egui::Ui,
        el: &UiElement,
        text: TextStyle,
        boxed: BoxStyle,
    ) -> egui::Response {
        let mut rows = Vec::new();
        collect_rows(el, &mut rows);
        let body = |painter: &mut Self, ui: &mut egui::Ui| {
            egui::Grid::new(&el.path)
                .striped(true)
                .spacing(egui::vec2(12.0, 4.0))
                .show(ui, |ui| {
                    for row in &rows {
                        for cell in &row.children {
                            match cell {
                                UiNode::Element(cell) => {
                                    let (cell_text, cell_box) = style::resolve(cell, text);
                                    painter.inline(ui, cell, cell_text, cell_box);
                                }
                                UiNode::Text(t) if t.trim().is_empty() => {}
                                UiNode::Text(t) => {
                                    ui.label(text.rich(t.as_str()));
                                }
                            }
                        }
                        ui.end_row();
                    }
                })
                .response
        };
        if boxed.is_plain() {
            body(self, ui)
        } else {
            boxed.frame().show(ui, |ui| body(self, ui)).response
        }
    }

    // ---- controls ---

    fn button(&mut self, ui: &mut egui::Ui, el: &UiElement, text: TextStyle, boxed: BoxStyle) {
        let mut button = egui::Button::new(text.rich(el.text_content()))
            .fill(boxed.fill.unwrap_or(BUTTON_FILL));
        if let Some(border) = boxed.border {
            button = button.stroke(egui::Stroke::new(1.0, border));
        }
        let response = ui.add_enabled(!el.flag("disabled"), button);
        if response.clicked() {
            self.emit(el.handler("onClick"), UiEvent::Click);
            // A button inside a form submits it unless told otherwise.
            let kind = el.text_prop("type").unwrap_or_else(|| "submit".into());
            if kind == "submit" {
                self.emit(self.submit, UiEvent::Submit);
            }
        }
    }

    fn input(&mut self, ui: &mut egui::Ui, el: &UiElement, text: TextStyle) {
        let kind = el.text_prop("type").unwrap_or_else(|| "text".into());
        let enabled = !el.flag("disabled");
        let on_change = el.handler("onChange");
        match kind.as_str() {
            "checkbox" => {
                let mut checked = self.checked(el);
                let response = ui.add_enabled(enabled, egui::Checkbox::without_text(&mut checked));
                if response.changed() {
                    self.store_uncontrolled(el, "checked", checked.to_string());
                    let value = el.text_prop("value").unwrap_or_else(|| "on".into());
                    self.emit(on_change, UiEvent::Change { value, checked });
                }
            }
            "radio" => {
                let checked = self.checked(el);
                let response = ui.add_enabled(enabled, egui::RadioButton::new(checked, ""));
                if response.clicked() && !checked {
                    self.store_uncontrolled(el, "checked", "true".into());
                    let value = el.text_prop("value").unwrap_or_else(|| "on".into());
                    self.emit(on_change, UiEvent::Change { value, checked: true });
                }
            }
            "range" => {
                let number = |name: &str, default: f64| {
                    el.text_prop(name)
                        .and_then(|v| v.parse::<f64>().ok())
                        .unwrap_or(default)
                };
                let (min, max) = (number("min", 0.0), number("max", 100.0));
                let mut value = self
                    .current_value(el)
                    .and_then(|v| v.parse::<f64>().ok())
                    .unwrap_or((min + max) / 2.0);
                let mut slider = egui::Slider::new(&mut value, min..=max);
                if let Some(step) = el.text_prop("step").and_then(|s| s.parse::<f64>().ok()) {
                    slider = slider.step_by(step);
                }
                if ui.add_enabled(enabled, slider).changed() {
                    let value = number_to_string(value);
                    self.store_uncontrolled(el, "value", value.clone());
                    self.emit(on_change, UiEvent::Change { value, checked: false });
                }
            }
            "submit" | "button" | "reset" => {
                let label = el.text_prop("value").unwrap_or_else(|| "Submit".into());
                let button = egui::Button::new(text.rich(label)).fill(BUTTON_FILL);
                if ui.add_enabled(enabled, button).clicked() {
                    self.emit(el.handler("onClick"), UiEvent::Click);
                    if kind == "submit" {
                        self.emit(self.submit, UiEvent::Submit);
                    }
                }
            }
            _ => self.text_edit(ui, el, false),
        }
    }

    fn text_edit(&mut self, ui: &mut egui::Ui, el: &UiElement, multiline: bool) {
        let mut buffer = self.current_value(el).unwrap_or_default();
        let mut edit = if multiline {
            let rows = el
                .text_prop("rows")
                .and_then(|r| r.parse().ok())
                .unwrap_or(3);
            egui::TextEdit::multiline(&mut buffer).desired_rows(rows)
        } else {
            egui::TextEdit::singleline(&mut buffer)
        };
        if let Some(hint) = el.text_prop("placeholder") {
            edit = edit.hint_text(hint);
        }
        if el.text_prop("type").as_deref() == Some("password") {
            edit = edit.password(true);
        }
        let response = ui.add_enabled(!el.flag("disabled"), edit);

        if response.changed() {
            self.store_uncontrolled(el, "value", buffer.clone());
            self.emit(
                el.handler("onChange"),
                UiEvent::Change {
                    value: buffer,
                    checked: false,
                },
            );
        }
        if !multiline && response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
            self.emit(self.submit, UiEvent::Submit);
        }
    }

    fn select(&mut self, ui: &mut egui::Ui, el: &UiElement, text: TextStyle) {
        let mut options = Vec::new();
        collect_options(el, &mut options);
        let current = self
            .current_value(el)
            .or_else(|| options.first().map(|(value, _)| value.clone()))
            .unwrap_or_default();
        let shown = options
            .iter()
            .find(|(value, _)| *value == current)
            .map_or(current.as_str(), |(_, label)| label.as_str())
            .to_string();

        let mut chosen = None;
        egui::ComboBox::from_id_salt(&el.path)
            .selected_text(text.rich(shown))
            .show_ui(ui, |ui| {
                for (value, label) in &options {
                    if ui.selectable_label(*value == current, label.as_str()).clicked() {
                        chosen = Some(value.clone());
                    }
                }
            });

        if let Some(value) = chosen.filter(|v| *v != current) {
            self.store_uncontrolled(el, "value", value.clone());
            self.emit(
                el.handler("onChange"),
                UiEvent::Change {
                    value,
                    checked: false,
                },
            );
        }
    }

    // ---- form state ---

    /// The prop when the artifact controls it, else what the user last set.
    fn current_value(&self, el: &UiElement) -> Option<String> {
        el.text_prop("value")
            .or_else(|| self.uncontrolled.get(&uncontrolled_key(el, "value")).cloned())
            .or_else(|| el.text_prop("defaultValue"))
    }

    fn checked(&self, el: &UiElement) -> bool {
        if el.prop("checked").is_some() {
            return el.flag("checked");
        }
        match self.uncontrolled.get(&uncontrolled_key(el, "checked")) {
            Some(stored) => stored == "true",
            None => el.flag("defaultChecked"),
        }
    }

    fn store_uncontrolled(&mut self, el: &UiElement, field: &str, value: String) {
        if el.prop(field).is_none() {
            self.uncontrolled.insert(uncontrolled_key(el, field), value);
        }
    }
}

fn uncontrolled_key(el: &UiElement, field: &str) -> String {
    format!("{}#{field}", el.path)
}

fn collect_rows<'a>(el: &'a UiElement, out: &mut Vec<&'a UiElement>) {
    for child in &el.children {
        if let UiNode::Element(child) = child {
            match child.tag.as_str() {
                "tr" => out.push(child),
                "thead" | "tbody" | "tfoot" => collect_rows(child, out),
                _ => {}
            }
        }
    }
}

/// `(value, label)` for every `<option>`, looking through `<optgroup>`.
fn collect_options(el: &UiElement, out: &mut Vec<(String, String)>) {
    for child in &el.children {
        if let UiNode::Element(child) = child {
            match child.tag.as_str() {
                "option" => {
                    let label = child.text_content();
                    let value = child.text_prop("value").unwrap_or_else(|| label.clone());
                    out.push((value, label));
                }
                "optgroup" => collect_options(child, out),
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(src: &str) -> SandboxRenderer {
        let r = SandboxRenderer::new(src);
        assert!(r.error().is_none(), "{:?}", r.error());
        r
    }

    fn run_frame(renderer: &mut SandboxRenderer) {
        let ctx = egui::Context::default();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| renderer.draw(ui));
        });
    }

    #[test]
    fn draws_a_full_tree_without_events() {
        let mut r = render(
            r#"function render() {
  return (
    <div className="p-4 bg-gray-100 rounded flex gap-2">
      <h1 className="text-2xl font-bold">Title</h1>
      <ul><li>One</li><li>Two</li></ul>
      <ol><li>First</li></ol>
      <table><thead><tr><th>A</th></tr></thead><tbody><tr><td>1</td></tr></tbody></table>
      <select value="b"><option value="a">A</option><option value="b">B</option></select>
      <input type="checkbox" checked={true} onChange={() => {}} />
      <input type="range" min="0" max="10" value={3} onChange={() => {}} />
      <textarea placeholder="notes" />
      <img alt="logo" />
      <hr />
      <form onSubmit={() => {}}><button>Send</button></form>
      <svg><path d="M0 0" /></svg>
    </div>
  );
}"#,
        );
        run_frame(&mut r);
        assert!(r.error().is_none());
        assert!(r.tree()[0].text_content().contains("Title"));
    }

    #[test]
    fn error_banner_replaces_the_preview() {
        let mut r = SandboxRenderer::new("function render() { throw new Error('boom'); }");
        run_frame(&mut r);
        assert_eq!(r.error().unwrap().to_string(), "Render failed: Error: boom");
    }

    #[test]
    fn options_fall_back_to_their_text() {
        let r = render(
            r#"function render() {
  return <select><optgroup label="g"><option>Red</option></optgroup><option value="b">Blue</option></select>;
}"#,
        );
        let UiNode::Element(select) = &r.tree()[0] else {
            panic!("expected select");
        };
        let mut options = Vec::new();
        collect_options(select, &mut options);
        assert_eq!(
            options,
            vec![
                ("Red".to_string(), "Red".to_string()),
                ("b".to_string(), "Blue".to_string())
            ]
        );
    }

    #[test]
    fn uncontrolled_values_are_remembered_per_element() {
        let mut r = render(r#"function render() { return <div><input /><input defaultValue="x" /></div>; }"#);
        let UiNode::Element(div) = r.tree()[0].clone() else {
            panic!("expected div");
        };
        let inputs: Vec<UiElement> = div
            .children
            .iter()
            .filter_map(|c| match c {
                UiNode::Element(e) => Some(e.clone()),
                UiNode::Text(_) => None,
            })
            .collect();

        let mut painter = Painter {
            uncontrolled: &mut r.uncontrolled,
            events: Vec::new(),
            submit: None,
        };
        assert_eq!(painter.current_value(&inputs[0]), None);
        assert_eq!(painter.current_value(&inputs[1]).as_deref(), Some("x"));
        painter.store_uncontrolled(&inputs[0], "value", "typed".into());
        assert_eq!(painter.current_value(&inputs[0]).as_deref(), Some("typed"));
        assert_eq!(painter.current_value(&inputs[1]).as_deref(), Some("x"));
    }

    #[test]
    fn controlled_values_win_over_stored_text() {
        let mut r = render(r#"function render() { return <input value="fixed" onChange={() => {}} />; }"#);
        let UiNode::Element(input) = r.tree()[0].clone() else {
            panic!("expected input");
        };
        let mut painter = Painter {
            uncontrolled: &mut r.uncontrolled,
            events: Vec::new(),
            submit: None,
        };
        painter.store_uncontrolled(&input, "value", "typed".into());
        assert_eq!(painter.current_value(&input).as_deref(), Some("fixed"));
    }
}
