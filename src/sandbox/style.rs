//! Tailwind classes and inline styles, mapped onto what egui can express.
//!
//! Coverage is deliberately partial: colours, type scale, weight, padding,
//! rounding, borders, gaps and flex direction.  Variant prefixes such as
//! `hover:` or `md:` are ignored, and so is anything egui has no knob for.

use super::tree::UiElement;

/// Inherited text appearance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: Option<egui::Color32>,
    pub size: Option<f32>,
    pub strong: bool,
    pub italic: bool,
    pub mono: bool,
    pub underline: bool,
}

/// Per-element box appearance; never inherited.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoxStyle {
    pub fill: Option<egui::Color32>,
    pub border: Option<egui::Color32>,
    pub padding: egui::Vec2,
    pub radius: u8,
    pub gap: Option<f32>,
    pub flow: Flow,
    pub centered: bool,
    pub hidden: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Flow {
    #[default]
    Column,
    Row,
    Wrap,
}

/// Default text on the white preview surface (gray-900).
pub const INK: egui::Color32 = egui::Color32::from_rgb(17, 24, 39);

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: Some(INK),
            size: None,
            strong: false,
            italic: false,
            mono: false,
            underline: false,
        }
    }
}

impl TextStyle {
    pub fn rich(&self, text: impl Into<String>) -> egui::RichText {
        let mut rich = egui::RichText::new(text);
        if let Some(color) = self.color {
            rich = rich.color(color);
        }
        if let Some(size) = self.size {
            rich = rich.size(size);
        }
        if self.strong {
            rich = rich.strong();
        }
        if self.italic {
            rich = rich.italics();
        }
        if self.mono {
            rich = rich.monospace();
        }
        if self.underline {
            rich = rich.underline();
        }
        rich
    }
}

impl BoxStyle {
    /// Whether the element needs a frame of its own.
    pub fn is_plain(&self) -> bool {
        self.fill.is_none()
            && self.border.is_none()
            && self.padding == egui::Vec2::ZERO
    }

    pub fn frame(&self) -> egui::Frame {
        let mut frame = egui::Frame::default()
            .inner_margin(egui::Margin::symmetric(
                clamp_i8(self.padding.x),
                clamp_i8(self.padding.y),
            ))
            .corner_radius(egui::CornerRadius::same(self.radius));
        if let Some(fill) = self.fill {
            frame = frame.fill(fill);
        }
        if let Some(border) = self.border {
            frame = frame.stroke(egui::Stroke::new(1.0, border));
        }
        frame
    }
}

fn clamp_i8(v: f32) -> i8 {
    v.round().clamp(0.0, f32::from(i8::MAX)) as i8
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Combine tag defaults, classes and inline style for `el`.
pub fn resolve(el: &UiElement, inherited: TextStyle) -> (TextStyle, BoxStyle) {
    let mut text = inherited;
    let mut boxed = BoxStyle::default();
    tag_defaults(&el.tag, &mut text, &mut boxed);
    for class in el.classes() {
        apply_class(class, &mut text, &mut boxed);
    }
    apply_inline(el, &mut text, &mut boxed);
    (text, boxed)
}

fn tag_defaults(tag: &str, text: &mut TextStyle, boxed: &mut BoxStyle) {
    match tag {
        "h1" => heading(text, 30.0),
        "h2" => heading(text, 24.0),
        "h3" => heading(text, 20.0),
        "h4" => heading(text, 18.0),
        "h5" | "h6" => heading(text, 16.0),
        "strong" | "b" | "th" => text.strong = true,
        "em" | "i" => text.italic = true,
        "code" | "kbd" => text.mono = true,
        "pre" => {
            text.mono = true;
            boxed.padding = egui::vec2(8.0, 8.0);
        }
        "small" => text.size = Some(12.0),
        "a" => {
            text.color = Some(palette("blue", 600).unwrap_or(INK));
            text.underline = true;
        }
        "u" => text.underline = true,
        _ => {}
    }
}

fn heading(text: &mut TextStyle, size: f32) {
    text.size = Some(size);
    text.strong = true;
}

fn apply_class(class: &str, text: &mut TextStyle, boxed: &mut BoxStyle) {
    if class.contains(':') {
        return;
    }
    match class {
        "hidden" => boxed.hidden = true,
        "flex" | "inline-flex" | "flex-row" => boxed.flow = Flow::Row,
        "flex-col" => boxed.flow = Flow::Column,
        "flex-wrap" | "grid" => boxed.flow = Flow::Wrap,
        "text-center" | "items-center" | "justify-center" | "mx-auto" => boxed.centered = true,
        "font-bold" | "font-semibold" | "font-extrabold" | "font-black" => text.strong = true,
        "font-normal" | "font-light" => text.strong = false,
        "italic" => text.italic = true,
        "not-italic" => text.italic = false,
        "underline" => text.underline = true,
        "no-underline" => text.underline = false,
        "font-mono" => text.mono = true,
        "border" | "border-2" | "border-b" | "border-t" => {
            boxed.border.get_or_insert(palette("gray", 300).unwrap_or(INK));
        }
        "rounded-none" => boxed.radius = 0,
        "rounded-sm" => boxed.radius = 2,
        "rounded" => boxed.radius = 4,
        "rounded-md" => boxed.radius = 6,
        "rounded-lg" => boxed.radius = 8,
        "rounded-xl" => boxed.radius = 12,
        "rounded-2xl" => boxed.radius = 16,
        "rounded-3xl" => boxed.radius = 24,
        "rounded-full" => boxed.radius = u8::MAX,
        "shadow" | "shadow-md" | "shadow-lg" => {
            boxed.border.get_or_insert(palette("gray", 200).unwrap_or(INK));
        }
        _ => apply_scaled(class, text, boxed),
    }
}

fn apply_scaled(class: &str, text: &mut TextStyle, boxed: &mut BoxStyle) {
    if let Some(size) = class.strip_prefix("text-").and_then(font_size) {
        text.size = Some(size);
    } else if let Some(color) = class.strip_prefix("text-").and_then(color_name) {
        text.color = Some(color);
    } else if let Some(color) = class.strip_prefix("bg-").and_then(color_name) {
        boxed.fill = Some(color);
    } else if let Some(color) = class.strip_prefix("border-").and_then(color_name) {
        boxed.border = Some(color);
    } else if let Some(v) = class.strip_prefix("p-").and_then(spacing) {
        boxed.padding = egui::vec2(v, v);
    } else if let Some(v) = class.strip_prefix("px-").and_then(spacing) {
        boxed.padding.x = v;
    } else if let Some(v) = class.strip_prefix("py-").and_then(spacing) {
        boxed.padding.y = v;
    } else if let Some(v) = class
        .strip_prefix("gap-")
        .or_else(|| class.strip_prefix("space-y-"))
        .or_else(|| class.strip_prefix("space-x-"))
        .and_then(spacing)
    {
        boxed.gap = Some(v);
    }
}

fn apply_inline(el: &UiElement, text: &mut TextStyle, boxed: &mut BoxStyle) {
    if let Some(color) = el.style("color").and_then(css_color) {
        text.color = Some(color);
    }
    if let Some(color) = el
        .style("backgroundColor")
        .or_else(|| el.style("background"))
        .and_then(css_color)
    {
        boxed.fill = Some(color);
    }
    if let Some(size) = el.style("fontSize").and_then(css_length) {
        text.size = Some(size);
    }
    match el.style("fontWeight") {
        Some("bold" | "bolder") => text.strong = true,
        Some(w) => {
            if let Ok(w) = w.parse::<u32>() {
                text.strong = w >= 600;
            }
        }
        None => {}
    }
    if el.style("fontStyle") == Some("italic") {
        text.italic = true;
    }
    if let Some(p) = el.style("padding").and_then(css_length) {
        boxed.padding = egui::vec2(p, p);
    }
    if let Some(r) = el.style("borderRadius").and_then(css_length) {
        boxed.radius = r.clamp(0.0, 255.0) as u8;
    }
    if let Some(g) = el.style("gap").and_then(css_length) {
        boxed.gap = Some(g);
    }
    if el.style("border").is_some() {
        boxed.border.get_or_insert(palette("gray", 300).unwrap_or(INK));
    }
    if el.style("textAlign") == Some("center") {
        boxed.centered = true;
    }
    match el.style("display") {
        Some("none") => boxed.hidden = true,
        Some("flex") if el.style("flexDirection") != Some("column") => boxed.flow = Flow::Row,
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Scales
// ---------------------------------------------------------------------------

fn font_size(name: &str) -> Option<f32> {
    Some(match name {
        "xs" => 12.0,
        "sm" => 14.0,
        "base" => 16.0,
        "lg" => 18.0,
        "xl" => 20.0,
        "2xl" => 24.0,
        "3xl" => 30.0,
        "4xl" => 36.0,
        "5xl" => 48.0,
        "6xl" => 60.0,
        _ => return None,
    })
}

/// Tailwind spacing units are a quarter of a rem.
fn spacing(value: &str) -> Option<f32> {
    if value == "px" {
        return Some(1.0);
    }
    let units: f32 = value.parse().ok()?;
    (units >= 0.0).then_some(units * 4.0)
}

fn color_name(name: &str) -> Option<egui::Color32> {
    let name = name.split('/').next().unwrap_or(name);
    match name {
        "white" => return Some(egui::Color32::WHITE),
        "black" => return Some(egui::Color32::BLACK),
        "transparent" => return Some(egui::Color32::TRANSPARENT),
        _ => {}
    }
    let (hue, shade) = name.rsplit_once('-')?;
    palette(hue, shade.parse().ok()?)
}

/// Tailwind hue at `shade`, derived from its 500 tone.
fn palette(hue: &str, shade: u32) -> Option<egui::Color32> {
    let base = match hue {
        "slate" => [100, 116, 139],
        "gray" => [107, 114, 128],
        "zinc" => [113, 113, 122],
        "neutral" => [115, 115, 115],
        "stone" => [120, 113, 108],
        "red" => [239, 68, 68],
        "orange" => [249, 115, 22],
        "amber" => [245, 158, 11],
        "yellow" => [234, 179, 8],
        "lime" => [132, 204, 22],
        "green" => [34, 197, 94],
        "emerald" => [16, 185, 129],
        "teal" => [20, 184, 166],
        "cyan" => [6, 182, 212],
        "sky" => [14, 165, 233],
        "blue" => [59, 130, 246],
        "indigo" => [99, 102, 241],
        "violet" => [139, 92, 246],
        "purple" => [168, 85, 247],
        "fuchsia" => [217, 70, 239],
        "pink" => [236, 72, 153],
        "rose" => [244, 63, 94],
        _ => return None,
    };
    let (target, amount) = match shade {
        50 => (255.0, 0.95),
        100 => (255.0, 0.9),
        200 => (255.0, 0.75),
        300 => (255.0, 0.55),
        400 => (255.0, 0.3),
        500 => (0.0, 0.0),
        600 => (0.0, 0.15),
        700 => (0.0, 0.3),
        800 => (0.0, 0.45),
        900 => (0.0, 0.6),
        950 => (0.0, 0.72),
        _ => return None,
    };
    let mix = |c: u8| (f32::from(c) + (target - f32::from(c)) * amount).round() as u8;
    Some(egui::Color32::from_rgb(mix(base[0]), mix(base[1]), mix(base[2])))
}

fn css_color(value: &str) -> Option<egui::Color32> {
    let value = value.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return hex_color(hex);
    }
    if let Some(args) = value
        .strip_prefix("rgb(")
        .or_else(|| value.strip_prefix("rgba("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<u8> = args
            .split(',')
            .take(3)
            .map(|p| p.trim().parse::<f32>().map(|v| v.clamp(0.0, 255.0) as u8))
            .collect::<Result<_, _>>()
            .ok()?;
        return match parts[..] {
            [r, g, b] => Some(egui::Color32::from_rgb(r, g, b)),
            _ => None,
        };
    }
    match value {
        "grey" => palette("gray", 500),
        "white" | "black" | "transparent" => color_name(value),
        named => palette(named, 500),
    }
}

/// `rgb` or `rrggbb`, without the leading `#`.
fn hex_color(hex: &str) -> Option<egui::Color32> {
    let full: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };
    let channel = |i: usize| u8::from_str_radix(full.get(i..i + 2)?, 16).ok();
    Some(egui::Color32::from_rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// `16`, `"16px"` or `"1rem"` in points.
fn css_length(value: &str) -> Option<f32> {
    let value = value.trim();
    if let Some(rem) = value.strip_suffix("rem").or_else(|| value.strip_suffix("em")) {
        return rem.trim().parse::<f32>().ok().map(|v| v * 16.0);
    }
    value.trim_end_matches("px").trim().parse().ok()
}
