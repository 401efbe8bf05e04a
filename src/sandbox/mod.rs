//! Isolated preview of generated UI artifacts.
//!
//! Artifacts are JSX source text produced by a remote model, so they are
//! never handed to a host engine.  This module interprets a small
//! React-flavoured subset of JavaScript against an allow-listed global
//! environment and draws the result with egui.
//!
//! # Architecture
//!
//! ```text
//!  source ─▶ lexer ─▶ parser ─▶ Vec<Stmt> ─▶ Interpreter::render()
//!                                               │  hooks keyed by path
//!                                               ▼
//!                                          Vec<UiNode>  (plain data)
//!                                               │
//!  SandboxRenderer::draw(ui) ◀──────────────────┘
//!        │  style: Tailwind / inline style → egui
//!        └─ (HandlerId, UiEvent) ─▶ Interpreter::dispatch ─▶ render again
//! ```
//!
//! Every failure mode (syntax, thrown values, fuel or depth exhaustion and
//! interpreter panics) ends up as a [`RenderError`] on the renderer that
//! owns the artifact.
//!
//! # Quick start
//!
//! ```rust
//! use voice_to_ui::sandbox::{SandboxRenderer, UiNode};
//!
//! let renderer = SandboxRenderer::new(
//!     "function render() { return <p className=\"text-lg\">Hello</p>; }",
//! );
//! assert!(renderer.error().is_none());
//! assert_eq!(renderer.tree()[0].text_content(), "Hello");
//! ```

mod ast;
mod builtins;
mod draw;
mod interp;
mod lexer;
mod parser;
mod renderer;
mod style;
mod tree;
mod value;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use renderer::{RenderError, SandboxRenderer};
pub use tree::{HandlerId, Prop, UiElement, UiEvent, UiNode};
