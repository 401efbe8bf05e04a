//! [`SandboxRenderer`]: owns one artifact's interpreter and its last tree.
//!
//! All evaluation passes through a single barrier that converts thrown
//! values, exhausted limits and interpreter panics into [`RenderError`].
//! Nothing that happens inside the artifact propagates further than the
//! renderer that owns it.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use super::builtins::thrown_message;
use super::interp::{Eval, Interpreter, Interrupt};
use super::parser::parse_program;
use super::tree::{HandlerId, UiEvent, UiNode};

// ---------------------------------------------------------------------------
// RenderError
// ---------------------------------------------------------------------------

/// Why an artifact could not be shown.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("Render failed: syntax error at line {line}, column {column}: {message}")]
    Syntax {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Render failed: {0}")]
    Runtime(String),

    #[error("Render failed: {0}")]
    Limit(String),

    #[error("Render failed: the preview crashed ({0})")]
    Panic(String),
}

/// Run `f` behind the panic barrier and translate its outcome.
fn guarded<T>(f: impl FnOnce() -> Eval<T>) -> Result<T, RenderError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(Interrupt::Throw(thrown))) => Err(RenderError::Runtime(thrown_message(&thrown))),
        Ok(Err(Interrupt::Limit(reason))) => Err(RenderError::Limit(reason)),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            log::error!("Sandbox interpreter panicked: {reason}");
            Err(RenderError::Panic(reason))
        }
    }
}

// ---------------------------------------------------------------------------
// SandboxRenderer
// ---------------------------------------------------------------------------

pub struct SandboxRenderer {
    source: String,
    /// `None` after a syntax error or a panic.
    interp: Option<Interpreter>,
    pub(super) tree: Vec<UiNode>,
    error: Option<RenderError>,
    /// Text of inputs that have no `value` prop, keyed by element path.
    pub(super) uncontrolled: HashMap<String, String>,
}

impl SandboxRenderer {
    /// Parse and render `source` in a fresh interpreter.
    pub fn new(source: &str) -> Self {
        let mut renderer = Self {
            source: String::new(),
            interp: None,
            tree: Vec::new(),
            error: None,
            uncontrolled: HashMap::new(),
        };
        renderer.set_source(source);
        renderer
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replace the artifact text.  State from the previous text is dropped.
    pub fn set_source(&mut self, source: &str) {
        self.source = source.to_string();
        self.tree.clear();
        self.uncontrolled.clear();
        self.error = None;
        self.interp = match parse_program(source) {
            Ok(program) => Some(Interpreter::new(program)),
            Err(e) => {
                let (line, column) = e.line_col(source);
                self.error = Some(RenderError::Syntax {
                    message: e.message,
                    line,
                    column,
                });
                None
            }
        };
        self.rerender();
    }

    pub fn error(&self) -> Option<&RenderError> {
        self.error.as_ref()
    }

    pub fn tree(&self) -> &[UiNode] {
        &self.tree
    }

    /// Captured `console` output of the artifact.
    pub fn logs(&self) -> &[String] {
        match &self.interp {
            Some(interp) => interp.logs(),
            None => &[],
        }
    }

    /// Deliver `event` to `handler` and re-render.
    pub fn dispatch(&mut self, handler: HandlerId, event: &UiEvent) {
        self.dispatch_all(&[(handler, event.clone())]);
    }

    /// Deliver a frame's worth of events, then re-render once.
    ///
    /// Handler ids refer to the tree currently shown, so every event is
    /// delivered before the tree is rebuilt.
    pub fn dispatch_all(&mut self, events: &[(HandlerId, UiEvent)]) {
        let Some(interp) = self.interp.as_mut() else {
            return;
        };
        let outcome = guarded(|| {
            let mut delivered = false;
            for (handler, event) in events {
                if interp.dispatch(*handler, event)? {
                    delivered = true;
                } else {
                    log::debug!("Ignoring event for stale handler {handler}");
                }
            }
            Ok(delivered)
        });
        match outcome {
            Ok(true) => self.rerender(),
            Ok(false) => {}
            Err(e) => self.fail(e),
        }
    }

    fn rerender(&mut self) {
        let Some(interp) = self.interp.as_mut() else {
            return;
        };
        match guarded(|| interp.render()) {
            Ok(tree) => {
                self.tree = tree;
                self.error = None;
            }
            Err(e) => self.fail(e),
        }
    }

    fn fail(&mut self, error: RenderError) {
        log::warn!("Artifact failed to render: {error}");
        if matches!(error, RenderError::Panic(_)) {
            self.interp = None;
        }
        self.tree.clear();
        self.error = Some(error);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: &str = r#"function render() {
  function MyComponent() {
    const [count, setCount] = React.useState(0);
    return (
      <div className="p-4">
        <p>Count: {count}</p>
        <button onClick={() => setCount(count + 1)}>Increment</button>
      </div>
    );
  }
  return <MyComponent />;
}"#;

    fn click(renderer: &mut SandboxRenderer, label: &str) {
        let handler = renderer
            .tree()
            .iter()
            .find_map(|n| n.find(&|el| el.tag == "button" && el.text_content() == label))
            .and_then(|el| el.handler("onClick"))
            .unwrap_or_else(|| panic!("no button labelled {label}"));
        renderer.dispatch(handler, &UiEvent::Click);
    }

    fn text(renderer: &SandboxRenderer) -> String {
        renderer.tree().iter().map(UiNode::text_content).collect()
    }

    #[test]
    fn counter_increments_on_click() {
        let mut r = SandboxRenderer::new(COUNTER);
        assert!(r.error().is_none(), "{:?}", r.error());
        assert_eq!(text(&r), "Count: 0Increment");

        click(&mut r, "Increment");
        click(&mut r, "Increment");
        assert_eq!(text(&r), "Count: 2Increment");
    }

    #[test]
    fn throwing_artifact_reports_render_failed() {
        let r = SandboxRenderer::new(
            "function render() {\n  const x = null;\n  return <p>{x.missing.field}</p>;\n}",
        );
        let err = r.error().unwrap();
        assert!(matches!(err, RenderError::Runtime(_)));
        assert_eq!(
            err.to_string(),
            "Render failed: TypeError: Cannot read properties of null (reading 'missing')"
        );
        assert!(r.tree().is_empty());
    }

    #[test]
    fn syntax_errors_carry_line_and_column() {
        let r = SandboxRenderer::new("function render() {\n  return <div>;\n}");
        let Some(RenderError::Syntax { line, .. }) = r.error() else {
            panic!("expected syntax error, got {:?}", r.error());
        };
        assert_eq!(*line, 2);
    }

    #[test]
    fn runaway_recursion_is_a_limit_error() {
        let r = SandboxRenderer::new("function render() { const f = () => f(); return f(); }");
        assert!(matches!(r.error(), Some(RenderError::Limit(_))));
    }

    #[test]
    fn doubling_a_string_fails_before_exhausting_memory() {
        let r = SandboxRenderer::new(
            "function render() { const f = (s, n) => n === 0 ? s : f(s + s, n - 1); return <p>{f('x', 36).length}</p>; }",
        );
        assert_eq!(
            r.error().unwrap().to_string(),
            "Render failed: RangeError: Invalid string length"
        );
        assert!(r.tree().is_empty());
    }

    #[test]
    fn handler_errors_replace_the_tree() {
        let mut r = SandboxRenderer::new(
            r#"function render() { return <button onClick={() => { throw new Error("nope"); }}>Go</button>; }"#,
        );
        click(&mut r, "Go");
        assert_eq!(r.error().unwrap().to_string(), "Render failed: Error: nope");
        assert!(r.tree().is_empty());
    }

    #[test]
    fn set_source_starts_fresh() {
        let mut r = SandboxRenderer::new(COUNTER);
        click(&mut r, "Increment");
        r.set_source(COUNTER);
        assert_eq!(text(&r), "Count: 0Increment");
        assert_eq!(r.source(), COUNTER);

        r.set_source("function render() { return <p>other</p>; }");
        assert_eq!(text(&r), "other");
    }

    #[test]
    fn fixing_a_broken_source_clears_the_error() {
        let mut r = SandboxRenderer::new("function render() { return <p>; }");
        assert!(r.error().is_some());
        r.set_source("function render() { return <p>ok</p>; }");
        assert!(r.error().is_none());
        assert_eq!(text(&r), "ok");
    }

    #[test]
    fn stale_handlers_are_ignored() {
        let mut r = SandboxRenderer::new(COUNTER);
        r.dispatch(99, &UiEvent::Click);
        assert!(r.error().is_none());
        assert_eq!(text(&r), "Count: 0Increment");
    }

    #[test]
    fn batched_events_use_the_tree_they_were_read_from() {
        let mut r = SandboxRenderer::new(
            r#"function render() {
  function Form() {
    const [text, setText] = React.useState("");
    const [sent, setSent] = React.useState([]);
    return (
      <form onSubmit={(e) => { e.preventDefault(); setSent([...sent, text]); }}>
        <input value={text} onChange={(e) => setText(e.target.value)} />
        <ul>{sent.map((s, i) => <li key={i}>{s}</li>)}</ul>
      </form>
    );
  }
  return <Form />;
}"#,
        );
        let form = r.tree()[0].find(&|el| el.tag == "form").cloned().unwrap();
        let input = r.tree()[0].find(&|el| el.tag == "input").cloned().unwrap();
        r.dispatch_all(&[
            (
                input.handler("onChange").unwrap(),
                UiEvent::Change {
                    value: "milk".into(),
                    checked: false,
                },
            ),
            (form.handler("onSubmit").unwrap(), UiEvent::Submit),
        ]);
        assert!(r.error().is_none(), "{:?}", r.error());
        // The submit handler still closes over the text from before the change.
        let items = r.tree()[0].find(&|el| el.tag == "ul").unwrap().children.len();
        assert_eq!(items, 1);
    }

    #[test]
    fn panics_are_contained() {
        let result: Result<(), RenderError> = guarded(|| panic!("interpreter bug"));
        assert_eq!(result, Err(RenderError::Panic("interpreter bug".into())));
    }

    #[test]
    fn console_output_is_exposed() {
        let r = SandboxRenderer::new(r#"function render() { console.log("hi"); return null; }"#);
        assert_eq!(r.logs(), ["hi"]);
    }
}
