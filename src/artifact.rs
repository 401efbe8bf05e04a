//! Generated UI source text and its normalization.
//!
//! The synthesis service is asked for a single `function render()` factory
//! with no imports, exports or comments.  Models do not always comply, so
//! every piece of returned text goes through [`normalize`] before it is
//! published:
//!
//! 1. Markdown code fences (```` ``` ````, optionally followed by a language
//!    tag such as `jsx` or `js`) are removed wherever they appear, and the
//!    result is trimmed.
//! 2. If the text does not start with [`FACTORY_SIGNATURE`] it is wrapped in
//!    a `render` factory that returns `<MyComponent />`.
//!
//! The signature test is a prefix check only.  Nothing here validates that
//! the braces balance or that `MyComponent` exists; those problems surface
//! later as a render error in the sandbox.

use std::fmt;

/// Every published artifact starts with this.
pub const FACTORY_SIGNATURE: &str = "function render()";

const FENCE: &str = "```";

// ---------------------------------------------------------------------------
// GeneratedArtifact
// ---------------------------------------------------------------------------

/// Normalized synthesis output.  Immutable; cheap to clone into history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GeneratedArtifact(String);

impl GeneratedArtifact {
    /// Normalize raw service output into an artifact.
    pub fn from_raw(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for GeneratedArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for GeneratedArtifact {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// normalize
// ---------------------------------------------------------------------------

/// Strip code fences and guarantee the factory signature prefix.
///
/// Idempotent: normalizing an already-normalized artifact returns it
/// unchanged.
///
/// ```rust
/// use voice_to_ui::artifact::normalize;
///
/// let raw = "```jsx\nfunction render() {\n  return <p>hi</p>;\n}\n```";
/// assert_eq!(normalize(raw), "function render() {\n  return <p>hi</p>;\n}");
///
/// let bare = "function MyComponent() { return <button>Go</button>; }";
/// assert!(normalize(bare).starts_with("function render()"));
/// ```
pub fn normalize(raw: &str) -> String {
    let code = strip_fences(raw.trim());
    let code = code.trim();

    if code.starts_with(FACTORY_SIGNATURE) {
        code.to_string()
    } else {
        format!("{FACTORY_SIGNATURE} {{\n{code}\n  return <MyComponent />;\n}}")
    }
}

/// Remove every fence token together with an immediately following
/// language tag.
fn strip_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(FENCE) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + FENCE.len()..];
        let tag_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        rest = &rest[tag_len..];
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_factory_is_untouched() {
        let code = "function render() {\n  return <div>ok</div>;\n}";
        assert_eq!(normalize(code), code);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let code = "\n\n  function render() { return <p/>; }  \n";
        assert_eq!(normalize(code), "function render() { return <p/>; }");
    }

    #[test]
    fn jsx_fence_is_removed() {
        let raw = "```jsx\nfunction render() { return <p/>; }\n```";
        assert_eq!(normalize(raw), "function render() { return <p/>; }");
    }

    #[test]
    fn js_and_bare_fences_are_removed() {
        let raw = "```js\nfunction render() { return <p/>; }\n```\n";
        assert_eq!(normalize(raw), "function render() { return <p/>; }");

        let raw = "```\nfunction render() { return <p/>; }\n```";
        assert_eq!(normalize(raw), "function render() { return <p/>; }");
    }

    #[test]
    fn other_language_tags_are_removed_with_the_fence() {
        let raw = "```javascript\nfunction render() { return <p/>; }\n```";
        assert_eq!(normalize(raw), "function render() { return <p/>; }");
    }

    #[test]
    fn bare_component_is_wrapped() {
        let raw = "function MyComponent() {\n  return <button>Red</button>;\n}";
        let out = normalize(raw);
        assert!(out.starts_with("function render() {\n"));
        assert!(out.contains(raw));
        assert!(out.trim_end().ends_with("return <MyComponent />;\n}"));
    }

    #[test]
    fn fenced_bare_component_is_unfenced_then_wrapped() {
        let raw = "```jsx\nfunction MyComponent() { return <b>x</b>; }\n```";
        let out = normalize(raw);
        assert!(out.starts_with(FACTORY_SIGNATURE));
        assert!(!out.contains("```"));
        assert!(!out.contains("jsx\n"));
    }

    #[test]
    fn normalize_is_idempotent() {
        for raw in [
            "function MyComponent() { return <i/>; }",
            "```jsx\nfunction render() { return <i/>; }\n```",
            "",
        ] {
            let once = normalize(raw);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn prefix_check_is_only_a_heuristic() {
        // Starts with the signature but is broken: left alone.
        let broken = "function render() { return <div>";
        assert_eq!(normalize(broken), broken);
    }

    #[test]
    fn artifact_wraps_normalized_text() {
        let artifact = GeneratedArtifact::from_raw("```\nfunction render() { return 1; }\n```");
        assert_eq!(artifact.as_str(), "function render() { return 1; }");
        assert_eq!(artifact.to_string(), artifact.clone().into_string());
    }
}
