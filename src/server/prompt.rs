//! Prompt construction for `/generate-code`.
//!
//! [`build_chat`] returns a `(system_msg, user_msg)` pair for any
//! OpenAI-compatible `/v1/chat/completions` endpoint.  The user message
//! embeds the spoken description, the authoring rules and one worked
//! example of the `function render()` factory shape the preview expects.

// ---------------------------------------------------------------------------
// System instruction
// ---------------------------------------------------------------------------

const SYSTEM_INSTRUCTION: &str = "\
You are a React component generator specializing in dark-themed, high-contrast UI \
with solid colors. Do not use gradients or animations. Always use dark backgrounds \
with light text for optimal contrast against white containers.";

// ---------------------------------------------------------------------------
// Rules and example
// ---------------------------------------------------------------------------

const RULES: &str = "
Rules:
- Use Tailwind CSS for styling with modern design principles
- Component must have a dark background (slate-800 or similar) to contrast with white container
- Do not include any imports, exports, or comments
- Component must be wrapped in a render() function
- Use React.useState instead of importing useState
- Include modern UI patterns
- Use solid colors and shadows for depth
- Include loading states and feedback for interactive elements
- Do not use gradients or animations
- Return ONLY the component code, no explanations or comments
";

const EXAMPLE_FORMAT: &str = r#"
Example format:
function render() {
  function MyComponent() {
    const [state, setState] = React.useState(initialValue);

    return (
      <div className="bg-slate-800 rounded-xl shadow-xl p-6">
        <div className="w-full max-w-md mx-auto space-y-4">
          <div className="bg-slate-700 p-6 rounded-lg border border-slate-600">
            <h2 className="text-2xl font-bold text-white mb-4">
              {state.title}
            </h2>
            <div className="space-y-4">
              <button
                className="w-full py-3 px-6 text-lg font-semibold rounded-lg
                        bg-blue-600 text-white shadow-lg
                        hover:bg-blue-700 active:bg-blue-800
                        disabled:opacity-50 disabled:cursor-not-allowed"
                onClick={handleClick}
              >
                {state.buttonText}
              </button>
            </div>
          </div>
        </div>
      </div>
    );
  }

  return <MyComponent />;
}"#;

/// Build the `(system_msg, user_msg)` pair for one description.
///
/// # Example
/// ```rust
/// use voice_to_ui::server::prompt::build_chat;
///
/// let (system, user) = build_chat("a red button");
/// assert!(system.contains("React component generator"));
/// assert!(user.contains("a red button"));
/// ```
pub fn build_chat(description: &str) -> (String, String) {
    let mut user_msg = String::with_capacity(2048);
    user_msg.push_str(
        "Create a modern, polished React component that meets this description: ",
    );
    user_msg.push_str(description.trim());
    user_msg.push('\n');
    user_msg.push_str(RULES);
    user_msg.push_str(EXAMPLE_FORMAT);

    (SYSTEM_INSTRUCTION.to_string(), user_msg)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::FACTORY_SIGNATURE;

    #[test]
    fn user_msg_embeds_description_first() {
        let (_, user) = build_chat("  a counter with increment button ");
        assert!(user.starts_with(
            "Create a modern, polished React component that meets this description: \
             a counter with increment button\n"
        ));
    }

    #[test]
    fn user_msg_carries_rules_and_factory_example() {
        let (_, user) = build_chat("a todo list");
        assert!(user.contains("Component must be wrapped in a render() function"));
        assert!(user.contains("Use React.useState instead of importing useState"));
        assert!(user.contains(FACTORY_SIGNATURE), "example must show the factory shape");
        assert!(user.trim_end().ends_with("return <MyComponent />;\n}"));
    }

    #[test]
    fn system_msg_sets_dark_theme() {
        let (system, _) = build_chat("anything");
        assert!(system.contains("dark backgrounds with light text"));
        assert!(system.contains("Do not use gradients or animations"));
    }
}
