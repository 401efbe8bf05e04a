//! Host-side view of a rendered artifact.
//!
//! The interpreter resolves elements and components into a [`UiNode`] tree
//! made only of plain data; the egui layer never touches interpreter values.
//! Event handler props are replaced by [`HandlerId`]s into the table of the
//! render pass that produced the tree.

/// Index into the handler table of the current render pass.
pub type HandlerId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum UiNode {
    Element(UiElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UiElement {
    pub tag: String,
    pub props: Vec<(String, Prop)>,
    pub children: Vec<UiNode>,
    /// Position in the component tree; stable across re-renders.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Prop {
    Str(String),
    Num(f64),
    Bool(bool),
    Handler(HandlerId),
    /// Inline `style={{ … }}` as `(property, value)` pairs.
    Style(Vec<(String, String)>),
}

/// Host event delivered to an artifact handler.
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Click,
    Change { value: String, checked: bool },
    Submit,
}

impl UiEvent {
    pub fn handler_prop(&self) -> &'static str {
        match self {
            UiEvent::Click => "onClick",
            UiEvent::Change { .. } => "onChange",
            UiEvent::Submit => "onSubmit",
        }
    }
}

impl UiElement {
    pub fn prop(&self, name: &str) -> Option<&Prop> {
        self.props.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// String form of a scalar prop.
    pub fn text_prop(&self, name: &str) -> Option<String> {
        match self.prop(name)? {
            Prop::Str(s) => Some(s.clone()),
            Prop::Num(n) => Some(super::value::number_to_string(*n)),
            Prop::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> bool {
        match self.prop(name) {
            Some(Prop::Bool(b)) => *b,
            Some(Prop::Str(s)) => s != "false",
            Some(Prop::Num(n)) => *n != 0.0,
            _ => false,
        }
    }

    pub fn handler(&self, name: &str) -> Option<HandlerId> {
        match self.prop(name)? {
            Prop::Handler(id) => Some(*id),
            _ => None,
        }
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        let class = match self.prop("className").or_else(|| self.prop("class")) {
            Some(Prop::Str(s)) => s.as_str(),
            _ => "",
        };
        class.split_whitespace()
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.children.iter().for_each(|c| c.collect_text(&mut out));
        out
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        match self.prop("style")? {
            Prop::Style(pairs) => pairs
                .iter()
                .find(|(k, _)| k == property)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

impl UiNode {
    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            UiNode::Text(t) => out.push_str(t),
            UiNode::Element(el) => el.children.iter().for_each(|c| c.collect_text(out)),
        }
    }

    /// Depth-first search for the first element matching `pred`.
    pub fn find(&self, pred: &dyn Fn(&UiElement) -> bool) -> Option<&UiElement> {
        match self {
            UiNode::Text(_) => None,
            UiNode::Element(el) if pred(el) => Some(el),
            UiNode::Element(el) => el.children.iter().find_map(|c| c.find(pred)),
        }
    }
}
