//! Runtime values of the artifact language.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;

use super::ast::FunctionDef;

/// Upper bound for strings and arrays built by the artifact, in bytes or
/// elements.
pub const MAX_BUILT_LEN: usize = 1 << 20;

/// Array/object nesting followed when flattening a value to text; deeper
/// levels (and self-references) print as empty.
const MAX_FLATTEN_DEPTH: usize = 32;

/// A value whose text form would pass [`MAX_BUILT_LEN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TooLarge;

/// Index of a scope in the interpreter's arena.
pub type ScopeId = usize;

pub type Array = Rc<RefCell<Vec<Value>>>;

/// Insertion-ordered property list.
pub type Object = Rc<RefCell<Vec<(Rc<str>, Value)>>>;

#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    Array(Array),
    Object(Object),
    Function(Rc<Closure>),
    Native(Rc<Native>),
    Element(Rc<Element>),
}

/// A user function together with the scope it closes over.
#[derive(Debug)]
pub struct Closure {
    pub def: Rc<FunctionDef>,
    pub scope: ScopeId,
    /// Render pass that created the closure; scopes of older passes are gone.
    pub generation: u64,
}

#[derive(Debug)]
pub enum Native {
    /// Global helper, named by its qualified path (`"Math.max"`).
    Builtin(&'static str),
    /// Method looked up on a primitive or array, bound to its receiver.
    Method { receiver: Value, name: Rc<str> },
    /// State setter returned by `useState`.
    Setter { path: Rc<str>, index: usize },
}

/// Result of evaluating JSX or `React.createElement`.
#[derive(Debug)]
pub struct Element {
    pub tag: ElementTag,
    pub props: Vec<(Rc<str>, Value)>,
    pub children: Vec<Value>,
}

#[derive(Debug)]
pub enum ElementTag {
    Fragment,
    Intrinsic(Rc<str>),
    Component(Value),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(s.into())
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Rc::new(RefCell::new(items)))
    }

    pub fn object(props: Vec<(Rc<str>, Value)>) -> Self {
        Value::Object(Rc::new(RefCell::new(props)))
    }

    pub fn builtin(name: &'static str) -> Self {
        Value::Native(Rc::new(Native::Builtin(name)))
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Native(_))
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Native(_) => "function",
            Value::Null | Value::Array(_) | Value::Object(_) | Value::Element(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Num(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Array(a) => {
                let a = a.borrow();
                match a.as_slice() {
                    [] => 0.0,
                    [only] => only.to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// `String(value)`.
    /// `String(value)`.
    ///
    /// Output is cut short once it passes [`MAX_BUILT_LEN`]; callers that
    /// build strings reject results longer than that.
    pub fn to_display(&self) -> String {
        let mut out = String::new();
        self.write_display(&mut out, 0);
        out
    }

    fn write_display(&self, out: &mut String, depth: usize) {
        if out.len() > MAX_BUILT_LEN {
            return;
        }
        match self {
            Value::Undefined => out.push_str("undefined"),
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Num(n) => out.push_str(&number_to_string(*n)),
            Value::Str(s) => out.push_str(s),
            Value::Array(a) => {
                if depth >= MAX_FLATTEN_DEPTH {
                    return;
                }
                for (i, v) in a.borrow().iter().enumerate() {
                    if out.len() > MAX_BUILT_LEN {
                        return;
                    }
                    if i > 0 {
                        out.push(',');
                    }
                    if !v.is_nullish() {
                        v.write_display(out, depth + 1);
                    }
                }
            }
            Value::Object(_) | Value::Element(_) => out.push_str("[object Object]"),
            Value::Function(c) => match &c.def.name {
                Some(name) => {
                    let _ = write!(out, "function {name}() {{ … }}");
                }
                None => out.push_str("() => { … }"),
            },
            Value::Native(_) => out.push_str("function () { [native code] }"),
        }
    }

    /// Own property lookup on objects.
    pub fn get_prop(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(o) => o
                .borrow()
                .iter()
                .find(|(k, _)| &**k == key)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Element(a), Value::Element(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Value::Num(_) | Value::Str(_) | Value::Bool(_), Value::Num(_) | Value::Str(_) | Value::Bool(_))
                if std::mem::discriminant(self) != std::mem::discriminant(other) =>
            {
                self.to_number() == other.to_number()
            }
            _ => self.strict_eq(other),
        }
    }

    /// Structure for `JSON.stringify`; `None` for values JSON omits.
    /// JSON form; `Ok(None)` for values `JSON.stringify` skips.
    pub fn to_json(&self) -> Result<Option<serde_json::Value>, TooLarge> {
        let mut budget = MAX_BUILT_LEN;
        self.json_within(&mut budget, 0)
    }

    /// `budget` counts roughly one byte per scalar plus string lengths.
    fn json_within(&self, budget: &mut usize, depth: usize) -> Result<Option<serde_json::Value>, TooLarge> {
        use serde_json::Value as J;
        let cost = match self {
            Value::Str(s) => s.len() + 2,
            _ => 1,
        };
        *budget = budget.checked_sub(cost).ok_or(TooLarge)?;
        if depth > MAX_FLATTEN_DEPTH {
            return Err(TooLarge);
        }
        Ok(Some(match self {
            Value::Undefined | Value::Function(_) | Value::Native(_) => return Ok(None),
            Value::Null => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Num(n) => number_to_json(*n),
            Value::Str(s) => J::String(s.to_string()),
            Value::Array(a) => {
                let mut items = Vec::new();
                for v in a.borrow().iter() {
                    items.push(v.json_within(budget, depth + 1)?.unwrap_or(J::Null));
                }
                J::Array(items)
            }
            Value::Object(o) => {
                let mut map = serde_json::Map::new();
                for (k, v) in o.borrow().iter() {
                    *budget = budget.checked_sub(k.len()).ok_or(TooLarge)?;
                    if let Some(j) = v.json_within(budget, depth + 1)? {
                        map.insert(k.to_string(), j);
                    }
                }
                J::Object(map)
            }
            Value::Element(_) => J::Object(serde_json::Map::new()),
        }))
    }

    /// Rendering used by captured `console.log` lines.
    pub fn inspect(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            Value::Array(_) | Value::Object(_) => match self.to_json() {
                Ok(json) => json.map(|j| j.to_string()).unwrap_or_default(),
                Err(TooLarge) => "[too large to print]".into(),
            },
            Value::Element(_) => "<element>".into(),
            other => other.to_display(),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |v| v as f64);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if t.contains(|c: char| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => t.parse().unwrap_or(f64::NAN),
    }
}

/// Number formatting as JavaScript's `String(n)` does it.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if n == 0.0 {
        return "0".into();
    }
    if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let mut s = String::new();
        let _ = write!(s, "{n:e}");
        // Rust writes `1e21` and `1e-7`; JavaScript writes `1e+21` and `1e-7`.
        if let Some(idx) = s.find('e') {
            if !s[idx + 1..].starts_with('-') {
                s.insert(idx + 1, '+');
            }
        }
        return s;
    }
    if n.fract() == 0.0 {
        return format!("{n:.0}");
    }
    n.to_string()
}
