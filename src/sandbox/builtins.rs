//! The capability surface of the sandbox.
//!
//! Artifacts see exactly the globals listed in [`GLOBALS`]: `React`'s hooks
//! and element factory plus pure helpers.  Nothing here can reach the file
//! system, the network, the clock or any host state; `console` output is
//! captured into the interpreter's log buffer.

use std::cmp::Ordering;
use std::rc::Rc;

use super::interp::{iterate, Eval, Interpreter, Interrupt, BYTES_PER_STEP};
use super::value::{
    number_to_string, Array, Element, ElementTag, Native, TooLarge, Value, MAX_BUILT_LEN,
};

/// Global names bound in every render pass.
const GLOBALS: &[&str] = &[
    "React", "Math", "JSON", "console", "Object", "Array", "String", "Number", "Boolean",
    "parseInt", "parseFloat", "isNaN", "isFinite", "Error", "TypeError",
];

/// Namespace members, addressed as `"Namespace.member"`.
const MEMBERS: &[&str] = &[
    "React.useState", "React.useEffect", "React.useRef", "React.useMemo", "React.useCallback",
    "React.createElement", "React.Fragment",
    "Math.abs", "Math.floor", "Math.ceil", "Math.round", "Math.trunc", "Math.sign", "Math.sqrt",
    "Math.cbrt", "Math.pow", "Math.min", "Math.max", "Math.random", "Math.hypot", "Math.log",
    "Math.exp", "Math.sin", "Math.cos", "Math.tan", "Math.atan2",
    "JSON.stringify", "JSON.parse",
    "console.log", "console.info", "console.warn", "console.error", "console.debug",
    "Object.keys", "Object.values", "Object.entries", "Object.assign", "Object.fromEntries",
    "Object.freeze",
    "Array.isArray", "Array.from", "Array.of",
    "Number.isInteger", "Number.isFinite", "Number.isNaN", "Number.parseFloat", "Number.parseInt",
];

const ARRAY_METHODS: &[&str] = &[
    "map", "filter", "forEach", "find", "findIndex", "some", "every", "reduce", "join", "includes",
    "indexOf", "lastIndexOf", "slice", "concat", "push", "pop", "shift", "unshift", "reverse", "sort",
    "at", "flat", "flatMap", "fill", "toString",
];

const STRING_METHODS: &[&str] = &[
    "trim", "trimStart", "trimEnd", "toUpperCase", "toLowerCase", "split", "includes",
    "startsWith", "endsWith", "slice", "substring", "replace", "replaceAll", "indexOf",
    "lastIndexOf", "charAt", "repeat", "padStart", "padEnd", "at", "concat", "toString",
];

const NUMBER_METHODS: &[&str] = &["toFixed", "toString", "toLocaleString", "toPrecision"];

pub(super) fn globals() -> Vec<(&'static str, Value)> {
    let mut out: Vec<(&'static str, Value)> =
        GLOBALS.iter().map(|name| (*name, Value::builtin(*name))).collect();
    out.push(("NaN", Value::Num(f64::NAN)));
    out.push(("Infinity", Value::Num(f64::INFINITY)));
    out
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An `Error`-shaped object.
pub(super) fn error_value(name: &str, message: &str) -> Value {
    Value::object(vec![
        ("name".into(), Value::str(name)),
        ("message".into(), Value::str(message)),
    ])
}

pub(super) fn type_error(message: &str) -> Interrupt {
    Interrupt::Throw(error_value("TypeError", message))
}

pub(super) fn range_error(message: &str) -> Interrupt {
    Interrupt::Throw(error_value("RangeError", message))
}

/// Wrap a freshly built string, rejecting it past [`MAX_BUILT_LEN`] bytes.
pub(super) fn checked_string(s: String) -> Eval<Value> {
    if s.len() > MAX_BUILT_LEN {
        return Err(range_error("Invalid string length"));
    }
    Ok(Value::Str(s.into()))
}

/// Array counterpart of [`checked_string`].
pub(super) fn checked_array(items: Vec<Value>) -> Eval<Value> {
    if items.len() > MAX_BUILT_LEN {
        return Err(range_error("Invalid array length"));
    }
    Ok(Value::array(items))
}

/// How an uncaught value reads in the error banner.
pub fn thrown_message(value: &Value) -> String {
    match value.get_prop("message") {
        Some(message) => {
            let name = value
                .get_prop("name")
                .filter(|n| !n.is_nullish())
                .map_or_else(|| "Error".to_string(), |n| n.to_display());
            format!("{name}: {}", message.to_display())
        }
        None => format!("Uncaught {}", value.inspect()),
    }
}

// ---------------------------------------------------------------------------
// Property access
// ---------------------------------------------------------------------------

fn array_index(key: &Value) -> Option<usize> {
    match key {
        Value::Num(n) if *n >= 0.0 && n.fract() == 0.0 => Some(*n as usize),
        Value::Str(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => s.parse().ok(),
        _ => None,
    }
}

fn method(receiver: &Value, name: &str, table: &[&str]) -> Value {
    if table.contains(&name) {
        Value::Native(Rc::new(Native::Method {
            receiver: receiver.clone(),
            name: name.into(),
        }))
    } else {
        Value::Undefined
    }
}

pub(super) fn get_member(obj: &Value, key: &Value) -> Eval<Value> {
    match obj {
        Value::Undefined | Value::Null => Err(type_error(&format!(
            "Cannot read properties of {} (reading '{}')",
            obj.to_display(),
            key.to_display()
        ))),
        Value::Object(_) => Ok(obj.get_prop(&key.to_display()).unwrap_or(Value::Undefined)),
        Value::Array(items) => {
            if let Some(i) = array_index(key) {
                return Ok(items.borrow().get(i).cloned().unwrap_or(Value::Undefined));
            }
            let name = key.to_display();
            if name == "length" {
                return Ok(Value::Num(items.borrow().len() as f64));
            }
            Ok(method(obj, &name, ARRAY_METHODS))
        }
        Value::Str(s) => {
            if let Some(i) = array_index(key) {
                return Ok(s
                    .chars()
                    .nth(i)
                    .map_or(Value::Undefined, |c| Value::Str(c.to_string().into())));
            }
            let name = key.to_display();
            if name == "length" {
                return Ok(Value::Num(s.chars().count() as f64));
            }
            Ok(method(obj, &name, STRING_METHODS))
        }
        Value::Num(_) => Ok(method(obj, &key.to_display(), NUMBER_METHODS)),
        Value::Element(el) => Ok(match &*key.to_display() {
            "props" => Value::object(el.props.clone()),
            "type" => match &el.tag {
                ElementTag::Intrinsic(t) => Value::Str(Rc::clone(t)),
                ElementTag::Component(c) => c.clone(),
                ElementTag::Fragment => Value::builtin("React.Fragment"),
            },
            "key" => el
                .props
                .iter()
                .find(|(k, _)| &**k == "key")
                .map_or(Value::Null, |(_, v)| v.clone()),
            _ => Value::Undefined,
        }),
        Value::Native(native) => match &**native {
            Native::Builtin(ns) => Ok(namespace_member(ns, &key.to_display())),
            _ => Ok(Value::Undefined),
        },
        Value::Bool(_) | Value::Function(_) => Ok(Value::Undefined),
    }
}

fn namespace_member(ns: &str, name: &str) -> Value {
    match (ns, name) {
        ("Math", "PI") => return Value::Num(std::f64::consts::PI),
        ("Math", "E") => return Value::Num(std::f64::consts::E),
        ("Number", "MAX_SAFE_INTEGER") => return Value::Num(9_007_199_254_740_991.0),
        ("Number", "MIN_SAFE_INTEGER") => return Value::Num(-9_007_199_254_740_991.0),
        ("Number", "EPSILON") => return Value::Num(f64::EPSILON),
        _ => {}
    }
    MEMBERS
        .iter()
        .find(|m| m.len() == ns.len() + 1 + name.len() && m.starts_with(ns) && m.ends_with(name))
        .filter(|m| m.as_bytes()[ns.len()] == b'.')
        .map_or(Value::Undefined, |m| Value::builtin(*m))
}

pub(super) fn set_member(obj: &Value, key: &Value, value: Value) -> Eval<()> {
    match obj {
        Value::Undefined | Value::Null => Err(type_error(&format!(
            "Cannot set properties of {} (setting '{}')",
            obj.to_display(),
            key.to_display()
        ))),
        Value::Object(o) => {
            let key: Rc<str> = key.to_display().into();
            let mut props = o.borrow_mut();
            match props.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => props.push((key, value)),
            }
            Ok(())
        }
        Value::Array(items) => {
            if let Some(i) = array_index(key) {
                let mut items = items.borrow_mut();
                if i >= MAX_BUILT_LEN {
                    return Err(range_error("Invalid array length"));
                }
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                }
                items[i] = value;
            } else if &*key.to_display() == "length" {
                let len = value.to_number();
                if !(0.0..MAX_BUILT_LEN as f64).contains(&len) || len.fract() != 0.0 {
                    return Err(range_error("Invalid array length"));
                }
                items.borrow_mut().resize(len as usize, Value::Undefined);
            }
            Ok(())
        }
        Value::Native(_) => Err(type_error(&format!(
            "Cannot assign to read only property '{}'",
            key.to_display()
        ))),
        // Writes to primitives are silently dropped.
        _ => Ok(()),
    }
}

/// Enumerable own `(key, value)` pairs, as used by spread and `Object.*`.
pub(super) fn own_entries(value: &Value) -> Vec<(Rc<str>, Value)> {
    match value {
        Value::Object(o) => o.borrow().clone(),
        Value::Array(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string().into(), v.clone()))
            .collect(),
        Value::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string().into(), Value::Str(c.to_string().into())))
            .collect(),
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

fn arg(args: &[Value], i: usize) -> Value {
    args.get(i).cloned().unwrap_or(Value::Undefined)
}

fn num_arg(args: &[Value], i: usize) -> f64 {
    args.get(i).map_or(f64::NAN, Value::to_number)
}

fn int_or(args: &[Value], i: usize, default: i64) -> i64 {
    match args.get(i) {
        None | Some(Value::Undefined) => default,
        Some(v) => {
            let n = v.to_number();
            if n.is_nan() {
                0
            } else {
                n.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64
            }
        }
    }
}

/// Resolve a possibly negative index against `len`, clamped to `0..=len`.
fn relative(index: i64, len: usize) -> usize {
    if index < 0 {
        len.saturating_sub(index.unsigned_abs() as usize)
    } else {
        (index as usize).min(len)
    }
}

impl Interpreter {
    pub(super) fn call_native(&mut self, native: &Native, args: Vec<Value>) -> Eval<Value> {
        let value = match native {
            Native::Builtin(name) => self.call_builtin(name, args)?,
            Native::Method { receiver, name } => match receiver {
                Value::Array(items) => {
                    // Methods start from a copy of the receiver.
                    let len = items.borrow().len();
                    self.burn(len / 8)?;
                    self.array_method(items, name, args)?
                }
                Value::Str(s) => {
                    self.burn(s.len() / BYTES_PER_STEP)?;
                    self.string_method(s, name, &args)?
                }
                Value::Num(n) => number_method(*n, name, &args)?,
                _ => Value::Undefined,
            },
            Native::Setter { path, index } => {
                self.set_state(path, *index, arg(&args, 0))?;
                Value::Undefined
            }
        };
        self.charge_built(&value)?;
        Ok(value)
    }

    fn call_builtin(&mut self, name: &str, args: Vec<Value>) -> Eval<Value> {
        let value = match name {
            "noop" => Value::Undefined,

            "React.useState" => return self.use_state(arg(&args, 0)),
            "React.useEffect" => return self.use_effect(arg(&args, 0), arg(&args, 1)),
            "React.useRef" => return self.use_ref(arg(&args, 0)),
            // Memoization is only an optimization; recomputing is always correct.
            "React.useMemo" => return self.call(&arg(&args, 0), Vec::new()),
            "React.useCallback" => arg(&args, 0),
            "React.createElement" => create_element(args),
            "React.Fragment" => arg(&args, 0).get_prop("children").unwrap_or(Value::Undefined),

            "Math.abs" => Value::Num(num_arg(&args, 0).abs()),
            "Math.floor" => Value::Num(num_arg(&args, 0).floor()),
            "Math.ceil" => Value::Num(num_arg(&args, 0).ceil()),
            "Math.round" => Value::Num((num_arg(&args, 0) + 0.5).floor()),
            "Math.trunc" => Value::Num(num_arg(&args, 0).trunc()),
            "Math.sign" => {
                let n = num_arg(&args, 0);
                Value::Num(if n == 0.0 || n.is_nan() { n } else { n.signum() })
            }
            "Math.sqrt" => Value::Num(num_arg(&args, 0).sqrt()),
            "Math.cbrt" => Value::Num(num_arg(&args, 0).cbrt()),
            "Math.pow" => Value::Num(num_arg(&args, 0).powf(num_arg(&args, 1))),
            "Math.log" => Value::Num(num_arg(&args, 0).ln()),
            "Math.exp" => Value::Num(num_arg(&args, 0).exp()),
            "Math.sin" => Value::Num(num_arg(&args, 0).sin()),
            "Math.cos" => Value::Num(num_arg(&args, 0).cos()),
            "Math.tan" => Value::Num(num_arg(&args, 0).tan()),
            "Math.atan2" => Value::Num(num_arg(&args, 0).atan2(num_arg(&args, 1))),
            "Math.hypot" => Value::Num(args.iter().map(|v| v.to_number().powi(2)).sum::<f64>().sqrt()),
            "Math.min" => Value::Num(args.iter().map(Value::to_number).fold(f64::INFINITY, |a, b| {
                if a.is_nan() || b.is_nan() { f64::NAN } else { a.min(b) }
            })),
            "Math.max" => Value::Num(args.iter().map(Value::to_number).fold(f64::NEG_INFINITY, |a, b| {
                if a.is_nan() || b.is_nan() { f64::NAN } else { a.max(b) }
            })),
            "Math.random" => Value::Num(self.next_random()),

            "JSON.stringify" => json_stringify(&args)?,
            "JSON.parse" => {
                let text = arg(&args, 0).to_display();
                let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                    Interrupt::Throw(error_value("SyntaxError", &format!("JSON.parse: {e}")))
                })?;
                from_json(&parsed)
            }

            "console.log" | "console.info" | "console.warn" | "console.error" | "console.debug" => {
                let line = args.iter().map(Value::inspect).collect::<Vec<_>>().join(" ");
                let level = &name["console.".len()..];
                self.log(if level == "log" { line } else { format!("[{level}] {line}") });
                Value::Undefined
            }

            "Object.keys" | "Object.values" | "Object.entries" => {
                let target = arg(&args, 0);
                if target.is_nullish() {
                    return Err(type_error("Cannot convert undefined or null to object"));
                }
                let entries = own_entries(&target);
                Value::array(
                    entries
                        .into_iter()
                        .map(|(k, v)| match name {
                            "Object.keys" => Value::Str(k),
                            "Object.values" => v,
                            _ => Value::array(vec![Value::Str(k), v]),
                        })
                        .collect(),
                )
            }
            "Object.assign" => {
                let target = arg(&args, 0);
                for source in args.iter().skip(1) {
                    for (k, v) in own_entries(source) {
                        set_member(&target, &Value::Str(k), v)?;
                    }
                }
                target
            }
            "Object.fromEntries" => {
                let mut props: Vec<(Rc<str>, Value)> = Vec::new();
                for pair in iterate(&arg(&args, 0))? {
                    let key: Rc<str> = get_member(&pair, &Value::Num(0.0))?.to_display().into();
                    let value = get_member(&pair, &Value::Num(1.0))?;
                    match props.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = value,
                        None => props.push((key, value)),
                    }
                }
                Value::object(props)
            }
            "Object.freeze" => arg(&args, 0),

            "Array.isArray" => Value::Bool(matches!(arg(&args, 0), Value::Array(_))),
            "Array.of" => Value::array(args),
            "Array.from" => return self.array_from(&args),

            "String" => match args.first() {
                None => Value::str(""),
                Some(v) => Value::Str(v.to_display().into()),
            },
            "Number" => Value::Num(args.first().map_or(0.0, Value::to_number)),
            "Boolean" => Value::Bool(arg(&args, 0).truthy()),
            "parseInt" | "Number.parseInt" => {
                Value::Num(parse_int(&arg(&args, 0).to_display(), int_or(&args, 1, 0)))
            }
            "parseFloat" | "Number.parseFloat" => Value::Num(parse_float(&arg(&args, 0).to_display())),
            "isNaN" => Value::Bool(num_arg(&args, 0).is_nan()),
            "isFinite" => Value::Bool(num_arg(&args, 0).is_finite()),
            "Number.isNaN" => Value::Bool(matches!(arg(&args, 0), Value::Num(n) if n.is_nan())),
            "Number.isFinite" => Value::Bool(matches!(arg(&args, 0), Value::Num(n) if n.is_finite())),
            "Number.isInteger" => {
                Value::Bool(matches!(arg(&args, 0), Value::Num(n) if n.is_finite() && n.fract() == 0.0))
            }
            "Error" | "TypeError" => {
                let message = match args.first() {
                    None | Some(Value::Undefined) => String::new(),
                    Some(v) => v.to_display(),
                };
                error_value(name, &message)
            }

            other => return Err(type_error(&format!("{other} is not a function"))),
        };
        Ok(value)
    }

    fn array_from(&mut self, args: &[Value]) -> Eval<Value> {
        let source = arg(args, 0);
        let items = match &source {
            Value::Array(_) | Value::Str(_) => iterate(&source)?,
            Value::Object(_) => {
                let len = source.get_prop("length").map_or(0.0, |v| v.to_number());
                if !(0.0..MAX_BUILT_LEN as f64).contains(&len) {
                    return Err(range_error("Invalid array length"));
                }
                (0..len as usize)
                    .map(|i| source.get_prop(&i.to_string()).unwrap_or(Value::Undefined))
                    .collect()
            }
            _ => Vec::new(),
        };
        let map = arg(args, 1);
        if !map.is_callable() {
            return Ok(Value::array(items));
        }
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            out.push(self.call(&map, vec![item, Value::Num(i as f64)])?);
        }
        Ok(Value::array(out))
    }

    // ---- arrays ---

    fn array_method(&mut self, array: &Array, name: &str, args: Vec<Value>) -> Eval<Value> {
        let receiver = Value::Array(Rc::clone(array));
        let items: Vec<Value> = array.borrow().clone();
        let f = arg(&args, 0);
        let each = |this: &mut Self, i: usize, item: &Value| -> Eval<Value> {
            this.call(&f, vec![item.clone(), Value::Num(i as f64), receiver.clone()])
        };

        let value = match name {
            "map" => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(each(self, i, item)?);
                }
                Value::array(out)
            }
            "flatMap" => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match each(self, i, item)? {
                        Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                        other => out.push(other),
                    }
                    if out.len() > MAX_BUILT_LEN {
                        break;
                    }
                }
                checked_array(out)?
            }
            "filter" => {
                let mut out = Vec::new();
                for (i, item) in items.iter().enumerate() {
                    if each(self, i, item)?.truthy() {
                        out.push(item.clone());
                    }
                }
                Value::array(out)
            }
            "forEach" => {
                for (i, item) in items.iter().enumerate() {
                    each(self, i, item)?;
                }
                Value::Undefined
            }
            "find" | "findIndex" => {
                let mut found = None;
                for (i, item) in items.iter().enumerate() {
                    if each(self, i, item)?.truthy() {
                        found = Some(i);
                        break;
                    }
                }
                match (name, found) {
                    ("find", Some(i)) => items[i].clone(),
                    ("find", None) => Value::Undefined,
                    (_, Some(i)) => Value::Num(i as f64),
                    (_, None) => Value::Num(-1.0),
                }
            }
            "some" => {
                let mut hit = false;
                for (i, item) in items.iter().enumerate() {
                    if each(self, i, item)?.truthy() {
                        hit = true;
                        break;
                    }
                }
                Value::Bool(hit)
            }
            "every" => {
                let mut all = true;
                for (i, item) in items.iter().enumerate() {
                    if !each(self, i, item)?.truthy() {
                        all = false;
                        break;
                    }
                }
                Value::Bool(all)
            }
            "reduce" => {
                let mut iter = items.iter().enumerate();
                let mut acc = match args.get(1) {
                    Some(initial) => initial.clone(),
                    None => match iter.next() {
                        Some((_, first)) => first.clone(),
                        None => return Err(type_error("Reduce of empty array with no initial value")),
                    },
                };
                for (i, item) in iter {
                    acc = self.call(
                        &f,
                        vec![acc, item.clone(), Value::Num(i as f64), receiver.clone()],
                    )?;
                }
                acc
            }
            "join" | "toString" => {
                let sep = match args.first() {
                    Some(v) if name == "join" && !matches!(v, Value::Undefined) => v.to_display(),
                    _ => ",".into(),
                };
                let mut joined = String::new();
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        joined.push_str(&sep);
                    }
                    if !v.is_nullish() {
                        joined.push_str(&v.to_display());
                    }
                    if joined.len() > MAX_BUILT_LEN {
                        break;
                    }
                }
                checked_string(joined)?
            }
            "includes" => Value::Bool(items.iter().any(|v| {
                v.strict_eq(&f) || matches!((v, &f), (Value::Num(a), Value::Num(b)) if a.is_nan() && b.is_nan())
            })),
            "indexOf" => Value::Num(
                items
                    .iter()
                    .position(|v| v.strict_eq(&f))
                    .map_or(-1.0, |i| i as f64),
            ),
            "lastIndexOf" => Value::Num(
                items
                    .iter()
                    .rposition(|v| v.strict_eq(&f))
                    .map_or(-1.0, |i| i as f64),
            ),
            "slice" => {
                let len = items.len();
                let start = relative(int_or(&args, 0, 0), len);
                let end = relative(int_or(&args, 1, len as i64), len);
                Value::array(items.get(start..end.max(start)).unwrap_or_default().to_vec())
            }
            "concat" => {
                let mut out = items;
                for a in &args {
                    match a {
                        Value::Array(more) => out.extend(more.borrow().iter().cloned()),
                        other => out.push(other.clone()),
                    }
                    if out.len() > MAX_BUILT_LEN {
                        break;
                    }
                }
                checked_array(out)?
            }
            "at" => {
                let i = int_or(&args, 0, 0);
                let idx = if i < 0 { items.len() as i64 + i } else { i };
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| items.get(i).cloned())
                    .unwrap_or(Value::Undefined)
            }
            "flat" => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Array(inner) => out.extend(inner.borrow().iter().cloned()),
                        other => out.push(other),
                    }
                    if out.len() > MAX_BUILT_LEN {
                        break;
                    }
                }
                checked_array(out)?
            }
            "push" => {
                let mut a = array.borrow_mut();
                if a.len() + args.len() > MAX_BUILT_LEN {
                    return Err(range_error("Invalid array length"));
                }
                a.extend(args);
                Value::Num(a.len() as f64)
            }
            "unshift" => {
                let mut a = array.borrow_mut();
                let tail = std::mem::replace(&mut *a, args);
                a.extend(tail);
                Value::Num(a.len() as f64)
            }
            "pop" => array.borrow_mut().pop().unwrap_or(Value::Undefined),
            "shift" => {
                let mut a = array.borrow_mut();
                if a.is_empty() {
                    Value::Undefined
                } else {
                    a.remove(0)
                }
            }
            "reverse" => {
                array.borrow_mut().reverse();
                receiver.clone()
            }
            "fill" => {
                let mut a = array.borrow_mut();
                let len = a.len();
                let start = relative(int_or(&args, 1, 0), len);
                let end = relative(int_or(&args, 2, len as i64), len);
                for slot in a.iter_mut().take(end).skip(start) {
                    *slot = f.clone();
                }
                receiver.clone()
            }
            "sort" => {
                let sorted = self.sort_values(items, &f)?;
                *array.borrow_mut() = sorted;
                receiver.clone()
            }
            _ => Value::Undefined,
        };
        Ok(value)
    }

    /// Stable merge sort with a fallible comparator.
    fn sort_values(&mut self, mut items: Vec<Value>, cmp: &Value) -> Eval<Vec<Value>> {
        if items.len() <= 1 {
            return Ok(items);
        }
        let right = items.split_off(items.len() / 2);
        let left = self.sort_values(items, cmp)?;
        let right = self.sort_values(right, cmp)?;

        let mut out = Vec::with_capacity(left.len() + right.len());
        let mut left = left.into_iter().peekable();
        let mut right = right.into_iter().peekable();
        while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
            let take_left = self.compare(l, r, cmp)? != Ordering::Greater;
            let next = if take_left { left.next() } else { right.next() };
            out.extend(next);
        }
        out.extend(left);
        out.extend(right);
        Ok(out)
    }

    fn compare(&mut self, a: &Value, b: &Value, cmp: &Value) -> Eval<Ordering> {
        self.tick()?;
        if !cmp.is_callable() {
            return Ok(match (a, b) {
                (Value::Undefined, Value::Undefined) => Ordering::Equal,
                (Value::Undefined, _) => Ordering::Greater,
                (_, Value::Undefined) => Ordering::Less,
                _ => a.to_display().cmp(&b.to_display()),
            });
        }
        let n = self.call(cmp, vec![a.clone(), b.clone()])?.to_number();
        Ok(n.partial_cmp(&0.0).unwrap_or(Ordering::Equal))
    }

    // ---- strings ---

    fn string_method(&mut self, s: &Rc<str>, name: &str, args: &[Value]) -> Eval<Value> {
        let text = |i: usize| arg(args, i).to_display();
        let chars = || s.chars().collect::<Vec<_>>();

        let value = match name {
            "trim" => Value::str(s.trim()),
            "trimStart" => Value::str(s.trim_start()),
            "trimEnd" => Value::str(s.trim_end()),
            "toUpperCase" => Value::Str(s.to_uppercase().into()),
            "toLowerCase" => Value::Str(s.to_lowercase().into()),
            "toString" => Value::Str(Rc::clone(s)),
            "includes" => Value::Bool(s.contains(&*text(0))),
            "startsWith" => Value::Bool(s.starts_with(&*text(0))),
            "endsWith" => Value::Bool(s.ends_with(&*text(0))),
            "indexOf" => Value::Num(char_offset(s, s.find(&*text(0)))),
            "lastIndexOf" => Value::Num(char_offset(s, s.rfind(&*text(0)))),
            "charAt" => {
                let i = int_or(args, 0, 0);
                let c = usize::try_from(i).ok().and_then(|i| s.chars().nth(i));
                Value::Str(c.map(String::from).unwrap_or_default().into())
            }
            "at" => {
                let cs = chars();
                let i = int_or(args, 0, 0);
                let idx = if i < 0 { cs.len() as i64 + i } else { i };
                usize::try_from(idx)
                    .ok()
                    .and_then(|i| cs.get(i))
                    .map_or(Value::Undefined, |c| Value::Str(c.to_string().into()))
            }
            "slice" | "substring" => {
                let cs = chars();
                let len = cs.len();
                let (mut start, mut end) = if name == "slice" {
                    (relative(int_or(args, 0, 0), len), relative(int_or(args, 1, len as i64), len))
                } else {
                    let clamp = |v: i64| v.clamp(0, len as i64) as usize;
                    (clamp(int_or(args, 0, 0)), clamp(int_or(args, 1, len as i64)))
                };
                if name == "substring" && start > end {
                    std::mem::swap(&mut start, &mut end);
                }
                let out: String = cs.get(start..end.max(start)).unwrap_or_default().iter().collect();
                Value::Str(out.into())
            }
            "split" => {
                let parts: Vec<Value> = match args.first() {
                    None | Some(Value::Undefined) => vec![Value::Str(Rc::clone(s))],
                    Some(sep) => {
                        let sep = sep.to_display();
                        if sep.is_empty() {
                            s.chars().map(|c| Value::Str(c.to_string().into())).collect()
                        } else {
                            s.split(&*sep).map(Value::str).collect()
                        }
                    }
                };
                let limit = int_or(args, 1, parts.len() as i64).max(0) as usize;
                Value::array(parts.into_iter().take(limit).collect())
            }
            "replace" | "replaceAll" => {
                let pattern = text(0);
                let replacement = arg(args, 1);
                let mut out = String::with_capacity(s.len());
                let mut rest: &str = s;
                while let Some(pos) = rest.find(&*pattern) {
                    out.push_str(&rest[..pos]);
                    let piece = if replacement.is_callable() {
                        self.call(&replacement, vec![Value::str(&pattern)])?.to_display()
                    } else {
                        replacement.to_display()
                    };
                    out.push_str(&piece);
                    if out.len() > MAX_BUILT_LEN {
                        return Err(range_error("Invalid string length"));
                    }
                    rest = &rest[pos + pattern.len()..];
                    if name == "replace" || pattern.is_empty() {
                        break;
                    }
                }
                out.push_str(rest);
                checked_string(out)?
            }
            "repeat" => {
                let n = int_or(args, 0, 0);
                if n < 0 || (n as usize).saturating_mul(s.len()) > MAX_BUILT_LEN {
                    return Err(range_error("Invalid count value"));
                }
                Value::Str(s.repeat(n as usize).into())
            }
            "padStart" | "padEnd" => {
                let target = int_or(args, 0, 0).max(0) as usize;
                if target > MAX_BUILT_LEN {
                    return Err(range_error("Invalid string length"));
                }
                let fill = match args.get(1) {
                    None | Some(Value::Undefined) => " ".to_string(),
                    Some(v) => v.to_display(),
                };
                let len = s.chars().count();
                if target <= len || fill.is_empty() {
                    Value::Str(Rc::clone(s))
                } else {
                    let pad: String = fill.chars().cycle().take(target - len).collect();
                    let out = if name == "padStart" {
                        format!("{pad}{s}")
                    } else {
                        format!("{s}{pad}")
                    };
                    Value::Str(out.into())
                }
            }
            "concat" => {
                let mut out = s.to_string();
                for a in args {
                    out.push_str(&a.to_display());
                    if out.len() > MAX_BUILT_LEN {
                        break;
                    }
                }
                checked_string(out)?
            }
            _ => Value::Undefined,
        };
        Ok(value)
    }
}

fn char_offset(s: &str, byte: Option<usize>) -> f64 {
    byte.map_or(-1.0, |b| s[..b].chars().count() as f64)
}

// ---------------------------------------------------------------------------
// Numbers
// ---------------------------------------------------------------------------

fn number_method(n: f64, name: &str, args: &[Value]) -> Eval<Value> {
    let value = match name {
        "toFixed" => {
            let digits = int_or(args, 0, 0);
            if !(0..=100).contains(&digits) {
                return Err(range_error("toFixed() digits argument must be between 0 and 100"));
            }
            if !n.is_finite() || n.abs() >= 1e21 {
                Value::Str(number_to_string(n).into())
            } else {
                Value::Str(format!("{:.*}", digits as usize, n).into())
            }
        }
        "toPrecision" => match args.first() {
            None | Some(Value::Undefined) => Value::Str(number_to_string(n).into()),
            Some(_) => {
                let p = int_or(args, 0, 1);
                if !(1..=100).contains(&p) {
                    return Err(range_error("toPrecision() argument must be between 1 and 100"));
                }
                if n == 0.0 || !n.is_finite() {
                    Value::Str(number_to_string(n).into())
                } else {
                    let magnitude = n.abs().log10().floor() as i64;
                    let decimals = (p - 1 - magnitude).max(0) as usize;
                    Value::Str(format!("{n:.decimals$}").into())
                }
            }
        },
        "toString" => {
            let radix = int_or(args, 0, 10);
            if !(2..=36).contains(&radix) {
                return Err(range_error("toString() radix must be between 2 and 36"));
            }
            if radix == 10 || n.fract() != 0.0 || !n.is_finite() {
                Value::Str(number_to_string(n).into())
            } else {
                Value::Str(integer_to_radix(n, radix as u32).into())
            }
        }
        "toLocaleString" => Value::Str(locale_string(n).into()),
        _ => Value::Undefined,
    };
    Ok(value)
}

fn integer_to_radix(n: f64, radix: u32) -> String {
    let mut v = n.abs() as u64;
    if v == 0 {
        return "0".into();
    }
    let mut digits = Vec::new();
    while v > 0 {
        let d = (v % u64::from(radix)) as u32;
        digits.push(std::char::from_digit(d, radix).unwrap_or('?'));
        v /= u64::from(radix);
    }
    if n < 0.0 {
        digits.push('-');
    }
    digits.iter().rev().collect()
}

/// `en-US` grouping with at most three fraction digits.
fn locale_string(n: f64) -> String {
    if !n.is_finite() {
        return number_to_string(n);
    }
    let fixed = format!("{:.3}", n.abs());
    let (int_part, frac) = fixed.split_once('.').unwrap_or((&fixed, ""));
    let frac = frac.trim_end_matches('0');
    let mut grouped = String::new();
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if n < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') { "-" } else { "" };
    if frac.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac}")
    }
}

fn parse_int(text: &str, radix: i64) -> f64 {
    let t = text.trim_start();
    let (negative, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let (radix, t) = match (radix, t.strip_prefix("0x").or_else(|| t.strip_prefix("0X"))) {
        (0 | 16, Some(hex)) => (16, hex),
        (0, None) => (10, t),
        (r, _) if (2..=36).contains(&r) => (r as u32, t),
        _ => return f64::NAN,
    };
    let digits: String = t.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let value = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    if negative {
        -value
    } else {
        value
    }
}

fn parse_float(text: &str) -> f64 {
    let t = text.trim_start();
    let bytes = t.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    if t[end..].starts_with("Infinity") {
        return if t.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'.' if !seen_dot => seen_dot = true,
            _ => break,
        }
        end += 1;
    }
    if seen_digit && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut j = end + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            end = j;
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    t[..end].parse().unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// JSON and elements
// ---------------------------------------------------------------------------

fn json_stringify(args: &[Value]) -> Eval<Value> {
    let json = match arg(args, 0).to_json() {
        Ok(Some(json)) => json,
        Ok(None) => return Ok(Value::Undefined),
        Err(TooLarge) => return Err(range_error("Invalid string length")),
    };
    let pretty = match args.get(2) {
        Some(Value::Num(n)) => *n >= 1.0,
        Some(Value::Str(s)) => !s.is_empty(),
        _ => false,
    };
    let text = if pretty {
        serde_json::to_string_pretty(&json)
    } else {
        serde_json::to_string(&json)
    };
    match text {
        Ok(t) => checked_string(t),
        Err(_) => Ok(Value::Undefined),
    }
}

fn from_json(json: &serde_json::Value) -> Value {
    use serde_json::Value as J;
    match json {
        J::Null => Value::Null,
        J::Bool(b) => Value::Bool(*b),
        J::Number(n) => Value::Num(n.as_f64().unwrap_or(f64::NAN)),
        J::String(s) => Value::str(s),
        J::Array(items) => Value::array(items.iter().map(from_json).collect()),
        J::Object(map) => Value::object(
            map.iter()
                .map(|(k, v)| (Rc::from(k.as_str()), from_json(v)))
                .collect(),
        ),
    }
}

/// `React.createElement(type, props, ...children)`.
fn create_element(args: Vec<Value>) -> Value {
    let mut args = args.into_iter();
    let kind = args.next().unwrap_or(Value::Undefined);
    let props = args.next().map(|p| own_entries(&p)).unwrap_or_default();
    let children: Vec<Value> = args.collect();

    let tag = match kind {
        Value::Str(name) => ElementTag::Intrinsic(name),
        Value::Native(ref n) if matches!(&**n, Native::Builtin("React.Fragment")) => ElementTag::Fragment,
        other => ElementTag::Component(other),
    };
    Value::Element(Rc::new(Element {
        tag,
        props,
        children,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::parser::parse_program;
    use crate::sandbox::tree::UiNode;

    /// Text rendered by `render() { return <p>{EXPR}</p>; }`.
    fn eval(expr: &str) -> String {
        let src = format!("function render() {{ return <p>{{{expr}}}</p>; }}");
        let mut it = Interpreter::new(parse_program(&src).unwrap());
        match it.render() {
            Ok(tree) => tree.iter().map(UiNode::text_content).collect(),
            Err(Interrupt::Throw(v)) => format!("threw {}", thrown_message(&v)),
            Err(Interrupt::Limit(m)) => format!("limit {m}"),
        }
    }

    #[test]
    fn array_helpers() {
        assert_eq!(eval("[1, 2, 3].reduce((a, b) => a + b, 0)"), "6");
        assert_eq!(eval("[3, 1, 2].sort().join()"), "1,2,3");
        assert_eq!(eval("[10, 9, 1].sort((a, b) => a - b).join(' ')"), "1 9 10");
        assert_eq!(eval("[1, 2, 3].find(n => n > 1)"), "2");
        assert_eq!(eval("[1, 2, 3].findIndex(n => n > 5)"), "-1");
        assert_eq!(eval("[1, 2, 3].some(n => n > 2) && [1, 2].every(n => n > 0) ? 'y' : 'n'"), "y");
        assert_eq!(eval("[1, 2, 3, 4].slice(-2).concat([5], 6).join()"), "3,4,5,6");
        assert_eq!(eval("[1, [2, 3]].flat().length"), "3");
        assert_eq!(eval("['a', 'b'].includes('b') ? 1 : 0"), "1");
        assert_eq!(eval("[].reduce((a, b) => a + b)"), "threw TypeError: Reduce of empty array with no initial value");
    }

    #[test]
    fn push_mutates_in_place() {
        assert_eq!(eval("(() => { const a = [1]; a.push(2, 3); return a.length; })()"), "3");
    }

    #[test]
    fn string_helpers() {
        assert_eq!(eval("'  Hi  '.trim().toUpperCase()"), "HI");
        assert_eq!(eval("'a,b,c'.split(',').length"), "3");
        assert_eq!(eval("'hello'.startsWith('he') && 'hello'.includes('ll') ? 'y' : 'n'"), "y");
        assert_eq!(eval("'hello'.slice(1, -1)"), "ell");
        assert_eq!(eval("'a-b-c'.replace('-', '+')"), "a+b-c");
        assert_eq!(eval("'a-b-c'.replaceAll('-', '+')"), "a+b+c");
        assert_eq!(eval("'5'.padStart(3, '0')"), "005");
        assert_eq!(eval("'héllo'.length"), "5");
    }

    #[test]
    fn number_helpers() {
        assert_eq!(eval("(3.14159).toFixed(2)"), "3.14");
        assert_eq!(eval("(255).toString(16)"), "ff");
        assert_eq!(eval("(1234567.891).toLocaleString()"), "1,234,567.891");
        assert_eq!(eval("Math.max(1, 5, 3) + Math.round(2.5)"), "8");
        assert_eq!(eval("parseInt('42px') + parseFloat('1.5e1x')"), "57");
        assert_eq!(eval("Number('abc')"), "NaN");
    }

    #[test]
    fn json_and_object_helpers() {
        assert_eq!(eval("JSON.stringify({ a: [1, 'x'], b: null, c: undefined })"), r#"{"a":[1,"x"],"b":null}"#);
        assert_eq!(eval("JSON.parse('{\"n\": 2}').n"), "2");
        assert_eq!(eval("Object.keys({ b: 1, a: 2 }).join()"), "b,a");
        assert_eq!(eval("Object.entries({ a: 1 })[0].join('=')"), "a=1");
        assert_eq!(eval("Array.from({ length: 3 }, (_, i) => i * 2).join()"), "0,2,4");
    }

    #[test]
    fn create_element_matches_jsx() {
        assert_eq!(eval("React.createElement('b', null, 'bold', ' ', 1)"), "bold 1");
        assert_eq!(
            eval("React.createElement(React.Fragment, null, React.createElement('i', { key: 1 }, 'x'))"),
            "x"
        );
    }

    #[test]
    fn namespaces_are_not_callable() {
        assert_eq!(eval("Math()"), "threw TypeError: Math is not a function");
    }

    #[test]
    fn builtins_are_read_only() {
        assert_eq!(
            eval("(() => { Math.max = () => 0; return 1; })()"),
            "threw TypeError: Cannot assign to read only property 'max'"
        );
    }

    #[test]
    fn thrown_values_render_like_errors() {
        assert_eq!(thrown_message(&error_value("RangeError", "bad")), "RangeError: bad");
        assert_eq!(thrown_message(&Value::str("oops")), "Uncaught oops");
    }
}
