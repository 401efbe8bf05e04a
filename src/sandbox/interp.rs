//! Tree-walking interpreter for generated artifacts.
//!
//! Every render pass starts from a clean scope arena: the program is
//! re-executed, `render` is resolved as the root component and the resulting
//! element tree is flattened into [`UiNode`]s.  Only hook slots survive
//! between passes, keyed by component path and call order.
//!
//! Closures refer to scopes by index, so a closure and the scope that holds
//! it never form an `Rc` cycle.  Scopes from an older pass are dropped as a
//! whole; a closure that outlives its pass (for example one stored in state)
//! reports an error instead of reading the wrong scope.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use super::ast::*;
use super::builtins::{self, checked_string, error_value, type_error};
use super::tree::{HandlerId, Prop, UiElement, UiEvent, UiNode};
use super::value::{Closure, Element, ElementTag, Native, ScopeId, Value, MAX_BUILT_LEN};

/// Evaluation steps allowed per render or event.
pub const FUEL_PER_RUN: u64 = 1_000_000;

/// Bytes of built string one evaluation step pays for.
pub(super) const BYTES_PER_STEP: usize = 64;

/// Nested user function calls allowed at once.
pub const MAX_CALL_DEPTH: usize = 64;

/// Nested expression, statement and element evaluations allowed at once,
/// across all user calls.
const MAX_EVAL_NESTING: usize = 1024;

/// Native stack one run may use below its entry point.  The interpreter runs
/// on the UI thread, whose stack can be as small as 1 MiB.
const MAX_STACK_BYTES: usize = 512 * 1024;

/// Renders triggered by state updates during render or effects.
const MAX_RENDER_PASSES: usize = 10;

const MAX_LOG_LINES: usize = 200;

/// Bytes of text, prop values and element paths one render may hand to the
/// host.
const MAX_TREE_BYTES: usize = 16 * MAX_BUILT_LEN;

const GLOBAL_SCOPE: ScopeId = 0;

/// Why evaluation stopped early.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// A value thrown by the artifact or by a failing operation.
    Throw(Value),
    /// A resource limit was hit.
    Limit(String),
}

pub type Eval<T> = Result<T, Interrupt>;

enum Flow {
    Normal,
    Return(Value),
}

struct Binding {
    value: Value,
    mutable: bool,
}

struct Scope {
    vars: HashMap<Rc<str>, Binding>,
    parent: Option<ScopeId>,
}

enum HookSlot {
    State(Value),
    Ref(Value),
    Effect { deps: Option<Vec<Value>> },
}

struct HookFrame {
    path: Rc<str>,
    next: usize,
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

pub struct Interpreter {
    program: Vec<Stmt>,
    scopes: Vec<Scope>,
    generation: u64,
    fuel: u64,
    depth: usize,
    hooks: HashMap<Rc<str>, Vec<HookSlot>>,
    rendered: HashSet<Rc<str>>,
    frame: Option<HookFrame>,
    effects: Vec<Value>,
    handlers: Vec<Value>,
    logs: Vec<String>,
    dirty: bool,
    rng: u64,
    tree_bytes: usize,
    nesting: usize,
    stack_base: usize,
}

impl Interpreter {
    pub fn new(program: Vec<Stmt>) -> Self {
        Self {
            program,
            scopes: Vec::new(),
            generation: 0,
            fuel: FUEL_PER_RUN,
            depth: 0,
            hooks: HashMap::new(),
            rendered: HashSet::new(),
            frame: None,
            effects: Vec::new(),
            handlers: Vec::new(),
            logs: Vec::new(),
            dirty: false,
            rng: 0x2545_f491_4f6c_dd1d,
            tree_bytes: 0,
            nesting: 0,
            stack_base: 0,
        }
    }

    /// Lines written through `console.*`, oldest first.
    pub fn logs(&self) -> &[String] {
        &self.logs
    }

    /// Render until state settles and return the tree.
    pub fn render(&mut self) -> Eval<Vec<UiNode>> {
        self.begin_run();
        for _ in 0..MAX_RENDER_PASSES {
            let tree = self.render_pass()?;
            self.run_effects()?;
            if !self.dirty {
                return Ok(tree);
            }
        }
        Err(Interrupt::Limit(
            "Too many re-renders. State kept changing on every render.".into(),
        ))
    }

    /// Invoke a handler from the most recent render pass.
    ///
    /// Returns `false` when the handler no longer exists.
    pub fn dispatch(&mut self, handler: HandlerId, event: &UiEvent) -> Eval<bool> {
        let Some(callback) = self.handlers.get(handler).cloned() else {
            return Ok(false);
        };
        self.begin_run();
        self.depth = 0;
        self.frame = None;
        self.call(&callback, vec![event_object(event)])?;
        Ok(true)
    }

    fn render_pass(&mut self) -> Eval<Vec<UiNode>> {
        self.generation += 1;
        self.scopes.clear();
        self.handlers.clear();
        self.rendered.clear();
        self.effects.clear();
        self.frame = None;
        self.depth = 0;
        self.dirty = false;
        self.tree_bytes = 0;

        self.scopes.push(Scope {
            vars: HashMap::new(),
            parent: None,
        });
        for (name, value) in builtins::globals() {
            self.declare(GLOBAL_SCOPE, name.into(), value, false);
        }
        let program_scope = self.new_scope(GLOBAL_SCOPE);

        let program = std::mem::take(&mut self.program);
        let result = self.exec_block(&program, program_scope);
        self.program = program;
        if let Flow::Return(_) = result? {
            return Err(Interrupt::Throw(error_value(
                "SyntaxError",
                "Illegal return statement",
            )));
        }

        let root = match self.find(program_scope, "render") {
            Some(f) if f.is_callable() => f,
            _ => {
                return Err(Interrupt::Throw(error_value(
                    "ReferenceError",
                    "render is not defined; the artifact must declare function render()",
                )))
            }
        };
        let root = Value::Element(Rc::new(Element {
            tag: ElementTag::Component(root),
            props: Vec::new(),
            children: Vec::new(),
        }));

        let mut tree = Vec::new();
        self.resolve(&root, "root", &mut tree)?;

        let rendered = std::mem::take(&mut self.rendered);
        self.hooks.retain(|path, _| rendered.contains(path));
        self.rendered = rendered;
        Ok(tree)
    }

    fn run_effects(&mut self) -> Eval<()> {
        for effect in std::mem::take(&mut self.effects) {
            self.call(&effect, Vec::new())?;
        }
        Ok(())
    }

    // ---- bookkeeping ---

    fn begin_run(&mut self) {
        self.fuel = FUEL_PER_RUN;
        self.nesting = 0;
        self.stack_base = stack_address();
    }

    /// Guard one level of evaluator recursion; pair with `self.nesting -= 1`.
    fn enter(&mut self) -> Eval<()> {
        let used = self.stack_base.abs_diff(stack_address());
        if self.nesting >= MAX_EVAL_NESTING || used > MAX_STACK_BYTES {
            return Err(Interrupt::Limit(
                "Maximum call stack size exceeded".into(),
            ));
        }
        self.nesting += 1;
        Ok(())
    }

    pub(super) fn tick(&mut self) -> Eval<()> {
        self.burn(1)
    }

    /// Spend `steps` of fuel at once, for work proportional to data size.
    pub(super) fn burn(&mut self, steps: usize) -> Eval<()> {
        match self.fuel.checked_sub(steps as u64) {
            Some(left) => {
                self.fuel = left;
                Ok(())
            }
            None => {
                self.fuel = 0;
                Err(Interrupt::Limit(
                    "Evaluation budget exhausted; the component does too much work or never finishes."
                        .into(),
                ))
            }
        }
    }

    /// Pay for a freshly built string or array by its size.
    pub(super) fn charge_built(&mut self, value: &Value) -> Eval<()> {
        match value {
            Value::Str(s) => self.burn(s.len() / BYTES_PER_STEP),
            Value::Array(a) => {
                let len = a.borrow().len();
                self.burn(len)
            }
            _ => Ok(()),
        }
    }

    pub(super) fn log(&mut self, line: String) {
        if self.logs.len() == MAX_LOG_LINES {
            self.logs.remove(0);
        }
        self.logs.push(line);
    }

    /// xorshift64*; `Math.random` needs no real entropy.
    pub(super) fn next_random(&mut self) -> f64 {
        self.rng ^= self.rng >> 12;
        self.rng ^= self.rng << 25;
        self.rng ^= self.rng >> 27;
        let bits = self.rng.wrapping_mul(0x2545_f491_4f6c_dd1d) >> 11;
        bits as f64 / (1u64 << 53) as f64
    }

    // ---- scopes ---

    fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
        self.scopes.push(Scope {
            vars: HashMap::new(),
            parent: Some(parent),
        });
        self.scopes.len() - 1
    }

    fn declare(&mut self, scope: ScopeId, name: Rc<str>, value: Value, mutable: bool) {
        self.scopes[scope].vars.insert(name, Binding { value, mutable });
    }

    fn find(&self, scope: ScopeId, name: &str) -> Option<Value> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let s = &self.scopes[id];
            if let Some(b) = s.vars.get(name) {
                return Some(b.value.clone());
            }
            cursor = s.parent;
        }
        None
    }

    fn lookup(&self, scope: ScopeId, name: &str) -> Eval<Value> {
        self.find(scope, name).ok_or_else(|| {
            Interrupt::Throw(error_value("ReferenceError", &format!("{name} is not defined")))
        })
    }

    fn assign_var(&mut self, scope: ScopeId, name: &str, value: Value) -> Eval<()> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            let s = &mut self.scopes[id];
            if let Some(b) = s.vars.get_mut(name) {
                if !b.mutable {
                    return Err(type_error("Assignment to constant variable."));
                }
                b.value = value;
                return Ok(());
            }
            cursor = s.parent;
        }
        Err(Interrupt::Throw(error_value(
            "ReferenceError",
            &format!("{name} is not defined"),
        )))
    }

    fn closure(&self, def: &Rc<FunctionDef>, scope: ScopeId) -> Value {
        Value::Function(Rc::new(Closure {
            def: Rc::clone(def),
            scope,
            generation: self.generation,
        }))
    }

    // ---- statements ---

    fn exec_block(&mut self, stmts: &[Stmt], scope: ScopeId) -> Eval<Flow> {
        for stmt in stmts {
            if let Stmt::Function(def) = stmt {
                if let Some(name) = &def.name {
                    let f = self.closure(def, scope);
                    self.declare(scope, Rc::clone(name), f, true);
                }
            }
        }
        for stmt in stmts {
            if let Flow::Return(v) = self.exec(stmt, scope)? {
                return Ok(Flow::Return(v));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt, scope: ScopeId) -> Eval<Flow> {
        self.enter()?;
        let flow = self.exec_stmt(stmt, scope);
        self.nesting -= 1;
        flow
    }

    fn exec_stmt(&mut self, stmt: &Stmt, scope: ScopeId) -> Eval<Flow> {
        self.tick()?;
        match stmt {
            Stmt::Function(_) | Stmt::Empty => {}
            Stmt::Declare { mutable, decls } => {
                for (pattern, init) in decls {
                    let value = match init {
                        Some(e) => self.eval(e, scope)?,
                        None => Value::Undefined,
                    };
                    self.bind_pattern(pattern, value, scope, *mutable)?;
                }
            }
            Stmt::Return(value) => {
                let v = match value {
                    Some(e) => self.eval(e, scope)?,
                    None => Value::Undefined,
                };
                return Ok(Flow::Return(v));
            }
            Stmt::Throw(e) => return Err(Interrupt::Throw(self.eval(e, scope)?)),
            Stmt::If {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, scope)?.truthy() {
                    return self.exec(then, scope);
                } else if let Some(otherwise) = otherwise {
                    return self.exec(otherwise, scope);
                }
            }
            Stmt::Block(stmts) => {
                let inner = self.new_scope(scope);
                return self.exec_block(stmts, inner);
            }
            Stmt::ForOf {
                mutable,
                pattern,
                iter,
                body,
            } => {
                let iterable = self.eval(iter, scope)?;
                for item in iterate(&iterable)? {
                    let inner = self.new_scope(scope);
                    self.bind_pattern(pattern, item, inner, *mutable)?;
                    if let Flow::Return(v) = self.exec(body, inner)? {
                        return Ok(Flow::Return(v));
                    }
                }
            }
            Stmt::Expr(e) => {
                self.eval(e, scope)?;
            }
        }
        Ok(Flow::Normal)
    }

    fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        scope: ScopeId,
        mutable: bool,
    ) -> Eval<()> {
        match pattern {
            Pattern::Ident(name) => self.declare(scope, Rc::clone(name), value, mutable),
            Pattern::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(type_error(&format!(
                        "Cannot destructure '{}' as it is {}.",
                        value.to_display(),
                        value.to_display()
                    )));
                }
                for prop in props {
                    let mut v = builtins::get_member(&value, &Value::Str(Rc::clone(&prop.key)))?;
                    if let (Value::Undefined, Some(default)) = (&v, &prop.default) {
                        v = self.eval(default, scope)?;
                    }
                    self.bind_pattern(&prop.value, v, scope, mutable)?;
                }
                if let Some(rest) = rest {
                    let remaining = match &value {
                        Value::Object(o) => o
                            .borrow()
                            .iter()
                            .filter(|(k, _)| !props.iter().any(|p| p.key == *k))
                            .cloned()
                            .collect(),
                        _ => Vec::new(),
                    };
                    self.declare(scope, Rc::clone(rest), Value::object(remaining), mutable);
                }
            }
            Pattern::Array { items } => {
                let list = iterate(&value)?;
                for (i, item) in items.iter().enumerate() {
                    let Some(param) = item else { continue };
                    let v = if param.rest {
                        Value::array(list.get(i..).map(<[Value]>::to_vec).unwrap_or_default())
                    } else {
                        list.get(i).cloned().unwrap_or(Value::Undefined)
                    };
                    self.bind_param(param, v, scope, mutable)?;
                }
            }
        }
        Ok(())
    }

    fn bind_param(&mut self, param: &Param, value: Value, scope: ScopeId, mutable: bool) -> Eval<()> {
        let value = match (&value, &param.default) {
            (Value::Undefined, Some(default)) => self.eval(default, scope)?,
            _ => value,
        };
        self.bind_pattern(&param.pattern, value, scope, mutable)
    }

    // ---- calls ---

    pub(super) fn call(&mut self, callee: &Value, args: Vec<Value>) -> Eval<Value> {
        match callee {
            Value::Function(closure) => self.call_closure(closure, args),
            Value::Native(native) => self.call_native(native, args),
            other => Err(type_error(&format!("{} is not a function", other.to_display()))),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Eval<Value> {
        if closure.generation != self.generation {
            return Err(type_error(
                "This function belongs to an earlier render and can no longer be called",
            ));
        }
        if self.depth >= MAX_CALL_DEPTH {
            return Err(Interrupt::Limit(
                "Maximum call stack size exceeded".into(),
            ));
        }
        self.tick()?;
        self.depth += 1;
        let result = self.invoke(closure, args);
        self.depth -= 1;
        result
    }

    fn invoke(&mut self, closure: &Closure, args: Vec<Value>) -> Eval<Value> {
        let scope = self.new_scope(closure.scope);
        let def = Rc::clone(&closure.def);
        let mut args = args.into_iter();
        for param in &def.params {
            let value = if param.rest {
                Value::array(args.by_ref().collect())
            } else {
                args.next().unwrap_or(Value::Undefined)
            };
            self.bind_param(param, value, scope, true)?;
        }
        match &def.body {
            FnBody::Expr(e) => self.eval(e, scope),
            FnBody::Block(stmts) => match self.exec_block(stmts, scope)? {
                Flow::Return(v) => Ok(v),
                Flow::Normal => Ok(Value::Undefined),
            },
        }
    }

    // ---- expressions ---

    fn eval(&mut self, expr: &Expr, scope: ScopeId) -> Eval<Value> {
        self.enter()?;
        let value = self.eval_expr(expr, scope);
        self.nesting -= 1;
        value
    }

    fn eval_expr(&mut self, expr: &Expr, scope: ScopeId) -> Eval<Value> {
        self.tick()?;
        match expr {
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Str(s) => Ok(Value::Str(Rc::clone(s))),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Template(parts) => self.eval_template(parts, scope),
            Expr::Ident(name) => self.lookup(scope, name),
            Expr::Array(items) => Ok(Value::array(self.eval_list(items, scope)?)),
            Expr::Object(items) => self.eval_object(items, scope),
            Expr::Function(def) => Ok(self.closure(def, scope)),
            Expr::Unary(op, operand) => self.eval_unary(*op, operand, scope),
            Expr::Binary(op, lhs, rhs) => {
                let l = self.eval(lhs, scope)?;
                let r = self.eval(rhs, scope)?;
                let v = binary(*op, &l, &r)?;
                self.charge_built(&v)?;
                Ok(v)
            }
            Expr::Logical(op, lhs, rhs) => {
                let l = self.eval(lhs, scope)?;
                let short = match op {
                    LogicalOp::And => !l.truthy(),
                    LogicalOp::Or => l.truthy(),
                    LogicalOp::Nullish => !l.is_nullish(),
                };
                if short {
                    Ok(l)
                } else {
                    self.eval(rhs, scope)
                }
            }
            Expr::Cond(test, cons, alt) => {
                if self.eval(test, scope)?.truthy() {
                    self.eval(cons, scope)
                } else {
                    self.eval(alt, scope)
                }
            }
            Expr::Assign(op, target, rhs) => self.eval_assign(*op, target, rhs, scope),
            Expr::Update {
                target,
                delta,
                prefix,
            } => self.eval_update(target, *delta, *prefix, scope),
            Expr::Member { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr, scope)?.unwrap_or(Value::Undefined))
            }
            Expr::Jsx(el) => self.eval_jsx(el, scope),
        }
    }

    /// Member/call chains; `None` once an optional link short-circuits.
    fn eval_chain(&mut self, expr: &Expr, scope: ScopeId) -> Eval<Option<Value>> {
        match expr {
            Expr::Member {
                object,
                prop,
                optional,
                ..
            } => {
                let Some(obj) = self.eval_chain(object, scope)? else {
                    return Ok(None);
                };
                if *optional && obj.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(prop, scope)?;
                builtins::get_member(&obj, &key).map(Some)
            }
            Expr::Call {
                callee,
                args,
                optional,
                ..
            } => {
                let Some(f) = self.eval_chain(callee, scope)? else {
                    return Ok(None);
                };
                if *optional && f.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_list(args, scope)?;
                if !f.is_callable() {
                    return Err(type_error(&format!(
                        "{} is not a function",
                        callee_name(callee)
                    )));
                }
                self.call(&f, args).map(Some)
            }
            _ => self.eval(expr, scope).map(Some),
        }
    }

    fn member_key(&mut self, prop: &MemberProp, scope: ScopeId) -> Eval<Value> {
        match prop {
            MemberProp::Named(name) => Ok(Value::Str(Rc::clone(name))),
            MemberProp::Computed(e) => self.eval(e, scope),
        }
    }

    fn eval_list(&mut self, items: &[ListItem], scope: ScopeId) -> Eval<Vec<Value>> {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ListItem::Item(e) => out.push(self.eval(e, scope)?),
                ListItem::Spread(e) => {
                    let v = self.eval(e, scope)?;
                    let items = iterate(&v)?;
                    self.burn(items.len())?;
                    out.extend(items);
                    if out.len() > MAX_BUILT_LEN {
                        return Err(builtins::range_error("Invalid array length"));
                    }
                }
            }
        }
        Ok(out)
    }

    fn eval_object(&mut self, items: &[ObjectItem], scope: ScopeId) -> Eval<Value> {
        let mut props: Vec<(Rc<str>, Value)> = Vec::with_capacity(items.len());
        for item in items {
            match item {
                ObjectItem::Prop(key, e) => {
                    let v = self.eval(e, scope)?;
                    put(&mut props, Rc::clone(key), v);
                }
                ObjectItem::Computed(key, e) => {
                    let key: Rc<str> = self.eval(key, scope)?.to_display().into();
                    let v = self.eval(e, scope)?;
                    put(&mut props, key, v);
                }
                ObjectItem::Spread(e) => {
                    let source = self.eval(e, scope)?;
                    for (k, v) in builtins::own_entries(&source) {
                        put(&mut props, k, v);
                    }
                }
            }
        }
        Ok(Value::object(props))
    }

    fn eval_template(&mut self, parts: &[TemplatePart], scope: ScopeId) -> Eval<Value> {
        let mut out = String::new();
        for part in parts {
            match part {
                TemplatePart::Str(s) => out.push_str(s),
                TemplatePart::Expr(e) => out.push_str(&self.eval(e, scope)?.to_display()),
            }
            if out.len() > MAX_BUILT_LEN {
                break;
            }
        }
        let v = checked_string(out)?;
        self.charge_built(&v)?;
        Ok(v)
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, scope: ScopeId) -> Eval<Value> {
        if let (UnaryOp::TypeOf, Expr::Ident(name)) = (op, operand) {
            let v = self.find(scope, name).unwrap_or(Value::Undefined);
            return Ok(Value::str(v.type_of()));
        }
        let v = self.eval(operand, scope)?;
        Ok(match op {
            UnaryOp::Not => Value::Bool(!v.truthy()),
            UnaryOp::Neg => Value::Num(-v.to_number()),
            UnaryOp::Plus => Value::Num(v.to_number()),
            UnaryOp::TypeOf => Value::str(v.type_of()),
        })
    }

    fn eval_assign(&mut self, op: AssignOp, target: &Expr, rhs: &Expr, scope: ScopeId) -> Eval<Value> {
        match target {
            Expr::Ident(name) => {
                let value = match op {
                    AssignOp::Set => self.eval(rhs, scope)?,
                    _ => {
                        let current = self.lookup(scope, name)?;
                        let r = self.eval(rhs, scope)?;
                        let v = compound(op, &current, &r)?;
                        self.charge_built(&v)?;
                        v
                    }
                };
                self.assign_var(scope, name, value.clone())?;
                Ok(value)
            }
            Expr::Member { object, prop, .. } => {
                let obj = self.eval(object, scope)?;
                let key = self.member_key(prop, scope)?;
                let value = match op {
                    AssignOp::Set => self.eval(rhs, scope)?,
                    _ => {
                        let current = builtins::get_member(&obj, &key)?;
                        let r = self.eval(rhs, scope)?;
                        let v = compound(op, &current, &r)?;
                        self.charge_built(&v)?;
                        v
                    }
                };
                builtins::set_member(&obj, &key, value.clone())?;
                Ok(value)
            }
            _ => Err(Interrupt::Throw(error_value(
                "SyntaxError",
                "Invalid left-hand side in assignment",
            ))),
        }
    }

    fn eval_update(&mut self, target: &Expr, delta: f64, prefix: bool, scope: ScopeId) -> Eval<Value> {
        let (old, new) = match target {
            Expr::Ident(name) => {
                let old = self.lookup(scope, name)?.to_number();
                self.assign_var(scope, name, Value::Num(old + delta))?;
                (old, old + delta)
            }
            Expr::Member { object, prop, .. } => {
                let obj = self.eval(object, scope)?;
                let key = self.member_key(prop, scope)?;
                let old = builtins::get_member(&obj, &key)?.to_number();
                builtins::set_member(&obj, &key, Value::Num(old + delta))?;
                (old, old + delta)
            }
            _ => {
                return Err(Interrupt::Throw(error_value(
                    "SyntaxError",
                    "Invalid left-hand side expression in update operation",
                )))
            }
        };
        Ok(Value::Num(if prefix { new } else { old }))
    }

    // ---- JSX ---

    fn eval_jsx(&mut self, el: &JsxElement, scope: ScopeId) -> Eval<Value> {
        let tag = match &el.tag {
            JsxTag::Fragment => ElementTag::Fragment,
            JsxTag::Intrinsic(name) => ElementTag::Intrinsic(Rc::clone(name)),
            JsxTag::Component(e) => ElementTag::Component(self.eval(e, scope)?),
        };

        let mut props = Vec::with_capacity(el.attrs.len());
        for attr in &el.attrs {
            match attr {
                JsxAttr::Named(name, e) => {
                    let v = self.eval(e, scope)?;
                    put(&mut props, Rc::clone(name), v);
                }
                JsxAttr::Spread(e) => {
                    let source = self.eval(e, scope)?;
                    for (k, v) in builtins::own_entries(&source) {
                        put(&mut props, k, v);
                    }
                }
            }
        }

        let mut children = Vec::with_capacity(el.children.len());
        for child in &el.children {
            children.push(match child {
                JsxChild::Text(t) => Value::Str(Rc::clone(t)),
                JsxChild::Expr(e) => self.eval(e, scope)?,
            });
        }

        Ok(Value::Element(Rc::new(Element {
            tag,
            props,
            children,
        })))
    }

    // ---- resolving elements into the host tree ---

    fn charge_tree(&mut self, bytes: usize) -> Eval<()> {
        self.tree_bytes = self.tree_bytes.saturating_add(bytes);
        if self.tree_bytes > MAX_TREE_BYTES {
            return Err(Interrupt::Limit(
                "The rendered output is too large to display".into(),
            ));
        }
        Ok(())
    }

    fn resolve(&mut self, value: &Value, path: &str, out: &mut Vec<UiNode>) -> Eval<()> {
        self.enter()?;
        let resolved = self.resolve_value(value, path, out);
        self.nesting -= 1;
        resolved
    }

    fn resolve_value(&mut self, value: &Value, path: &str, out: &mut Vec<UiNode>) -> Eval<()> {
        self.tick()?;
        match value {
            Value::Undefined | Value::Null | Value::Bool(_) => {}
            Value::Num(_) | Value::Str(_) => {
                let text = value.to_display();
                self.charge_tree(text.len())?;
                push_text(out, &text);
            }
            // React skips functions passed as children.
            Value::Function(_) | Value::Native(_) => {}
            Value::Array(items) => {
                let items = items.borrow().clone();
                for (i, item) in items.iter().enumerate() {
                    let child_path = match element_key(item) {
                        Some(key) => format!("{path}.k{key}"),
                        None => format!("{path}.{i}"),
                    };
                    self.resolve(item, &child_path, out)?;
                }
            }
            Value::Object(o) => {
                let keys: Vec<String> = o.borrow().iter().map(|(k, _)| k.to_string()).collect();
                return Err(Interrupt::Throw(error_value(
                    "Error",
                    &format!(
                        "Objects are not valid as a React child (found: object with keys {{{}}}). \
                         If you meant to render a collection of children, use an array instead.",
                        keys.join(", ")
                    ),
                )));
            }
            Value::Element(el) => self.resolve_element(el, path, out)?,
        }
        Ok(())
    }

    fn resolve_children(&mut self, children: &[Value], path: &str, out: &mut Vec<UiNode>) -> Eval<()> {
        for (i, child) in children.iter().enumerate() {
            let child_path = match element_key(child) {
                Some(key) => format!("{path}.k{key}"),
                None => format!("{path}.{i}"),
            };
            self.resolve(child, &child_path, out)?;
        }
        Ok(())
    }

    fn resolve_element(&mut self, el: &Element, path: &str, out: &mut Vec<UiNode>) -> Eval<()> {
        match &el.tag {
            ElementTag::Fragment => self.resolve_children(&el.children, path, out),
            ElementTag::Intrinsic(tag) => {
                self.charge_tree(path.len() + tag.len())?;
                let mut props = Vec::with_capacity(el.props.len());
                let mut spread_children = None;
                for (name, value) in &el.props {
                    if &**name == "children" {
                        spread_children = Some(value.clone());
                    } else if let Some(prop) = self.host_prop(name, value)? {
                        props.push((name.to_string(), prop));
                    }
                }
                let mut children = Vec::new();
                match spread_children {
                    Some(c) if el.children.is_empty() => self.resolve(&c, path, &mut children)?,
                    _ => self.resolve_children(&el.children, path, &mut children)?,
                }
                out.push(UiNode::Element(UiElement {
                    tag: tag.to_string(),
                    props,
                    children,
                    path: path.to_string(),
                }));
                Ok(())
            }
            ElementTag::Component(component) => {
                if !component.is_callable() {
                    return Err(Interrupt::Throw(error_value(
                        "Error",
                        &format!(
                            "Element type is invalid: expected a string (for built-in components) \
                             or a class/function (for composite components) but got: {}.",
                            component.type_of()
                        ),
                    )));
                }
                let name = match component {
                    Value::Function(c) => c.def.name.as_deref().unwrap_or("Anonymous").to_string(),
                    _ => "Native".to_string(),
                };
                let instance: Rc<str> = format!("{path}/{name}").into();
                let props = component_props(el);

                self.rendered.insert(Rc::clone(&instance));
                let saved = self.frame.replace(HookFrame {
                    path: Rc::clone(&instance),
                    next: 0,
                });
                let result = self.call(component, vec![props]);
                self.frame = saved;
                self.resolve(&result?, &instance, out)
            }
        }
    }

    fn host_prop(&mut self, name: &str, value: &Value) -> Eval<Option<Prop>> {
        let prop = match value {
            Value::Undefined | Value::Null => None,
            _ if name == "key" || name == "ref" => None,
            Value::Function(_) | Value::Native(_) => {
                if !name.starts_with("on") {
                    return Ok(None);
                }
                self.handlers.push(value.clone());
                Some(Prop::Handler(self.handlers.len() - 1))
            }
            Value::Str(s) => Some(Prop::Str(s.to_string())),
            Value::Num(n) => Some(Prop::Num(*n)),
            Value::Bool(b) => Some(Prop::Bool(*b)),
            Value::Object(o) if name == "style" => {
                let mut pairs = Vec::new();
                for (k, v) in o.borrow().iter().filter(|(_, v)| !v.is_nullish()) {
                    let v = v.to_display();
                    self.charge_tree(k.len() + v.len())?;
                    pairs.push((k.to_string(), v));
                }
                Some(Prop::Style(pairs))
            }
            other => Some(Prop::Str(other.to_display())),
        };
        let bytes = match &prop {
            Some(Prop::Str(s)) => s.len(),
            _ => 0,
        };
        self.charge_tree(name.len() + bytes)?;
        Ok(prop)
    }

    // ---- hooks ---

    fn next_hook(&mut self, hook: &str) -> Eval<(Rc<str>, usize)> {
        let Some(frame) = self.frame.as_mut() else {
            return Err(Interrupt::Throw(error_value(
                "Error",
                &format!("Invalid hook call: {hook} can only be called while rendering a component."),
            )));
        };
        let index = frame.next;
        frame.next += 1;
        Ok((Rc::clone(&frame.path), index))
    }

    fn existing_slot(&self, path: &str, index: usize) -> Option<&HookSlot> {
        self.hooks.get(path).and_then(|slots| slots.get(index))
    }

    fn push_slot(&mut self, path: &Rc<str>, slot: HookSlot) {
        self.hooks.entry(Rc::clone(path)).or_default().push(slot);
    }

    fn hook_order_error() -> Interrupt {
        Interrupt::Throw(error_value(
            "Error",
            "Rendered hooks in a different order than during the previous render.",
        ))
    }

    pub(super) fn use_state(&mut self, initial: Value) -> Eval<Value> {
        let (path, index) = self.next_hook("useState")?;
        let current = match self.existing_slot(&path, index) {
            Some(HookSlot::State(v)) => v.clone(),
            Some(_) => return Err(Self::hook_order_error()),
            None => {
                let v = if initial.is_callable() {
                    self.call(&initial, Vec::new())?
                } else {
                    initial
                };
                self.push_slot(&path, HookSlot::State(v.clone()));
                v
            }
        };
        let setter = Value::Native(Rc::new(Native::Setter { path, index }));
        Ok(Value::array(vec![current, setter]))
    }

    pub(super) fn set_state(&mut self, path: &str, index: usize, update: Value) -> Eval<()> {
        let Some(HookSlot::State(current)) = self.existing_slot(path, index) else {
            // The component is gone; React ignores updates to unmounted state.
            return Ok(());
        };
        let current = current.clone();
        let next = if update.is_callable() {
            self.call(&update, vec![current.clone()])?
        } else {
            update
        };
        if next.strict_eq(&current) {
            return Ok(());
        }
        if let Some(slot) = self.hooks.get_mut(path).and_then(|s| s.get_mut(index)) {
            *slot = HookSlot::State(next);
            self.dirty = true;
        }
        Ok(())
    }

    pub(super) fn use_ref(&mut self, initial: Value) -> Eval<Value> {
        let (path, index) = self.next_hook("useRef")?;
        match self.existing_slot(&path, index) {
            Some(HookSlot::Ref(v)) => Ok(v.clone()),
            Some(_) => Err(Self::hook_order_error()),
            None => {
                let r = Value::object(vec![("current".into(), initial)]);
                self.push_slot(&path, HookSlot::Ref(r.clone()));
                Ok(r)
            }
        }
    }

    /// Effects run after the pass when their dependencies change.  There
    /// are no timers or subscriptions, so cleanup callbacks are not kept.
    pub(super) fn use_effect(&mut self, callback: Value, deps: Value) -> Eval<Value> {
        let (path, index) = self.next_hook("useEffect")?;
        let deps = match &deps {
            Value::Array(items) => Some(items.borrow().clone()),
            _ => None,
        };
        let changed = match self.existing_slot(&path, index) {
            Some(HookSlot::Effect { deps: previous }) => match (previous, &deps) {
                (Some(prev), Some(next)) => {
                    prev.len() != next.len() || prev.iter().zip(next).any(|(a, b)| !a.strict_eq(b))
                }
                _ => true,
            },
            Some(_) => return Err(Self::hook_order_error()),
            None => {
                self.push_slot(&path, HookSlot::Effect { deps: None });
                true
            }
        };
        if changed {
            if let Some(slot) = self.hooks.get_mut(&*path).and_then(|s| s.get_mut(index)) {
                *slot = HookSlot::Effect { deps };
            }
            if callback.is_callable() {
                self.effects.push(callback);
            }
        }
        Ok(Value::Undefined)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Address of a local in a fresh frame; the distance between two readings
/// approximates the stack used between them.
#[inline(never)]
fn stack_address() -> usize {
    let marker = 0u8;
    std::hint::black_box(&marker) as *const u8 as usize
}

/// Insert or overwrite, keeping first-insertion order.
fn put(props: &mut Vec<(Rc<str>, Value)>, key: Rc<str>, value: Value) {
    match props.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => props.push((key, value)),
    }
}

pub(super) fn iterate(value: &Value) -> Eval<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.borrow().clone()),
        Value::Str(s) => Ok(s.chars().map(|c| Value::Str(c.to_string().into())).collect()),
        other => Err(type_error(&format!(
            "{} is not iterable",
            other.to_display()
        ))),
    }
}

fn callee_name(expr: &Expr) -> String {
    match expr {
        Expr::Ident(name) => name.to_string(),
        Expr::Member {
            object,
            prop: MemberProp::Named(name),
            ..
        } => format!("{}.{name}", callee_name(object)),
        Expr::Member { object, .. } => format!("{}[…]", callee_name(object)),
        Expr::Call { callee, .. } => format!("{}(…)", callee_name(callee)),
        _ => "expression".into(),
    }
}

fn element_key(value: &Value) -> Option<String> {
    match value {
        Value::Element(el) => el
            .props
            .iter()
            .find(|(k, _)| &**k == "key")
            .map(|(_, v)| v.to_display()),
        _ => None,
    }
}

fn component_props(el: &Element) -> Value {
    let mut props: Vec<(Rc<str>, Value)> = el
        .props
        .iter()
        .filter(|(k, _)| &**k != "key")
        .cloned()
        .collect();
    match el.children.as_slice() {
        [] => {}
        [only] => put(&mut props, "children".into(), only.clone()),
        many => put(&mut props, "children".into(), Value::array(many.to_vec())),
    }
    Value::object(props)
}

fn push_text(out: &mut Vec<UiNode>, text: &str) {
    if let Some(UiNode::Text(last)) = out.last_mut() {
        last.push_str(text);
    } else {
        out.push(UiNode::Text(text.to_string()));
    }
}

fn event_object(event: &UiEvent) -> Value {
    let (value, checked) = match event {
        UiEvent::Change { value, checked } => (Value::str(value), Value::Bool(*checked)),
        _ => (Value::str(""), Value::Bool(false)),
    };
    let target = Value::object(vec![("value".into(), value), ("checked".into(), checked)]);
    let kind = match event {
        UiEvent::Click => "click",
        UiEvent::Change { .. } => "change",
        UiEvent::Submit => "submit",
    };
    Value::object(vec![
        ("type".into(), Value::str(kind)),
        ("target".into(), target.clone()),
        ("currentTarget".into(), target),
        ("preventDefault".into(), Value::builtin("noop")),
        ("stopPropagation".into(), Value::builtin("noop")),
    ])
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Eval<Value> {
    use BinaryOp::*;
    Ok(match op {
        Add => {
            let numeric = |v: &Value| {
                matches!(v, Value::Num(_) | Value::Bool(_) | Value::Null | Value::Undefined)
            };
            if numeric(l) && numeric(r) {
                Value::Num(l.to_number() + r.to_number())
            } else {
                let mut s = l.to_display();
                if s.len() <= MAX_BUILT_LEN {
                    s.push_str(&r.to_display());
                }
                return checked_string(s);
            }
        }
        Sub => Value::Num(l.to_number() - r.to_number()),
        Mul => Value::Num(l.to_number() * r.to_number()),
        Div => Value::Num(l.to_number() / r.to_number()),
        Rem => Value::Num(l.to_number() % r.to_number()),
        Pow => Value::Num(l.to_number().powf(r.to_number())),
        StrictEq => Value::Bool(l.strict_eq(r)),
        StrictNe => Value::Bool(!l.strict_eq(r)),
        LooseEq => Value::Bool(l.loose_eq(r)),
        LooseNe => Value::Bool(!l.loose_eq(r)),
        Lt | Gt | Le | Ge => {
            let ord = match (l, r) {
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => l.to_number().partial_cmp(&r.to_number()),
            };
            Value::Bool(match ord {
                None => false,
                Some(o) => match op {
                    Lt => o.is_lt(),
                    Gt => o.is_gt(),
                    Le => o.is_le(),
                    _ => o.is_ge(),
                },
            })
        }
    })
}

fn compound(op: AssignOp, current: &Value, rhs: &Value) -> Eval<Value> {
    let bin = match op {
        AssignOp::Add => BinaryOp::Add,
        AssignOp::Sub => BinaryOp::Sub,
        AssignOp::Mul => BinaryOp::Mul,
        AssignOp::Div => BinaryOp::Div,
        AssignOp::Set => return Ok(rhs.clone()),
    };
    binary(bin, current, rhs)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::parser::parse_program;

    fn interp(src: &str) -> Interpreter {
        Interpreter::new(parse_program(src).unwrap())
    }

    fn render(src: &str) -> Vec<UiNode> {
        match interp(src).render() {
            Ok(tree) => tree,
            Err(Interrupt::Throw(v)) => panic!("threw {}", builtins::thrown_message(&v)),
            Err(Interrupt::Limit(m)) => panic!("limit: {m}"),
        }
    }

    fn text(src: &str) -> String {
        render(src).iter().map(UiNode::text_content).collect()
    }

    fn thrown(src: &str) -> String {
        match interp(src).render() {
            Err(Interrupt::Throw(v)) => builtins::thrown_message(&v),
            other => panic!("expected a throw, got {other:?}"),
        }
    }

    #[test]
    fn renders_host_elements_with_props() {
        let tree = render(
            r#"function render() { return <div className="p-4"><h1>Title</h1><p>Body</p></div>; }"#,
        );
        let UiNode::Element(div) = &tree[0] else {
            panic!("expected element");
        };
        assert_eq!(div.tag, "div");
        assert_eq!(div.text_prop("className").as_deref(), Some("p-4"));
        assert_eq!(div.children.len(), 2);
        assert_eq!(tree[0].text_content(), "TitleBody");
    }

    #[test]
    fn adjacent_text_is_merged() {
        let tree = render("function render() { const n = 3; return <p>Count: {n} items</p>; }");
        let UiNode::Element(p) = &tree[0] else {
            panic!("expected element");
        };
        assert_eq!(p.children, vec![UiNode::Text("Count: 3 items".into())]);
    }

    #[test]
    fn components_receive_props_and_children() {
        let out = text(
            r#"
            function render() {
              function Card({ title, children }) {
                return <section><h2>{title}</h2>{children}</section>;
              }
              return <Card title="Hello"><span>world</span></Card>;
            }"#,
        );
        assert_eq!(out, "Helloworld");
    }

    #[test]
    fn lists_map_filter_and_join() {
        let out = text(
            r#"
            function render() {
              const items = [1, 2, 3, 4].filter(n => n % 2 === 0).map(n => n * 10);
              return <ul>{items.map((n, i) => <li key={i}>{n}</li>)}<li>{items.join("-")}</li></ul>;
            }"#,
        );
        assert_eq!(out, "204020-40");
    }

    #[test]
    fn closures_capture_their_scope() {
        let out = text(
            r#"
            function render() {
              const makeAdder = (a) => (b) => a + b;
              const add5 = makeAdder(5);
              let total = 0;
              for (const n of [1, 2, 3]) { total += add5(n); }
              return <p>{`${total}`}</p>;
            }"#,
        );
        assert_eq!(out, "21");
    }

    #[test]
    fn destructuring_and_spread() {
        let out = text(
            r#"
            function render() {
              const { a, b: { c = 7 } = {}, ...rest } = { a: 1, d: 4, e: 5 };
              const [first, , third = 9, ...others] = [1, 2, undefined, 4, 5];
              const merged = { ...rest, e: 6 };
              return <p>{[a, c, first, third, others.length, merged.d, merged.e].join(",")}</p>;
            }"#,
        );
        assert_eq!(out, "1,7,1,9,2,4,6");
    }

    #[test]
    fn optional_chaining_short_circuits() {
        let out = text(
            r#"function render() { const u = null; return <p>{u?.profile.name ?? "anon"}</p>; }"#,
        );
        assert_eq!(out, "anon");
    }

    #[test]
    fn reading_through_null_throws_type_error() {
        let msg = thrown("function render() { const x = null; return <p>{x.missing.field}</p>; }");
        assert_eq!(msg, "TypeError: Cannot read properties of null (reading 'missing')");
    }

    #[test]
    fn user_throw_is_reported() {
        let msg = thrown(r#"function render() { throw new Error("boom"); }"#);
        assert_eq!(msg, "Error: boom");
    }

    #[test]
    fn missing_render_is_an_error() {
        let msg = thrown("function MyComponent() { return <p/>; }");
        assert!(msg.starts_with("ReferenceError: render is not defined"));
    }

    #[test]
    fn calling_a_non_function_names_the_callee() {
        let msg = thrown("function render() { const o = {}; return o.nope(); }");
        assert_eq!(msg, "TypeError: o.nope is not a function");
    }

    #[test]
    fn const_reassignment_throws() {
        let msg = thrown("function render() { const a = 1; a = 2; return null; }");
        assert_eq!(msg, "TypeError: Assignment to constant variable.");
    }

    #[test]
    fn host_globals_are_not_reachable() {
        for name in ["window", "document", "fetch", "require", "process", "globalThis", "setTimeout"] {
            let msg = thrown(&format!("function render() {{ return {name}; }}"));
            assert_eq!(msg, format!("ReferenceError: {name} is not defined"));
        }
    }

    #[test]
    fn infinite_recursion_hits_the_call_limit() {
        let result = interp("function render() { function f(n) { return f(n + 1); } return f(0); }").render();
        assert!(matches!(result, Err(Interrupt::Limit(m)) if m.contains("call stack")));
    }

    #[test]
    fn deep_expressions_inside_recursion_stay_on_the_stack() {
        let body = format!("{}f(n - 1){}", "1 + (".repeat(60), ")".repeat(60));
        let src = format!(
            "function render() {{ function f(n) {{ return n === 0 ? 0 : {body}; }} return <p>{{f(60)}}</p>; }}"
        );
        // 1 MiB matches the smallest UI thread stack the interpreter runs on.
        let result = std::thread::Builder::new()
            .stack_size(1 << 20)
            .spawn(move || match interp(&src).render() {
                Err(Interrupt::Limit(m)) => Some(m),
                _ => None,
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(result.as_deref(), Some("Maximum call stack size exceeded"));
    }

    #[test]
    fn runaway_work_exhausts_fuel() {
        let result = interp(
            r#"
            function render() {
              function fib(n) { return n < 2 ? n : fib(n - 1) + fib(n - 2); }
              return <p>{fib(40)}</p>;
            }"#,
        )
        .render();
        assert!(matches!(result, Err(Interrupt::Limit(m)) if m.contains("budget")));
    }

    #[test]
    fn doubling_strings_stop_at_the_length_limit() {
        let cases = [
            "const f = (s, n) => n === 0 ? s : f(s + s, n - 1); return <p>{f('x', 36).length}</p>;",
            "let s = 'x'; for (const _ of Array.from({ length: 36 })) { s = `${s}${s}`; } return <p>{s.length}</p>;",
            "let s = 'x'; for (const _ of Array.from({ length: 36 })) { s += s; } return <p>{s.length}</p>;",
            "return <p>{Array.from({ length: 4000 }, () => 'x'.repeat(1000)).join('').length}</p>;",
            "return <p>{'x'.repeat(1000000).concat('y'.repeat(100000)).length}</p>;",
        ];
        for body in cases {
            let msg = thrown(&format!("function render() {{ {body} }}"));
            assert_eq!(msg, "RangeError: Invalid string length", "{body}");
        }
    }

    #[test]
    fn doubling_arrays_run_out_of_budget() {
        let result = interp(
            "function render() { let a = [1]; for (const _ of Array.from({ length: 30 })) { a = [...a, ...a]; } return <p>{a.length}</p>; }",
        )
        .render();
        match result {
            Err(Interrupt::Limit(m)) => assert!(m.contains("budget"), "{m}"),
            Err(Interrupt::Throw(v)) => {
                assert_eq!(builtins::thrown_message(&v), "RangeError: Invalid array length")
            }
            Ok(_) => panic!("doubling an array thirty times must not succeed"),
        }
    }

    #[test]
    fn retained_large_strings_spend_the_budget() {
        let result = interp(
            r#"
            function render() {
              const big = 'x'.repeat(524288);
              const kept = [];
              for (const i of Array.from({ length: 1000 }, (_, i) => i)) {
                kept.push(big + i);
              }
              return <p>{kept.length}</p>;
            }"#,
        )
        .render();
        assert!(matches!(result, Err(Interrupt::Limit(m)) if m.contains("budget")));
    }

    #[test]
    fn oversized_output_tree_is_a_limit() {
        let result = interp(
            r#"
            function render() {
              const big = 'x'.repeat(1000000);
              return <div>{Array.from({ length: 100 }, () => big)}</div>;
            }"#,
        )
        .render();
        assert!(matches!(result, Err(Interrupt::Limit(m)) if m.contains("too large")));
    }

    #[test]
    fn state_survives_rerender_and_updates_on_dispatch() {
        let mut it = interp(
            r#"
            function render() {
              function Counter() {
                const [count, setCount] = React.useState(0);
                return <button onClick={() => setCount(c => c + 1)}>Clicked {count}</button>;
              }
              return <Counter />;
            }"#,
        );
        let tree = it.render().unwrap();
        assert_eq!(tree[0].text_content(), "Clicked 0");
        let UiNode::Element(button) = &tree[0] else {
            panic!("expected button");
        };
        let handler = button.handler("onClick").unwrap();

        assert!(it.dispatch(handler, &UiEvent::Click).unwrap());
        assert!(it.dispatch(handler, &UiEvent::Click).unwrap());
        let tree = it.render().unwrap();
        assert_eq!(tree[0].text_content(), "Clicked 2");
    }

    #[test]
    fn change_events_carry_the_value() {
        let mut it = interp(
            r#"
            function render() {
              const [name, setName] = React.useState("");
              return <div><input value={name} onChange={e => setName(e.target.value)} /><p>Hi {name}</p></div>;
            }"#,
        );
        let tree = it.render().unwrap();
        let input = tree[0].find(&|el| el.tag == "input").unwrap();
        let handler = input.handler("onChange").unwrap();
        it.dispatch(
            handler,
            &UiEvent::Change {
                value: "Ada".into(),
                checked: false,
            },
        )
        .unwrap();
        let tree = it.render().unwrap();
        assert_eq!(tree[0].text_content(), "Hi Ada");
    }

    #[test]
    fn effects_run_after_render_and_may_set_state() {
        let out = text(
            r#"
            function render() {
              const [ready, setReady] = React.useState(false);
              React.useEffect(() => { setReady(true); }, []);
              return <p>{ready ? "loaded" : "loading"}</p>;
            }"#,
        );
        assert_eq!(out, "loaded");
    }

    #[test]
    fn setting_state_during_render_forever_is_stopped() {
        let result = interp(
            r#"
            function render() {
              const [n, setN] = React.useState(0);
              setN(n + 1);
              return <p>{n}</p>;
            }"#,
        )
        .render();
        assert!(matches!(result, Err(Interrupt::Limit(m)) if m.contains("re-renders")));
    }

    #[test]
    fn hooks_outside_components_throw() {
        let mut it = interp(
            r#"
            function render() {
              return <button onClick={() => React.useState(1)}>x</button>;
            }"#,
        );
        let tree = it.render().unwrap();
        let UiNode::Element(b) = &tree[0] else {
            panic!("expected button");
        };
        let err = it.dispatch(b.handler("onClick").unwrap(), &UiEvent::Click).unwrap_err();
        let Interrupt::Throw(v) = err else {
            panic!("expected throw");
        };
        assert!(builtins::thrown_message(&v).contains("Invalid hook call"));
    }

    #[test]
    fn unmounted_state_is_discarded() {
        let mut it = interp(
            r#"
            function render() {
              const [show, setShow] = React.useState(true);
              function Child() {
                const [n, setN] = React.useState(0);
                return <button onClick={() => setN(n + 1)}>n={n}</button>;
              }
              return <div><button onClick={() => setShow(!show)}>toggle</button>{show && <Child />}</div>;
            }"#,
        );
        let find_button = |tree: &[UiNode], label: &str| {
            tree[0]
                .find(&|el| el.tag == "button" && el.text_content().starts_with(label))
                .and_then(|el| el.handler("onClick"))
                .unwrap()
        };

        let tree = it.render().unwrap();
        it.dispatch(find_button(&tree, "n="), &UiEvent::Click).unwrap();
        let tree = it.render().unwrap();
        assert!(tree[0].text_content().contains("n=1"));

        it.dispatch(find_button(&tree, "toggle"), &UiEvent::Click).unwrap();
        let tree = it.render().unwrap();
        assert!(!tree[0].text_content().contains("n="));

        it.dispatch(find_button(&tree, "toggle"), &UiEvent::Click).unwrap();
        let tree = it.render().unwrap();
        assert!(tree[0].text_content().contains("n=0"));
    }

    #[test]
    fn objects_as_children_are_rejected() {
        let msg = thrown("function render() { return <p>{{ a: 1 }}</p>; }");
        assert!(msg.starts_with("Error: Objects are not valid as a React child"));
    }

    #[test]
    fn inline_styles_become_style_props() {
        let tree = render(r#"function render() { return <div style={{ color: "red", padding: 4 }} />; }"#);
        let UiNode::Element(div) = &tree[0] else {
            panic!("expected element");
        };
        assert_eq!(div.style("color"), Some("red"));
        assert_eq!(div.style("padding"), Some("4"));
    }

    #[test]
    fn console_output_is_captured() {
        let mut it = interp(r#"function render() { console.log("rendering", 1, [2]); return null; }"#);
        it.render().unwrap();
        assert_eq!(it.logs(), ["rendering 1 [2]"]);
    }
}
