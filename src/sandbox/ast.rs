//! Syntax tree for the artifact language.

use std::rc::Rc;

/// Byte offset into the artifact source.
pub type Pos = usize;

#[derive(Debug, Clone)]
pub enum Stmt {
    /// `function name(..) { .. }`, hoisted to the top of its block.
    Function(Rc<FunctionDef>),
    /// `const` / `let` / `var` with one or more declarators.
    Declare {
        mutable: bool,
        decls: Vec<(Pattern, Option<Expr>)>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    Block(Vec<Stmt>),
    ForOf {
        mutable: bool,
        pattern: Pattern,
        iter: Expr,
        body: Box<Stmt>,
    },
    Expr(Expr),
    Empty,
}

#[derive(Debug)]
pub struct FunctionDef {
    pub name: Option<Rc<str>>,
    pub params: Vec<Param>,
    pub body: FnBody,
}

#[derive(Debug)]
pub enum FnBody {
    Block(Vec<Stmt>),
    /// Concise arrow body.
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub struct Param {
    pub pattern: Pattern,
    pub default: Option<Expr>,
    pub rest: bool,
}

#[derive(Debug, Clone)]
pub enum Pattern {
    Ident(Rc<str>),
    Object {
        props: Vec<PropPattern>,
        rest: Option<Rc<str>>,
    },
    /// `None` entries are holes (`[, b]`).
    Array {
        items: Vec<Option<Param>>,
    },
}

#[derive(Debug, Clone)]
pub struct PropPattern {
    pub key: Rc<str>,
    pub value: Pattern,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
    Plus,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    StrictEq,
    StrictNe,
    LooseEq,
    LooseNe,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone)]
pub enum MemberProp {
    Named(Rc<str>),
    Computed(Box<Expr>),
}

/// Element of an array literal or call argument list.
#[derive(Debug, Clone)]
pub enum ListItem {
    Item(Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum ObjectItem {
    Prop(Rc<str>, Expr),
    Computed(Expr, Expr),
    Spread(Expr),
}

#[derive(Debug, Clone)]
pub enum TemplatePart {
    Str(String),
    Expr(Expr),
}

#[derive(Debug, Clone)]
pub enum Expr {
    Num(f64),
    Str(Rc<str>),
    Template(Vec<TemplatePart>),
    Bool(bool),
    Null,
    Undefined,
    Ident(Rc<str>),
    Array(Vec<ListItem>),
    Object(Vec<ObjectItem>),
    Function(Rc<FunctionDef>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Logical(LogicalOp, Box<Expr>, Box<Expr>),
    Cond(Box<Expr>, Box<Expr>, Box<Expr>),
    Assign(AssignOp, Box<Expr>, Box<Expr>),
    /// `++x`, `x--` …  `delta` is `1.0` or `-1.0`.
    Update {
        target: Box<Expr>,
        delta: f64,
        prefix: bool,
    },
    Member {
        object: Box<Expr>,
        prop: MemberProp,
        optional: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<ListItem>,
        optional: bool,
    },
    Jsx(Rc<JsxElement>),
}

#[derive(Debug)]
pub struct JsxElement {
    pub tag: JsxTag,
    pub attrs: Vec<JsxAttr>,
    pub children: Vec<JsxChild>,
}

#[derive(Debug)]
pub enum JsxTag {
    Fragment,
    /// Lower-case tag such as `div`.
    Intrinsic(Rc<str>),
    /// Capitalized or dotted tag, evaluated as an expression.
    Component(Expr),
}

#[derive(Debug)]
pub enum JsxAttr {
    Named(Rc<str>, Expr),
    Spread(Expr),
}

#[derive(Debug)]
pub enum JsxChild {
    Text(Rc<str>),
    Expr(Expr),
}
