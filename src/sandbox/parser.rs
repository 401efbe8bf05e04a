//! Recursive-descent parser for the artifact language.
//!
//! Script syntax is read token by token through [`Lexer`]; JSX is read
//! character by character straight from the source, re-entering the token
//! parser for every `{ … }` expression container.
//!
//! ```text
//! statement   := function | declaration | return | throw | if | for-of
//!              | block | expression ';'?
//! assignment  := arrow | conditional (assign-op assignment)?
//! conditional := binary ('?' assignment ':' assignment)?
//! binary      := precedence climbing over ?? || / && / equality / relational
//!                / additive / multiplicative
//! exponent    := unary ('**' exponent)?
//! unary       := ('!' | '-' | '+' | typeof | ++ | --) unary | postfix
//! postfix     := call-member ('++' | '--')?
//! primary     := literal | ident | '(' expr ')' | array | object | function
//!              | template | jsx
//! ```

use std::rc::Rc;

use super::ast::*;
use super::lexer::{is_ident_part, is_ident_start, Lexer, RawTemplatePart, SyntaxError, Tok, Token};

/// Deepest allowed nesting of expressions, statements and elements.
const MAX_NESTING: usize = 150;

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "default", "delete", "do", "else",
    "export", "extends", "false", "finally", "for", "function", "if", "import", "in", "instanceof",
    "let", "new", "null", "return", "switch", "this", "throw", "true", "try", "typeof", "var",
    "void", "while", "with", "yield",
];

fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

type PResult<T> = Result<T, SyntaxError>;

/// Parse a complete artifact into its top-level statements.
pub fn parse_program(src: &str) -> PResult<Vec<Stmt>> {
    let mut parser = Parser::new(src);
    let mut stmts = Vec::new();
    while !matches!(parser.peek()?.tok, Tok::Eof) {
        stmts.push(parser.statement()?);
    }
    Ok(stmts)
}

// ---------------------------------------------------------------------------
// Binary operator table
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum Op {
    Bin(BinaryOp),
    Log(LogicalOp),
}

/// Lowest precedence first.
const LEVELS: &[&[(&str, Op)]] = &[
    &[("??", Op::Log(LogicalOp::Nullish)), ("||", Op::Log(LogicalOp::Or))],
    &[("&&", Op::Log(LogicalOp::And))],
    &[
        ("===", Op::Bin(BinaryOp::StrictEq)),
        ("!==", Op::Bin(BinaryOp::StrictNe)),
        ("==", Op::Bin(BinaryOp::LooseEq)),
        ("!=", Op::Bin(BinaryOp::LooseNe)),
    ],
    &[
        ("<=", Op::Bin(BinaryOp::Le)),
        (">=", Op::Bin(BinaryOp::Ge)),
        ("<", Op::Bin(BinaryOp::Lt)),
        (">", Op::Bin(BinaryOp::Gt)),
    ],
    &[("+", Op::Bin(BinaryOp::Add)), ("-", Op::Bin(BinaryOp::Sub))],
    &[
        ("*", Op::Bin(BinaryOp::Mul)),
        ("/", Op::Bin(BinaryOp::Div)),
        ("%", Op::Bin(BinaryOp::Rem)),
    ],
];

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser<'a> {
    src: &'a str,
    lexer: Lexer<'a>,
    peeked: Option<Token>,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            lexer: Lexer::new(src),
            peeked: None,
            depth: 0,
        }
    }

    // ---- token plumbing ---

    fn peek(&mut self) -> PResult<&Token> {
        let token = match self.peeked.take() {
            Some(t) => t,
            None => self.lexer.next_token()?,
        };
        Ok(self.peeked.insert(token))
    }

    fn next(&mut self) -> PResult<Token> {
        match self.peeked.take() {
            Some(t) => Ok(t),
            None => self.lexer.next_token(),
        }
    }

    /// Position to [`reset`](Self::reset) to for backtracking.
    fn mark(&self) -> usize {
        self.peeked.as_ref().map_or(self.lexer.pos(), |t| t.start)
    }

    fn reset(&mut self, pos: usize) {
        self.peeked = None;
        self.lexer.seek(pos);
    }

    fn eat_punct(&mut self, p: &str) -> PResult<bool> {
        if self.peek()?.is_punct(p) {
            self.next()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<Token> {
        let t = self.next()?;
        if t.is_punct(p) {
            Ok(t)
        } else {
            Err(SyntaxError::new(
                format!("expected '{p}' but found {}", describe(&t.tok)),
                t.start,
            ))
        }
    }

    fn unexpected<T>(&self, t: &Token) -> PResult<T> {
        Err(SyntaxError::new(
            format!("unexpected {}", describe(&t.tok)),
            t.start,
        ))
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= MAX_NESTING {
            return Err(SyntaxError::new("code is nested too deeply", self.mark()));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // ---- statements ---

    fn statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::statement_inner)
    }

    fn statement_inner(&mut self) -> PResult<Stmt> {
        let t = self.peek()?.clone();
        let keyword = match &t.tok {
            Tok::Ident(k) => k.as_str(),
            Tok::Punct("{") => {
                self.next()?;
                return Ok(Stmt::Block(self.block_body()?));
            }
            Tok::Punct(";") => {
                self.next()?;
                return Ok(Stmt::Empty);
            }
            _ => "",
        };

        let stmt = match keyword {
            "function" => {
                self.next()?;
                let def = self.function_rest()?;
                if def.name.is_none() {
                    return Err(SyntaxError::new("function statement requires a name", t.start));
                }
                return Ok(Stmt::Function(def));
            }
            "const" | "let" | "var" => {
                self.next()?;
                self.declaration(keyword != "const", t.start)?
            }
            "return" => {
                self.next()?;
                let next = self.peek()?;
                let value = if next.is_punct(";") || next.is_punct("}") || next.tok == Tok::Eof {
                    None
                } else {
                    Some(self.expression()?)
                };
                Stmt::Return(value)
            }
            "throw" => {
                self.next()?;
                Stmt::Throw(self.expression()?)
            }
            "if" => {
                self.next()?;
                self.expect_punct("(")?;
                let cond = self.expression()?;
                self.expect_punct(")")?;
                let then = Box::new(self.statement()?);
                let otherwise = if self.peek()?.is_ident("else") {
                    self.next()?;
                    Some(Box::new(self.statement()?))
                } else {
                    None
                };
                return Ok(Stmt::If {
                    cond,
                    then,
                    otherwise,
                });
            }
            "for" => {
                self.next()?;
                return self.for_of(t.start);
            }
            "import" | "export" => {
                return Err(SyntaxError::new(
                    "import and export statements are not supported",
                    t.start,
                ))
            }
            "while" | "do" | "switch" | "class" | "try" => {
                return Err(SyntaxError::new(
                    format!("'{keyword}' statements are not supported"),
                    t.start,
                ))
            }
            _ => Stmt::Expr(self.expression()?),
        };
        self.eat_punct(";")?;
        Ok(stmt)
    }

    /// Statements up to and including the closing `}`.
    fn block_body(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            let t = self.peek()?;
            if t.is_punct("}") {
                self.next()?;
                return Ok(stmts);
            }
            if t.tok == Tok::Eof {
                let pos = t.start;
                return Err(SyntaxError::new("missing '}' before end of input", pos));
            }
            stmts.push(self.statement()?);
        }
    }

    fn declaration(&mut self, mutable: bool, start: usize) -> PResult<Stmt> {
        let mut decls = Vec::new();
        loop {
            let pattern = self.pattern()?;
            let init = if self.eat_punct("=")? {
                Some(self.assignment()?)
            } else if !mutable {
                return Err(SyntaxError::new("missing initializer in const declaration", start));
            } else {
                None
            };
            decls.push((pattern, init));
            if !self.eat_punct(",")? {
                return Ok(Stmt::Declare { mutable, decls });
            }
        }
    }

    fn for_of(&mut self, start: usize) -> PResult<Stmt> {
        self.expect_punct("(")?;
        let kw = self.next()?;
        let mutable = match &kw.tok {
            Tok::Ident(k) if k == "const" => false,
            Tok::Ident(k) if k == "let" || k == "var" => true,
            _ => return Err(SyntaxError::new("only for...of loops are supported", start)),
        };
        let pattern = self.pattern()?;
        if !self.next()?.is_ident("of") {
            return Err(SyntaxError::new("only for...of loops are supported", start));
        }
        let iter = self.expression()?;
        self.expect_punct(")")?;
        let body = Box::new(self.statement()?);
        Ok(Stmt::ForOf {
            mutable,
            pattern,
            iter,
            body,
        })
    }

    // ---- functions and patterns ---

    /// Everything after the `function` keyword.
    fn function_rest(&mut self) -> PResult<Rc<FunctionDef>> {
        let name = match &self.peek()?.tok {
            Tok::Ident(n) if !is_reserved(n) => {
                let n: Rc<str> = n.as_str().into();
                self.next()?;
                Some(n)
            }
            _ => None,
        };
        self.expect_punct("(")?;
        let params = self.params()?;
        self.expect_punct("{")?;
        let body = FnBody::Block(self.block_body()?);
        Ok(Rc::new(FunctionDef { name, params, body }))
    }

    /// Parameters up to and including the closing `)`.
    fn params(&mut self) -> PResult<Vec<Param>> {
        let mut params = Vec::new();
        loop {
            if self.eat_punct(")")? {
                return Ok(params);
            }
            params.push(self.param()?);
            if !self.eat_punct(",")? {
                self.expect_punct(")")?;
                return Ok(params);
            }
        }
    }

    fn param(&mut self) -> PResult<Param> {
        let rest = self.eat_punct("...")?;
        let pattern = self.pattern()?;
        let default = if !rest && self.eat_punct("=")? {
            Some(self.assignment()?)
        } else {
            None
        };
        Ok(Param {
            pattern,
            default,
            rest,
        })
    }

    fn pattern(&mut self) -> PResult<Pattern> {
        let t = self.next()?;
        match &t.tok {
            Tok::Ident(name) if !is_reserved(name) => Ok(Pattern::Ident(name.as_str().into())),
            Tok::Punct("{") => self.object_pattern(),
            Tok::Punct("[") => {
                let mut items = Vec::new();
                loop {
                    if self.eat_punct("]")? {
                        return Ok(Pattern::Array { items });
                    }
                    if self.eat_punct(",")? {
                        items.push(None);
                        continue;
                    }
                    items.push(Some(self.param()?));
                    if !self.eat_punct(",")? {
                        self.expect_punct("]")?;
                        return Ok(Pattern::Array { items });
                    }
                }
            }
            _ => self.unexpected(&t),
        }
    }

    fn object_pattern(&mut self) -> PResult<Pattern> {
        let mut props = Vec::new();
        let mut rest = None;
        loop {
            if self.eat_punct("}")? {
                break;
            }
            if self.eat_punct("...")? {
                let t = self.next()?;
                match &t.tok {
                    Tok::Ident(n) => rest = Some(n.as_str().into()),
                    _ => return self.unexpected(&t),
                }
            } else {
                let t = self.next()?;
                let key: Rc<str> = match &t.tok {
                    Tok::Ident(n) => n.as_str().into(),
                    Tok::Str(s) => s.as_str().into(),
                    _ => return self.unexpected(&t),
                };
                let value = if self.eat_punct(":")? {
                    self.pattern()?
                } else if is_reserved(&key) {
                    return self.unexpected(&t);
                } else {
                    Pattern::Ident(Rc::clone(&key))
                };
                let default = if self.eat_punct("=")? {
                    Some(self.assignment()?)
                } else {
                    None
                };
                props.push(PropPattern {
                    key,
                    value,
                    default,
                });
            }
            if !self.eat_punct(",")? {
                self.expect_punct("}")?;
                break;
            }
        }
        Ok(Pattern::Object { props, rest })
    }

    // ---- expressions ---

    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        self.nested(Self::assignment_inner)
    }

    fn assignment_inner(&mut self) -> PResult<Expr> {
        if let Some(arrow) = self.try_arrow()? {
            return Ok(arrow);
        }

        let lhs = self.conditional()?;
        let op = {
            let t = self.peek()?;
            match &t.tok {
                Tok::Punct("=") => AssignOp::Set,
                Tok::Punct("+=") => AssignOp::Add,
                Tok::Punct("-=") => AssignOp::Sub,
                Tok::Punct("*=") => AssignOp::Mul,
                Tok::Punct("/=") => AssignOp::Div,
                _ => return Ok(lhs),
            }
        };
        let t = self.next()?;
        check_target(&lhs, t.start)?;
        let rhs = self.assignment()?;
        Ok(Expr::Assign(op, Box::new(lhs), Box::new(rhs)))
    }

    /// Parse an arrow function if one starts here, otherwise rewind.
    fn try_arrow(&mut self) -> PResult<Option<Expr>> {
        let mark = self.mark();
        let params = match self.peek()?.tok.clone() {
            Tok::Ident(name) if !is_reserved(&name) => {
                self.next()?;
                vec![Param {
                    pattern: Pattern::Ident(name.as_str().into()),
                    default: None,
                    rest: false,
                }]
            }
            Tok::Punct("(") => {
                self.next()?;
                match self.params() {
                    Ok(params) => params,
                    Err(_) => {
                        self.reset(mark);
                        return Ok(None);
                    }
                }
            }
            _ => return Ok(None),
        };

        if !matches!(self.peek(), Ok(t) if t.is_punct("=>")) {
            self.reset(mark);
            return Ok(None);
        }
        self.next()?;

        let body = if self.eat_punct("{")? {
            FnBody::Block(self.block_body()?)
        } else {
            FnBody::Expr(self.assignment()?)
        };
        Ok(Some(Expr::Function(Rc::new(FunctionDef {
            name: None,
            params,
            body,
        }))))
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let test = self.binary(0)?;
        if !self.eat_punct("?")? {
            return Ok(test);
        }
        let cons = self.assignment()?;
        self.expect_punct(":")?;
        let alt = self.assignment()?;
        Ok(Expr::Cond(Box::new(test), Box::new(cons), Box::new(alt)))
    }

    fn binary(&mut self, level: usize) -> PResult<Expr> {
        let Some(ops) = LEVELS.get(level) else {
            return self.exponent();
        };
        let mut lhs = self.binary(level + 1)?;
        loop {
            let op = {
                let t = self.peek()?;
                ops.iter().find(|(p, _)| t.is_punct(p)).map(|(_, op)| *op)
            };
            let Some(op) = op else {
                return Ok(lhs);
            };
            self.next()?;
            let rhs = self.binary(level + 1)?;
            lhs = match op {
                Op::Bin(b) => Expr::Binary(b, Box::new(lhs), Box::new(rhs)),
                Op::Log(l) => Expr::Logical(l, Box::new(lhs), Box::new(rhs)),
            };
        }
    }

    fn exponent(&mut self) -> PResult<Expr> {
        let base = self.unary()?;
        if self.eat_punct("**")? {
            let exp = self.nested(Self::exponent)?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn unary(&mut self) -> PResult<Expr> {
        self.nested(Self::unary_inner)
    }

    fn unary_inner(&mut self) -> PResult<Expr> {
        let t = self.peek()?.clone();
        let op = match &t.tok {
            Tok::Punct("!") => UnaryOp::Not,
            Tok::Punct("-") => UnaryOp::Neg,
            Tok::Punct("+") => UnaryOp::Plus,
            Tok::Ident(k) if k == "typeof" => UnaryOp::TypeOf,
            Tok::Punct(p @ ("++" | "--")) => {
                let delta = if *p == "++" { 1.0 } else { -1.0 };
                self.next()?;
                let target = self.unary()?;
                check_target(&target, t.start)?;
                return Ok(Expr::Update {
                    target: Box::new(target),
                    delta,
                    prefix: true,
                });
            }
            _ => return self.postfix(),
        };
        self.next()?;
        Ok(Expr::Unary(op, Box::new(self.unary()?)))
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let expr = self.call_member()?;
        let t = self.peek()?;
        let delta = if t.is_punct("++") {
            1.0
        } else if t.is_punct("--") {
            -1.0
        } else {
            return Ok(expr);
        };
        let pos = t.start;
        self.next()?;
        check_target(&expr, pos)?;
        Ok(Expr::Update {
            target: Box::new(expr),
            delta,
            prefix: false,
        })
    }

    fn call_member(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            let t = self.peek()?.clone();
            expr = match &t.tok {
                Tok::Punct(".") => {
                    self.next()?;
                    let name = self.property_name()?;
                    Expr::Member {
                        object: Box::new(expr),
                        prop: MemberProp::Named(name),
                        optional: false,
                    }
                }
                Tok::Punct("?.") => {
                    self.next()?;
                    if self.eat_punct("(")? {
                        Expr::Call {
                            callee: Box::new(expr),
                            args: self.list_items(")")?,
                            optional: true,
                        }
                    } else if self.eat_punct("[")? {
                        let index = self.expression()?;
                        self.expect_punct("]")?;
                        Expr::Member {
                            object: Box::new(expr),
                            prop: MemberProp::Computed(Box::new(index)),
                            optional: true,
                        }
                    } else {
                        Expr::Member {
                            object: Box::new(expr),
                            prop: MemberProp::Named(self.property_name()?),
                            optional: true,
                        }
                    }
                }
                Tok::Punct("[") => {
                    self.next()?;
                    let index = self.expression()?;
                    self.expect_punct("]")?;
                    Expr::Member {
                        object: Box::new(expr),
                        prop: MemberProp::Computed(Box::new(index)),
                        optional: false,
                    }
                }
                Tok::Punct("(") => {
                    self.next()?;
                    Expr::Call {
                        callee: Box::new(expr),
                        args: self.list_items(")")?,
                        optional: false,
                    }
                }
                _ => return Ok(expr),
            };
        }
    }

    fn property_name(&mut self) -> PResult<Rc<str>> {
        let t = self.next()?;
        match &t.tok {
            Tok::Ident(n) => Ok(n.as_str().into()),
            _ => self.unexpected(&t),
        }
    }

    /// Comma-separated items with optional spreads, up to `close`.
    fn list_items(&mut self, close: &str) -> PResult<Vec<ListItem>> {
        let mut items = Vec::new();
        loop {
            if self.eat_punct(close)? {
                return Ok(items);
            }
            if self.eat_punct(",")? {
                // Array hole.
                items.push(ListItem::Item(Expr::Undefined));
                continue;
            }
            let item = if self.eat_punct("...")? {
                ListItem::Spread(self.assignment()?)
            } else {
                ListItem::Item(self.assignment()?)
            };
            items.push(item);
            if !self.eat_punct(",")? {
                self.expect_punct(close)?;
                return Ok(items);
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let t = self.next()?;
        match t.tok {
            Tok::Num(n) => Ok(Expr::Num(n)),
            Tok::Str(s) => Ok(Expr::Str(s.into())),
            Tok::Template(parts) => self.template(parts),
            Tok::Ident(ref name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "null" => Ok(Expr::Null),
                "undefined" => Ok(Expr::Undefined),
                "function" => Ok(Expr::Function(self.function_rest()?)),
                "new" => {
                    // `new X(..)` is treated as a plain call of `X`.
                    let callee = self.primary()?;
                    let args = if self.eat_punct("(")? {
                        self.list_items(")")?
                    } else {
                        Vec::new()
                    };
                    Ok(Expr::Call {
                        callee: Box::new(callee),
                        args,
                        optional: false,
                    })
                }
                n if is_reserved(n) => self.unexpected(&t),
                _ => Ok(Expr::Ident(name.as_str().into())),
            },
            Tok::Punct("(") => {
                let e = self.expression()?;
                self.expect_punct(")")?;
                Ok(e)
            }
            Tok::Punct("[") => Ok(Expr::Array(self.list_items("]")?)),
            Tok::Punct("{") => self.object_literal(),
            Tok::Punct("<") => Ok(Expr::Jsx(self.jsx_element(t.start)?)),
            _ => self.unexpected(&t),
        }
    }

    fn object_literal(&mut self) -> PResult<Expr> {
        let mut items = Vec::new();
        loop {
            if self.eat_punct("}")? {
                return Ok(Expr::Object(items));
            }
            if self.eat_punct("...")? {
                items.push(ObjectItem::Spread(self.assignment()?));
            } else if self.eat_punct("[")? {
                let key = self.assignment()?;
                self.expect_punct("]")?;
                self.expect_punct(":")?;
                items.push(ObjectItem::Computed(key, self.assignment()?));
            } else {
                let t = self.next()?;
                let (key, shorthand_ok): (Rc<str>, bool) = match &t.tok {
                    Tok::Ident(n) => (n.as_str().into(), !is_reserved(n)),
                    Tok::Str(s) => (s.as_str().into(), false),
                    Tok::Num(n) => (super::value::number_to_string(*n).into(), false),
                    _ => return self.unexpected(&t),
                };
                let value = if self.eat_punct(":")? {
                    self.assignment()?
                } else if self.eat_punct("(")? {
                    let params = self.params()?;
                    self.expect_punct("{")?;
                    let body = FnBody::Block(self.block_body()?);
                    Expr::Function(Rc::new(FunctionDef {
                        name: Some(Rc::clone(&key)),
                        params,
                        body,
                    }))
                } else if shorthand_ok {
                    Expr::Ident(Rc::clone(&key))
                } else {
                    return self.unexpected(&t);
                };
                items.push(ObjectItem::Prop(key, value));
            }
            if !self.eat_punct(",")? {
                self.expect_punct("}")?;
                return Ok(Expr::Object(items));
            }
        }
    }

    fn template(&mut self, parts: Vec<RawTemplatePart>) -> PResult<Expr> {
        let mut out = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                RawTemplatePart::Str(s) => out.push(TemplatePart::Str(s)),
                RawTemplatePart::Expr(start, end) => {
                    let mut sub = Parser::new(self.src);
                    sub.lexer.seek(start);
                    sub.depth = self.depth;
                    let expr = sub.expression()?;
                    let close = sub.peek()?;
                    if close.start != end {
                        let pos = close.start;
                        return Err(SyntaxError::new("unexpected token in template expression", pos));
                    }
                    out.push(TemplatePart::Expr(expr));
                }
            }
        }
        Ok(Expr::Template(out))
    }

    // ---- JSX (character level) ---

    fn raw_rest(&self) -> &'a str {
        &self.src[self.lexer.pos()..]
    }

    fn raw_advance(&mut self, n: usize) {
        self.lexer.seek(self.lexer.pos() + n);
    }

    fn raw_skip_ws(&mut self) {
        let rest = self.raw_rest();
        let n = rest.len() - rest.trim_start().len();
        self.raw_advance(n);
    }

    fn raw_eat(&mut self, s: &str) -> bool {
        if self.raw_rest().starts_with(s) {
            self.raw_advance(s.len());
            true
        } else {
            false
        }
    }

    fn raw_name(&mut self) -> PResult<String> {
        let rest = self.raw_rest();
        if !rest.starts_with(is_ident_start) {
            return Err(SyntaxError::new("expected a JSX tag or attribute name", self.lexer.pos()));
        }
        let len = rest
            .find(|c: char| !(is_ident_part(c) || c == '-' || c == '.' || c == ':'))
            .unwrap_or(rest.len());
        let name = rest[..len].to_string();
        self.raw_advance(len);
        Ok(name)
    }

    /// An element whose `<` has already been consumed.
    fn jsx_element(&mut self, start: usize) -> PResult<Rc<JsxElement>> {
        self.peeked = None;
        self.nested(|p| p.jsx_element_inner(start))
    }

    fn jsx_element_inner(&mut self, start: usize) -> PResult<Rc<JsxElement>> {
        self.raw_skip_ws();
        if self.raw_eat(">") {
            let children = self.jsx_children("", start)?;
            return Ok(Rc::new(JsxElement {
                tag: JsxTag::Fragment,
                attrs: Vec::new(),
                children,
            }));
        }

        let name = self.raw_name()?;
        let tag = tag_for(&name);

        let mut attrs = Vec::new();
        loop {
            self.raw_skip_ws();
            if self.raw_eat("/>") {
                return Ok(Rc::new(JsxElement {
                    tag,
                    attrs,
                    children: Vec::new(),
                }));
            }
            if self.raw_eat(">") {
                break;
            }
            if self.raw_eat("{") {
                self.expect_punct("...")?;
                let value = self.assignment()?;
                self.expect_punct("}")?;
                attrs.push(JsxAttr::Spread(value));
                continue;
            }

            let attr = self.raw_name()?;
            self.raw_skip_ws();
            if !self.raw_eat("=") {
                attrs.push(JsxAttr::Named(attr.into(), Expr::Bool(true)));
                continue;
            }
            self.raw_skip_ws();
            let value_pos = self.lexer.pos();
            let rest = self.raw_rest();
            let value = if let Some(q) = rest.chars().next().filter(|c| *c == '"' || *c == '\'') {
                let Some(len) = rest[1..].find(q) else {
                    return Err(SyntaxError::new("unterminated attribute string", value_pos));
                };
                let text = decode_entities(&rest[1..1 + len]);
                self.raw_advance(len + 2);
                Expr::Str(text.into())
            } else if self.raw_eat("{") {
                let value = self.assignment()?;
                self.expect_punct("}")?;
                value
            } else if self.raw_eat("<") {
                Expr::Jsx(self.jsx_element(value_pos)?)
            } else {
                return Err(SyntaxError::new("expected an attribute value", value_pos));
            };
            attrs.push(JsxAttr::Named(attr.into(), value));
        }

        let children = self.jsx_children(&name, start)?;
        Ok(Rc::new(JsxElement {
            tag,
            attrs,
            children,
        }))
    }

    /// Children up to and including the closing tag `</name>`.
    fn jsx_children(&mut self, name: &str, start: usize) -> PResult<Vec<JsxChild>> {
        let mut children = Vec::new();
        loop {
            let rest = self.raw_rest();
            let text_len = rest.find(['{', '<']).unwrap_or(rest.len());
            if text_len > 0 {
                let text = jsx_text(&rest[..text_len]);
                if !text.is_empty() {
                    children.push(JsxChild::Text(text.into()));
                }
                self.raw_advance(text_len);
            }

            if self.raw_rest().is_empty() {
                let shown = if name.is_empty() { "fragment" } else { name };
                return Err(SyntaxError::new(format!("unclosed <{shown}> element"), start));
            }

            if self.raw_eat("{") {
                if self.eat_punct("}")? {
                    continue;
                }
                let expr = self.expression()?;
                self.expect_punct("}")?;
                children.push(JsxChild::Expr(expr));
                continue;
            }

            let lt = self.lexer.pos();
            self.raw_advance(1);
            self.raw_skip_ws();
            if self.raw_eat("/") {
                self.raw_skip_ws();
                let closing = if self.raw_rest().starts_with('>') {
                    String::new()
                } else {
                    self.raw_name()?
                };
                self.raw_skip_ws();
                if !self.raw_eat(">") {
                    return Err(SyntaxError::new("expected '>' in closing tag", self.lexer.pos()));
                }
                if closing != name {
                    return Err(SyntaxError::new(
                        format!("expected closing tag </{name}> but found </{closing}>"),
                        lt,
                    ));
                }
                return Ok(children);
            }
            children.push(JsxChild::Expr(Expr::Jsx(self.jsx_element(lt)?)));
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn describe(tok: &Tok) -> String {
    match tok {
        Tok::Eof => "end of input".into(),
        Tok::Ident(n) => format!("'{n}'"),
        Tok::Punct(p) => format!("'{p}'"),
        Tok::Num(_) => "number".into(),
        Tok::Str(_) => "string".into(),
        Tok::Template(_) => "template literal".into(),
    }
}

fn check_target(expr: &Expr, pos: usize) -> PResult<()> {
    match expr {
        Expr::Ident(..) | Expr::Member { optional: false, .. } => Ok(()),
        _ => Err(SyntaxError::new("invalid assignment target", pos)),
    }
}

/// Lower-case tags are host elements; anything else names a component.
fn tag_for(name: &str) -> JsxTag {
    let is_component = name.contains('.') || name.starts_with(|c: char| c.is_uppercase());
    if !is_component {
        return JsxTag::Intrinsic(name.into());
    }
    let mut segments = name.split('.');
    let first = segments.next().unwrap_or_default();
    let mut expr = Expr::Ident(first.into());
    for seg in segments {
        expr = Expr::Member {
            object: Box::new(expr),
            prop: MemberProp::Named(seg.into()),
            optional: false,
        };
    }
    JsxTag::Component(expr)
}

/// Collapse JSX text the way React does: lines are trimmed, blank lines
/// dropped, and the rest joined with single spaces.
fn jsx_text(raw: &str) -> String {
    let lines: Vec<&str> = raw.split('\n').collect();
    let last = lines.len() - 1;
    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        let mut s = *line;
        if i != 0 {
            s = s.trim_start();
        }
        if i != last {
            s = s.trim_end();
        }
        if s.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(s);
    }
    decode_entities(&out)
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                "copy" => Some('©'),
                "times" => Some('×'),
                "hellip" => Some('…'),
                "rarr" => Some('→'),
                "larr" => Some('←'),
                _ => entity.strip_prefix('#').and_then(|num| {
                    let code = match num.strip_prefix(['x', 'X']) {
                        Some(hex) => u32::from_str_radix(hex, 16).ok(),
                        None => num.parse().ok(),
                    };
                    code.and_then(char::from_u32)
                }),
            };
            c.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
