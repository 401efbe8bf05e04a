//! Tokenizer for the script part of the artifact language.
//!
//! JSX text is *not* tokenized here: the parser reads element children
//! straight from the source and only hands `{ … }` expressions back to the
//! lexer.  That is why the lexer is position-addressable ([`Lexer::seek`]).

use std::fmt;

use super::ast::Pos;

/// Punctuators, longest first so that greedy matching works.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", "**=", "...", "?.", "??", "=>", "==", "!=", "<=", ">=", "&&", "||", "++", "--",
    "+=", "-=", "*=", "/=", "**", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*",
    "/", "%", "=", "!", "?", ":", ".", "&", "|",
];

// ---------------------------------------------------------------------------
// SyntaxError
// ---------------------------------------------------------------------------

/// A lexing or parsing failure at a byte offset.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub message: String,
    pub pos: Pos,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, pos: Pos) -> Self {
        Self {
            message: message.into(),
            pos,
        }
    }

    /// 1-based `(line, column)` of the error in `src`.
    pub fn line_col(&self, src: &str) -> (usize, usize) {
        let upto = &src[..self.pos.min(src.len())];
        let line = upto.matches('\n').count() + 1;
        let col = upto.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        (line, col)
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

/// Piece of a template literal before its expressions are parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTemplatePart {
    Str(String),
    /// Byte range of a `${ … }` body, braces excluded.
    Expr(Pos, Pos),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Num(f64),
    Str(String),
    Template(Vec<RawTemplatePart>),
    Ident(String),
    Punct(&'static str),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub start: Pos,
    pub end: Pos,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        matches!(&self.tok, Tok::Punct(q) if *q == p)
    }

    pub fn is_ident(&self, name: &str) -> bool {
        matches!(&self.tok, Tok::Ident(n) if n == name)
    }
}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

pub struct Lexer<'a> {
    src: &'a str,
    pos: Pos,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    pub fn pos(&self) -> Pos {
        self.pos
    }

    pub fn seek(&mut self, pos: Pos) {
        self.pos = pos.min(self.src.len());
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    /// Skip whitespace and comments.
    pub fn skip_trivia(&mut self) -> Result<(), SyntaxError> {
        loop {
            let rest = self.rest();
            if let Some(c) = rest.chars().next().filter(|c| c.is_whitespace()) {
                self.pos += c.len_utf8();
            } else if rest.starts_with("//") {
                let len = rest.find('\n').unwrap_or(rest.len());
                self.pos += len;
            } else if rest.starts_with("/*") {
                let Some(end) = rest[2..].find("*/") else {
                    return Err(SyntaxError::new("unterminated comment", self.pos));
                };
                self.pos += end + 4;
            } else {
                return Ok(());
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek_char() else {
            return Ok(Token {
                tok: Tok::Eof,
                start,
                end: start,
            });
        };

        let tok = if c.is_ascii_digit()
            || (c == '.' && self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()))
        {
            self.number()?
        } else if c == '"' || c == '\'' {
            self.bump();
            Tok::Str(self.string(c)?)
        } else if c == '`' {
            self.bump();
            Tok::Template(self.template()?)
        } else if is_ident_start(c) {
            let len = self
                .rest()
                .find(|ch: char| !is_ident_part(ch))
                .unwrap_or(self.rest().len());
            let name = self.rest()[..len].to_string();
            self.pos += len;
            Tok::Ident(name)
        } else {
            self.punct()?
        };

        Ok(Token {
            tok,
            start,
            end: self.pos,
        })
    }

    fn punct(&mut self) -> Result<Tok, SyntaxError> {
        let rest = self.rest();
        for p in PUNCTUATORS {
            if rest.starts_with(p) {
                // `a?.5:0` is a conditional, not optional chaining.
                if *p == "?." && rest[2..].starts_with(|d: char| d.is_ascii_digit()) {
                    continue;
                }
                self.pos += p.len();
                return Ok(Tok::Punct(p));
            }
        }
        let c = rest.chars().next().unwrap_or('\0');
        Err(SyntaxError::new(format!("unexpected character '{c}'"), self.pos))
    }

    fn number(&mut self) -> Result<Tok, SyntaxError> {
        let start = self.pos;
        let rest = self.rest();
        if rest.starts_with("0x") || rest.starts_with("0X") {
            let digits = rest[2..]
                .find(|c: char| !c.is_ascii_hexdigit())
                .unwrap_or(rest.len() - 2);
            let value = u64::from_str_radix(&rest[2..2 + digits], 16)
                .map_err(|_| SyntaxError::new("invalid hex literal", start))?;
            self.pos += 2 + digits;
            return Ok(Tok::Num(value as f64));
        }

        let bytes = rest.as_bytes();
        let mut i = 0;
        while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
            i += 1;
        }
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mut j = i + 1;
            if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            if j < bytes.len() && bytes[j].is_ascii_digit() {
                while j < bytes.len() && bytes[j].is_ascii_digit() {
                    j += 1;
                }
                i = j;
            }
        }
        let text: String = rest[..i].chars().filter(|&c| c != '_').collect();
        let value = text
            .parse::<f64>()
            .map_err(|_| SyntaxError::new(format!("invalid number '{text}'"), start))?;
        self.pos += i;
        Ok(Tok::Num(value))
    }

    /// Body of a quoted string; the opening quote is already consumed.
    fn string(&mut self, quote: char) -> Result<String, SyntaxError> {
        let start = self.pos;
        let mut out = String::new();
        loop {
            match self.bump() {
                None | Some('\n') => {
                    return Err(SyntaxError::new("unterminated string literal", start))
                }
                Some(c) if c == quote => return Ok(out),
                Some('\\') => out.push(self.escape()?),
                Some(c) => out.push(c),
            }
        }
    }

    fn escape(&mut self) -> Result<char, SyntaxError> {
        let at = self.pos;
        let c = self
            .bump()
            .ok_or_else(|| SyntaxError::new("unterminated escape", at))?;
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            'u' => {
                let rest = self.rest();
                let (hex, consumed) = if let Some(body) = rest.strip_prefix('{') {
                    let close = body
                        .find('}')
                        .ok_or_else(|| SyntaxError::new("invalid unicode escape", at))?;
                    (&body[..close], close + 2)
                } else {
                    (rest.get(..4).unwrap_or(""), 4)
                };
                let code = u32::from_str_radix(hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| SyntaxError::new("invalid unicode escape", at))?;
                self.pos += consumed;
                code
            }
            other => other,
        })
    }

    /// Body of a template literal; the opening backtick is already consumed.
    fn template(&mut self) -> Result<Vec<RawTemplatePart>, SyntaxError> {
        let start = self.pos;
        let mut parts = Vec::new();
        let mut buf = String::new();
        loop {
            if self.rest().starts_with("${") {
                self.pos += 2;
                if !buf.is_empty() {
                    parts.push(RawTemplatePart::Str(std::mem::take(&mut buf)));
                }
                let expr_start = self.pos;
                self.skip_balanced()?;
                parts.push(RawTemplatePart::Expr(expr_start, self.pos));
                self.pos += 1; // closing brace
                continue;
            }
            match self.bump() {
                None => return Err(SyntaxError::new("unterminated template literal", start)),
                Some('`') => break,
                Some('\\') => buf.push(self.escape()?),
                Some(c) => buf.push(c),
            }
        }
        if !buf.is_empty() {
            parts.push(RawTemplatePart::Str(buf));
        }
        Ok(parts)
    }

    /// Advance to the `}` that closes the current `${`, leaving `pos` on it.
    fn skip_balanced(&mut self) -> Result<(), SyntaxError> {
        let start = self.pos;
        let mut depth = 0usize;
        loop {
            let Some(c) = self.peek_char() else {
                return Err(SyntaxError::new("unterminated template expression", start));
            };
            match c {
                '}' if depth == 0 => return Ok(()),
                '}' => depth -= 1,
                '{' => depth += 1,
                '"' | '\'' => {
                    self.bump();
                    self.string(c)?;
                    continue;
                }
                '`' => {
                    self.bump();
                    self.template()?;
                    continue;
                }
                _ => {}
            }
            self.bump();
        }
    }
}

pub fn is_ident_start(c: char) -> bool {
    c == '_' || c == '$' || c.is_alphabetic()
}

pub fn is_ident_part(c: char) -> bool {
    is_ident_start(c) || c.is_ascii_digit()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token().unwrap();
            if t.tok == Tok::Eof {
                return out;
            }
            out.push(t.tok);
        }
    }

    #[test]
    fn punctuators_are_greedy() {
        assert_eq!(
            toks("a === b ?? c?.d => ..."),
            vec![
                Tok::Ident("a".into()),
                Tok::Punct("==="),
                Tok::Ident("b".into()),
                Tok::Punct("??"),
                Tok::Ident("c".into()),
                Tok::Punct("?."),
                Tok::Ident("d".into()),
                Tok::Punct("=>"),
                Tok::Punct("..."),
            ]
        );
    }

    #[test]
    fn conditional_with_decimal_is_not_optional_chain() {
        assert_eq!(
            toks("a?.5:1"),
            vec![
                Tok::Ident("a".into()),
                Tok::Punct("?"),
                Tok::Num(0.5),
                Tok::Punct(":"),
                Tok::Num(1.0),
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            toks("1 2.5 .5 1e3 0xff 1_000"),
            vec![
                Tok::Num(1.0),
                Tok::Num(2.5),
                Tok::Num(0.5),
                Tok::Num(1000.0),
                Tok::Num(255.0),
                Tok::Num(1000.0),
            ]
        );
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(
            toks(r#"'it\'s' "a\tb" "A\u{1F600}""#),
            vec![
                Tok::Str("it's".into()),
                Tok::Str("a\tb".into()),
                Tok::Str("A\u{1F600}".into()),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            toks("a // line\n/* block */ b"),
            vec![Tok::Ident("a".into()), Tok::Ident("b".into())]
        );
    }

    #[test]
    fn template_records_expression_spans() {
        let src = "`Count: ${ {a: 1}.a } done`";
        let t = toks(src);
        let Tok::Template(parts) = &t[0] else {
            panic!("expected template, got {t:?}");
        };
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], RawTemplatePart::Str("Count: ".into()));
        let RawTemplatePart::Expr(s, e) = parts[1] else {
            panic!("expected expression part");
        };
        assert_eq!(&src[s..e], " {a: 1}.a ");
        assert_eq!(parts[2], RawTemplatePart::Str(" done".into()));
    }

    #[test]
    fn unterminated_string_reports_position() {
        let mut lexer = Lexer::new("x = 'oops");
        lexer.next_token().unwrap();
        lexer.next_token().unwrap();
        let err = lexer.next_token().unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
        assert_eq!(err.line_col("x = 'oops"), (1, 6));
    }

    #[test]
    fn line_col_counts_lines() {
        let err = SyntaxError::new("x", 8);
        assert_eq!(err.line_col("ab\ncd\nefgh"), (3, 3));
    }
}
