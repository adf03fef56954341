//! Hand-written, fault-tolerant tokenizer.
//!
//! Produces a flat token stream with INDENT/DEDENT tokens synthesized from
//! the indentation stack. Newlines inside open brackets and lines joined by
//! a trailing backslash do not terminate the logical line. Blank and
//! comment-only lines produce no tokens at all.
//!
//! Fault tolerance: unknown characters and unterminated strings become
//! [`TokenKind::Error`] tokens instead of aborting, so the parser can skip
//! the damaged region and keep going.

use crate::nodes::Span;

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or keyword; the parser distinguishes by text.
    Name,
    Number,
    Str,
    /// Operator or delimiter; the exact text is in the token.
    Op,
    /// Logical end of line.
    Newline,
    Indent,
    Dedent,
    /// End of the token stream.
    EndMarker,
    /// Unscannable input; the parser skips these.
    Error,
}

/// One token with its text, byte span and 1-indexed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    pub lineno: u32,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, span: Span, lineno: u32) -> Self {
        Token {
            kind,
            text: text.into(),
            span,
            lineno,
        }
    }

    /// True when this token is the given operator/delimiter text.
    pub fn is_op(&self, text: &str) -> bool {
        self.kind == TokenKind::Op && self.text == text
    }

    /// True when this token is the given keyword.
    pub fn is_keyword(&self, text: &str) -> bool {
        self.kind == TokenKind::Name && self.text == text
    }
}

/// Multi-character operators, longest first so greedy matching works.
const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "!=", ">=", "<=", "==", "->", "+=", "-=", "*=", "/=",
    "%=", "&=", "|=", "^=", "**", "//", "<<", ">>", "<>", "+", "-", "*", "/", "%", "&", "|",
    "^", "~", "<", ">", "(", ")", "[", "]", "{", "}", ",", ":", ".", ";", "@", "=",
];

/// Tokenize `source` into a complete token vector.
///
/// The stream always ends with trailing DEDENTs (if any) and one
/// `EndMarker`; a final NEWLINE is synthesized when the file does not end
/// with one.
pub fn tokenize(source: &str) -> Vec<Token> {
    Tokenizer::new(source).run()
}

struct Tokenizer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    lineno: u32,
    bracket_depth: u32,
    indents: Vec<u32>,
    tokens: Vec<Token>,
    /// True while no real token has been produced on the current line.
    at_line_start: bool,
}

impl<'a> Tokenizer<'a> {
    fn new(source: &'a str) -> Self {
        Tokenizer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            lineno: 1,
            bracket_depth: 0,
            indents: vec![0],
            tokens: Vec::new(),
            at_line_start: true,
        }
    }

    fn run(mut self) -> Vec<Token> {
        while self.pos < self.bytes.len() {
            if self.at_line_start && self.bracket_depth == 0 {
                self.handle_line_start();
                if self.pos >= self.bytes.len() {
                    break;
                }
            }
            self.next_token();
        }
        self.finish();
        self.tokens
    }

    fn peek(&self) -> u8 {
        self.bytes[self.pos]
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn emit(&mut self, kind: TokenKind, start: usize) {
        let span = Span::new(start, self.pos);
        let text = self.source[start..self.pos].to_string();
        self.tokens.push(Token::new(kind, text, span, self.lineno));
    }

    /// Measure indentation at a line start and emit INDENT/DEDENT tokens.
    /// Blank and comment-only lines are consumed without any tokens.
    fn handle_line_start(&mut self) {
        loop {
            let line_begin = self.pos;
            let mut width = 0u32;
            while self.pos < self.bytes.len() {
                match self.peek() {
                    b' ' => {
                        width += 1;
                        self.pos += 1;
                    }
                    b'\t' => {
                        width = (width / 8 + 1) * 8;
                        self.pos += 1;
                    }
                    _ => break,
                }
            }
            if self.pos >= self.bytes.len() {
                return;
            }
            match self.peek() {
                b'\n' => {
                    self.pos += 1;
                    self.lineno += 1;
                    continue;
                }
                b'#' => {
                    while self.pos < self.bytes.len() && self.peek() != b'\n' {
                        self.pos += 1;
                    }
                    continue;
                }
                b'\r' => {
                    self.pos += 1;
                    continue;
                }
                _ => {
                    self.apply_indent(width, line_begin);
                    self.at_line_start = false;
                    return;
                }
            }
        }
    }

    fn apply_indent(&mut self, width: u32, at: usize) {
        let current = *self.indents.last().unwrap();
        if width > current {
            self.indents.push(width);
            self.tokens.push(Token::new(
                TokenKind::Indent,
                "",
                Span::new(at, self.pos),
                self.lineno,
            ));
        } else if width < current {
            while *self.indents.last().unwrap() > width {
                self.indents.pop();
                self.tokens.push(Token::new(
                    TokenKind::Dedent,
                    "",
                    Span::new(self.pos, self.pos),
                    self.lineno,
                ));
            }
            // Tolerate dedents to a level never pushed: align to the
            // nearest enclosing level instead of failing the file.
            if *self.indents.last().unwrap() < width {
                self.indents.push(width);
            }
        }
    }

    fn next_token(&mut self) {
        let start = self.pos;
        let c = self.peek();
        match c {
            b' ' | b'\t' | b'\r' => {
                self.pos += 1;
            }
            b'\n' => {
                self.pos += 1;
                if self.bracket_depth == 0 {
                    self.emit_newline(start);
                }
                self.lineno += 1;
            }
            b'\\' if self.peek_at(1) == Some(b'\n') => {
                self.pos += 2;
                self.lineno += 1;
            }
            b'#' => {
                while self.pos < self.bytes.len() && self.peek() != b'\n' {
                    self.pos += 1;
                }
            }
            b'\'' | b'"' => self.scan_string(start, 0),
            c if c.is_ascii_digit() => self.scan_number(start),
            c if c.is_ascii_alphabetic() || c == b'_' || c >= 0x80 => self.scan_name(start),
            _ => self.scan_operator(start),
        }
    }

    fn emit_newline(&mut self, start: usize) {
        // Suppress consecutive NEWLINEs after comment-only continuations.
        if matches!(
            self.tokens.last().map(|t| t.kind),
            None | Some(TokenKind::Newline) | Some(TokenKind::Indent) | Some(TokenKind::Dedent)
        ) {
            self.at_line_start = true;
            return;
        }
        self.emit(TokenKind::Newline, start);
        self.at_line_start = true;
    }

    fn scan_name(&mut self, start: usize) {
        while self.pos < self.bytes.len() {
            let c = self.peek();
            if c.is_ascii_alphanumeric() || c == b'_' || c >= 0x80 {
                self.pos += 1;
            } else {
                break;
            }
        }
        // A short all-prefix-letter name directly followed by a quote is a
        // string prefix (r'...', b"...", rb'...').
        let text = &self.source[start..self.pos];
        if text.len() <= 2
            && text.bytes().all(|b| matches!(b, b'r' | b'b' | b'u' | b'f' | b'R' | b'B' | b'U' | b'F'))
            && self.pos < self.bytes.len()
            && matches!(self.peek(), b'\'' | b'"')
        {
            self.scan_string(start, self.pos - start);
            return;
        }
        self.emit(TokenKind::Name, start);
    }

    /// Scan a string whose opening quote is at the current position;
    /// `prefix_len` bytes of prefix letters were already consumed.
    fn scan_string(&mut self, start: usize, prefix_len: usize) {
        let quote = self.peek();
        let triple = self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote);
        let quote_len = if triple { 3 } else { 1 };
        self.pos += quote_len;
        let raw = self.source[start..start + prefix_len]
            .bytes()
            .any(|b| b == b'r' || b == b'R');
        loop {
            if self.pos >= self.bytes.len() {
                // Unterminated string: emit what we have as an error token.
                self.emit(TokenKind::Error, start);
                return;
            }
            let c = self.peek();
            if c == b'\\' && !raw && self.pos + 1 < self.bytes.len() {
                if self.peek_at(1) == Some(b'\n') {
                    self.lineno += 1;
                }
                self.pos += 2;
                continue;
            }
            if c == b'\n' {
                if !triple {
                    // Single-quoted strings do not span lines; degrade to
                    // the last valid subrange.
                    self.emit(TokenKind::Error, start);
                    return;
                }
                self.lineno += 1;
                self.pos += 1;
                continue;
            }
            if c == quote {
                if !triple {
                    self.pos += 1;
                    self.emit(TokenKind::Str, start);
                    return;
                }
                if self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    self.pos += 3;
                    self.emit(TokenKind::Str, start);
                    return;
                }
            }
            self.pos += 1;
        }
    }

    fn scan_number(&mut self, start: usize) {
        if self.peek() == b'0'
            && matches!(self.peek_at(1), Some(b'x') | Some(b'X') | Some(b'o') | Some(b'O') | Some(b'b') | Some(b'B'))
        {
            self.pos += 2;
            while self.pos < self.bytes.len() && self.peek().is_ascii_alphanumeric() {
                self.pos += 1;
            }
            self.emit(TokenKind::Number, start);
            return;
        }
        while self.pos < self.bytes.len() && self.peek().is_ascii_digit() {
            self.pos += 1;
        }
        if self.pos < self.bytes.len() && self.peek() == b'.' {
            // A dot directly after digits belongs to the number.
            self.pos += 1;
            while self.pos < self.bytes.len() && self.peek().is_ascii_digit() {
                self.pos += 1;
            }
        }
        if self.pos < self.bytes.len() && matches!(self.peek(), b'e' | b'E') {
            let mark = self.pos;
            self.pos += 1;
            if self.pos < self.bytes.len() && matches!(self.peek(), b'+' | b'-') {
                self.pos += 1;
            }
            if self.pos < self.bytes.len() && self.peek().is_ascii_digit() {
                while self.pos < self.bytes.len() && self.peek().is_ascii_digit() {
                    self.pos += 1;
                }
            } else {
                self.pos = mark;
            }
        }
        if self.pos < self.bytes.len() && matches!(self.peek(), b'j' | b'J' | b'l' | b'L') {
            self.pos += 1;
        }
        self.emit(TokenKind::Number, start);
    }

    fn scan_operator(&mut self, start: usize) {
        for op in OPERATORS {
            if self.source[self.pos..].starts_with(op) {
                self.pos += op.len();
                match *op {
                    "(" | "[" | "{" => self.bracket_depth += 1,
                    ")" | "]" | "}" => self.bracket_depth = self.bracket_depth.saturating_sub(1),
                    _ => {}
                }
                self.emit(TokenKind::Op, start);
                return;
            }
        }
        // Unknown character: error token, skip one byte.
        self.pos += 1;
        self.emit(TokenKind::Error, start);
    }

    fn finish(&mut self) {
        let end = self.bytes.len();
        if !matches!(
            self.tokens.last().map(|t| t.kind),
            None | Some(TokenKind::Newline) | Some(TokenKind::Indent) | Some(TokenKind::Dedent)
        ) {
            self.tokens
                .push(Token::new(TokenKind::Newline, "", Span::new(end, end), self.lineno));
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.tokens
                .push(Token::new(TokenKind::Dedent, "", Span::new(end, end), self.lineno));
        }
        self.tokens
            .push(Token::new(TokenKind::EndMarker, "", Span::new(end, end), self.lineno));
    }
}

// ============================================================================
// Tests
// ============================================================================
