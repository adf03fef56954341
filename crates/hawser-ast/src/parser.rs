//! Recursive-descent parser over the token stream.
//!
//! [`parse`] is strict: the first syntax error aborts with a [`ParseError`]
//! carrying the line number, which the module cache may demote to an empty
//! module when the workspace ignores syntax errors. [`parse_tolerant`] is
//! the tool-input path: unparsable statements are skipped to the end of
//! their line and recorded on the module instead of failing.

use thiserror::Error;
use tracing::trace;

use crate::nodes::{
    BinaryOp, BoolOp, CompareOp, Comprehension, ExceptHandler, Expr, ExprKind, ImportAlias,
    Module, Number, Param, Params, Span, Stmt, StmtKind, UnaryOp,
};
use crate::tokenizer::{tokenize, Token, TokenKind};

// ============================================================================
// Error Type
// ============================================================================

/// A parse failure with its 1-indexed line.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

impl ParseError {
    fn new(line: u32, message: impl Into<String>) -> Self {
        ParseError {
            line,
            message: message.into(),
        }
    }
}

/// Result type for parser operations.
pub type ParseResult<T> = Result<T, ParseError>;

// ============================================================================
// Entry Points
// ============================================================================

/// Parse `source` strictly: AST or the first syntax error.
pub fn parse(source: &str) -> ParseResult<Module> {
    let mut parser = Parser::new(source, false);
    let module = parser.parse_module()?;
    Ok(module)
}

/// Parse `source` tolerantly: statements that do not parse are skipped to
/// the next line and recorded in [`Module::recovered`].
pub fn parse_tolerant(source: &str) -> Module {
    let mut parser = Parser::new(source, true);
    parser
        .parse_module()
        .expect("tolerant parse never fails at module level")
}

// ============================================================================
// Parser
// ============================================================================

/// Names that can never be identifiers.
const KEYWORDS: &[&str] = &[
    "and", "or", "not", "if", "else", "elif", "while", "for", "in", "is", "def", "class",
    "return", "yield", "import", "from", "as", "pass", "break", "continue", "global", "del",
    "raise", "try", "except", "finally", "with", "lambda", "assert", "None", "True", "False",
];

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    tolerant: bool,
    recovered: Vec<(u32, String)>,
}

impl Parser {
    fn new(source: &str, tolerant: bool) -> Self {
        Parser {
            tokens: tokenize(source),
            pos: 0,
            tolerant,
            recovered: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Token access
    // ------------------------------------------------------------------

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_ahead(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.peek().kind == TokenKind::EndMarker
    }

    fn lineno(&self) -> u32 {
        self.peek().lineno
    }

    fn start(&self) -> usize {
        self.peek().span.start
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn eat_op(&mut self, text: &str) -> bool {
        if self.peek().is_op(text) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_op(&mut self, text: &str) -> ParseResult<Token> {
        if self.peek().is_op(text) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&format!("expected '{}'", text)))
        }
    }

    fn eat_keyword(&mut self, text: &str) -> bool {
        if self.peek().is_keyword(text) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_keyword(&mut self, text: &str) -> ParseResult<Token> {
        if self.peek().is_keyword(text) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(&format!("expected '{}'", text)))
        }
    }

    fn expect_newline(&mut self) -> ParseResult<()> {
        match self.peek().kind {
            TokenKind::Newline => {
                self.bump();
                Ok(())
            }
            TokenKind::EndMarker | TokenKind::Dedent => Ok(()),
            _ => Err(self.unexpected("expected end of line")),
        }
    }

    fn expect_name(&mut self) -> ParseResult<(String, Span, u32)> {
        let token = self.peek();
        if token.kind == TokenKind::Name && !KEYWORDS.contains(&token.text.as_str()) {
            let token = self.bump();
            Ok((token.text, token.span, token.lineno))
        } else {
            Err(self.unexpected("expected an identifier"))
        }
    }

    fn at_name(&self) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Name && !KEYWORDS.contains(&token.text.as_str())
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        let found = match token.kind {
            TokenKind::Newline => "end of line".to_string(),
            TokenKind::EndMarker => "end of file".to_string(),
            TokenKind::Indent => "indent".to_string(),
            TokenKind::Dedent => "dedent".to_string(),
            _ => format!("'{}'", token.text),
        };
        ParseError::new(token.lineno, format!("{}, found {}", expected, found))
    }

    // ------------------------------------------------------------------
    // Module and suites
    // ------------------------------------------------------------------

    fn parse_module(&mut self) -> ParseResult<Module> {
        let mut body = Vec::new();
        while !self.at_end() {
            match self.peek().kind {
                TokenKind::Newline | TokenKind::Error => {
                    self.bump();
                }
                TokenKind::Indent | TokenKind::Dedent => {
                    // Stray indentation at module level.
                    let err = self.unexpected("unexpected indentation");
                    if !self.tolerant {
                        return Err(err);
                    }
                    self.recovered.push((err.line, err.message));
                    self.skip_balanced();
                }
                _ => match self.parse_statement() {
                    Ok(mut stmts) => body.append(&mut stmts),
                    Err(err) => {
                        if !self.tolerant {
                            return Err(err);
                        }
                        trace!(line = err.line, "skipping unparsable statement");
                        self.recovered.push((err.line, err.message));
                        self.recover();
                    }
                },
            }
        }
        Ok(Module {
            body,
            recovered: std::mem::take(&mut self.recovered),
        })
    }

    /// Skip to the next statement boundary after an error: consume through
    /// the next NEWLINE, then any indented block that follows.
    fn recover(&mut self) {
        while !self.at_end() && self.peek().kind != TokenKind::Newline {
            if self.peek().kind == TokenKind::Dedent {
                return;
            }
            self.bump();
        }
        if self.peek().kind == TokenKind::Newline {
            self.bump();
        }
        if self.peek().kind == TokenKind::Indent {
            self.skip_balanced();
        }
    }

    /// Consume an INDENT...DEDENT region, balancing nested blocks.
    fn skip_balanced(&mut self) {
        let mut depth = 0i32;
        loop {
            match self.peek().kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth -= 1;
                    if depth <= 0 {
                        self.bump();
                        return;
                    }
                }
                TokenKind::EndMarker => return,
                _ => {}
            }
            self.bump();
        }
    }

    /// Parse `: suite`, either inline simple statements or an indented
    /// block.
    fn parse_suite(&mut self) -> ParseResult<Vec<Stmt>> {
        self.expect_op(":")?;
        if self.peek().kind != TokenKind::Newline {
            // Inline suite: simple statements on the header line.
            return self.parse_simple_line();
        }
        self.bump();
        if self.peek().kind != TokenKind::Indent {
            return Err(self.unexpected("expected an indented block"));
        }
        self.bump();
        let mut body = Vec::new();
        loop {
            match self.peek().kind {
                TokenKind::Dedent => {
                    self.bump();
                    break;
                }
                TokenKind::EndMarker => break,
                TokenKind::Newline | TokenKind::Error => {
                    self.bump();
                }
                _ => match self.parse_statement() {
                    Ok(mut stmts) => body.append(&mut stmts),
                    Err(err) => {
                        if !self.tolerant {
                            return Err(err);
                        }
                        self.recovered.push((err.line, err.message));
                        self.recover();
                    }
                },
            }
        }
        Ok(body)
    }

    // ------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------

    fn parse_statement(&mut self) -> ParseResult<Vec<Stmt>> {
        if self.peek().kind == TokenKind::Name {
            let text = self.peek().text.clone();
            match text.as_str() {
                "if" => return Ok(vec![self.parse_if()?]),
                "while" => return Ok(vec![self.parse_while()?]),
                "for" => return Ok(vec![self.parse_for()?]),
                "try" => return Ok(vec![self.parse_try()?]),
                "with" => return Ok(vec![self.parse_with()?]),
                "def" => return Ok(vec![self.parse_function(Vec::new())?]),
                "class" => return Ok(vec![self.parse_class(Vec::new())?]),
                _ => {}
            }
        }
        if self.peek().is_op("@") {
            return Ok(vec![self.parse_decorated()?]);
        }
        self.parse_simple_line()
    }

    /// One physical line of `;`-separated simple statements.
    fn parse_simple_line(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut stmts = vec![self.parse_simple_statement()?];
        while self.eat_op(";") {
            if self.peek().kind == TokenKind::Newline {
                break;
            }
            stmts.push(self.parse_simple_statement()?);
        }
        self.expect_newline()?;
        Ok(stmts)
    }

    fn parse_simple_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        let lineno = self.lineno();
        let kind = if self.eat_keyword("pass") {
            StmtKind::Pass
        } else if self.eat_keyword("break") {
            StmtKind::Break
        } else if self.eat_keyword("continue") {
            StmtKind::Continue
        } else if self.eat_keyword("return") {
            let value = if self.at_expression_start() {
                Some(self.parse_testlist()?)
            } else {
                None
            };
            StmtKind::Return { value }
        } else if self.eat_keyword("raise") {
            let exc = if self.at_expression_start() {
                let exc = self.parse_test()?;
                // Old-style `raise E, arg` trailer.
                if self.eat_op(",") {
                    let _ = self.parse_testlist()?;
                }
                Some(exc)
            } else {
                None
            };
            StmtKind::Raise { exc }
        } else if self.eat_keyword("global") {
            let mut names = Vec::new();
            loop {
                let (name, span, _) = self.expect_name()?;
                names.push((name, span));
                if !self.eat_op(",") {
                    break;
                }
            }
            StmtKind::Global { names }
        } else if self.eat_keyword("del") {
            let mut targets = vec![self.parse_test()?];
            while self.eat_op(",") {
                targets.push(self.parse_test()?);
            }
            StmtKind::Delete { targets }
        } else if self.eat_keyword("assert") {
            // The asserted expression still participates in analysis; the
            // optional message is parsed and dropped.
            let test = self.parse_test()?;
            if self.eat_op(",") {
                let _ = self.parse_test()?;
            }
            StmtKind::Expr(test)
        } else if self.peek().is_keyword("import") {
            self.parse_import()?
        } else if self.peek().is_keyword("from") {
            self.parse_from_import()?
        } else {
            return self.parse_expr_statement();
        };
        Ok(Stmt {
            kind,
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_import(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword("import")?;
        let mut names = Vec::new();
        loop {
            let (name, span) = self.parse_dotted_name()?;
            let asname = if self.eat_keyword("as") {
                Some(self.expect_name()?.0)
            } else {
                None
            };
            names.push(ImportAlias { name, asname, span });
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(StmtKind::Import { names })
    }

    fn parse_from_import(&mut self) -> ParseResult<StmtKind> {
        self.expect_keyword("from")?;
        let mut level = 0u32;
        let module_start = self.start();
        while self.eat_op(".") {
            level += 1;
        }
        let (module, module_span) = if self.peek().is_keyword("import") {
            // `from . import x` is purely relative.
            (String::new(), Span::new(module_start, self.prev_end()))
        } else {
            let (name, span) = self.parse_dotted_name()?;
            (name, Span::new(module_start.min(span.start), span.end))
        };
        self.expect_keyword("import")?;
        if self.eat_op("*") {
            return Ok(StmtKind::ImportFrom {
                module,
                module_span,
                level,
                names: Vec::new(),
                is_star: true,
            });
        }
        let parenthesized = self.eat_op("(");
        let mut names = Vec::new();
        loop {
            let (name, span, _) = self.expect_name()?;
            let asname = if self.eat_keyword("as") {
                Some(self.expect_name()?.0)
            } else {
                None
            };
            names.push(ImportAlias { name, asname, span });
            if !self.eat_op(",") {
                break;
            }
            if parenthesized && self.peek().is_op(")") {
                break;
            }
        }
        if parenthesized {
            self.expect_op(")")?;
        }
        Ok(StmtKind::ImportFrom {
            module,
            module_span,
            level,
            names,
            is_star: false,
        })
    }

    fn parse_dotted_name(&mut self) -> ParseResult<(String, Span)> {
        let (first, span, _) = self.expect_name()?;
        let mut name = first;
        let start = span.start;
        let mut end = span.end;
        while self.peek().is_op(".") && self.peek_ahead(1).kind == TokenKind::Name {
            self.bump();
            let (part, part_span, _) = self.expect_name()?;
            name.push('.');
            name.push_str(&part);
            end = part_span.end;
        }
        Ok((name, Span::new(start, end)))
    }

    fn parse_expr_statement(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        let lineno = self.lineno();
        let first = self.parse_testlist_or_yield()?;

        // Augmented assignment.
        let aug = match self.peek().text.as_str() {
            "+=" => Some(BinaryOp::Add),
            "-=" => Some(BinaryOp::Sub),
            "*=" => Some(BinaryOp::Mult),
            "/=" => Some(BinaryOp::Div),
            "//=" => Some(BinaryOp::FloorDiv),
            "%=" => Some(BinaryOp::Mod),
            "**=" => Some(BinaryOp::Pow),
            "<<=" => Some(BinaryOp::LShift),
            ">>=" => Some(BinaryOp::RShift),
            "&=" => Some(BinaryOp::BitAnd),
            "|=" => Some(BinaryOp::BitOr),
            "^=" => Some(BinaryOp::BitXor),
            _ => None,
        };
        if let Some(op) = aug {
            if self.peek().kind == TokenKind::Op {
                self.bump();
                let value = self.parse_testlist_or_yield()?;
                return Ok(Stmt {
                    kind: StmtKind::AugAssign {
                        target: first,
                        op,
                        value,
                    },
                    span: Span::new(start, self.prev_end()),
                    lineno,
                });
            }
        }

        if self.peek().is_op("=") {
            let mut exprs = vec![first];
            while self.eat_op("=") {
                exprs.push(self.parse_testlist_or_yield()?);
            }
            let value = exprs.pop().unwrap();
            for target in &exprs {
                if !target.is_target() {
                    return Err(ParseError::new(
                        target.lineno,
                        "cannot assign to this expression".to_string(),
                    ));
                }
            }
            return Ok(Stmt {
                kind: StmtKind::Assign {
                    targets: exprs,
                    value,
                },
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }

        Ok(Stmt {
            kind: StmtKind::Expr(first),
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_decorated(&mut self) -> ParseResult<Stmt> {
        let mut decorators = Vec::new();
        while self.eat_op("@") {
            let deco = self.parse_postfix()?;
            decorators.push(deco);
            self.expect_newline()?;
        }
        if self.peek().is_keyword("def") {
            self.parse_function(decorators)
        } else if self.peek().is_keyword("class") {
            self.parse_class(decorators)
        } else {
            Err(self.unexpected("expected 'def' or 'class' after decorators"))
        }
    }

    fn parse_function(&mut self, decorators: Vec<Expr>) -> ParseResult<Stmt> {
        let start = decorators
            .first()
            .map(|d| d.span.start)
            .unwrap_or_else(|| self.start());
        let lineno = self.lineno();
        self.expect_keyword("def")?;
        let (name, name_span, _) = self.expect_name()?;
        self.expect_op("(")?;
        let params = self.parse_params(true)?;
        self.expect_op(")")?;
        let body = self.parse_suite()?;
        Ok(Stmt {
            kind: StmtKind::FunctionDef {
                name,
                name_span,
                params,
                decorators,
                body,
            },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_class(&mut self, decorators: Vec<Expr>) -> ParseResult<Stmt> {
        let start = decorators
            .first()
            .map(|d| d.span.start)
            .unwrap_or_else(|| self.start());
        let lineno = self.lineno();
        self.expect_keyword("class")?;
        let (name, name_span, _) = self.expect_name()?;
        let mut bases = Vec::new();
        if self.eat_op("(") {
            while !self.peek().is_op(")") {
                bases.push(self.parse_test()?);
                if !self.eat_op(",") {
                    break;
                }
            }
            self.expect_op(")")?;
        }
        let body = self.parse_suite()?;
        Ok(Stmt {
            kind: StmtKind::ClassDef {
                name,
                name_span,
                bases,
                decorators,
                body,
            },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    /// Parameter list; `parenthesized` allows a trailing comma before `)`.
    fn parse_params(&mut self, parenthesized: bool) -> ParseResult<Params> {
        let mut params = Params::default();
        loop {
            if parenthesized && self.peek().is_op(")") {
                break;
            }
            if self.eat_op("*") {
                if self.eat_op("*") {
                    // `* *name` never occurs; real input is `**name`.
                    let (name, span, _) = self.expect_name()?;
                    params.kwarg = Some(Param {
                        name,
                        span,
                        default: None,
                    });
                } else {
                    let (name, span, _) = self.expect_name()?;
                    params.vararg = Some(Param {
                        name,
                        span,
                        default: None,
                    });
                }
            } else if self.eat_op("**") {
                let (name, span, _) = self.expect_name()?;
                params.kwarg = Some(Param {
                    name,
                    span,
                    default: None,
                });
            } else if self.at_name() {
                let (name, span, _) = self.expect_name()?;
                let default = if self.eat_op("=") {
                    Some(self.parse_test()?)
                } else {
                    None
                };
                params.args.push(Param {
                    name,
                    span,
                    default,
                });
            } else {
                break;
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok(params)
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_keyword("if")?;
        let test = self.parse_test()?;
        let body = self.parse_suite()?;
        let orelse = self.parse_if_tail()?;
        Ok(Stmt {
            kind: StmtKind::If { test, body, orelse },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_if_tail(&mut self) -> ParseResult<Vec<Stmt>> {
        if self.peek().is_keyword("elif") {
            let start = self.start();
            let lineno = self.lineno();
            self.bump();
            let test = self.parse_test()?;
            let body = self.parse_suite()?;
            let orelse = self.parse_if_tail()?;
            return Ok(vec![Stmt {
                kind: StmtKind::If { test, body, orelse },
                span: Span::new(start, self.prev_end()),
                lineno,
            }]);
        }
        if self.eat_keyword("else") {
            return self.parse_suite();
        }
        Ok(Vec::new())
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_keyword("while")?;
        let test = self.parse_test()?;
        let body = self.parse_suite()?;
        let orelse = if self.eat_keyword("else") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            kind: StmtKind::While { test, body, orelse },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_for(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_keyword("for")?;
        let target = self.parse_target_list()?;
        self.expect_keyword("in")?;
        let iter = self.parse_testlist()?;
        let body = self.parse_suite()?;
        let orelse = if self.eat_keyword("else") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        Ok(Stmt {
            kind: StmtKind::For {
                target,
                iter,
                body,
                orelse,
            },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_try(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_keyword("try")?;
        let body = self.parse_suite()?;
        let mut handlers = Vec::new();
        while self.peek().is_keyword("except") {
            let handler_lineno = self.lineno();
            self.bump();
            let mut typ = None;
            let mut name = None;
            let mut name_span = None;
            if !self.peek().is_op(":") {
                typ = Some(self.parse_test()?);
                // `as e` (or the old `, e` spelling) binds the exception.
                if self.eat_keyword("as") || self.eat_op(",") {
                    let (n, s, _) = self.expect_name()?;
                    name = Some(n);
                    name_span = Some(s);
                }
            }
            let handler_body = self.parse_suite()?;
            handlers.push(ExceptHandler {
                typ,
                name,
                name_span,
                body: handler_body,
                lineno: handler_lineno,
            });
        }
        let orelse = if self.eat_keyword("else") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        let finalbody = if self.eat_keyword("finally") {
            self.parse_suite()?
        } else {
            Vec::new()
        };
        if handlers.is_empty() && finalbody.is_empty() {
            return Err(ParseError::new(
                lineno,
                "try statement needs an except or finally clause".to_string(),
            ));
        }
        Ok(Stmt {
            kind: StmtKind::Try {
                body,
                handlers,
                orelse,
                finalbody,
            },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_with(&mut self) -> ParseResult<Stmt> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_keyword("with")?;
        self.parse_with_item(start, lineno)
    }

    /// One `with` item; further comma-separated items nest in the body.
    fn parse_with_item(&mut self, start: usize, lineno: u32) -> ParseResult<Stmt> {
        let context = self.parse_test()?;
        let target = if self.eat_keyword("as") {
            Some(self.parse_target_list()?)
        } else {
            None
        };
        let body = if self.eat_op(",") {
            vec![self.parse_with_item(self.start(), self.lineno())?]
        } else {
            self.parse_suite()?
        };
        Ok(Stmt {
            kind: StmtKind::With {
                context,
                target,
                body,
            },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_target_list(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        let first = self.parse_postfix()?;
        if !self.peek().is_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if !self.at_expression_start() {
                break;
            }
            items.push(self.parse_postfix()?);
        }
        Ok(Expr {
            kind: ExprKind::Tuple(items),
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    // ------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------

    fn at_expression_start(&self) -> bool {
        let token = self.peek();
        match token.kind {
            TokenKind::Name => {
                !matches!(
                    token.text.as_str(),
                    "in" | "is" | "and" | "or" | "if" | "else" | "elif" | "as" | "import"
                        | "from" | "for" | "while" | "def" | "class" | "except" | "finally"
                        | "pass" | "break" | "continue" | "global" | "del" | "return" | "raise"
                        | "try" | "with" | "assert"
                )
            }
            TokenKind::Number | TokenKind::Str => true,
            TokenKind::Op => matches!(
                token.text.as_str(),
                "(" | "[" | "{" | "-" | "+" | "~" | "*" | "**"
            ),
            _ => false,
        }
    }

    /// `testlist`: one or more tests; more than one (or a trailing comma)
    /// makes a tuple.
    fn parse_testlist(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        let first = self.parse_test()?;
        if !self.peek().is_op(",") {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if !self.at_expression_start() {
                break;
            }
            items.push(self.parse_test()?);
        }
        Ok(Expr {
            kind: ExprKind::Tuple(items),
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_testlist_or_yield(&mut self) -> ParseResult<Expr> {
        if self.peek().is_keyword("yield") {
            return self.parse_yield();
        }
        self.parse_testlist()
    }

    fn parse_yield(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_keyword("yield")?;
        let value = if self.at_expression_start() {
            Some(Box::new(self.parse_testlist()?))
        } else {
            None
        };
        Ok(Expr {
            kind: ExprKind::Yield { value },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_test(&mut self) -> ParseResult<Expr> {
        if self.peek().is_keyword("lambda") {
            return self.parse_lambda();
        }
        let start = self.start();
        let lineno = self.lineno();
        let body = self.parse_or_test()?;
        if self.peek().is_keyword("if") {
            self.bump();
            let test = self.parse_or_test()?;
            self.expect_keyword("else")?;
            let orelse = self.parse_test()?;
            return Ok(Expr {
                kind: ExprKind::IfExpr {
                    test: Box::new(test),
                    body: Box::new(body),
                    orelse: Box::new(orelse),
                },
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        Ok(body)
    }

    fn parse_lambda(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_keyword("lambda")?;
        let params = self.parse_params(false)?;
        self.expect_op(":")?;
        let body = self.parse_test()?;
        Ok(Expr {
            kind: ExprKind::Lambda {
                params: Box::new(params),
                body: Box::new(body),
            },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_or_test(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        let first = self.parse_and_test()?;
        if !self.peek().is_keyword("or") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword("or") {
            values.push(self.parse_and_test()?);
        }
        Ok(Expr {
            kind: ExprKind::BoolExpr {
                op: BoolOp::Or,
                values,
            },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_and_test(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        let first = self.parse_not_test()?;
        if !self.peek().is_keyword("and") {
            return Ok(first);
        }
        let mut values = vec![first];
        while self.eat_keyword("and") {
            values.push(self.parse_not_test()?);
        }
        Ok(Expr {
            kind: ExprKind::BoolExpr {
                op: BoolOp::And,
                values,
            },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_not_test(&mut self) -> ParseResult<Expr> {
        if self.peek().is_keyword("not") {
            let start = self.start();
            let lineno = self.lineno();
            self.bump();
            let operand = self.parse_not_test()?;
            return Ok(Expr {
                kind: ExprKind::UnaryExpr {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                },
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        self.parse_comparison()
    }

    fn comparison_op(&mut self) -> Option<CompareOp> {
        let kind = self.peek().kind;
        let text = self.peek().text.clone();
        match (kind, text.as_str()) {
            (TokenKind::Op, "==") => {
                self.bump();
                Some(CompareOp::Eq)
            }
            (TokenKind::Op, "!=") | (TokenKind::Op, "<>") => {
                self.bump();
                Some(CompareOp::NotEq)
            }
            (TokenKind::Op, "<") => {
                self.bump();
                Some(CompareOp::Lt)
            }
            (TokenKind::Op, "<=") => {
                self.bump();
                Some(CompareOp::LtE)
            }
            (TokenKind::Op, ">") => {
                self.bump();
                Some(CompareOp::Gt)
            }
            (TokenKind::Op, ">=") => {
                self.bump();
                Some(CompareOp::GtE)
            }
            (TokenKind::Name, "in") => {
                self.bump();
                Some(CompareOp::In)
            }
            (TokenKind::Name, "is") => {
                self.bump();
                if self.eat_keyword("not") {
                    Some(CompareOp::IsNot)
                } else {
                    Some(CompareOp::Is)
                }
            }
            (TokenKind::Name, "not") if self.peek_ahead(1).is_keyword("in") => {
                self.bump();
                self.bump();
                Some(CompareOp::NotIn)
            }
            _ => None,
        }
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        let left = self.parse_bit_or()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.parse_bit_or()?));
        }
        if rest.is_empty() {
            return Ok(left);
        }
        Ok(Expr {
            kind: ExprKind::Compare {
                left: Box::new(left),
                rest,
            },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> ParseResult<Expr>,
    ) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        let mut left = next(self)?;
        loop {
            let matched = ops.iter().find(|(text, _)| self.peek().is_op(text));
            let Some(&(_, op)) = matched else {
                return Ok(left);
            };
            self.bump();
            let right = next(self)?;
            left = Expr {
                kind: ExprKind::BinExpr {
                    left: Box::new(left),
                    op,
                    right: Box::new(right),
                },
                span: Span::new(start, self.prev_end()),
                lineno,
            };
        }
    }

    fn parse_bit_or(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[("|", BinaryOp::BitOr)], Self::parse_bit_xor)
    }

    fn parse_bit_xor(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[("^", BinaryOp::BitXor)], Self::parse_bit_and)
    }

    fn parse_bit_and(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(&[("&", BinaryOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[("<<", BinaryOp::LShift), (">>", BinaryOp::RShift)],
            Self::parse_arith,
        )
    }

    fn parse_arith(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::parse_term,
        )
    }

    fn parse_term(&mut self) -> ParseResult<Expr> {
        self.parse_binary_level(
            &[
                ("*", BinaryOp::Mult),
                ("//", BinaryOp::FloorDiv),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Mod),
            ],
            Self::parse_factor,
        )
    }

    fn parse_factor(&mut self) -> ParseResult<Expr> {
        let token = self.peek();
        let op = match token.text.as_str() {
            "-" if token.kind == TokenKind::Op => Some(UnaryOp::Neg),
            "+" if token.kind == TokenKind::Op => Some(UnaryOp::Pos),
            "~" if token.kind == TokenKind::Op => Some(UnaryOp::Invert),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.start();
            let lineno = self.lineno();
            self.bump();
            let operand = self.parse_factor()?;
            return Ok(Expr {
                kind: ExprKind::UnaryExpr {
                    op,
                    operand: Box::new(operand),
                },
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        self.parse_power()
    }

    fn parse_power(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        let base = self.parse_postfix()?;
        if self.eat_op("**") {
            let exponent = self.parse_factor()?;
            return Ok(Expr {
                kind: ExprKind::BinExpr {
                    left: Box::new(base),
                    op: BinaryOp::Pow,
                    right: Box::new(exponent),
                },
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        Ok(base)
    }

    /// Atom followed by call/subscript/attribute trailers.
    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        let mut value = self.parse_atom()?;
        loop {
            if self.peek().is_op("(") {
                self.bump();
                let (args, keywords) = self.parse_call_args()?;
                self.expect_op(")")?;
                value = Expr {
                    kind: ExprKind::Call {
                        func: Box::new(value),
                        args,
                        keywords,
                    },
                    span: Span::new(start, self.prev_end()),
                    lineno,
                };
            } else if self.peek().is_op("[") {
                self.bump();
                let index = self.parse_subscript()?;
                self.expect_op("]")?;
                value = Expr {
                    kind: ExprKind::Subscript {
                        value: Box::new(value),
                        index: Box::new(index),
                    },
                    span: Span::new(start, self.prev_end()),
                    lineno,
                };
            } else if self.peek().is_op(".") {
                self.bump();
                let (attr, attr_span, _) = self.expect_name()?;
                value = Expr {
                    kind: ExprKind::Attribute {
                        value: Box::new(value),
                        attr,
                        attr_span,
                    },
                    span: Span::new(start, self.prev_end()),
                    lineno,
                };
            } else {
                return Ok(value);
            }
        }
    }

    fn parse_call_args(&mut self) -> ParseResult<(Vec<Expr>, Vec<(String, Expr)>)> {
        let mut args = Vec::new();
        let mut keywords = Vec::new();
        while !self.peek().is_op(")") {
            if self.eat_op("*") {
                let start = self.start();
                let lineno = self.lineno();
                let inner = self.parse_test()?;
                args.push(Expr {
                    span: Span::new(start, self.prev_end()),
                    lineno,
                    kind: ExprKind::Starred(Box::new(inner)),
                });
            } else if self.eat_op("**") {
                let value = self.parse_test()?;
                keywords.push(("**".to_string(), value));
            } else if self.at_name() && self.peek_ahead(1).is_op("=") {
                let (name, _, _) = self.expect_name()?;
                self.bump();
                let value = self.parse_test()?;
                keywords.push((name, value));
            } else {
                let value = self.parse_test()?;
                // A bare generator argument: f(x for x in xs).
                if self.peek().is_keyword("for") {
                    let generators = self.parse_comprehension_clauses()?;
                    let span = Span::new(value.span.start, self.prev_end());
                    let lineno = value.lineno;
                    args.push(Expr {
                        kind: ExprKind::GeneratorExp {
                            element: Box::new(value),
                            generators,
                        },
                        span,
                        lineno,
                    });
                } else {
                    args.push(value);
                }
            }
            if !self.eat_op(",") {
                break;
            }
        }
        Ok((args, keywords))
    }

    fn parse_subscript(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        let lower = if self.peek().is_op(":") {
            None
        } else {
            Some(Box::new(self.parse_testlist()?))
        };
        if !self.peek().is_op(":") {
            return Ok(*lower.expect("subscript without index"));
        }
        self.bump();
        let upper = if self.peek().is_op(":") || self.peek().is_op("]") {
            None
        } else {
            Some(Box::new(self.parse_test()?))
        };
        let step = if self.eat_op(":") {
            if self.peek().is_op("]") {
                None
            } else {
                Some(Box::new(self.parse_test()?))
            }
        } else {
            None
        };
        Ok(Expr {
            kind: ExprKind::Slice { lower, upper, step },
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_comprehension_clauses(&mut self) -> ParseResult<Vec<Comprehension>> {
        let mut generators = Vec::new();
        while self.eat_keyword("for") {
            let target = self.parse_target_list()?;
            self.expect_keyword("in")?;
            let iter = self.parse_or_test()?;
            let mut ifs = Vec::new();
            while self.eat_keyword("if") {
                ifs.push(self.parse_or_test()?);
            }
            generators.push(Comprehension { target, iter, ifs });
        }
        Ok(generators)
    }

    fn parse_atom(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let start = token.span.start;
        let lineno = token.lineno;
        match token.kind {
            TokenKind::Number => {
                self.bump();
                let text = token.text;
                let is_float = !text.starts_with("0x")
                    && !text.starts_with("0X")
                    && (text.contains('.') || text.contains('e') || text.contains('E'));
                Ok(Expr {
                    kind: ExprKind::Num(if is_float { Number::Float } else { Number::Int }),
                    span: token.span,
                    lineno,
                })
            }
            TokenKind::Str => {
                self.bump();
                // Adjacent string literals concatenate.
                let mut end = token.span.end;
                while self.peek().kind == TokenKind::Str {
                    end = self.bump().span.end;
                }
                Ok(Expr {
                    kind: ExprKind::Str,
                    span: Span::new(start, end),
                    lineno,
                })
            }
            TokenKind::Name => match token.text.as_str() {
                "None" => {
                    self.bump();
                    Ok(Expr {
                        kind: ExprKind::NoneLit,
                        span: token.span,
                        lineno,
                    })
                }
                "True" | "False" => {
                    self.bump();
                    Ok(Expr {
                        kind: ExprKind::BoolLit(token.text == "True"),
                        span: token.span,
                        lineno,
                    })
                }
                "yield" => self.parse_yield(),
                text if KEYWORDS.contains(&text) => Err(self.unexpected("expected an expression")),
                _ => {
                    self.bump();
                    Ok(Expr {
                        kind: ExprKind::Name(token.text),
                        span: token.span,
                        lineno,
                    })
                }
            },
            TokenKind::Op => match token.text.as_str() {
                "(" => self.parse_paren_atom(),
                "[" => self.parse_list_atom(),
                "{" => self.parse_dict_or_set_atom(),
                _ => Err(self.unexpected("expected an expression")),
            },
            _ => Err(self.unexpected("expected an expression")),
        }
    }

    fn parse_paren_atom(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_op("(")?;
        if self.eat_op(")") {
            return Ok(Expr {
                kind: ExprKind::Tuple(Vec::new()),
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        if self.peek().is_keyword("yield") {
            let inner = self.parse_yield()?;
            self.expect_op(")")?;
            return Ok(inner);
        }
        let first = self.parse_test()?;
        if self.peek().is_keyword("for") {
            let generators = self.parse_comprehension_clauses()?;
            self.expect_op(")")?;
            return Ok(Expr {
                kind: ExprKind::GeneratorExp {
                    element: Box::new(first),
                    generators,
                },
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        if self.peek().is_op(",") {
            let mut items = vec![first];
            while self.eat_op(",") {
                if self.peek().is_op(")") {
                    break;
                }
                items.push(self.parse_test()?);
            }
            self.expect_op(")")?;
            return Ok(Expr {
                kind: ExprKind::Tuple(items),
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        self.expect_op(")")?;
        // A parenthesized expression keeps its inner kind; the span widens
        // to include the parens so primaries resolve cleanly.
        Ok(Expr {
            kind: first.kind,
            span: Span::new(start, self.prev_end()),
            lineno: first.lineno,
        })
    }

    fn parse_list_atom(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_op("[")?;
        if self.eat_op("]") {
            return Ok(Expr {
                kind: ExprKind::List(Vec::new()),
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        let first = self.parse_test()?;
        if self.peek().is_keyword("for") {
            let generators = self.parse_comprehension_clauses()?;
            self.expect_op("]")?;
            return Ok(Expr {
                kind: ExprKind::ListComp {
                    element: Box::new(first),
                    generators,
                },
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.peek().is_op("]") {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect_op("]")?;
        Ok(Expr {
            kind: ExprKind::List(items),
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }

    fn parse_dict_or_set_atom(&mut self) -> ParseResult<Expr> {
        let start = self.start();
        let lineno = self.lineno();
        self.expect_op("{")?;
        if self.eat_op("}") {
            return Ok(Expr {
                kind: ExprKind::Dict(Vec::new()),
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        let first = self.parse_test()?;
        if self.eat_op(":") {
            let first_value = self.parse_test()?;
            if self.peek().is_keyword("for") {
                let generators = self.parse_comprehension_clauses()?;
                self.expect_op("}")?;
                return Ok(Expr {
                    kind: ExprKind::DictComp {
                        key: Box::new(first),
                        value: Box::new(first_value),
                        generators,
                    },
                    span: Span::new(start, self.prev_end()),
                    lineno,
                });
            }
            let mut items = vec![(first, first_value)];
            while self.eat_op(",") {
                if self.peek().is_op("}") {
                    break;
                }
                let key = self.parse_test()?;
                self.expect_op(":")?;
                let value = self.parse_test()?;
                items.push((key, value));
            }
            self.expect_op("}")?;
            return Ok(Expr {
                kind: ExprKind::Dict(items),
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        if self.peek().is_keyword("for") {
            let generators = self.parse_comprehension_clauses()?;
            self.expect_op("}")?;
            return Ok(Expr {
                kind: ExprKind::SetComp {
                    element: Box::new(first),
                    generators,
                },
                span: Span::new(start, self.prev_end()),
                lineno,
            });
        }
        let mut items = vec![first];
        while self.eat_op(",") {
            if self.peek().is_op("}") {
                break;
            }
            items.push(self.parse_test()?);
        }
        self.expect_op("}")?;
        Ok(Expr {
            kind: ExprKind::Set(items),
            span: Span::new(start, self.prev_end()),
            lineno,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_one(source: &str) -> Stmt {
        let module = parse(source).unwrap();
        assert_eq!(module.body.len(), 1, "expected one statement");
        module.body.into_iter().next().unwrap()
    }

    mod statements {
        use super::*;

        #[test]
        fn simple_assignment() {
            let stmt = parse_one("x = 1\n");
            let StmtKind::Assign { targets, value } = stmt.kind else {
                panic!("expected assignment");
            };
            assert_eq!(targets.len(), 1);
            assert!(matches!(targets[0].kind, ExprKind::Name(ref n) if n == "x"));
            assert!(matches!(value.kind, ExprKind::Num(Number::Int)));
        }

        #[test]
        fn chained_assignment_keeps_all_targets() {
            let stmt = parse_one("a = b = 1\n");
            let StmtKind::Assign { targets, .. } = stmt.kind else {
                panic!("expected assignment");
            };
            assert_eq!(targets.len(), 2);
        }

        #[test]
        fn tuple_assignment() {
            let stmt = parse_one("a, b = 1, 2\n");
            let StmtKind::Assign { targets, value } = stmt.kind else {
                panic!("expected assignment");
            };
            assert!(matches!(targets[0].kind, ExprKind::Tuple(ref items) if items.len() == 2));
            assert!(matches!(value.kind, ExprKind::Tuple(ref items) if items.len() == 2));
        }

        #[test]
        fn augmented_assignment() {
            let stmt = parse_one("x += 1\n");
            assert!(matches!(
                stmt.kind,
                StmtKind::AugAssign {
                    op: BinaryOp::Add,
                    ..
                }
            ));
        }

        #[test]
        fn function_def_with_params() {
            let stmt = parse_one("def f(a, b=1, *args, **kwargs):\n    return a\n");
            let StmtKind::FunctionDef { name, params, body, .. } = stmt.kind else {
                panic!("expected function");
            };
            assert_eq!(name, "f");
            assert_eq!(params.args.len(), 2);
            assert!(params.args[1].default.is_some());
            assert_eq!(params.vararg.as_ref().unwrap().name, "args");
            assert_eq!(params.kwarg.as_ref().unwrap().name, "kwargs");
            assert!(matches!(body[0].kind, StmtKind::Return { .. }));
        }

        #[test]
        fn class_def_with_bases() {
            let stmt = parse_one("class B(A):\n    pass\n");
            let StmtKind::ClassDef { name, bases, body, .. } = stmt.kind else {
                panic!("expected class");
            };
            assert_eq!(name, "B");
            assert_eq!(bases.len(), 1);
            assert!(matches!(body[0].kind, StmtKind::Pass));
        }

        #[test]
        fn decorated_function() {
            let stmt = parse_one("@staticmethod\ndef f():\n    pass\n");
            let StmtKind::FunctionDef { decorators, .. } = stmt.kind else {
                panic!("expected function");
            };
            assert_eq!(decorators.len(), 1);
            assert!(matches!(decorators[0].kind, ExprKind::Name(ref n) if n == "staticmethod"));
        }

        #[test]
        fn if_elif_else() {
            let stmt = parse_one("if a:\n    pass\nelif b:\n    pass\nelse:\n    pass\n");
            let StmtKind::If { orelse, .. } = stmt.kind else {
                panic!("expected if");
            };
            assert_eq!(orelse.len(), 1);
            let StmtKind::If { orelse: inner, .. } = &orelse[0].kind else {
                panic!("expected nested elif");
            };
            assert_eq!(inner.len(), 1);
        }

        #[test]
        fn for_else() {
            let stmt = parse_one("for x in xs:\n    pass\nelse:\n    pass\n");
            let StmtKind::For { target, orelse, .. } = stmt.kind else {
                panic!("expected for");
            };
            assert!(matches!(target.kind, ExprKind::Name(ref n) if n == "x"));
            assert_eq!(orelse.len(), 1);
        }

        #[test]
        fn try_except_finally() {
            let stmt =
                parse_one("try:\n    pass\nexcept ValueError as e:\n    pass\nfinally:\n    pass\n");
            let StmtKind::Try { handlers, finalbody, .. } = stmt.kind else {
                panic!("expected try");
            };
            assert_eq!(handlers.len(), 1);
            assert_eq!(handlers[0].name.as_deref(), Some("e"));
            assert_eq!(finalbody.len(), 1);
        }

        #[test]
        fn with_as_target() {
            let stmt = parse_one("with open(p) as f:\n    pass\n");
            let StmtKind::With { target, .. } = stmt.kind else {
                panic!("expected with");
            };
            assert!(matches!(target.unwrap().kind, ExprKind::Name(ref n) if n == "f"));
        }

        #[test]
        fn imports() {
            let stmt = parse_one("import a.b as c, d\n");
            let StmtKind::Import { names } = stmt.kind else {
                panic!("expected import");
            };
            assert_eq!(names[0].name, "a.b");
            assert_eq!(names[0].asname.as_deref(), Some("c"));
            assert_eq!(names[1].name, "d");
        }

        #[test]
        fn from_import_with_level_and_star() {
            let stmt = parse_one("from ..pkg import *\n");
            let StmtKind::ImportFrom { module, level, is_star, .. } = stmt.kind else {
                panic!("expected from-import");
            };
            assert_eq!(module, "pkg");
            assert_eq!(level, 2);
            assert!(is_star);
        }

        #[test]
        fn from_import_aliases() {
            let stmt = parse_one("from pkg.mod import g as h, k\n");
            let StmtKind::ImportFrom { module, names, .. } = stmt.kind else {
                panic!("expected from-import");
            };
            assert_eq!(module, "pkg.mod");
            assert_eq!(names[0].name, "g");
            assert_eq!(names[0].asname.as_deref(), Some("h"));
            assert_eq!(names[1].name, "k");
        }

        #[test]
        fn global_statement() {
            let stmt = parse_one("global a, b\n");
            let StmtKind::Global { names } = stmt.kind else {
                panic!("expected global");
            };
            assert_eq!(names.len(), 2);
        }

        #[test]
        fn semicolon_separated_statements() {
            let module = parse("a = 1; b = 2\n").unwrap();
            assert_eq!(module.body.len(), 2);
        }
    }

    mod expressions {
        use super::*;

        fn parse_expr(source: &str) -> Expr {
            let stmt = parse_one(source);
            match stmt.kind {
                StmtKind::Expr(e) => e,
                other => panic!("expected expression statement, got {:?}", other),
            }
        }

        #[test]
        fn attribute_chain() {
            let expr = parse_expr("a.b.c\n");
            let ExprKind::Attribute { value, attr, .. } = expr.kind else {
                panic!("expected attribute");
            };
            assert_eq!(attr, "c");
            assert!(matches!(value.kind, ExprKind::Attribute { .. }));
        }

        #[test]
        fn call_with_keywords() {
            let expr = parse_expr("f(1, x=2, *rest, **kw)\n");
            let ExprKind::Call { args, keywords, .. } = expr.kind else {
                panic!("expected call");
            };
            assert_eq!(args.len(), 2);
            assert!(matches!(args[1].kind, ExprKind::Starred(_)));
            assert_eq!(keywords.len(), 2);
            assert_eq!(keywords[0].0, "x");
            assert_eq!(keywords[1].0, "**");
        }

        #[test]
        fn subscript_and_slice() {
            let expr = parse_expr("a[1:2]\n");
            let ExprKind::Subscript { index, .. } = expr.kind else {
                panic!("expected subscript");
            };
            assert!(matches!(index.kind, ExprKind::Slice { .. }));
        }

        #[test]
        fn operator_precedence() {
            let expr = parse_expr("1 + 2 * 3\n");
            let ExprKind::BinExpr { op, right, .. } = expr.kind else {
                panic!("expected binary expression");
            };
            assert_eq!(op, BinaryOp::Add);
            assert!(matches!(
                right.kind,
                ExprKind::BinExpr {
                    op: BinaryOp::Mult,
                    ..
                }
            ));
        }

        #[test]
        fn comparison_chain() {
            let expr = parse_expr("a < b <= c\n");
            let ExprKind::Compare { rest, .. } = expr.kind else {
                panic!("expected comparison");
            };
            assert_eq!(rest.len(), 2);
            assert_eq!(rest[0].0, CompareOp::Lt);
            assert_eq!(rest[1].0, CompareOp::LtE);
        }

        #[test]
        fn is_not_and_not_in() {
            let expr = parse_expr("a is not b\n");
            let ExprKind::Compare { rest, .. } = expr.kind else {
                panic!("expected comparison");
            };
            assert_eq!(rest[0].0, CompareOp::IsNot);

            let expr = parse_expr("a not in b\n");
            let ExprKind::Compare { rest, .. } = expr.kind else {
                panic!("expected comparison");
            };
            assert_eq!(rest[0].0, CompareOp::NotIn);
        }

        #[test]
        fn list_comprehension() {
            let expr = parse_expr("[x * 2 for x in xs if x]\n");
            let ExprKind::ListComp { generators, .. } = expr.kind else {
                panic!("expected list comprehension");
            };
            assert_eq!(generators.len(), 1);
            assert_eq!(generators[0].ifs.len(), 1);
        }

        #[test]
        fn dict_comprehension_and_literal() {
            assert!(matches!(
                parse_expr("{k: v for k, v in items}\n").kind,
                ExprKind::DictComp { .. }
            ));
            assert!(matches!(
                parse_expr("{'a': 1}\n").kind,
                ExprKind::Dict(ref items) if items.len() == 1
            ));
            assert!(matches!(
                parse_expr("{1, 2}\n").kind,
                ExprKind::Set(ref items) if items.len() == 2
            ));
        }

        #[test]
        fn lambda_and_ifexp() {
            assert!(matches!(
                parse_expr("lambda a, b=1: a\n").kind,
                ExprKind::Lambda { .. }
            ));
            assert!(matches!(
                parse_expr("a if c else b\n").kind,
                ExprKind::IfExpr { .. }
            ));
        }

        #[test]
        fn adjacent_strings_concatenate() {
            let expr = parse_expr("'a' 'b'\n");
            assert!(matches!(expr.kind, ExprKind::Str));
            assert_eq!(expr.span, Span::new(0, 7));
        }

        #[test]
        fn generator_argument() {
            let expr = parse_expr("any(x for x in xs)\n");
            let ExprKind::Call { args, .. } = expr.kind else {
                panic!("expected call");
            };
            assert!(matches!(args[0].kind, ExprKind::GeneratorExp { .. }));
        }

        #[test]
        fn yield_expression() {
            let stmt = parse_one("def g():\n    yield 1\n");
            let StmtKind::FunctionDef { body, .. } = stmt.kind else {
                panic!("expected function");
            };
            let StmtKind::Expr(ref e) = body[0].kind else {
                panic!("expected expression statement");
            };
            assert!(matches!(e.kind, ExprKind::Yield { .. }));
        }
    }

    mod error_handling {
        use super::*;

        #[test]
        fn syntax_error_carries_line() {
            let err = parse("a = 1\nb = = 2\n").unwrap_err();
            assert_eq!(err.line, 2);
        }

        #[test]
        fn tolerant_parse_skips_bad_statement() {
            let module = parse_tolerant("a = 1\nb = = 2\nc = 3\n");
            assert_eq!(module.body.len(), 2);
            assert_eq!(module.recovered.len(), 1);
            assert_eq!(module.recovered[0].0, 2);
        }

        #[test]
        fn tolerant_parse_skips_broken_block() {
            let module = parse_tolerant("def f(:\n    pass\nx = 1\n");
            assert_eq!(module.recovered.len(), 1);
            assert_eq!(module.body.len(), 1);
            assert!(matches!(module.body[0].kind, StmtKind::Assign { .. }));
        }

        #[test]
        fn empty_module() {
            let module = parse("").unwrap();
            assert!(module.body.is_empty());
        }

        #[test]
        fn shebang_and_encoding_only() {
            let module = parse("#!/usr/bin/env python\n# -*- coding: utf-8 -*-\n").unwrap();
            assert!(module.body.is_empty());
        }

        #[test]
        fn module_without_trailing_newline() {
            let module = parse("x = 1").unwrap();
            assert_eq!(module.body.len(), 1);
        }

        #[test]
        fn assignment_to_literal_is_an_error() {
            assert!(parse("1 = x\n").is_err());
        }
    }

    mod spans {
        use super::*;

        #[test]
        fn name_spans_are_exact() {
            let module = parse("value = other\n").unwrap();
            let StmtKind::Assign { targets, value } = &module.body[0].kind else {
                panic!("expected assignment");
            };
            assert_eq!(targets[0].span, Span::new(0, 5));
            assert_eq!(value.span, Span::new(8, 13));
        }

        #[test]
        fn linenos_are_one_indexed() {
            let module = parse("a = 1\nb = 2\n").unwrap();
            assert_eq!(module.body[0].lineno, 1);
            assert_eq!(module.body[1].lineno, 2);
        }

        #[test]
        fn attribute_span_covers_attr_name() {
            let module = parse("obj.attr\n").unwrap();
            let StmtKind::Expr(ref e) = module.body[0].kind else {
                panic!("expected expression");
            };
            let ExprKind::Attribute { attr_span, .. } = e.kind else {
                panic!("expected attribute");
            };
            assert_eq!(attr_span, Span::new(4, 8));
        }
    }
}
