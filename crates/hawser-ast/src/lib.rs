//! Tokenizer, parser and AST for the analyzed language.
//!
//! The parser is hand-written and fault tolerant: it is routinely handed
//! syntactically dubious tool input (half-typed lines, editors mid-edit),
//! so an unparsable simple statement is skipped to the end of its line and
//! recorded, rather than aborting the whole module.
//!
//! Entry point: [`parse`], returning a [`nodes::Module`] or a
//! [`ParseError`] carrying the failing line.

pub mod nodes;
pub mod parser;
pub mod tokenizer;
pub mod visitor;

pub use nodes::{Expr, ExprKind, Module, Span, Stmt, StmtKind};
pub use parser::{parse, ParseError};
