//! The code language used inside `{...}` regions
//!
//! Expressions and block headers are lexed with logos and parsed with
//! chumsky. The template compiler never looks inside code; fragments are
//! parsed when a program is lowered for rendering.

pub mod ast;
pub mod grammar;
pub mod lexer;

pub use ast::{Argument, BinaryOp, Expr, Header, Literal, ParamDecl, UnaryOp};
pub use grammar::{parse_expression, parse_header, parse_params};

use thiserror::Error;

/// A code fragment that does not parse
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct SyntaxError {
    pub message: String,
    /// Byte range within the fragment
    pub span: std::ops::Range<usize>,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: std::ops::Range<usize>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}
