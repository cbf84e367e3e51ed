//! Error types for compiling and rendering templates

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::template::RegistryError;

/// Errors detected while compiling a template. Compilation stops at the
/// first one; there is no partial result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A line starts with `#` or `=` but no space follows
    #[error("invalid template line {line} - missing space after '{prefix}'?")]
    MalformedLine {
        line: usize,
        prefix: char,
        text: String,
    },

    /// A token that is not allowed in the current state
    #[error("line {line}: unexpected {token} in {state}")]
    UnexpectedToken {
        line: usize,
        token: String,
        state: &'static str,
        text: String,
    },

    /// A block close without an open block
    #[error("line {line}: block closed but no block is open")]
    UnbalancedBlock { line: usize, text: String },

    /// The template ends inside a code region
    #[error("line {line}: code block is never closed")]
    UnterminatedBlock { line: usize, text: String },

    /// `{::}` - a block with no header
    #[error("line {line}: block header is empty")]
    EmptyBlockHeader { line: usize, text: String },

    /// A code fragment that does not parse
    #[error("line {line}: invalid code `{code}`: {message}")]
    InvalidCode {
        line: usize,
        code: String,
        message: String,
    },
}

impl CompileError {
    /// 1-based template line the error refers to
    pub fn line(&self) -> usize {
        match self {
            CompileError::MalformedLine { line, .. }
            | CompileError::UnexpectedToken { line, .. }
            | CompileError::UnbalancedBlock { line, .. }
            | CompileError::UnterminatedBlock { line, .. }
            | CompileError::EmptyBlockHeader { line, .. }
            | CompileError::InvalidCode { line, .. } => *line,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        let span = line_span(source, self.line());
        let label = match self {
            CompileError::MalformedLine { prefix, .. } => {
                format!("expected a space or end of line after '{}'", prefix)
            }
            CompileError::UnexpectedToken { token, state, .. } => {
                format!("{} is not allowed in {}", token, state)
            }
            CompileError::UnbalancedBlock { .. } => "no open block to close".to_string(),
            CompileError::UnterminatedBlock { .. } => "code block opened here".to_string(),
            CompileError::EmptyBlockHeader { .. } => "header expected before ':}'".to_string(),
            CompileError::InvalidCode { message, .. } => message.clone(),
        };

        let mut buf = Vec::new();
        let written = Report::build(ReportKind::Error, filename, span.start)
            .with_message(self.to_string())
            .with_label(
                Label::new((filename, span))
                    .with_message(label)
                    .with_color(Color::Red),
            )
            .finish()
            .write((filename, Source::from(source)), &mut buf);
        match written {
            Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

/// Character range of a 1-based line, for diagnostics
fn line_span(source: &str, line: usize) -> std::ops::Range<usize> {
    let mut start = 0;
    for (index, text) in source.split('\n').enumerate() {
        let len = text.chars().count();
        if index + 1 == line {
            return start..start + len;
        }
        start += len + 1;
    }
    let end = source.chars().count();
    end..end
}

/// Evaluation failure without location; the renderer attaches the
/// template line and code before it reaches the caller
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UndefinedName(String),

    #[error("type error: {0}")]
    TypeMismatch(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow")]
    Overflow,

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("key '{0}' not found")]
    MissingKey(String),

    #[error("'{0}' is not callable")]
    NotCallable(String),

    #[error("{0}")]
    Arguments(String),

    /// Raised by a host function
    #[error("{0}")]
    Host(String),

    /// Too many nested routine or template calls
    #[error("maximum call depth of {0} exceeded")]
    RecursionLimit(usize),
}

impl EvalError {
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }

    pub fn arguments(message: impl Into<String>) -> Self {
        Self::Arguments(message.into())
    }
}

/// Errors returned from rendering a compiled template
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The call does not fit the template's signature
    #[error("{template}: {source}")]
    Arguments {
        template: String,
        #[source]
        source: EvalError,
    },

    /// An expression or block header failed
    #[error("{template}, line {line}: {source} (in `{code}`)")]
    Evaluation {
        template: String,
        line: usize,
        code: String,
        #[source]
        source: EvalError,
    },

    /// The template to render is not registered
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl RenderError {
    /// The underlying evaluation failure, if any
    pub fn eval_error(&self) -> Option<&EvalError> {
        match self {
            RenderError::Arguments { source, .. } | RenderError::Evaluation { source, .. } => {
                Some(source)
            }
            RenderError::Registry(_) => None,
        }
    }
}
