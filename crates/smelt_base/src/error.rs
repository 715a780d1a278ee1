//! Compiler error types with source location tracking.
//!
//! The compiler distinguishes two error kinds:
//!
//! - [`ErrorKind::Syntax`] — malformed input or a type-check failure. The
//!   message embeds the offending construct and, where applicable, the
//!   display names of both involved types. Compilation of the current file
//!   stops.
//! - [`ErrorKind::Internal`] — an invariant violation. Every `match` over a
//!   tagged value has an arm that raises this; reaching it is a compiler
//!   bug, not a user mistake.
//!
//! Warnings are not errors: they print to stderr through [`warn`] and
//! compilation continues.

use crate::span::Span;
use crate::style::Style;
use std::fmt;

/// Which class of failure a [`CompileError`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input or a failed type check. The user's fault.
    Syntax,
    /// A broken compiler invariant. Our fault.
    Internal,
}

/// An error annotated with its kind and, when known, its source location.
///
/// Implements [`std::error::Error`] and [`fmt::Display`]. The display format
/// is `{kind} error: {message}`.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: ErrorKind,
    /// Human-readable error description.
    pub message: String,
    /// Location in source, when the failing layer knows one. Type-check
    /// failures raised during expression construction carry no span.
    pub span: Option<Span>,
}

impl CompileError {
    /// Creates a syntax error without a source location.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            message: message.into(),
            span: None,
        }
    }

    /// Creates a syntax error pointing at `span`.
    pub fn syntax_at(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ErrorKind::Syntax,
            message: message.into(),
            span: Some(span),
        }
    }

    /// Creates an internal error. Reaching one of these is a bug.
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal,
            message: message.into(),
            span: None,
        }
    }

    /// Attaches a span if the error does not already carry one.
    pub fn with_span(mut self, span: Span) -> Self {
        if self.span.is_none() {
            self.span = Some(span);
        }
        self
    }

    /// Renders the error against its source text with a line gutter and a
    /// caret underline, in the conventional `error:` style.
    ///
    /// Falls back to the plain display format when the error has no span.
    pub fn display_with_source(&self, source: &str) -> String {
        let span = match self.span {
            Some(span) if span.start <= source.len() => span,
            _ => return format!("{}", self),
        };

        let (line_num, line_start, line_content) = find_context(source, span.start);
        let col = span.start.saturating_sub(line_start);
        let len = span.len().max(1).min(line_content.len().saturating_sub(col).max(1));
        let underline = format!("{}{}", " ".repeat(col), "^".repeat(len));

        let label = match self.kind {
            ErrorKind::Syntax => Style::bold_red("error"),
            ErrorKind::Internal => Style::bold_red("internal error"),
        };
        let gutter = Style::blue(&format!("{:4}", line_num));
        let pipe = Style::blue("|");

        format!(
            "{}: {}\n\n{} {} {}\n     {} {}",
            label,
            self.message,
            gutter,
            pipe,
            line_content,
            pipe,
            Style::red(&underline)
        )
    }
}

/// The 1-based line number, line start offset, and line text containing
/// `offset`.
fn find_context(source: &str, offset: usize) -> (usize, usize, &str) {
    let offset = offset.min(source.len());
    let line_start = match source[..offset].rfind('\n') {
        Some(newline) => newline + 1,
        None => 0,
    };
    let line_num = source[..line_start].matches('\n').count() + 1;
    let line = source[line_start..]
        .split('\n')
        .next()
        .unwrap_or("");
    (line_num, line_start, line)
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::Syntax => "syntax error",
            ErrorKind::Internal => "internal error",
        };
        write!(f, "{}: {}", kind, self.message)
    }
}

impl std::error::Error for CompileError {}

/// Alias for `std::result::Result<T, CompileError>`.
///
/// Use this as the return type for fallible operations in smelt.
pub type Result<T> = std::result::Result<T, CompileError>;

/// Prints a warning to stderr. Warnings never stop compilation.
pub fn warn(message: &str) {
    eprintln!("{}: {}", Style::yellow("warning"), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_display() {
        let err = CompileError::syntax("unexpected token");
        assert_eq!(format!("{}", err), "syntax error: unexpected token");
    }

    #[test]
    fn internal_error_display() {
        let err = CompileError::internal("unreachable declaration kind");
        assert!(format!("{}", err).starts_with("internal error"));
    }

    #[test]
    fn display_with_source_shows_line_and_underline() {
        let source = "int x = nope;";
        let err = CompileError::syntax_at("unknown identifier \"nope\"", Span::new(8, 12));
        let display = err.display_with_source(source);
        assert!(display.contains("nope"), "should contain source word: {}", display);
        assert!(display.contains("^^^^"), "should contain underline: {}", display);
    }

    #[test]
    fn display_with_source_falls_back_without_span() {
        let err = CompileError::syntax("no span here");
        assert_eq!(err.display_with_source("whatever"), "syntax error: no span here");
    }

    #[test]
    fn with_span_keeps_existing_span() {
        let err = CompileError::syntax_at("msg", Span::new(1, 2)).with_span(Span::new(5, 6));
        assert_eq!(err.span, Some(Span::new(1, 2)));
    }
}
