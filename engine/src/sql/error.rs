//! SQL syntax errors with source positions.

use serde::Serialize;
use thiserror::Error;

/// A syntax error raised by the lexer or parser.
///
/// Positions are derived from the byte `offset` into the query text: `line`
/// and `column` are 1-based, the column counting characters.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{message} at line {line}, column {column}")]
pub struct SyntaxError {
    /// Human-readable description.
    pub message: String,
    /// Byte offset of the offending token.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column number.
    pub column: usize,
    /// Text of the offending token, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<String>,
    /// Token kinds that would have been accepted at this position.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub expected: Vec<String>,
}

impl SyntaxError {
    /// Creates an error at `offset` within `input`.
    #[must_use]
    pub fn new(message: impl Into<String>, input: &str, offset: usize) -> Self {
        let (line, column) = line_column(input, offset);
        Self {
            message: message.into(),
            offset,
            line,
            column,
            found: None,
            expected: Vec::new(),
        }
    }

    /// Creates an "unexpected token" error listing the accepted alternatives.
    #[must_use]
    pub fn unexpected(input: &str, offset: usize, found: &str, expected: Vec<String>) -> Self {
        let shown = if found.is_empty() {
            "end of input".to_string()
        } else {
            format!("'{found}'")
        };
        let message = if expected.is_empty() {
            format!("unexpected {shown}")
        } else {
            format!("expected {}, found {shown}", expected.join(" or "))
        };
        Self {
            found: Some(found.to_string()),
            expected,
            ..Self::new(message, input, offset)
        }
    }

    /// Error for a query containing nothing but whitespace and comments.
    #[must_use]
    pub fn empty_query() -> Self {
        Self::new("empty query", "", 0)
    }
}

fn line_column(input: &str, offset: usize) -> (usize, usize) {
    let mut end = offset.min(input.len());
    while !input.is_char_boundary(end) {
        end -= 1;
    }
    let before = &input[..end];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}
