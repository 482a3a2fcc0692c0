//! Error types shared across the engine.
//!
//! Each stage reports its own error enum; [`QueryError`] wraps them so callers
//! of the entry points see a single type with a stable [`QueryError::kind`].

use crate::adapter::AdapterError;
use crate::sink::SinkError;
use crate::sql::SyntaxError;
use crate::value::DataType;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors raised while binding a parsed query against its sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A FROM-clause source could not be resolved.
    #[error("Unknown source: '{name}'")]
    UnknownSource {
        /// Source name as written.
        name: String,
    },

    /// A column reference matched nothing in scope.
    #[error("Unknown column: '{name}'")]
    UnknownColumn {
        /// Column reference as written.
        name: String,
    },

    /// An unqualified column reference matched several sources.
    #[error("Ambiguous column: '{name}' exists in more than one source")]
    AmbiguousColumn {
        /// Column reference as written.
        name: String,
    },

    /// A qualifier names no source in scope.
    #[error("Unknown qualifier: '{name}'")]
    UnknownQualifier {
        /// Qualifier as written.
        name: String,
    },

    /// Two sources in one FROM clause share an alias.
    #[error("Duplicate source alias: '{name}'")]
    DuplicateAlias {
        /// Alias.
        name: String,
    },

    /// A function name is not registered.
    #[error("Unknown function: '{name}'")]
    UnknownFunction {
        /// Function name as written.
        name: String,
    },

    /// A function was called with an unsupported number of arguments.
    #[error("Function '{name}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        /// Function name.
        name: String,
        /// Accepted arities.
        expected: String,
        /// Supplied argument count.
        found: usize,
    },

    /// A function argument is invalid (for example a non-constant offset).
    #[error("Invalid argument to '{name}': {message}")]
    InvalidArgument {
        /// Function name.
        name: String,
        /// Explanation.
        message: String,
    },

    /// An aggregate appeared where aggregates are not allowed.
    #[error("Aggregate function '{name}' is not allowed in {clause}")]
    MisplacedAggregate {
        /// Aggregate name.
        name: String,
        /// Clause it appeared in.
        clause: String,
    },

    /// A window function appeared where windows are not allowed.
    #[error("Window function '{name}' is not allowed in {clause}")]
    MisplacedWindow {
        /// Function name.
        name: String,
        /// Clause it appeared in.
        clause: String,
    },

    /// A column is used outside aggregates without being grouped.
    #[error("Column '{name}' must appear in GROUP BY or be used in an aggregate function")]
    NotGrouped {
        /// Column reference.
        name: String,
    },

    /// A scalar or IN subquery returned other than one column.
    #[error("Subquery must return exactly one column, got {found}")]
    SubqueryColumns {
        /// Number of columns returned.
        found: usize,
    },

    /// UNION branches differ in column count.
    #[error("UNION branches have different column counts: {left} vs {right}")]
    SetOpArity {
        /// Left branch arity.
        left: usize,
        /// Right branch arity.
        right: usize,
    },

    /// UNION branch column types have no common type.
    #[error("UNION column '{column}' has incompatible types {left} and {right}")]
    SetOpTypeMismatch {
        /// Output column name.
        column: String,
        /// Left branch type.
        left: DataType,
        /// Right branch type.
        right: DataType,
    },

    /// A window frame is not supported.
    #[error("Unsupported window frame: {message}")]
    UnsupportedFrame {
        /// Explanation.
        message: String,
    },

    /// An ORDER BY or GROUP BY ordinal is out of range.
    #[error("{clause} position {position} is not in the select list")]
    InvalidOrdinal {
        /// Clause name.
        clause: String,
        /// 1-based position as written.
        position: i64,
    },

    /// With SELECT DISTINCT, ORDER BY referenced an expression not selected.
    #[error("ORDER BY expression '{name}' must appear in the select list when using DISTINCT")]
    OrderByNotSelected {
        /// Expression text.
        name: String,
    },

    /// `*` used where it is not meaningful.
    #[error("Invalid use of '*' in {context}")]
    InvalidWildcard {
        /// Where it appeared.
        context: String,
    },
}

/// Why a query was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelReason {
    /// Cancelled through a [`crate::CancellationHandle`].
    User,
    /// The query exceeded its timeout.
    Timeout,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "cancelled by user"),
            Self::Timeout => write!(f, "timed out"),
        }
    }
}

/// Any error a query can end with.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The SQL text does not parse.
    #[error("Syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// The query does not bind against its sources.
    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    /// A source failed to open or read.
    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    /// The sink failed to open or write.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// The query was cancelled before completing.
    #[error("Query {0}")]
    Cancelled(CancelReason),

    /// Query options failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

impl QueryError {
    /// Stable snake_case error code.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax(_) => "syntax_error",
            Self::Bind(_) => "bind_error",
            Self::Adapter(_) => "adapter_error",
            Self::Sink(_) => "sink_error",
            Self::Cancelled(CancelReason::User) => "cancelled",
            Self::Cancelled(CancelReason::Timeout) => "timeout",
            Self::InvalidOptions(_) => "invalid_options",
        }
    }
}

impl From<validator::ValidationErrors> for QueryError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidOptions(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes() {
        let syntax = QueryError::from(SyntaxError::empty_query());
        assert_eq!(syntax.kind(), "syntax_error");
        let bind = QueryError::from(BindError::UnknownColumn {
            name: "x".to_string(),
        });
        assert_eq!(bind.kind(), "bind_error");
        assert_eq!(QueryError::Cancelled(CancelReason::Timeout).kind(), "timeout");
        assert_eq!(QueryError::Cancelled(CancelReason::User).kind(), "cancelled");
    }

    #[test]
    fn test_display_messages() {
        let err = QueryError::from(BindError::ArityMismatch {
            name: "UPPER".to_string(),
            expected: "1".to_string(),
            found: 2,
        });
        assert_eq!(
            err.to_string(),
            "Bind error: Function 'UPPER' expects 1 argument(s), got 2"
        );
        assert_eq!(
            QueryError::Cancelled(CancelReason::Timeout).to_string(),
            "Query timed out"
        );
    }
}
