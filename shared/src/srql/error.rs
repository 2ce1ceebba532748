//! Error taxonomy for SRQL parsing and compilation.
//!
//! Every error is returned as a value so the calling view can render a
//! user-facing message and keep its current result set on screen.

use thiserror::Error;

/// Errors that can occur while parsing or compiling an SRQL query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// The query text is malformed (bad quoting, missing value, unknown token shape).
    #[error("syntax error at offset {offset}: {message}")]
    Syntax {
        /// Byte offset of the offending token in the query string.
        offset: usize,
        /// What went wrong.
        message: String,
    },

    /// A singleton clause appeared more than once.
    #[error("duplicate '{0}:' clause; each query may contain at most one")]
    DuplicateClause(String),

    /// The `in:` entity is not in the catalog.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// A field is not in the entity's allow-listed schema.
    #[error("unknown field '{field}' for entity '{entity}'")]
    UnknownField {
        /// The field that was referenced.
        field: String,
        /// The entity the query targets.
        entity: String,
    },

    /// A stats/aggregation expression falls outside the supported grammar.
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// The cursor does not decode, or was issued for a different query shape.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// The limit is outside the accepted range.
    ///
    /// Reserved for strict modes; the default policy clamps instead.
    #[error("limit {0} is out of range")]
    LimitOutOfRange(i64),
}

impl CompileError {
    /// Convenience constructor for syntax errors.
    pub fn syntax(offset: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            offset,
            message: message.into(),
        }
    }

    /// Stable machine-readable kind for wire responses and logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Syntax { .. } => "syntax_error",
            Self::DuplicateClause(_) => "duplicate_clause",
            Self::UnknownEntity(_) => "unknown_entity",
            Self::UnknownField { .. } => "unknown_field",
            Self::UnsupportedExpression(_) => "unsupported_expression",
            Self::InvalidCursor(_) => "invalid_cursor",
            Self::LimitOutOfRange(_) => "limit_out_of_range",
        }
    }
}
