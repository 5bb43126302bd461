//! # Search Errors
//!
//! Every failure the compiler or the provider can produce is a [`SearchError`].
//! Errors are returned synchronously to the caller of `build_expr`/`exec` and
//! are never logged or swallowed here; mapping them to HTTP status codes or
//! localized messages is left to the calling layer.
//!
//! ```rust,ignore
//! match provider.exec::<Row, _>(&db).await {
//!     Ok(result) => Json(result).into_response(),
//!     Err(err) if err.is_client_error() => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
//!     Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
//! }
//! ```

use sea_orm::{DbBackend, DbErr};
use thiserror::Error;

pub use crate::fexpr::ParseError;

/// Which side of a binary comparison failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandSide {
    Left,
    Right,
}

impl std::fmt::Display for OperandSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// The error type for filter/sort compilation and search execution.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The filter string is not valid grammar.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The filter compiled to zero expression groups.
    #[error("empty filter expression")]
    EmptyExpression,

    /// One side of a comparison could not be resolved.
    #[error("invalid {side} operand {literal:?} - {source}")]
    InvalidOperand {
        side: OperandSide,
        /// The raw token literal as written by the client
        literal: String,
        #[source]
        source: Box<SearchError>,
    },

    /// A comparison operator outside of `= != ~ !~ < <= > >=`.
    #[error("unknown expression operator {0:?}")]
    UnknownOperator(String),

    /// The sort field does not resolve to a plain column expression.
    #[error("invalid sort field {0:?}")]
    InvalidSortField(String),

    /// `exec` was called before a base query was configured.
    #[error("search query is not set")]
    MissingQuery,

    /// The field resolver rejected the field.
    #[error("failed to resolve field {0:?}")]
    UnknownField(String),

    /// A token function was unknown or called with unsupported arguments.
    #[error("[{name}] {message}")]
    Function { name: String, message: String },

    /// An allow-list regex pattern failed to compile.
    #[error("invalid field pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// A recognized query parameter carried an unparsable value.
    #[error("invalid {name} query parameter value {value:?}")]
    InvalidQueryParam { name: &'static str, value: String },

    /// A configured safety limit was exceeded.
    #[error("{what} exceeds the limit of {limit}")]
    LimitExceeded { what: &'static str, limit: usize },

    /// A `{:name}` placeholder had no bound value at render time.
    #[error("named parameter {0:?} is not bound")]
    MissingParam(String),

    /// Compiled filters use SQLite functions and operators.
    #[error("unsupported database backend {0:?}, searches run on SQLite only")]
    UnsupportedBackend(DbBackend),

    /// Propagated unchanged from the count/data statements.
    #[error(transparent)]
    Database(#[from] DbErr),
}

impl SearchError {
    /// Create a token function error
    pub fn function(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Function {
            name: name.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_operand(side: OperandSide, literal: impl Into<String>, source: Self) -> Self {
        Self::InvalidOperand {
            side,
            literal: literal.into(),
            source: Box::new(source),
        }
    }

    /// Whether the error was caused by the client-supplied input rather than
    /// by configuration or the database.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Self::MissingQuery
                | Self::InvalidPattern(_)
                | Self::MissingParam(_)
                | Self::UnsupportedBackend(_)
                | Self::Database(_)
        )
    }
}
