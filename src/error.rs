use thiserror::Error;

use crate::parser::ParseError;

/// Failure raised while planning, evaluating or rewriting a query.
///
/// Planning aborts on the first problem found; no partial plan is ever
/// returned alongside an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("no table or cte \"{0}\" found")]
    UnknownTable(String),

    #[error("procedure \"{0}\" not found")]
    UnknownProcedure(String),

    #[error("foreign procedure \"{0}\" not found")]
    UnknownForeignProcedure(String),

    #[error("no function or procedure \"{0}\" found")]
    UnknownFunction(String),

    #[error("variable \"{0}\" not found")]
    UnknownVariable(String),

    #[error("column not found: \"{0}\"")]
    ColumnNotFound(String),

    #[error("column \"{0}\" is ambiguous")]
    AmbiguousColumn(String),

    /// Wrong arity or structure: wildcards without FROM, missing aliases,
    /// non-table procedures used as sources, set-operation arity.
    #[error("{0}")]
    Shape(String),

    /// Operand or result type violations.
    #[error("{0}")]
    Type(String),

    /// GROUP BY and aggregate legality violations.
    #[error("{0}")]
    Aggregation(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("rewrite failed: {0}")]
    Rewrite(String),

    #[error("{0}")]
    Parse(String),

    /// Reading input or writing plans failed.
    #[error("i/o error: {0}")]
    Io(String),
}

pub type PlanResult<T> = Result<T, PlanError>;

impl PlanError {
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape(message.into())
    }

    pub fn type_err(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn not_implemented(what: impl Into<String>) -> Self {
        Self::NotImplemented(what.into())
    }

    /// Missing-column failures are recoverable during correlated lookups:
    /// the evaluator retries them against the outer relation.
    pub fn is_column_not_found(&self) -> bool {
        matches!(self, Self::ColumnNotFound(_))
    }
}

impl From<ParseError> for PlanError {
    fn from(err: ParseError) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<std::io::Error> for PlanError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
