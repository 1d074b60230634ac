use crate::{Error, Result};
use std::fmt::{self, Display};
use thiserror::Error as ThisError;

/// Operation that was running when a backend failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add,
    Fetch,
    Count,
    Update,
    Delete,
    ApplySchema,
    DeleteSchema,
    Transaction,
}

impl Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Add => "add",
            Operation::Fetch => "fetch",
            Operation::Count => "count",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::ApplySchema => "apply schema",
            Operation::DeleteSchema => "delete schema",
            Operation::Transaction => "transaction",
        })
    }
}

///
/// ErrorKind
///
/// Travels inside `anyhow::Error`, use [`ErrorKind::of`] to inspect it.
///

#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ErrorKind {
    #[error("could not connect to `{url}`")]
    ConnectFailed { url: String },

    #[error("no reference links model `{from}` to model `{to}`")]
    JoinResolutionFailed { from: String, to: String },

    #[error("reference `{model}.{field}` -> `{target}` cannot be resolved")]
    UnresolvedReference {
        model: String,
        field: String,
        target: String,
    },

    #[error("fields `{first}` and `{second}` of model `{model}` are both stored as `{storage_name}`")]
    DuplicateStorageName {
        model: String,
        storage_name: String,
        first: String,
        second: String,
    },

    #[error("the query returned no result")]
    EmptyResult,

    #[error("{operation} failed on `{model}`")]
    OperationFailed { operation: Operation, model: String },

    #[error("{0}")]
    TransactionStateError(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("model `{model}` has no field `{field}`")]
    UnknownField { model: String, field: String },

    #[error("malformed predicate: {0}")]
    MalformedPredicate(String),
}

impl ErrorKind {
    /// The kind carried by `error`, either as its root cause or as one of its contexts.
    pub fn of(error: &Error) -> Option<&ErrorKind> {
        error.downcast_ref::<ErrorKind>()
    }

    pub fn into_error(self) -> Error {
        Error::new(self)
    }
}

/// Wraps a backend failure as [`ErrorKind::OperationFailed`] unless it is already classified.
pub fn operation_failed(error: Error, operation: Operation, model: &str) -> Error {
    let error = if ErrorKind::of(&error).is_some() {
        error.context(format!("While running {} on `{}`", operation, model))
    } else {
        error.context(ErrorKind::OperationFailed {
            operation,
            model: model.to_string(),
        })
    };
    log::error!("{:#}", error);
    error
}

/// Helpers on operation results, the success/failure wrapper is `Result` itself.
pub trait ResultExt<T> {
    /// The value, or `default` when the operation failed.
    fn or_use(self, default: T) -> T;
    /// Same as [`ResultExt::or_use`].
    fn value_or(self, default: T) -> T;
    /// True when the failure is an [`ErrorKind::EmptyResult`].
    fn is_empty_result(&self) -> bool;
}

impl<T> ResultExt<T> for Result<T> {
    fn or_use(self, default: T) -> T {
        self.unwrap_or(default)
    }
    fn value_or(self, default: T) -> T {
        self.or_use(default)
    }
    fn is_empty_result(&self) -> bool {
        matches!(self, Err(e) if matches!(ErrorKind::of(e), Some(ErrorKind::EmptyResult)))
    }
}
