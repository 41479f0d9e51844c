use std::fmt;
use std::time::Duration;

use crate::client::ApiError;
use crate::models::ResourceKind;
use crate::wait::WaitError;

/// The reconciler operation a remote failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Create => "creating",
            Operation::Read => "reading",
            Operation::Update => "updating",
            Operation::Delete => "deleting",
        })
    }
}

/// A value in the desired-state bag could not be coerced into the shape
/// the schema or the remote struct expects.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("unknown field {0:?}")]
    UnknownField(String),
    #[error("required field {0:?} is missing")]
    Missing(String),
    #[error("field {field:?} expects {expected}, got {found}")]
    Mismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("field {field:?} allows at most {max} item(s), got {found}")]
    TooMany {
        field: String,
        max: usize,
        found: usize,
    },
    #[error("field {field:?}: cannot convert {value:?} to {target}")]
    Coerce {
        field: String,
        value: String,
        target: &'static str,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid {kind}: {message}")]
    Validation { kind: ResourceKind, message: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("error creating {kind} {id}: {source}")]
    CreateFailed {
        kind: ResourceKind,
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("error reading {kind} {id}: {source}")]
    ReadFailed {
        kind: ResourceKind,
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("error updating {kind} {id}: {source}")]
    UpdateFailed {
        kind: ResourceKind,
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("error deleting {kind} {id}: {source}")]
    DeleteFailed {
        kind: ResourceKind,
        id: String,
        #[source]
        source: ApiError,
    },

    /// The remote write happened, but it did not become observable in time.
    #[error("timed out after {elapsed:?} waiting for {kind} {id} to {goal}")]
    PropagationTimeout {
        kind: ResourceKind,
        id: String,
        goal: &'static str,
        elapsed: Duration,
    },

    #[error("{kind}: {source}")]
    Shape {
        kind: ResourceKind,
        #[source]
        source: ShapeError,
    },
}

impl ProviderError {
    pub fn validation(kind: ResourceKind, message: impl Into<String>) -> Self {
        ProviderError::Validation {
            kind,
            message: message.into(),
        }
    }

    pub fn shape(kind: ResourceKind) -> impl FnOnce(ShapeError) -> Self {
        move |source| ProviderError::Shape { kind, source }
    }

    /// Wraps a non-404 remote error with the operation it interrupted.
    pub fn remote(op: Operation, kind: ResourceKind, id: impl Into<String>, source: ApiError) -> Self {
        let id = id.into();
        match op {
            Operation::Create => ProviderError::CreateFailed { kind, id, source },
            Operation::Read => ProviderError::ReadFailed { kind, id, source },
            Operation::Update => ProviderError::UpdateFailed { kind, id, source },
            Operation::Delete => ProviderError::DeleteFailed { kind, id, source },
        }
    }

    /// Maps the outcome of a consistency wait onto the surrounding operation.
    pub fn from_wait(
        err: WaitError<ApiError>,
        op: Operation,
        kind: ResourceKind,
        id: impl Into<String>,
        goal: &'static str,
    ) -> Self {
        match err {
            WaitError::TimedOut { elapsed, .. } => ProviderError::PropagationTimeout {
                kind,
                id: id.into(),
                goal,
                elapsed,
            },
            WaitError::Aborted(source) => ProviderError::remote(op, kind, id, source),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::PropagationTimeout { .. })
    }
}
