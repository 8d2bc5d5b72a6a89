//! Reconciliation error types

use std::fmt;
use thiserror::Error;

/// Remote call that an error or log line refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    List,
    Update,
    Delete,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Read => write!(f, "read"),
            Operation::List => write!(f, "list"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
            Operation::Import => write!(f, "import"),
        }
    }
}

/// How an import reference was looked up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Id,
    Name,
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id => write!(f, "id"),
            Lookup::Name => write!(f, "name"),
        }
    }
}

/// Errors reported by a `RemoteObjectService` implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The object does not exist. Kept distinct so the engine can treat it as drift.
    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

/// Errors surfaced by the reconciliation engine and the provider facade
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("{kind} with {lookup} {reference} not found")]
    NotFound {
        kind: String,
        lookup: Lookup,
        reference: String,
    },

    #[error("{address}: remote object {id} is a {actual}, expected one of [{expected}]")]
    KindMismatch {
        address: String,
        id: String,
        expected: String,
        actual: String,
    },

    #[error("found multiple {kind} with name {name}")]
    Ambiguous {
        kind: String,
        name: String,
        ids: Vec<String>,
    },

    #[error("{operation} {kind} {target} failed: {source}")]
    RemoteOperationFailure {
        operation: Operation,
        kind: String,
        target: String,
        #[source]
        source: ServiceError,
    },

    #[error("{operation} {target} cancelled")]
    Cancelled { operation: Operation, target: String },

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("{resource_type} does not accept kind {kind}")]
    UnsupportedKind { resource_type: String, kind: String },

    #[error("No service registered for object family: {0}")]
    NoService(String),

    #[error("Invalid import reference: {0}")]
    InvalidReference(String),

    #[error("State file error: {0}")]
    State(String),

    #[error("Lock acquisition failed: {0}")]
    Lock(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReconcileError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ReconcileError::Cancelled { .. })
    }

    pub(crate) fn remote(
        operation: Operation,
        kind: impl Into<String>,
        target: impl Into<String>,
        source: ServiceError,
    ) -> Self {
        ReconcileError::RemoteOperationFailure {
            operation,
            kind: kind.into(),
            target: target.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
