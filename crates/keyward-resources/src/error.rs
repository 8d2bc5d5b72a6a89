//! Resource catalog error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("Invalid {resource_type} field {field}: {reason}")]
    InvalidField {
        resource_type: &'static str,
        field: &'static str,
        reason: String,
    },

    #[error("Expected a {expected} object, got kind {actual}")]
    WrongKind {
        expected: &'static str,
        actual: String,
    },

    #[error("{0} does not serialize to a field map")]
    NotAnObject(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Reconcile(#[from] keyward_core::ReconcileError),
}

impl ResourceError {
    pub(crate) fn invalid(
        resource_type: &'static str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        ResourceError::InvalidField {
            resource_type,
            field,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ResourceError>;
