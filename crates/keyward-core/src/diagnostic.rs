//! User-facing diagnostics returned alongside reconciliation results

use crate::error::ReconcileError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: Option<String>,
    /// Address of the instance the diagnostic refers to, if any
    pub address: Option<String>,
}

impl Diagnostic {
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            summary: summary.into(),
            detail: None,
            address: None,
        }
    }

    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            summary: summary.into(),
            detail: None,
            address: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn at(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }
}

impl From<&ReconcileError> for Diagnostic {
    fn from(err: &ReconcileError) -> Self {
        let summary = match err {
            ReconcileError::NotFound { .. } => "Remote object not found",
            ReconcileError::KindMismatch { .. } => "Remote object has the wrong kind",
            ReconcileError::Ambiguous { .. } => "Import reference is ambiguous",
            ReconcileError::RemoteOperationFailure { .. } => "Remote operation failed",
            ReconcileError::Cancelled { .. } => "Operation cancelled",
            _ => "Provider error",
        };
        let mut diagnostic = Diagnostic::error(summary).with_detail(err.to_string());
        if let ReconcileError::KindMismatch { address, .. } = err {
            diagnostic = diagnostic.at(address.clone());
        }
        diagnostic
    }
}

/// Ordered collection of diagnostics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics(Vec<Diagnostic>);

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.0.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.0.extend(other.0);
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.0.iter()
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(items: Vec<Diagnostic>) -> Self {
        Self(items)
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Lookup;

    #[test]
    fn test_error_becomes_diagnostic() {
        let err = ReconcileError::NotFound {
            kind: "template".to_string(),
            lookup: Lookup::Id,
            reference: "tpl-9".to_string(),
        };
        let diagnostic = Diagnostic::from(&err);
        assert_eq!(diagnostic.severity, Severity::Error);
        assert_eq!(diagnostic.detail.as_deref(), Some("template with id tpl-9 not found"));
    }

    #[test]
    fn test_has_errors() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(Diagnostic::warning("remote object vanished"));
        assert!(!diagnostics.has_errors());

        diagnostics.push(Diagnostic::error("boom"));
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.len(), 2);
    }
}
