//! Managed instances, remote snapshots and import references

use crate::error::{ReconcileError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Field name to value mapping, ordered so diffs and logs are stable
pub type FieldMap = BTreeMap<String, serde_json::Value>;

/// Look up a field, treating a JSON `null` the same as an absent key
pub fn field<'a>(fields: &'a FieldMap, name: &str) -> Option<&'a serde_json::Value> {
    fields.get(name).filter(|v| !v.is_null())
}

/// One declared object under management
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedInstance {
    /// Front-end address (e.g. "keyward_role.admin")
    pub address: String,

    /// Resource type the instance was declared as
    pub resource_type: String,

    /// Id assigned by the remote service; `None` until the first create
    pub external_id: Option<String>,

    /// Kind tag to create the remote object with
    pub kind: String,

    /// Declared field values
    pub desired: FieldMap,

    /// Last applied values of write-only fields
    #[serde(default)]
    pub applied: FieldMap,
}

impl ManagedInstance {
    pub fn new(
        address: impl Into<String>,
        resource_type: impl Into<String>,
        kind: impl Into<String>,
        desired: FieldMap,
    ) -> Self {
        Self {
            address: address.into(),
            resource_type: resource_type.into(),
            external_id: None,
            kind: kind.into(),
            desired,
            applied: FieldMap::new(),
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    pub fn with_applied(mut self, applied: FieldMap) -> Self {
        self.applied = applied;
        self
    }

    /// Target string used in errors and logs: address plus id when known
    pub fn target(&self) -> String {
        match &self.external_id {
            Some(id) => format!("{} ({})", self.address, id),
            None => self.address.clone(),
        }
    }
}

/// The service's view of one remote object at the time it was fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteObjectSnapshot {
    pub external_id: String,
    pub kind: String,
    pub fields: FieldMap,

    /// Soft-deleted objects are reported by some services; treated as missing
    #[serde(default)]
    pub deleted: bool,
}

impl RemoteObjectSnapshot {
    pub fn new(external_id: impl Into<String>, kind: impl Into<String>, fields: FieldMap) -> Self {
        Self {
            external_id: external_id.into(),
            kind: kind.into(),
            fields,
            deleted: false,
        }
    }

    pub fn mark_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// String value of a field, if present
    pub fn str_field(&self, name: &str) -> Option<&str> {
        field(&self.fields, name).and_then(|v| v.as_str())
    }

    /// Snapshot fields with the given values layered on top
    pub fn merged_with(&self, overlay: &FieldMap) -> Self {
        let mut merged = self.clone();
        for (key, value) in overlay {
            merged.fields.insert(key.clone(), value.clone());
        }
        merged
    }
}

/// User-supplied reference to a pre-existing remote object: an id or a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReference(String);

impl ImportReference {
    pub fn parse(reference: impl Into<String>) -> Result<Self> {
        let reference = reference.into();
        if reference.trim().is_empty() {
            return Err(ReconcileError::InvalidReference(
                "import reference must not be empty".to_string(),
            ));
        }
        Ok(Self(reference))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImportReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
