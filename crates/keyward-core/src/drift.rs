//! Drift detection between desired fields and a remote snapshot

use crate::kind::ResourceDescriptor;
use crate::model::{FieldMap, ManagedInstance, RemoteObjectSnapshot, field};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeSet;

/// Pseudo-field reported when the remote kind differs from the desired kind
pub const KIND_FIELD: &str = "kind";

/// Stands in for write-only values wherever a change is serialized
pub const REDACTED: &str = "(sensitive value)";

/// A single field that differs between remote and desired state
///
/// Changes to write-only fields are marked `sensitive`. Their values stay
/// available in memory for the update call but are never serialized.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FieldChange {
    pub name: String,
    pub from: serde_json::Value,
    pub to: serde_json::Value,
    #[serde(default)]
    pub sensitive: bool,
}

impl FieldChange {
    pub fn new(name: impl Into<String>, from: serde_json::Value, to: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            sensitive: false,
        }
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Values as they may be shown to a user
    pub fn display_values(&self) -> (serde_json::Value, serde_json::Value) {
        if self.sensitive {
            let hidden = serde_json::Value::String(REDACTED.to_string());
            (hidden.clone(), hidden)
        } else {
            (self.from.clone(), self.to.clone())
        }
    }
}

impl Serialize for FieldChange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (from, to) = self.display_values();
        let mut change = serializer.serialize_struct("FieldChange", 4)?;
        change.serialize_field("name", &self.name)?;
        change.serialize_field("from", &from)?;
        change.serialize_field("to", &to)?;
        change.serialize_field("sensitive", &self.sensitive)?;
        change.end()
    }
}

/// Outcome of comparing one managed instance with its remote object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Drift {
    /// Remote object matches the declaration
    Unchanged,
    /// Differences can be applied in place
    Update { changes: Vec<FieldChange> },
    /// At least one difference forces delete then create
    Replace {
        changes: Vec<FieldChange>,
        forced_by: BTreeSet<String>,
    },
    /// No remote object (never created, removed externally, or soft-deleted)
    Missing,
}

impl Drift {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, Drift::Unchanged)
    }

    pub fn changes(&self) -> &[FieldChange] {
        match self {
            Drift::Update { changes } | Drift::Replace { changes, .. } => changes,
            Drift::Unchanged | Drift::Missing => &[],
        }
    }

    /// Changed fields with their desired values, as sent to an in-place update
    pub fn changed_fields(&self) -> FieldMap {
        self.changes()
            .iter()
            .filter(|c| c.name != KIND_FIELD)
            .map(|c| (c.name.clone(), c.to.clone()))
            .collect()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Drift::Unchanged => "unchanged",
            Drift::Update { .. } => "update in place",
            Drift::Replace { .. } => "replace",
            Drift::Missing => "missing",
        }
    }
}

/// Compare declared fields with the remote snapshot
///
/// Write-only fields are compared against the instance's last applied
/// values since the service never returns them. Undeclared remote fields
/// are computed by the service and ignored.
pub fn diff_fields(
    descriptor: &ResourceDescriptor,
    instance: &ManagedInstance,
    remote: &RemoteObjectSnapshot,
) -> Vec<FieldChange> {
    let names: BTreeSet<&String> = instance.desired.keys().chain(descriptor.fields.iter()).collect();

    names
        .into_iter()
        .filter_map(|name| {
            let desired = field(&instance.desired, name);
            let write_only = descriptor.is_write_only(name);
            let current = if write_only {
                field(&instance.applied, name)
            } else {
                field(&remote.fields, name)
            };
            if desired == current {
                return None;
            }
            let change = FieldChange::new(
                name.clone(),
                current.cloned().unwrap_or(serde_json::Value::Null),
                desired.cloned().unwrap_or(serde_json::Value::Null),
            );
            Some(if write_only { change.sensitive() } else { change })
        })
        .collect()
}

/// Decide between unchanged, in-place update, and replace
pub fn classify(
    descriptor: &ResourceDescriptor,
    instance: &ManagedInstance,
    remote: &RemoteObjectSnapshot,
) -> Drift {
    let mut changes = diff_fields(descriptor, instance, remote);

    // Switching between two accepted kinds cannot be done in place.
    if remote.kind != instance.kind {
        changes.push(FieldChange::new(
            KIND_FIELD,
            serde_json::Value::String(remote.kind.clone()),
            serde_json::Value::String(instance.kind.clone()),
        ));
    }

    if changes.is_empty() {
        return Drift::Unchanged;
    }

    let forced_by: BTreeSet<String> = changes
        .iter()
        .filter(|c| c.name == KIND_FIELD || descriptor.replace_on_change.contains(&c.name))
        .map(|c| c.name.clone())
        .collect();

    if forced_by.is_empty() {
        Drift::Update { changes }
    } else {
        Drift::Replace { changes, forced_by }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new("keyward_access_key", "access key", "credentials")
            .accepts_kind("aws_access_key")
            .field("name")
            .field("description")
            .replace_on("secret_access_key")
            .write_only("secret_access_key")
    }

    fn fields(pairs: &[(&str, serde_json::Value)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn instance(desired: FieldMap, applied: FieldMap) -> ManagedInstance {
        ManagedInstance::new("keyward_access_key.ci", "keyward_access_key", "aws_access_key", desired)
            .with_external_id("cred-1")
            .with_applied(applied)
    }

    #[test]
    fn test_unchanged_ignores_computed_fields() {
        let d = descriptor();
        let inst = instance(
            fields(&[("name", json!("ci")), ("secret_access_key", json!("s1"))]),
            fields(&[("secret_access_key", json!("s1"))]),
        );
        let remote = RemoteObjectSnapshot::new(
            "cred-1",
            "aws_access_key",
            fields(&[("name", json!("ci")), ("created_at", json!("2026-01-01"))]),
        );

        assert_eq!(classify(&d, &inst, &remote), Drift::Unchanged);
    }

    #[test]
    fn test_description_change_is_update() {
        let d = descriptor();
        let inst = instance(
            fields(&[("name", json!("ci")), ("description", json!("new"))]),
            FieldMap::new(),
        );
        let remote = RemoteObjectSnapshot::new(
            "cred-1",
            "aws_access_key",
            fields(&[("name", json!("ci")), ("description", json!("old"))]),
        );

        let drift = classify(&d, &inst, &remote);
        assert!(matches!(drift, Drift::Update { .. }));
        assert_eq!(drift.changed_fields(), fields(&[("description", json!("new"))]));
    }

    #[test]
    fn test_removed_declared_field_clears_remote_value() {
        let d = descriptor();
        let inst = instance(fields(&[("name", json!("ci"))]), FieldMap::new());
        let remote = RemoteObjectSnapshot::new(
            "cred-1",
            "aws_access_key",
            fields(&[("name", json!("ci")), ("description", json!("old"))]),
        );

        let drift = classify(&d, &inst, &remote);
        assert_eq!(drift.changed_fields(), fields(&[("description", json!(null))]));
    }

    #[test]
    fn test_write_only_compared_against_applied() {
        let d = descriptor();
        let inst = instance(
            fields(&[("name", json!("ci")), ("secret_access_key", json!("s2"))]),
            fields(&[("secret_access_key", json!("s1"))]),
        );
        let remote =
            RemoteObjectSnapshot::new("cred-1", "aws_access_key", fields(&[("name", json!("ci"))]));

        match classify(&d, &inst, &remote) {
            Drift::Replace { forced_by, changes } => {
                assert_eq!(forced_by, BTreeSet::from(["secret_access_key".to_string()]));
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].from, json!("s1"));
                assert!(changes[0].sensitive);
            }
            other => panic!("expected replace, got {:?}", other),
        }
    }

    #[test]
    fn test_serialized_drift_hides_write_only_values() {
        let d = descriptor();
        let inst = instance(
            fields(&[
                ("name", json!("ci")),
                ("description", json!("rotated")),
                ("secret_access_key", json!("new-secret")),
            ]),
            fields(&[("secret_access_key", json!("old-secret"))]),
        );
        let remote =
            RemoteObjectSnapshot::new("cred-1", "aws_access_key", fields(&[("name", json!("ci"))]));

        let drift = classify(&d, &inst, &remote);
        let text = serde_json::to_string(&drift).unwrap();
        assert!(!text.contains("new-secret"));
        assert!(!text.contains("old-secret"));
        assert!(text.contains(REDACTED));
        assert!(text.contains("rotated"));

        // The update path still sees the real value
        assert_eq!(
            drift.changed_fields().get("secret_access_key"),
            Some(&json!("new-secret"))
        );
    }

    #[test]
    fn test_kind_switch_forces_replace() {
        let d = descriptor().accepts_kind("aws_access_key_v2");
        let inst = instance(fields(&[("name", json!("ci"))]), FieldMap::new());
        let remote =
            RemoteObjectSnapshot::new("cred-1", "aws_access_key_v2", fields(&[("name", json!("ci"))]));

        let drift = classify(&d, &inst, &remote);
        match &drift {
            Drift::Replace { forced_by, .. } => assert!(forced_by.contains(KIND_FIELD)),
            other => panic!("expected replace, got {:?}", other),
        }
        assert!(drift.changed_fields().is_empty());
    }
}
