//! Action types for planned and applied reconciliation passes

use crate::diagnostic::Diagnostics;
use crate::drift::{Drift, FieldChange};
use crate::model::ManagedInstance;
use serde::{Deserialize, Serialize};

/// Represents a planned action for one managed instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Address of the instance (e.g. "keyward_role.admin")
    pub address: String,

    /// Type of action to perform
    pub action_type: ActionType,

    /// Resource type (e.g. "keyward_role")
    pub resource_type: String,

    /// Remote id, when the instance already exists
    pub external_id: Option<String>,

    /// Field-level differences behind the action
    pub changes: Vec<FieldChange>,

    /// Human-readable description of the action
    pub description: String,
}

impl Action {
    /// Action the engine would take for an observed drift
    pub fn for_drift(
        address: impl Into<String>,
        resource_type: impl Into<String>,
        external_id: Option<String>,
        drift: &Drift,
    ) -> Self {
        let address = address.into();
        let action_type = ActionType::from(drift);
        let description = match drift {
            Drift::Unchanged => format!("{} is up to date", address),
            Drift::Update { changes } => format!(
                "update {} in place ({})",
                address,
                field_names(changes)
            ),
            Drift::Replace { forced_by, .. } => format!(
                "replace {} (forced by {})",
                address,
                forced_by.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
            Drift::Missing if external_id.is_some() => {
                format!("create {} (remote object no longer exists)", address)
            }
            Drift::Missing => format!("create {}", address),
        };
        Self {
            address,
            action_type,
            resource_type: resource_type.into(),
            external_id,
            changes: drift.changes().to_vec(),
            description,
        }
    }

    /// Replace for an address now declared with a different resource type
    pub fn retype(old: &ManagedInstance, resource_type: &str) -> Self {
        Self {
            address: old.address.clone(),
            action_type: ActionType::Replace,
            resource_type: resource_type.to_string(),
            external_id: old.external_id.clone(),
            changes: vec![FieldChange::new(
                "resource_type",
                serde_json::Value::String(old.resource_type.clone()),
                serde_json::Value::String(resource_type.to_string()),
            )],
            description: format!(
                "replace {} (resource type changed from {} to {})",
                old.address, old.resource_type, resource_type
            ),
        }
    }

    /// Destroy action for an instance whose declaration was removed
    pub fn destroy(
        address: impl Into<String>,
        resource_type: impl Into<String>,
        external_id: Option<String>,
    ) -> Self {
        let address = address.into();
        Self {
            description: format!("destroy {} (no longer declared)", address),
            address,
            action_type: ActionType::Delete,
            resource_type: resource_type.into(),
            external_id,
            changes: Vec::new(),
        }
    }
}

fn field_names(changes: &[FieldChange]) -> String {
    changes
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Type of action to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Create a new remote object
    Create,
    /// Update an existing remote object in place
    Update,
    /// Delete the remote object and create a new one
    Replace,
    /// Delete a remote object
    Delete,
    /// No changes needed
    NoOp,
}

impl From<&Drift> for ActionType {
    fn from(drift: &Drift) -> Self {
        match drift {
            Drift::Unchanged => ActionType::NoOp,
            Drift::Update { .. } => ActionType::Update,
            Drift::Replace { .. } => ActionType::Replace,
            Drift::Missing => ActionType::Create,
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::Create => write!(f, "create"),
            ActionType::Update => write!(f, "update"),
            ActionType::Replace => write!(f, "replace"),
            ActionType::Delete => write!(f, "delete"),
            ActionType::NoOp => write!(f, "no-op"),
        }
    }
}

/// Result of applying a desired set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplyResult {
    /// Successfully applied actions
    pub succeeded: Vec<ActionResult>,

    /// Failed actions
    pub failed: Vec<ActionResult>,

    /// Warnings and errors to show the user
    pub diagnostics: Diagnostics,

    /// Total execution time in milliseconds
    pub duration_ms: u64,
}

impl ApplyResult {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            diagnostics: Diagnostics::new(),
            duration_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn add_success(&mut self, address: String, action_type: ActionType, message: String) {
        self.succeeded.push(ActionResult {
            address,
            action_type: Some(action_type),
            success: true,
            message,
            error: None,
        });
    }

    /// Record a failure; the action is unknown when the read before it failed
    pub fn add_failure(&mut self, address: String, action_type: Option<ActionType>, error: String) {
        self.failed.push(ActionResult {
            address,
            action_type,
            success: false,
            message: String::new(),
            error: Some(error),
        });
    }

    /// Successful results of the given type
    pub fn succeeded_by_type(&self, action_type: ActionType) -> Vec<&ActionResult> {
        self.succeeded
            .iter()
            .filter(|r| r.action_type == Some(action_type))
            .collect()
    }
}

impl Default for ApplyResult {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Address of the instance
    pub address: String,

    /// Action that was attempted
    pub action_type: Option<ActionType>,

    /// Whether the action succeeded
    pub success: bool,

    /// Success message
    pub message: String,

    /// Error message if failed
    pub error: Option<String>,
}

/// Plan containing all actions to be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// List of actions to perform
    pub actions: Vec<Action>,

    /// Whether the plan has any changes
    pub has_changes: bool,
}

impl Plan {
    pub fn new(actions: Vec<Action>) -> Self {
        let has_changes = actions.iter().any(|a| a.action_type != ActionType::NoOp);
        Self {
            actions,
            has_changes,
        }
    }

    pub fn empty() -> Self {
        Self {
            actions: Vec::new(),
            has_changes: false,
        }
    }

    /// Get actions by type
    pub fn actions_by_type(&self, action_type: ActionType) -> Vec<&Action> {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .collect()
    }

    pub fn action_for(&self, address: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.address == address)
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            create: self.actions_by_type(ActionType::Create).len(),
            update: self.actions_by_type(ActionType::Update).len(),
            replace: self.actions_by_type(ActionType::Replace).len(),
            delete: self.actions_by_type(ActionType::Delete).len(),
            no_change: self.actions_by_type(ActionType::NoOp).len(),
        }
    }
}

/// Summary of planned actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub replace: usize,
    pub delete: usize,
    pub no_change: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} to replace, {} to delete, {} unchanged",
            self.create, self.update, self.replace, self.delete, self.no_change
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn test_plan_summary() {
        let update = Drift::Update {
            changes: vec![FieldChange::new("description", json!("old"), json!("new"))],
        };
        let replace = Drift::Replace {
            changes: Vec::new(),
            forced_by: BTreeSet::from(["secret".to_string()]),
        };
        let plan = Plan::new(vec![
            Action::for_drift("keyward_role.a", "keyward_role", None, &Drift::Missing),
            Action::for_drift("keyward_role.b", "keyward_role", Some("1".into()), &update),
            Action::for_drift("keyward_role.c", "keyward_role", Some("2".into()), &replace),
            Action::for_drift("keyward_role.d", "keyward_role", Some("3".into()), &Drift::Unchanged),
            Action::destroy("keyward_role.e", "keyward_role", Some("4".into())),
        ]);

        assert!(plan.has_changes);
        assert_eq!(
            plan.summary().to_string(),
            "1 to create, 1 to update, 1 to replace, 1 to delete, 1 unchanged"
        );
        assert_eq!(
            plan.action_for("keyward_role.b").unwrap().description,
            "update keyward_role.b in place (description)"
        );
        assert_eq!(
            plan.action_for("keyward_role.c").unwrap().description,
            "replace keyward_role.c (forced by secret)"
        );
    }

    #[test]
    fn test_noop_plan_has_no_changes() {
        let plan = Plan::new(vec![Action::for_drift(
            "keyward_role.a",
            "keyward_role",
            Some("1".into()),
            &Drift::Unchanged,
        )]);
        assert!(!plan.has_changes);
        assert!(!Plan::empty().has_changes);
    }
}
