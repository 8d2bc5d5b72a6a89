//! Custom roles and role assignments
//!
//! Builtin roles share the roles collection but are tagged `builtin_role`
//! and are never managed or imported as `keyward_role`.

use crate::error::{ResourceError, Result};
use crate::resource::{Resource, check_pattern, require};
use crate::{ASSIGNMENTS_FAMILY, ROLES_FAMILY};
use keyward_core::{IdShape, ResourceDescriptor};
use serde::{Deserialize, Serialize};

pub const BUILTIN_ROLE_KIND: &str = "builtin_role";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Permission strings such as `credentials:read`
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl Resource for Role {
    const TYPE_NAME: &'static str = "keyward_role";

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new(Self::TYPE_NAME, "role", ROLES_FAMILY)
            .accepts_kind("custom_role")
            .field("name")
            .field("description")
            .field("permissions")
            .id_shape(IdShape::Uuid)
    }

    fn kind(&self) -> &str {
        "custom_role"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        require(Self::TYPE_NAME, "name", &self.name)?;
        for permission in &self.permissions {
            check_pattern(
                Self::TYPE_NAME,
                "permissions",
                r"[a-z_]+:(\*|[a-z_]+)",
                permission,
            )?;
        }
        let mut sorted = self.permissions.clone();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != self.permissions.len() {
            return Err(ResourceError::invalid(
                Self::TYPE_NAME,
                "permissions",
                "contains duplicates",
            ));
        }
        Ok(())
    }
}

/// Grant of a role to a principal within a scope
///
/// Every identifying field forces a replace; only the name and description
/// can change in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub role_id: String,
    pub principal_id: String,
    /// Resource path the grant applies to, `/` for the whole account
    pub scope: String,
}

impl Resource for RoleAssignment {
    const TYPE_NAME: &'static str = "keyward_role_assignment";

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new(Self::TYPE_NAME, "role assignment", ASSIGNMENTS_FAMILY)
            .accepts_kind("role_assignment")
            .field("name")
            .field("description")
            .replace_on("role_id")
            .replace_on("principal_id")
            .replace_on("scope")
            .id_shape(IdShape::Prefixed("asg-".to_string()))
    }

    fn kind(&self) -> &str {
        "role_assignment"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        require(Self::TYPE_NAME, "name", &self.name)?;
        require(Self::TYPE_NAME, "role_id", &self.role_id)?;
        require(Self::TYPE_NAME, "principal_id", &self.principal_id)?;
        check_pattern(Self::TYPE_NAME, "scope", r"/([\w.-]+(/[\w.-]+)*)?", &self.scope)
    }
}
