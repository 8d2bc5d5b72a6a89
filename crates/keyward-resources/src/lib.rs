//! Keyward resource catalog
//!
//! Typed declarations for every resource type the keyward provider manages,
//! and the [`KindRegistry`] the reconciliation engine is built from.
//!
//! # Resource types
//!
//! - **Credentials**: AWS (assumed role, access key), GCP, Azure, git tokens
//! - **Templates**
//! - **Roles** and **role assignments**
//!
//! # Example
//!
//! ```ignore
//! use keyward_core::{CancellationToken, Provider};
//! use keyward_resources::{Role, catalog, to_instance};
//!
//! let provider = Provider::new(catalog())
//!     .with_service(credentials_client)
//!     .with_service(roles_client);
//!
//! let role = Role { name: "auditor".into(), description: None, permissions: vec![] };
//! let result = provider
//!     .reconcile(&to_instance("auditor", &role)?, &CancellationToken::new())
//!     .await?;
//! ```

pub mod credentials;
pub mod error;
pub mod resource;
pub mod role;
pub mod template;

pub use credentials::{
    AwsAccessKeyCredential, AwsAssumedRoleCredential, AzureServicePrincipalCredential,
    GcpServiceAccountCredential, GitProvider, GitTokenCredential,
};
pub use error::{ResourceError, Result};
pub use resource::{Resource, address_of, decode, to_desired, to_instance};
pub use role::{BUILTIN_ROLE_KIND, Role, RoleAssignment};
pub use template::{Template, TemplateFormat};

use keyward_core::KindRegistry;

pub const CREDENTIALS_FAMILY: &str = "credentials";
pub const TEMPLATES_FAMILY: &str = "templates";
pub const ROLES_FAMILY: &str = "roles";
pub const ASSIGNMENTS_FAMILY: &str = "assignments";

/// Registry of every resource type in the catalog
pub fn catalog() -> KindRegistry {
    KindRegistry::new()
        .with(AwsAssumedRoleCredential::descriptor())
        .with(AwsAccessKeyCredential::descriptor())
        .with(GcpServiceAccountCredential::descriptor())
        .with(AzureServicePrincipalCredential::descriptor())
        .with(GitTokenCredential::descriptor())
        .with(Template::descriptor())
        .with(Role::descriptor())
        .with(RoleAssignment::descriptor())
}
