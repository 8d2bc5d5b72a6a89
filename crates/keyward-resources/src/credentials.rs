//! Cloud and source-control credentials
//!
//! All credential types live in the `credentials` family and are told apart
//! by kind tag. Secret material is write-only: the service stores it but
//! never returns it, so changes to it are detected against the values
//! applied in the previous pass, and always force a replace.

use crate::CREDENTIALS_FAMILY;
use crate::error::{ResourceError, Result};
use crate::resource::{Resource, check_pattern, require};
use keyward_core::{IdShape, RemoteObjectSnapshot, ResourceDescriptor};
use serde::{Deserialize, Serialize};

fn credential(type_name: &str, display_name: &str) -> ResourceDescriptor {
    ResourceDescriptor::new(type_name, display_name, CREDENTIALS_FAMILY)
        .field("name")
        .field("description")
        .id_shape(IdShape::Prefixed("cred-".to_string()))
}

/// AWS credential obtained by assuming an IAM role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsAssumedRoleCredential {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub role_arn: String,
    /// Shared secret presented to the role's trust policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration_secs: Option<u32>,
}

impl AwsAssumedRoleCredential {
    pub const KIND: &'static str = "aws_assumed_role";
    /// Tag of objects created before the current schema; still managed by this type
    pub const LEGACY_KIND: &'static str = "aws_assumed_role_v1";
}

impl Resource for AwsAssumedRoleCredential {
    const TYPE_NAME: &'static str = "keyward_aws_assumed_role_credential";

    fn descriptor() -> ResourceDescriptor {
        credential(Self::TYPE_NAME, "AWS assumed-role credential")
            .accepts_kind(Self::KIND)
            .accepts_kind(Self::LEGACY_KIND)
            .replace_on("role_arn")
            .write_only("external_id")
            .field("session_duration_secs")
    }

    fn kind(&self) -> &str {
        Self::KIND
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        require(Self::TYPE_NAME, "name", &self.name)?;
        check_pattern(
            Self::TYPE_NAME,
            "role_arn",
            r"arn:aws[a-z-]*:iam::\d{12}:role/[\w+=,.@/-]+",
            &self.role_arn,
        )?;
        if let Some(secs) = self.session_duration_secs {
            if !(900..=43200).contains(&secs) {
                return Err(ResourceError::invalid(
                    Self::TYPE_NAME,
                    "session_duration_secs",
                    format!("{} is outside 900..=43200", secs),
                ));
            }
        }
        Ok(())
    }
}

/// Long-lived AWS access key pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsAccessKeyCredential {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
}

impl Resource for AwsAccessKeyCredential {
    const TYPE_NAME: &'static str = "keyward_aws_access_key_credential";

    fn descriptor() -> ResourceDescriptor {
        credential(Self::TYPE_NAME, "AWS access key credential")
            .accepts_kind("aws_access_key")
            .replace_on("access_key_id")
            .replace_on("secret_access_key")
            .write_only("secret_access_key")
    }

    fn kind(&self) -> &str {
        "aws_access_key"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        require(Self::TYPE_NAME, "name", &self.name)?;
        check_pattern(
            Self::TYPE_NAME,
            "access_key_id",
            "(AKIA|ASIA)[A-Z0-9]{16}",
            &self.access_key_id,
        )?;
        require(Self::TYPE_NAME, "secret_access_key", &self.secret_access_key)
    }
}

/// GCP service account key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcpServiceAccountCredential {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub project_id: String,
    /// JSON key file contents
    #[serde(default)]
    pub service_account_key: String,
}

impl Resource for GcpServiceAccountCredential {
    const TYPE_NAME: &'static str = "keyward_gcp_service_account_credential";

    fn descriptor() -> ResourceDescriptor {
        credential(Self::TYPE_NAME, "GCP service account credential")
            .accepts_kind("gcp_service_account")
            .replace_on("project_id")
            .replace_on("service_account_key")
            .write_only("service_account_key")
    }

    fn kind(&self) -> &str {
        "gcp_service_account"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        require(Self::TYPE_NAME, "name", &self.name)?;
        check_pattern(
            Self::TYPE_NAME,
            "project_id",
            "[a-z][a-z0-9-]{4,28}[a-z0-9]",
            &self.project_id,
        )?;
        if serde_json::from_str::<serde_json::Value>(&self.service_account_key).is_err() {
            return Err(ResourceError::invalid(
                Self::TYPE_NAME,
                "service_account_key",
                "must be the JSON key file contents",
            ));
        }
        Ok(())
    }
}

/// Azure service principal with a client secret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AzureServicePrincipalCredential {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub tenant_id: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

impl Resource for AzureServicePrincipalCredential {
    const TYPE_NAME: &'static str = "keyward_azure_service_principal_credential";

    fn descriptor() -> ResourceDescriptor {
        credential(Self::TYPE_NAME, "Azure service principal credential")
            .accepts_kind("azure_service_principal")
            .replace_on("tenant_id")
            .replace_on("client_id")
            .replace_on("client_secret")
            .write_only("client_secret")
    }

    fn kind(&self) -> &str {
        "azure_service_principal"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        const GUID: &str = "[0-9a-fA-F]{8}-([0-9a-fA-F]{4}-){3}[0-9a-fA-F]{12}";
        require(Self::TYPE_NAME, "name", &self.name)?;
        check_pattern(Self::TYPE_NAME, "tenant_id", GUID, &self.tenant_id)?;
        check_pattern(Self::TYPE_NAME, "client_id", GUID, &self.client_id)?;
        require(Self::TYPE_NAME, "client_secret", &self.client_secret)
    }
}

/// Hosting service a git token belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    #[default]
    Github,
    Gitlab,
    Bitbucket,
}

impl GitProvider {
    pub fn kind_tag(&self) -> &'static str {
        match self {
            GitProvider::Github => "github_token",
            GitProvider::Gitlab => "gitlab_token",
            GitProvider::Bitbucket => "bitbucket_token",
        }
    }

    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "github_token" => Some(GitProvider::Github),
            "gitlab_token" => Some(GitProvider::Gitlab),
            "bitbucket_token" => Some(GitProvider::Bitbucket),
            _ => None,
        }
    }
}

/// Personal or project access token for a git host
///
/// The host is carried by the kind tag rather than a field, so moving a
/// token between hosts replaces the remote object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitTokenCredential {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub provider: GitProvider,
    #[serde(default)]
    pub token: String,
    /// Self-hosted instance URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Resource for GitTokenCredential {
    const TYPE_NAME: &'static str = "keyward_git_token_credential";

    fn descriptor() -> ResourceDescriptor {
        credential(Self::TYPE_NAME, "git token credential")
            .accepts_kind(GitProvider::Github.kind_tag())
            .accepts_kind(GitProvider::Gitlab.kind_tag())
            .accepts_kind(GitProvider::Bitbucket.kind_tag())
            .replace_on("token")
            .write_only("token")
            .field("base_url")
    }

    fn kind(&self) -> &str {
        self.provider.kind_tag()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        require(Self::TYPE_NAME, "name", &self.name)?;
        require(Self::TYPE_NAME, "token", &self.token)?;
        if let Some(url) = &self.base_url {
            check_pattern(Self::TYPE_NAME, "base_url", r"https://[^\s/]+(/\S*)?", url)?;
        }
        Ok(())
    }

    fn from_snapshot(snapshot: &RemoteObjectSnapshot) -> Result<Self> {
        let provider =
            GitProvider::from_kind(&snapshot.kind).ok_or_else(|| ResourceError::WrongKind {
                expected: Self::TYPE_NAME,
                actual: snapshot.kind.clone(),
            })?;
        let object: serde_json::Map<String, serde_json::Value> = snapshot
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut token: Self = serde_json::from_value(serde_json::Value::Object(object))?;
        token.provider = provider;
        Ok(token)
    }
}
