//! Typed resource trait and conversions to and from engine values

use crate::error::{ResourceError, Result};
use keyward_core::{
    DesiredResource, FieldMap, ManagedInstance, RemoteObjectSnapshot, ResourceDescriptor,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// A declarable resource type
pub trait Resource: Serialize + DeserializeOwned + Sized {
    /// Resource type name as written in configuration
    const TYPE_NAME: &'static str;

    /// Engine parameters for this type
    fn descriptor() -> ResourceDescriptor;

    /// Kind tag to create this resource with
    fn kind(&self) -> &str;

    /// Local name used in addresses and name-based import
    fn name(&self) -> &str;

    /// Check field values before anything is sent
    fn validate(&self) -> Result<()>;

    /// Declared fields as the engine sees them
    fn to_fields(&self) -> Result<FieldMap> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(ResourceError::NotAnObject(Self::TYPE_NAME)),
        }
    }

    /// Rebuild the typed value from a remote or recorded snapshot
    fn from_snapshot(snapshot: &RemoteObjectSnapshot) -> Result<Self> {
        if !Self::descriptor().accepts(&snapshot.kind) {
            return Err(ResourceError::WrongKind {
                expected: Self::TYPE_NAME,
                actual: snapshot.kind.clone(),
            });
        }
        let object: serde_json::Map<String, serde_json::Value> = snapshot
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }
}

/// Address of a resource, e.g. `keyward_role.admin`
pub fn address_of<R: Resource>(label: &str) -> String {
    format!("{}.{}", R::TYPE_NAME, label)
}

/// Validated declaration for the batch driver
pub fn to_desired<R: Resource>(label: &str, resource: &R) -> Result<DesiredResource> {
    if let Err(e) = resource.validate() {
        tracing::debug!("Rejected {}: {}", address_of::<R>(label), e);
        return Err(e);
    }
    Ok(DesiredResource::new(
        address_of::<R>(label),
        R::TYPE_NAME,
        resource.kind(),
        resource.to_fields()?,
    ))
}

/// Validated managed instance for driving the engine directly
pub fn to_instance<R: Resource>(label: &str, resource: &R) -> Result<ManagedInstance> {
    let desired = to_desired(label, resource)?;
    Ok(ManagedInstance::new(
        desired.address,
        desired.resource_type,
        desired.kind,
        desired.fields,
    ))
}

/// Typed view of a snapshot
pub fn decode<R: Resource>(snapshot: &RemoteObjectSnapshot) -> Result<R> {
    R::from_snapshot(snapshot)
}

/// Fail unless `value` matches `pattern` in full
pub(crate) fn check_pattern(
    resource_type: &'static str,
    field: &'static str,
    pattern: &str,
    value: &str,
) -> Result<()> {
    let re = regex::Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| ResourceError::invalid(resource_type, field, format!("bad pattern: {}", e)))?;
    if re.is_match(value) {
        Ok(())
    } else {
        Err(ResourceError::invalid(
            resource_type,
            field,
            format!("{:?} does not match {}", value, pattern),
        ))
    }
}

/// Fail when a required string field is blank
pub(crate) fn require(resource_type: &'static str, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ResourceError::invalid(resource_type, field, "must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Template, TemplateFormat};

    #[test]
    fn test_to_desired_rejects_invalid_declaration() {
        let blank = Template {
            name: "welcome".to_string(),
            description: None,
            format: TemplateFormat::Plain,
            body: "  ".to_string(),
        };
        assert!(matches!(
            to_desired("welcome", &blank),
            Err(ResourceError::InvalidField { field: "body", .. })
        ));
        assert!(to_instance("welcome", &blank).is_err());
    }
}
