//! Notification and policy templates

use crate::TEMPLATES_FAMILY;
use crate::error::{ResourceError, Result};
use crate::resource::{Resource, require};
use keyward_core::{IdShape, ResourceDescriptor};
use serde::{Deserialize, Serialize};

/// Rendering format. The service cannot convert a template between formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateFormat {
    #[default]
    Markdown,
    Html,
    Plain,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub format: TemplateFormat,
    pub body: String,
}

impl Resource for Template {
    const TYPE_NAME: &'static str = "keyward_template";

    fn descriptor() -> ResourceDescriptor {
        ResourceDescriptor::new(Self::TYPE_NAME, "template", TEMPLATES_FAMILY)
            .accepts_kind("template")
            .field("name")
            .field("description")
            .field("body")
            .replace_on("format")
            .id_shape(IdShape::Prefixed("tpl-".to_string()))
    }

    fn kind(&self) -> &str {
        "template"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn validate(&self) -> Result<()> {
        require(Self::TYPE_NAME, "name", &self.name)?;
        require(Self::TYPE_NAME, "body", &self.body)?;
        if self.format == TemplateFormat::Json {
            serde_json::from_str::<serde_json::Value>(&self.body).map_err(|e| {
                ResourceError::invalid(Self::TYPE_NAME, "body", format!("invalid JSON: {}", e))
            })?;
        }
        Ok(())
    }
}
