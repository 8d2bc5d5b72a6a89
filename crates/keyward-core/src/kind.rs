//! Resource type descriptors and kind discrimination
//!
//! Every resource type is described by a [`ResourceDescriptor`]: which remote
//! family serves it, which kind tags belong to it, which fields force a
//! replace, and what its ids look like. The reconciliation engine is
//! parameterized by the descriptor instead of being re-derived per type.

use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Classifies a remote object's kind tag against the kinds a resource type accepts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeDiscriminator {
    kinds: BTreeSet<String>,
}

impl TypeDiscriminator {
    pub fn exact(kind: impl Into<String>) -> Self {
        Self {
            kinds: BTreeSet::from([kind.into()]),
        }
    }

    pub fn any_of<I, S>(kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kinds: kinds.into_iter().map(Into::into).collect(),
        }
    }

    pub fn accepts(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(String::as_str)
    }

    fn insert(&mut self, kind: String) {
        self.kinds.insert(kind);
    }
}

/// Shape of the ids a remote family issues
///
/// Used during import to decide whether a reference is an id or a name.
#[derive(Debug, Clone)]
pub enum IdShape {
    /// RFC 4122 UUID in any of its textual forms
    Uuid,
    /// Fixed prefix followed by one or more ASCII alphanumerics (e.g. "cred-8f3a")
    Prefixed(String),
    /// Arbitrary pattern, matched against the whole reference
    Pattern(Regex),
    /// The family has no recognizable id form; every reference is a name
    Never,
}

impl IdShape {
    /// Build a pattern shape. The pattern is anchored on both ends.
    pub fn pattern(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(&format!("^(?:{pattern})$")).map(IdShape::Pattern)
    }

    pub fn matches(&self, reference: &str) -> bool {
        match self {
            IdShape::Uuid => uuid::Uuid::parse_str(reference).is_ok(),
            IdShape::Prefixed(prefix) => reference
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| {
                    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_alphanumeric())
                }),
            IdShape::Pattern(re) => re.is_match(reference),
            IdShape::Never => false,
        }
    }
}

/// Per-type parameters of the reconciliation engine
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    /// Resource type name as declared by users (e.g. "keyward_role")
    pub type_name: String,

    /// Human label used in error messages (e.g. "role")
    pub display_name: String,

    /// Remote object family serving this type (e.g. "roles")
    pub family: String,

    /// Kind tags belonging to this type
    pub discriminator: TypeDiscriminator,

    /// Fields whose change requires delete then create
    pub replace_on_change: BTreeSet<String>,

    /// Fields the service accepts but never returns
    pub write_only: BTreeSet<String>,

    /// Declared fields; compared even when absent from the desired map
    pub fields: BTreeSet<String>,

    /// Field holding the human name used for name-based import
    pub name_field: String,

    pub id_shape: IdShape,
}

impl ResourceDescriptor {
    pub fn new(
        type_name: impl Into<String>,
        display_name: impl Into<String>,
        family: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            display_name: display_name.into(),
            family: family.into(),
            discriminator: TypeDiscriminator::default(),
            replace_on_change: BTreeSet::new(),
            write_only: BTreeSet::new(),
            fields: BTreeSet::new(),
            name_field: "name".to_string(),
            id_shape: IdShape::Never,
        }
    }

    pub fn accepts_kind(mut self, kind: impl Into<String>) -> Self {
        self.discriminator.insert(kind.into());
        self
    }

    /// Declare an in-place updatable field
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into());
        self
    }

    /// Declare a field whose change forces a replace
    pub fn replace_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.insert(name.clone());
        self.replace_on_change.insert(name);
        self
    }

    /// Declare a field the service never returns
    pub fn write_only(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.insert(name.clone());
        self.write_only.insert(name);
        self
    }

    pub fn name_field(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.fields.insert(name.clone());
        self.name_field = name;
        self
    }

    pub fn id_shape(mut self, shape: IdShape) -> Self {
        self.id_shape = shape;
        self
    }

    pub fn accepts(&self, kind: &str) -> bool {
        self.discriminator.accepts(kind)
    }

    pub fn is_write_only(&self, field: &str) -> bool {
        self.write_only.contains(field)
    }

    pub fn expected_kinds(&self) -> String {
        self.discriminator.kinds().collect::<Vec<_>>().join(", ")
    }
}

/// Registry of resource descriptors, keyed by type name and by kind
#[derive(Debug, Clone, Default)]
pub struct KindRegistry {
    by_type: HashMap<String, Arc<ResourceDescriptor>>,
    by_kind: HashMap<String, Vec<String>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ResourceDescriptor) {
        let type_name = descriptor.type_name.clone();
        for kind in descriptor.discriminator.kinds() {
            let owners = self.by_kind.entry(kind.to_string()).or_default();
            if !owners.contains(&type_name) {
                owners.push(type_name.clone());
            }
        }
        if self.by_type.insert(type_name.clone(), Arc::new(descriptor)).is_some() {
            tracing::warn!("Resource type {} registered twice, keeping the latest", type_name);
        }
    }

    pub fn with(mut self, descriptor: ResourceDescriptor) -> Self {
        self.register(descriptor);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<Arc<ResourceDescriptor>> {
        self.by_type.get(type_name).cloned()
    }

    /// Resource types whose discriminator accepts `kind`
    pub fn types_accepting(&self, kind: &str) -> Vec<Arc<ResourceDescriptor>> {
        self.by_kind
            .get(kind)
            .into_iter()
            .flatten()
            .filter_map(|t| self.by_type.get(t).cloned())
            .collect()
    }

    pub fn families(&self) -> BTreeSet<&str> {
        self.by_type.values().map(|d| d.family.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ResourceDescriptor>> {
        self.by_type.values()
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}
