//! In-memory remote object service
//!
//! Stores objects in a map and records every call so tests can assert the
//! exact sequence the engine issued.

use crate::error::{Operation, ServiceError, ServiceResult};
use crate::model::{FieldMap, RemoteObjectSnapshot};
use crate::service::RemoteObjectService;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

/// A call received by the in-memory service
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub operation: Operation,
    /// Object id, or the kind for creates and the family for lists
    pub target: String,
    pub fields: FieldMap,
}

#[derive(Debug)]
pub struct InMemoryService {
    family: String,
    id_prefix: Option<String>,
    hidden: BTreeSet<String>,
    objects: Mutex<BTreeMap<String, RemoteObjectSnapshot>>,
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashMap<Operation, ServiceError>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl InMemoryService {
    /// New empty family issuing UUID ids
    pub fn new(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            id_prefix: None,
            hidden: BTreeSet::new(),
            objects: Mutex::new(BTreeMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Issue ids of the form `<prefix><32 hex digits>`
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    /// Never return this field from reads, like a real secret store
    pub fn hiding(mut self, field: impl Into<String>) -> Self {
        self.hidden.insert(field.into());
        self
    }

    fn next_id(&self) -> String {
        let id = uuid::Uuid::new_v4();
        match &self.id_prefix {
            Some(prefix) => format!("{}{}", prefix, id.simple()),
            None => id.to_string(),
        }
    }

    fn visible(&self, mut fields: FieldMap) -> FieldMap {
        fields.retain(|k, v| !self.hidden.contains(k) && !v.is_null());
        fields
    }

    /// Insert an object directly, bypassing the call log
    pub fn seed(&self, kind: &str, fields: FieldMap) -> String {
        let id = self.next_id();
        let snapshot = RemoteObjectSnapshot::new(id.clone(), kind, self.visible(fields));
        lock(&self.objects).insert(id.clone(), snapshot);
        id
    }

    /// Simulate an out-of-band deletion
    pub fn remove(&self, id: &str) -> Option<RemoteObjectSnapshot> {
        lock(&self.objects).remove(id)
    }

    /// Flag an object as soft-deleted; it stays listable
    pub fn soft_delete(&self, id: &str) {
        if let Some(snapshot) = lock(&self.objects).get_mut(id) {
            snapshot.deleted = true;
        }
    }

    /// Simulate an out-of-band edit
    pub fn set_field(&self, id: &str, name: &str, value: serde_json::Value) {
        if let Some(snapshot) = lock(&self.objects).get_mut(id) {
            snapshot.fields.insert(name.to_string(), value);
        }
    }

    pub fn object(&self, id: &str) -> Option<RemoteObjectSnapshot> {
        lock(&self.objects).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.objects).is_empty()
    }

    /// Make the next call of `operation` fail with `error`
    pub fn fail_next(&self, operation: Operation, error: ServiceError) {
        lock(&self.failures).insert(operation, error);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// Operation names in call order (e.g. `["get", "delete", "create"]`)
    pub fn call_names(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|c| match c.operation {
                Operation::Read => "get".to_string(),
                other => other.to_string(),
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, operation: Operation, target: &str, fields: &FieldMap) -> ServiceResult<()> {
        lock(&self.calls).push(RecordedCall {
            operation,
            target: target.to_string(),
            fields: fields.clone(),
        });
        match lock(&self.failures).remove(&operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteObjectService for InMemoryService {
    fn family(&self) -> &str {
        &self.family
    }

    async fn create(&self, kind: &str, fields: &FieldMap) -> ServiceResult<RemoteObjectSnapshot> {
        self.record(Operation::Create, kind, fields)?;
        let id = self.next_id();
        let snapshot = RemoteObjectSnapshot::new(id.clone(), kind, self.visible(fields.clone()));
        lock(&self.objects).insert(id, snapshot.clone());
        Ok(snapshot)
    }

    async fn get(&self, id: &str) -> ServiceResult<RemoteObjectSnapshot> {
        self.record(Operation::Read, id, &FieldMap::new())?;
        lock(&self.objects)
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))
    }

    async fn list(&self) -> ServiceResult<Vec<RemoteObjectSnapshot>> {
        self.record(Operation::List, &self.family, &FieldMap::new())?;
        Ok(lock(&self.objects).values().cloned().collect())
    }

    async fn update(&self, id: &str, changed: &FieldMap) -> ServiceResult<RemoteObjectSnapshot> {
        self.record(Operation::Update, id, changed)?;
        let mut objects = lock(&self.objects);
        let snapshot = objects
            .get_mut(id)
            .filter(|s| !s.deleted)
            .ok_or_else(|| ServiceError::NotFound(id.to_string()))?;
        for (key, value) in changed {
            if value.is_null() {
                snapshot.fields.remove(key);
            } else if !self.hidden.contains(key) {
                snapshot.fields.insert(key.clone(), value.clone());
            }
        }
        Ok(snapshot.clone())
    }

    async fn delete(&self, id: &str) -> ServiceResult<()> {
        self.record(Operation::Delete, id, &FieldMap::new())?;
        match lock(&self.objects).remove(id) {
            Some(_) => Ok(()),
            None => Err(ServiceError::NotFound(id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_hides_write_only_fields() {
        let service = InMemoryService::new("credentials")
            .with_id_prefix("cred-")
            .hiding("secret");
        let fields = FieldMap::from([
            ("name".to_string(), json!("ci")),
            ("secret".to_string(), json!("s3cr3t")),
        ]);

        let created = service.create("aws_access_key", &fields).await.unwrap();
        assert!(created.external_id.starts_with("cred-"));
        assert!(created.str_field("secret").is_none());

        let fetched = service.get(&created.external_id).await.unwrap();
        assert_eq!(fetched.str_field("name"), Some("ci"));
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let service = InMemoryService::new("roles");
        service.fail_next(Operation::List, ServiceError::Transport("reset".to_string()));

        assert!(service.list().await.is_err());
        assert!(service.list().await.is_ok());
        assert_eq!(service.call_names(), vec!["list", "list"]);
    }

    #[tokio::test]
    async fn test_delete_missing_reports_not_found() {
        let service = InMemoryService::new("roles");
        let err = service.delete("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
