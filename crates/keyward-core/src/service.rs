//! Remote object service trait definition

use crate::error::ServiceResult;
use crate::model::{FieldMap, RemoteObjectSnapshot};
use async_trait::async_trait;

/// CRUD access to one remote object family
///
/// Each family (credentials, templates, roles, assignments) is served by one
/// implementation. Transport concerns such as authentication, timeouts and
/// retries live behind this trait; the engine never retries.
#[async_trait]
pub trait RemoteObjectService: Send + Sync {
    /// Family served by this service (e.g. "credentials")
    fn family(&self) -> &str;

    /// Create an object of the given kind
    async fn create(&self, kind: &str, fields: &FieldMap) -> ServiceResult<RemoteObjectSnapshot>;

    /// Fetch one object. Must return `ServiceError::NotFound` for unknown ids.
    async fn get(&self, id: &str) -> ServiceResult<RemoteObjectSnapshot>;

    /// List every object in the family, across all kinds
    async fn list(&self) -> ServiceResult<Vec<RemoteObjectSnapshot>>;

    /// Apply the changed fields in place
    async fn update(&self, id: &str, changed: &FieldMap) -> ServiceResult<RemoteObjectSnapshot>;

    /// Delete an object. `NotFound` is tolerated by the engine.
    async fn delete(&self, id: &str) -> ServiceResult<()>;
}
