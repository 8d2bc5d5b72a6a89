//! Provider facade
//!
//! Routes each declared instance to the engine for its resource type, and
//! drives whole desired sets: plan, apply, and destroy of instances whose
//! declaration was removed. Services are injected per object family.

use crate::action::{Action, ActionType, ApplyResult, Plan};
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::engine::{Imported, ReadOutcome, Reconciled, ReconciliationEngine};
use crate::error::{ReconcileError, Result};
use crate::kind::KindRegistry;
use crate::model::{FieldMap, ImportReference, ManagedInstance};
use crate::service::RemoteObjectService;
use crate::state::{GlobalState, StateManager};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Declaration of one instance, as produced by the front-end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredResource {
    /// Address (e.g. "keyward_role.admin")
    pub address: String,

    /// Resource type (e.g. "keyward_role")
    pub resource_type: String,

    /// Kind tag to create with
    pub kind: String,

    /// Declared field values
    pub fields: FieldMap,
}

impl DesiredResource {
    pub fn new(
        address: impl Into<String>,
        resource_type: impl Into<String>,
        kind: impl Into<String>,
        fields: FieldMap,
    ) -> Self {
        Self {
            address: address.into(),
            resource_type: resource_type.into(),
            kind: kind.into(),
            fields,
        }
    }
}

/// Set of declared instances, indexed by address
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesiredSet {
    pub resources: BTreeMap<String, DesiredResource>,
}

impl DesiredSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: DesiredResource) {
        self.resources.insert(resource.address.clone(), resource);
    }

    pub fn with(mut self, resource: DesiredResource) -> Self {
        self.add(resource);
        self
    }

    pub fn get(&self, address: &str) -> Option<&DesiredResource> {
        self.resources.get(address)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DesiredResource> {
        self.resources.values()
    }

    pub fn by_type(&self, resource_type: &str) -> Vec<&DesiredResource> {
        self.resources
            .values()
            .filter(|r| r.resource_type == resource_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Options for planning and applying a desired set
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// Maximum number of instances reconciled at once
    pub concurrency: usize,

    /// Destroy recorded instances that are no longer declared
    pub destroy_orphans: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            concurrency: 4,
            destroy_orphans: true,
        }
    }
}

pub struct Provider {
    registry: KindRegistry,
    services: HashMap<String, Arc<dyn RemoteObjectService>>,
}

impl Provider {
    pub fn new(registry: KindRegistry) -> Self {
        Self {
            registry,
            services: HashMap::new(),
        }
    }

    /// Register the service for its family
    pub fn with_service(mut self, service: Arc<dyn RemoteObjectService>) -> Self {
        let family = service.family().to_string();
        if !self.registry.families().contains(family.as_str()) {
            tracing::warn!("No resource type uses object family {}", family);
        }
        self.services.insert(family, service);
        self
    }

    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Engine for one resource type
    pub fn engine(&self, resource_type: &str) -> Result<ReconciliationEngine> {
        let descriptor = self
            .registry
            .get(resource_type)
            .ok_or_else(|| ReconcileError::UnknownResourceType(resource_type.to_string()))?;
        let service = self
            .services
            .get(&descriptor.family)
            .cloned()
            .ok_or_else(|| ReconcileError::NoService(descriptor.family.clone()))?;
        Ok(ReconciliationEngine::new(service, descriptor))
    }

    pub async fn read(
        &self,
        instance: &ManagedInstance,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome> {
        self.engine(&instance.resource_type)?
            .read(instance, cancel)
            .await
    }

    pub async fn reconcile(
        &self,
        instance: &ManagedInstance,
        cancel: &CancellationToken,
    ) -> Result<Reconciled> {
        self.engine(&instance.resource_type)?
            .reconcile(instance, cancel)
            .await
    }

    pub async fn destroy(
        &self,
        instance: &ManagedInstance,
        cancel: &CancellationToken,
    ) -> Result<Diagnostics> {
        self.engine(&instance.resource_type)?
            .destroy(instance, cancel)
            .await
    }

    /// Import a pre-existing remote object of `resource_type` by id or name
    pub async fn import(
        &self,
        resource_type: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<Imported> {
        let reference = ImportReference::parse(reference)?;
        self.engine(resource_type)?.import(&reference, cancel).await
    }

    /// Managed instance for a declaration, carrying the recorded id if any
    fn instance_for(&self, desired: &DesiredResource, state: &GlobalState) -> ManagedInstance {
        match state.get_instance(&desired.address) {
            Some(recorded) if recorded.resource_type == desired.resource_type => recorded
                .to_instance(&desired.address, &desired.kind, desired.fields.clone()),
            _ => ManagedInstance::new(
                &desired.address,
                &desired.resource_type,
                &desired.kind,
                desired.fields.clone(),
            ),
        }
    }

    /// Recorded instances to destroy: undeclared ones, and ones whose type changed
    fn orphans(
        &self,
        desired: &DesiredSet,
        state: &GlobalState,
        options: &ApplyOptions,
    ) -> Vec<ManagedInstance> {
        state
            .instances
            .iter()
            .filter(|(address, recorded)| match desired.get(address) {
                None => options.destroy_orphans,
                Some(d) => d.resource_type != recorded.resource_type,
            })
            .map(|(address, recorded)| recorded.to_orphan(address))
            .collect()
    }

    /// Compute the actions an apply would take, without changing anything
    pub async fn plan_all(
        &self,
        desired: &DesiredSet,
        state: &GlobalState,
        options: &ApplyOptions,
        cancel: &CancellationToken,
    ) -> Result<Plan> {
        // An address whose resource type changed shows up once, as a replace
        let mut actions = Vec::new();
        let mut retyped: HashMap<String, ManagedInstance> = HashMap::new();
        for orphan in self.orphans(desired, state, options) {
            if desired.get(&orphan.address).is_some() {
                retyped.insert(orphan.address.clone(), orphan);
            } else {
                actions.push(Action::destroy(
                    orphan.address,
                    orphan.resource_type,
                    orphan.external_id,
                ));
            }
        }

        let instances: Vec<ManagedInstance> = desired
            .iter()
            .map(|d| self.instance_for(d, state))
            .collect();

        let planned: Vec<Action> = stream::iter(instances.iter())
            .map(|instance| async move {
                let outcome = self.read(instance, cancel).await?;
                Ok::<_, ReconcileError>(Action::for_drift(
                    &instance.address,
                    &instance.resource_type,
                    instance.external_id.clone(),
                    &outcome.drift(),
                ))
            })
            .buffer_unordered(options.concurrency.max(1))
            .try_collect()
            .await?;

        let planned = planned.into_iter().map(|action| match retyped.get(&action.address) {
            Some(old) => Action::retype(old, &action.resource_type),
            None => action,
        });
        actions.extend(planned);
        actions.sort_by(|a, b| a.address.cmp(&b.address));

        let plan = Plan::new(actions);
        tracing::info!("Plan: {}", plan.summary());
        Ok(plan)
    }

    /// Reconcile every declared instance and record the results in `state`
    ///
    /// Orphans are destroyed first so that an address whose resource type
    /// changed is deleted before its replacement is created. When that
    /// destroy fails the replacement is not attempted. Each instance's state
    /// is updated only when its own pass completed; a failure or cancellation
    /// leaves its recorded state untouched.
    pub async fn apply_all(
        &self,
        desired: &DesiredSet,
        state: &mut GlobalState,
        options: &ApplyOptions,
        cancel: &CancellationToken,
    ) -> ApplyResult {
        let mut result = ApplyResult::new();
        let mut blocked: BTreeSet<String> = BTreeSet::new();
        let start = std::time::Instant::now();

        for orphan in self.orphans(desired, state, options) {
            tracing::info!("Destroying {} (no longer declared)", orphan.target());
            match self.destroy(&orphan, cancel).await {
                Ok(diagnostics) => {
                    state.remove_instance(&orphan.address);
                    result.diagnostics.extend(diagnostics);
                    result.add_success(
                        orphan.address.clone(),
                        ActionType::Delete,
                        format!("destroyed {}", orphan.target()),
                    );
                }
                Err(e) => {
                    record_failure(&mut result, &orphan.address, Some(ActionType::Delete), &e);
                    if desired.get(&orphan.address).is_some() {
                        blocked.insert(orphan.address.clone());
                    }
                }
            }
        }

        for address in &blocked {
            let message = format!(
                "{} blocked: previous object could not be destroyed",
                address
            );
            tracing::warn!("{}", message);
            result
                .diagnostics
                .push(Diagnostic::error(message.clone()).at(address.clone()));
            result.add_failure(address.clone(), Some(ActionType::Create), message);
        }

        let instances: Vec<ManagedInstance> = desired
            .iter()
            .filter(|d| !blocked.contains(&d.address))
            .map(|d| self.instance_for(d, state))
            .collect();

        let outcomes: Vec<(&ManagedInstance, Result<Reconciled>)> = stream::iter(instances.iter())
            .map(|instance| async move { (instance, self.reconcile(instance, cancel).await) })
            .buffer_unordered(options.concurrency.max(1))
            .collect()
            .await;

        for (instance, outcome) in outcomes {
            match outcome {
                Ok(reconciled) => {
                    state.record(instance, &reconciled);
                    let message = match reconciled.action {
                        ActionType::NoOp => format!("{} is up to date", instance.address),
                        action => format!(
                            "{} {} (ID: {})",
                            action,
                            instance.address,
                            reconciled.external_id()
                        ),
                    };
                    result.add_success(instance.address.clone(), reconciled.action, message);
                    result.diagnostics.extend(reconciled.diagnostics);
                }
                Err(e) => record_failure(&mut result, &instance.address, None, &e),
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            "Apply finished: {} succeeded, {} failed in {}ms",
            result.succeeded.len(),
            result.failed.len(),
            result.duration_ms
        );
        result
    }

    /// Load state, apply under the state lock, and save the new state
    pub async fn apply_with_state(
        &self,
        manager: &StateManager,
        desired: &DesiredSet,
        options: &ApplyOptions,
        cancel: &CancellationToken,
    ) -> Result<ApplyResult> {
        let lock = manager.acquire_lock().await?;
        let mut state = manager.load().await?;

        let result = self.apply_all(desired, &mut state, options, cancel).await;

        manager.save(&state).await?;
        lock.release().await?;
        Ok(result)
    }
}

fn record_failure(
    result: &mut ApplyResult,
    address: &str,
    action_type: Option<ActionType>,
    err: &ReconcileError,
) {
    tracing::warn!("{}: {}", address, err);
    result
        .diagnostics
        .push(Diagnostic::from(err).at(address.to_string()));
    result.add_failure(address.to_string(), action_type, err.to_string());
}
