//! Resource lifecycle reconciliation
//!
//! One [`ReconciliationEngine`] drives instances of a single resource type
//! through create, read, update-or-replace and delete against the remote
//! family that serves the type.
//!
//! ```text
//!            create                    read
//!  Absent ───────────▶ Present(id) ─────────────┐
//!    ▲                    │  ▲                  │ unchanged / update in place
//!    │      delete        │  └──────────────────┘
//!    └────────────────────┘   replace: delete(id) then create ─▶ Present(new id)
//! ```
//!
//! The engine takes instances by shared reference and returns new state as
//! values, so a failed or cancelled pass never leaves a half-applied
//! transition behind on the caller's side.

use crate::action::ActionType;
use crate::diagnostic::{Diagnostic, Diagnostics};
use crate::drift::{Drift, classify};
use crate::error::{Operation, ReconcileError, Result, ServiceResult};
use crate::kind::ResourceDescriptor;
use crate::model::{FieldMap, ImportReference, ManagedInstance, RemoteObjectSnapshot, field};
use crate::resolver::IdentityResolver;
use crate::service::RemoteObjectService;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Await a remote call unless `cancel` fires first
///
/// The outer `Result` carries cancellation, the inner one the service outcome.
pub(crate) async fn guarded<T, F>(
    cancel: &CancellationToken,
    operation: Operation,
    target: &str,
    call: F,
) -> Result<ServiceResult<T>>
where
    F: Future<Output = ServiceResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!("{} {} cancelled", operation, target);
            Err(ReconcileError::Cancelled {
                operation,
                target: target.to_string(),
            })
        }
        result = call => Ok(result),
    }
}

/// What a read observed
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    /// No remote object: never created, removed externally, or soft-deleted
    Missing,
    /// Remote object exists and is of an accepted kind
    Found {
        snapshot: RemoteObjectSnapshot,
        drift: Drift,
    },
}

impl ReadOutcome {
    pub fn drift(&self) -> Drift {
        match self {
            ReadOutcome::Missing => Drift::Missing,
            ReadOutcome::Found { drift, .. } => drift.clone(),
        }
    }

    pub fn snapshot(&self) -> Option<&RemoteObjectSnapshot> {
        match self {
            ReadOutcome::Missing => None,
            ReadOutcome::Found { snapshot, .. } => Some(snapshot),
        }
    }
}

/// Result of one reconcile pass
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Normalized state to persist: remote fields plus applied write-only values
    pub snapshot: RemoteObjectSnapshot,

    /// Write-only values now applied remotely
    pub applied: FieldMap,

    /// What the engine did
    pub action: ActionType,

    /// What the read before the action observed
    pub drift: Drift,

    pub diagnostics: Diagnostics,
}

impl Reconciled {
    pub fn external_id(&self) -> &str {
        &self.snapshot.external_id
    }
}

/// Result of a successful import
#[derive(Debug, Clone)]
pub struct Imported {
    pub external_id: String,
    pub snapshot: RemoteObjectSnapshot,
    pub diagnostics: Diagnostics,
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    service: Arc<dyn RemoteObjectService>,
    descriptor: Arc<ResourceDescriptor>,
}

impl ReconciliationEngine {
    pub fn new(service: Arc<dyn RemoteObjectService>, descriptor: Arc<ResourceDescriptor>) -> Self {
        Self {
            service,
            descriptor,
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    fn check_instance(&self, instance: &ManagedInstance) -> Result<()> {
        if instance.resource_type != self.descriptor.type_name {
            return Err(ReconcileError::UnknownResourceType(format!(
                "{} is declared as {}, engine manages {}",
                instance.address, instance.resource_type, self.descriptor.type_name
            )));
        }
        if !self.descriptor.accepts(&instance.kind) {
            return Err(ReconcileError::UnsupportedKind {
                resource_type: self.descriptor.type_name.clone(),
                kind: instance.kind.clone(),
            });
        }
        Ok(())
    }

    /// Fetch the remote object and compare it with the declaration
    ///
    /// A vanished object is reported as [`ReadOutcome::Missing`], not as an
    /// error, and is not recreated here.
    pub async fn read(
        &self,
        instance: &ManagedInstance,
        cancel: &CancellationToken,
    ) -> Result<ReadOutcome> {
        self.check_instance(instance)?;

        let Some(id) = instance.external_id.as_deref() else {
            return Ok(ReadOutcome::Missing);
        };
        let target = instance.target();

        let snapshot = match guarded(cancel, Operation::Read, &target, self.service.get(id)).await? {
            Ok(snapshot) if snapshot.deleted => {
                tracing::warn!("{} is soft-deleted remotely", target);
                return Ok(ReadOutcome::Missing);
            }
            Ok(snapshot) => snapshot,
            Err(e) if e.is_not_found() => {
                tracing::warn!("{} no longer exists remotely", target);
                return Ok(ReadOutcome::Missing);
            }
            Err(e) => {
                return Err(ReconcileError::remote(
                    Operation::Read,
                    &self.descriptor.display_name,
                    target,
                    e,
                ));
            }
        };

        if !self.descriptor.accepts(&snapshot.kind) {
            return Err(ReconcileError::KindMismatch {
                address: instance.address.clone(),
                id: id.to_string(),
                expected: self.descriptor.expected_kinds(),
                actual: snapshot.kind,
            });
        }

        let drift = classify(&self.descriptor, instance, &snapshot);
        tracing::debug!("{}: {}", target, drift.label());
        Ok(ReadOutcome::Found { snapshot, drift })
    }

    /// Bring the remote object in line with the declaration
    pub async fn reconcile(
        &self,
        instance: &ManagedInstance,
        cancel: &CancellationToken,
    ) -> Result<Reconciled> {
        let outcome = self.read(instance, cancel).await?;
        let mut diagnostics = Diagnostics::new();

        let (snapshot, action, drift) = match outcome {
            ReadOutcome::Missing
            | ReadOutcome::Found {
                drift: Drift::Missing,
                ..
            } => {
                if let Some(old) = &instance.external_id {
                    diagnostics.push(
                        Diagnostic::warning("Remote object no longer exists, recreating")
                            .with_detail(format!(
                                "{} {} was removed outside of keyward",
                                self.descriptor.display_name, old
                            ))
                            .at(instance.address.clone()),
                    );
                }
                let created = self.create(instance, cancel).await?;
                (created, ActionType::Create, Drift::Missing)
            }
            ReadOutcome::Found {
                snapshot,
                drift: Drift::Unchanged,
            } => (snapshot, ActionType::NoOp, Drift::Unchanged),
            ReadOutcome::Found {
                snapshot,
                drift: drift @ Drift::Update { .. },
            } => {
                let updated = self
                    .update(instance, &snapshot.external_id, &drift.changed_fields(), cancel)
                    .await?;
                (updated, ActionType::Update, drift)
            }
            ReadOutcome::Found {
                snapshot,
                drift: drift @ Drift::Replace { .. },
            } => {
                if let Drift::Replace { forced_by, .. } = &drift {
                    tracing::info!(
                        "Replacing {} (forced by {})",
                        instance.target(),
                        forced_by.iter().cloned().collect::<Vec<_>>().join(", ")
                    );
                }
                self.delete_remote(&snapshot.external_id, &instance.target(), cancel)
                    .await?;
                let created = self.create(instance, cancel).await?;
                (created, ActionType::Replace, drift)
            }
        };

        let applied = self.write_only_values(&instance.desired);
        Ok(Reconciled {
            snapshot: snapshot.merged_with(&applied),
            applied,
            action,
            drift,
            diagnostics,
        })
    }

    /// Delete the remote object, if any. Deleting an absent object succeeds.
    pub async fn destroy(
        &self,
        instance: &ManagedInstance,
        cancel: &CancellationToken,
    ) -> Result<Diagnostics> {
        self.check_instance(instance)?;

        match instance.external_id.as_deref() {
            Some(id) => {
                self.delete_remote(id, &instance.target(), cancel).await?;
            }
            None => {
                tracing::debug!("{} was never created, nothing to destroy", instance.address);
            }
        }
        Ok(Diagnostics::new())
    }

    /// Attach management to a pre-existing remote object by id or name
    pub async fn import(
        &self,
        reference: &ImportReference,
        cancel: &CancellationToken,
    ) -> Result<Imported> {
        let snapshot = IdentityResolver::new(self.service.as_ref(), &self.descriptor)
            .resolve(reference, cancel)
            .await?;

        tracing::info!(
            "Imported {} {} as {}",
            self.descriptor.type_name,
            reference,
            snapshot.external_id
        );

        let mut diagnostics = Diagnostics::new();
        if !self.descriptor.write_only.is_empty() {
            let names = self
                .descriptor
                .write_only
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            diagnostics.push(
                Diagnostic::warning("Write-only fields cannot be imported").with_detail(format!(
                    "{} are never returned by the service; the next apply sends the declared values",
                    names
                )),
            );
        }

        Ok(Imported {
            external_id: snapshot.external_id.clone(),
            snapshot,
            diagnostics,
        })
    }

    async fn create(
        &self,
        instance: &ManagedInstance,
        cancel: &CancellationToken,
    ) -> Result<RemoteObjectSnapshot> {
        tracing::info!("Creating {}: {}", self.descriptor.type_name, instance.address);

        let fields: FieldMap = instance
            .desired
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let target = instance.address.clone();

        let snapshot = guarded(
            cancel,
            Operation::Create,
            &target,
            self.service.create(&instance.kind, &fields),
        )
        .await?
        .map_err(|e| {
            ReconcileError::remote(Operation::Create, &self.descriptor.display_name, &target, e)
        })?;

        tracing::info!("Created {} (ID: {})", instance.address, snapshot.external_id);
        Ok(snapshot)
    }

    async fn update(
        &self,
        instance: &ManagedInstance,
        id: &str,
        changed: &FieldMap,
        cancel: &CancellationToken,
    ) -> Result<RemoteObjectSnapshot> {
        let target = instance.target();
        tracing::info!(
            "Updating {} in place: {}",
            target,
            changed.keys().cloned().collect::<Vec<_>>().join(", ")
        );

        guarded(cancel, Operation::Update, &target, self.service.update(id, changed))
            .await?
            .map_err(|e| {
                ReconcileError::remote(Operation::Update, &self.descriptor.display_name, &target, e)
            })
    }

    async fn delete_remote(&self, id: &str, target: &str, cancel: &CancellationToken) -> Result<()> {
        tracing::info!("Deleting {}", target);

        match guarded(cancel, Operation::Delete, target, self.service.delete(id)).await? {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                tracing::debug!("{} was already gone", target);
                Ok(())
            }
            Err(e) => Err(ReconcileError::remote(
                Operation::Delete,
                &self.descriptor.display_name,
                target,
                e,
            )),
        }
    }

    fn write_only_values(&self, desired: &FieldMap) -> FieldMap {
        self.descriptor
            .write_only
            .iter()
            .filter_map(|name| field(desired, name).map(|v| (name.clone(), v.clone())))
            .collect()
    }
}
