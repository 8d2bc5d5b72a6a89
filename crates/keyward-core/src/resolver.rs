//! Import reference resolution
//!
//! An import reference is either an opaque id or a human name. References
//! shaped like the family's ids are fetched directly; anything else is
//! matched by exact name against the family listing. Name matching never
//! picks a "first" match: two or more candidates is an error.

use crate::engine::guarded;
use crate::error::{Lookup, Operation, ReconcileError, Result};
use crate::kind::ResourceDescriptor;
use crate::model::{ImportReference, RemoteObjectSnapshot};
use crate::service::RemoteObjectService;
use tokio_util::sync::CancellationToken;

pub struct IdentityResolver<'a> {
    service: &'a dyn RemoteObjectService,
    descriptor: &'a ResourceDescriptor,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(service: &'a dyn RemoteObjectService, descriptor: &'a ResourceDescriptor) -> Self {
        Self {
            service,
            descriptor,
        }
    }

    /// Resolve the reference to exactly one remote object of an accepted kind
    pub async fn resolve(
        &self,
        reference: &ImportReference,
        cancel: &CancellationToken,
    ) -> Result<RemoteObjectSnapshot> {
        if self.descriptor.id_shape.matches(reference.as_str()) {
            tracing::debug!(
                "Resolving {} import reference {} as an id",
                self.descriptor.type_name,
                reference
            );
            self.resolve_id(reference, cancel).await
        } else {
            tracing::debug!(
                "Resolving {} import reference {} as a name",
                self.descriptor.type_name,
                reference
            );
            self.resolve_name(reference, cancel).await
        }
    }

    async fn resolve_id(
        &self,
        reference: &ImportReference,
        cancel: &CancellationToken,
    ) -> Result<RemoteObjectSnapshot> {
        let id = reference.as_str();
        let fetched = guarded(cancel, Operation::Import, id, self.service.get(id)).await?;

        match fetched {
            // Foreign kinds are reported exactly like absent objects.
            Ok(snapshot) if !snapshot.deleted && self.descriptor.accepts(&snapshot.kind) => {
                Ok(snapshot)
            }
            Ok(snapshot) => {
                if !snapshot.deleted {
                    tracing::debug!(
                        "Object {} has kind {}, not accepted by {}",
                        id,
                        snapshot.kind,
                        self.descriptor.type_name
                    );
                }
                Err(self.not_found(Lookup::Id, reference))
            }
            Err(e) if e.is_not_found() => Err(self.not_found(Lookup::Id, reference)),
            Err(e) => Err(ReconcileError::remote(
                Operation::Read,
                &self.descriptor.display_name,
                id,
                e,
            )),
        }
    }

    async fn resolve_name(
        &self,
        reference: &ImportReference,
        cancel: &CancellationToken,
    ) -> Result<RemoteObjectSnapshot> {
        let listed = guarded(cancel, Operation::Import, reference.as_str(), self.service.list())
            .await?
            .map_err(|e| {
                ReconcileError::remote(
                    Operation::List,
                    &self.descriptor.display_name,
                    self.service.family(),
                    e,
                )
            })?;

        select_by_name(self.descriptor, listed, reference)
    }

    fn not_found(&self, lookup: Lookup, reference: &ImportReference) -> ReconcileError {
        ReconcileError::NotFound {
            kind: self.descriptor.display_name.clone(),
            lookup,
            reference: reference.to_string(),
        }
    }
}

/// Pick the single accepted-kind candidate whose name equals the reference
pub fn select_by_name(
    descriptor: &ResourceDescriptor,
    candidates: Vec<RemoteObjectSnapshot>,
    reference: &ImportReference,
) -> Result<RemoteObjectSnapshot> {
    let name = reference.as_str();
    let mut matches: Vec<RemoteObjectSnapshot> = candidates
        .into_iter()
        .filter(|s| !s.deleted)
        .filter(|s| descriptor.accepts(&s.kind))
        .filter(|s| s.str_field(&descriptor.name_field) == Some(name))
        .collect();

    match matches.len() {
        0 => Err(ReconcileError::NotFound {
            kind: descriptor.display_name.clone(),
            lookup: Lookup::Name,
            reference: name.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        _ => Err(ReconcileError::Ambiguous {
            kind: descriptor.display_name.clone(),
            name: name.to_string(),
            ids: matches.into_iter().map(|s| s.external_id).collect(),
        }),
    }
}
