//! Keyward Reconciliation Core
//!
//! This crate drives declared access-management objects (credentials,
//! templates, roles, role assignments) to match their declarations on a
//! remote service, and attaches management to objects that already exist.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │              Provider host / front-end           │
//! │          (plan / apply / import / destroy)       │
//! └─────────────────┬───────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────┐
//! │                 keyward-core                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │ Provider: DesiredSet ─▶ Plan / Apply      │   │
//! │  └──────────────────┬───────────────────────┘   │
//! │  ┌──────────────────▼───────────────────────┐   │
//! │  │ ReconciliationEngine (one per type)       │   │
//! │  │  drift · IdentityResolver · diagnostics   │   │
//! │  └──────────────────┬───────────────────────┘   │
//! │  ┌──────────────┐   │   ┌──────────────┐        │
//! │  │ KindRegistry │   │   │  State Mgmt  │        │
//! │  └──────────────┘   │   └──────────────┘        │
//! └─────────────────────┼───────────────────────────┘
//!                       │ trait RemoteObjectService
//!         ┌─────────────┼─────────────┐
//! ┌───────▼─────┐ ┌─────▼──────┐ ┌────▼────────┐
//! │ credentials │ │  templates │ │ roles / ... │
//! └─────────────┘ └────────────┘ └─────────────┘
//! ```

pub mod action;
pub mod diagnostic;
pub mod drift;
pub mod engine;
pub mod error;
pub mod kind;
pub mod logging;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod model;
pub mod provider;
pub mod resolver;
pub mod service;
pub mod state;

// Re-exports
pub use action::{Action, ActionResult, ActionType, ApplyResult, Plan, PlanSummary};
pub use diagnostic::{Diagnostic, Diagnostics, Severity};
pub use drift::{Drift, FieldChange, KIND_FIELD, REDACTED};
pub use engine::{Imported, ReadOutcome, Reconciled, ReconciliationEngine};
pub use error::{Lookup, Operation, ReconcileError, Result, ServiceError, ServiceResult};
pub use kind::{IdShape, KindRegistry, ResourceDescriptor, TypeDiscriminator};
pub use logging::{init_logging, try_init_logging};
pub use model::{FieldMap, ImportReference, ManagedInstance, RemoteObjectSnapshot};
pub use provider::{ApplyOptions, DesiredResource, DesiredSet, Provider};
pub use resolver::IdentityResolver;
pub use service::RemoteObjectService;
pub use state::{GlobalState, InstanceState, StateLock, StateManager};

pub use tokio_util::sync::CancellationToken;
