//! State management for managed instances
//!
//! Manages the `.keyward/state.json` file which records, per instance
//! address, the remote id and the last normalized snapshot.

use crate::engine::Reconciled;
use crate::error::{ReconcileError, Result};
use crate::model::{FieldMap, ManagedInstance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

const STATE_VERSION: u32 = 1;
pub const DEFAULT_STATE_DIR: &str = ".keyward";
const STATE_FILE: &str = "state.json";
const STATE_BACKUP: &str = "state.json.backup";
const LOCK_FILE: &str = "lock.json";

/// Global state containing every managed instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalState {
    /// State file version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Instances indexed by address
    pub instances: BTreeMap<String, InstanceState>,
}

impl Default for GlobalState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            updated_at: Utc::now(),
            instances: BTreeMap::new(),
        }
    }
}

impl GlobalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or update an instance
    pub fn set_instance(&mut self, address: String, state: InstanceState) {
        self.instances.insert(address, state);
        self.updated_at = Utc::now();
    }

    /// Remove an instance
    pub fn remove_instance(&mut self, address: &str) -> Option<InstanceState> {
        let result = self.instances.remove(address);
        if result.is_some() {
            self.updated_at = Utc::now();
        }
        result
    }

    pub fn get_instance(&self, address: &str) -> Option<&InstanceState> {
        self.instances.get(address)
    }

    /// Instances of one resource type
    pub fn instances_of(&self, resource_type: &str) -> Vec<(&String, &InstanceState)> {
        self.instances
            .iter()
            .filter(|(_, s)| s.resource_type == resource_type)
            .collect()
    }

    /// Record the outcome of a reconcile pass, keeping the original creation time
    /// unless the object was replaced
    pub fn record(&mut self, instance: &ManagedInstance, result: &Reconciled) {
        let now = Utc::now();
        let created_at = self
            .instances
            .get(&instance.address)
            .filter(|s| s.external_id == result.external_id())
            .map(|s| s.created_at)
            .unwrap_or(now);

        self.set_instance(
            instance.address.clone(),
            InstanceState {
                external_id: result.external_id().to_string(),
                resource_type: instance.resource_type.clone(),
                kind: result.snapshot.kind.clone(),
                fields: result.snapshot.fields.clone(),
                applied: result.applied.clone(),
                created_at,
                updated_at: now,
            },
        );
    }
}

/// Recorded state of a single managed instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceState {
    /// Remote id
    pub external_id: String,

    /// Resource type
    pub resource_type: String,

    /// Kind of the remote object
    pub kind: String,

    /// Normalized fields from the last pass
    pub fields: FieldMap,

    /// Write-only values applied in the last pass
    #[serde(default)]
    pub applied: FieldMap,

    /// When the remote object was created
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl InstanceState {
    /// Rebuild the managed instance for a new pass from this state and the new declaration
    pub fn to_instance(&self, address: &str, kind: &str, desired: FieldMap) -> ManagedInstance {
        ManagedInstance::new(address, &self.resource_type, kind, desired)
            .with_external_id(&self.external_id)
            .with_applied(self.applied.clone())
    }

    /// Managed instance for destroying an instance that is no longer declared
    pub fn to_orphan(&self, address: &str) -> ManagedInstance {
        self.to_instance(address, &self.kind, self.fields.clone())
    }
}

/// State manager for reading/writing state files
pub struct StateManager {
    /// Directory holding the state file
    state_dir: PathBuf,
}

impl StateManager {
    /// Manager for `<project_root>/.keyward`
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self::with_state_dir(project_root.as_ref().join(DEFAULT_STATE_DIR))
    }

    pub fn with_state_dir(state_dir: impl AsRef<Path>) -> Self {
        Self {
            state_dir: state_dir.as_ref().to_path_buf(),
        }
    }

    /// Get the state file path
    fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    /// Get the backup file path
    fn backup_path(&self) -> PathBuf {
        self.state_dir.join(STATE_BACKUP)
    }

    /// Get the lock file path
    fn lock_path(&self) -> PathBuf {
        self.state_dir.join(LOCK_FILE)
    }

    /// Ensure the state directory exists
    async fn ensure_state_dir(&self) -> Result<()> {
        if !self.state_dir.exists() {
            fs::create_dir_all(&self.state_dir).await?;
            tracing::debug!("Created state directory: {}", self.state_dir.display());
        }
        Ok(())
    }

    /// Load the current state
    pub async fn load(&self) -> Result<GlobalState> {
        let path = self.state_path();
        if !path.exists() {
            tracing::debug!("State file not found, returning empty state");
            return Ok(GlobalState::new());
        }

        let content = fs::read_to_string(&path).await?;
        let state: GlobalState = serde_json::from_str(&content)?;

        // Version check
        if state.version > STATE_VERSION {
            return Err(ReconcileError::State(format!(
                "State file version {} is newer than supported version {}",
                state.version, STATE_VERSION
            )));
        }

        tracing::debug!("Loaded state with {} instances", state.instances.len());
        Ok(state)
    }

    /// Save the state, keeping the previous file as a backup
    pub async fn save(&self, state: &GlobalState) -> Result<()> {
        self.ensure_state_dir().await?;

        let path = self.state_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
            tracing::debug!("Created state backup");
        }

        let content = serde_json::to_string_pretty(state)?;
        fs::write(&path, content).await?;

        tracing::debug!("Saved state with {} instances", state.instances.len());
        Ok(())
    }

    /// Acquire a lock for exclusive access
    pub async fn acquire_lock(&self) -> Result<StateLock> {
        self.ensure_state_dir().await?;

        let lock_path = self.lock_path();

        if lock_path.exists() {
            let content = fs::read_to_string(&lock_path).await?;
            let lock_info: LockInfo = serde_json::from_str(&content)?;

            // Locks older than an hour are considered stale
            let age = Utc::now().signed_duration_since(lock_info.acquired_at);
            if age.num_hours() < 1 {
                return Err(ReconcileError::Lock(format!(
                    "State is locked by {} since {}",
                    lock_info.holder, lock_info.acquired_at
                )));
            }

            tracing::warn!("Removing stale lock from {}", lock_info.holder);
        }

        let lock_info = LockInfo {
            holder: std::env::var("HOSTNAME")
                .or_else(|_| std::env::var("HOST"))
                .unwrap_or_else(|_| "unknown".to_string()),
            acquired_at: Utc::now(),
        };

        let content = serde_json::to_string_pretty(&lock_info)?;
        fs::write(&lock_path, content).await?;

        tracing::debug!("Acquired state lock");
        Ok(StateLock {
            lock_path,
            released: false,
        })
    }
}

/// Lock information
#[derive(Debug, Serialize, Deserialize)]
struct LockInfo {
    holder: String,
    acquired_at: DateTime<Utc>,
}

/// RAII guard for state lock
pub struct StateLock {
    lock_path: PathBuf,
    released: bool,
}

impl StateLock {
    /// Release the lock
    pub async fn release(mut self) -> Result<()> {
        if !self.released {
            if self.lock_path.exists() {
                fs::remove_file(&self.lock_path).await?;
                tracing::debug!("Released state lock");
            }
            self.released = true;
        }
        Ok(())
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if !self.released && self.lock_path.exists() {
            // Drop cannot await; fall back to blocking removal
            let _ = std::fs::remove_file(&self.lock_path);
        }
    }
}
