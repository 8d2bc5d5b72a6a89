pub mod error;

pub use error::*;

use keyward_core::{ApplyOptions, StateManager};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file directly
pub const CONFIG_PATH_ENV: &str = "KEYWARD_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["keyward.local.yaml", "keyward.yaml"];

/// Provider settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Maximum number of instances reconciled at once
    pub concurrency: usize,

    /// State directory, relative paths resolve against the project root
    pub state_dir: PathBuf,

    /// Default log filter when neither KEYWARD_LOG nor RUST_LOG is set
    pub log_filter: String,

    /// Destroy recorded instances that are no longer declared
    pub destroy_orphans: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let options = ApplyOptions::default();
        Self {
            concurrency: options.concurrency,
            state_dir: PathBuf::from(keyward_core::state::DEFAULT_STATE_DIR),
            log_filter: "keyward=info".to_string(),
            destroy_orphans: options.destroy_orphans,
        }
    }
}

impl ProviderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log_filter",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// State manager for a project rooted at `project_root`
    pub fn state_manager(&self, project_root: impl AsRef<Path>) -> StateManager {
        if self.state_dir.is_absolute() {
            StateManager::with_state_dir(&self.state_dir)
        } else {
            StateManager::with_state_dir(project_root.as_ref().join(&self.state_dir))
        }
    }

    /// Install the global log subscriber with this config's filter
    pub fn init_logging(&self) {
        keyward_core::init_logging(&self.log_filter);
    }
}

impl From<&ProviderConfig> for ApplyOptions {
    fn from(config: &ProviderConfig) -> Self {
        ApplyOptions {
            concurrency: config.concurrency,
            destroy_orphans: config.destroy_orphans,
        }
    }
}

/// Find the provider config file
///
/// Search order:
/// 1. `KEYWARD_CONFIG_PATH`
/// 2. Current directory: keyward.local.yaml, keyward.yaml
/// 3. `./.keyward/` directory, same order
/// 4. `~/.config/keyward/keyward.yaml`
pub fn find_config_file() -> Result<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(path);
        }
        tracing::warn!("{} points at missing file {}", CONFIG_PATH_ENV, path.display());
    }

    let current_dir = std::env::current_dir()?;

    for filename in &CANDIDATES {
        let path = current_dir.join(filename);
        if path.exists() {
            return Ok(path);
        }
    }

    let keyward_dir = current_dir.join(keyward_core::state::DEFAULT_STATE_DIR);
    if keyward_dir.is_dir() {
        for filename in &CANDIDATES {
            let path = keyward_dir.join(filename);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    if let Some(config_dir) = dirs::config_dir() {
        let global_config = config_dir.join("keyward").join("keyward.yaml");
        if global_config.exists() {
            return Ok(global_config);
        }
    }

    Err(ConfigError::ConfigFileNotFound)
}

/// Parse and validate a config file
pub fn load_config(path: impl AsRef<Path>) -> Result<ProviderConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config: ProviderConfig =
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate()?;
    tracing::debug!("Loaded config from {}", path.display());
    Ok(config)
}

/// Config from the first file found, or defaults when there is none
pub fn load_or_default() -> Result<ProviderConfig> {
    match find_config_file() {
        Ok(path) => load_config(path),
        Err(ConfigError::ConfigFileNotFound) => {
            tracing::debug!("No config file found, using defaults");
            Ok(ProviderConfig::default())
        }
        Err(e) => Err(e),
    }
}
