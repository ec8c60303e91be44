use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RouteError;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_WORKER_POOL_SIZE: usize = 100;
pub const DEFAULT_ENTITY_TYPE: &str = "MMSCInfo";

/// Runtime settings for the watcher and the resolver pool.
///
/// Missing fields in a config file fall back to the defaults above.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub poll_interval_ms: u64,
    pub worker_pool_size: usize,
    pub recognized_entity_types: BTreeSet<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            worker_pool_size: DEFAULT_WORKER_POOL_SIZE,
            recognized_entity_types: BTreeSet::from([DEFAULT_ENTITY_TYPE.to_string()]),
        }
    }
}

impl Config {
    /// Read and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RouteError> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .map_err(|e| RouteError::Config(format!("read {}: {e}", path.display())))?;
        let config: Config = serde_json::from_str(&data)
            .map_err(|e| RouteError::Config(format!("parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RouteError> {
        if self.poll_interval_ms == 0 {
            return Err(RouteError::Config(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.worker_pool_size == 0 {
            return Err(RouteError::Config(
                "worker_pool_size must be greater than 0".to_string(),
            ));
        }
        if self.recognized_entity_types.is_empty() {
            return Err(RouteError::Config(
                "recognized_entity_types must not be empty".to_string(),
            ));
        }
        if self.recognized_entity_types.iter().any(|t| t.trim().is_empty()) {
            return Err(RouteError::Config(
                "recognized_entity_types must not contain blank names".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn recognizes(&self, entity_type: &str) -> bool {
        self.recognized_entity_types.contains(entity_type)
    }
}
