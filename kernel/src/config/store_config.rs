// Store Configuration
//
// Selects the store backend and its sharding.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::store::{ServerStore, ShardedServerStore, SwapServerStore, DEFAULT_SHARDS};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Mutex per key slot.
    #[default]
    Sharded,

    /// Compare-and-swap per key slot.
    Swap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    #[serde(default = "default_shards")]
    pub shards: usize,
}

fn default_shards() -> usize {
    DEFAULT_SHARDS
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            shards: DEFAULT_SHARDS,
        }
    }
}

impl StoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.shards.is_power_of_two() {
            return Err(ConfigError::InvalidShardCount(self.shards));
        }
        Ok(())
    }

    /// Build an empty store as configured.
    pub fn open(&self) -> Result<Box<dyn ServerStore>, ConfigError> {
        self.validate()?;
        let store: Box<dyn ServerStore> = match self.backend {
            StoreBackend::Sharded => Box::new(ShardedServerStore::with_shards(self.shards)),
            StoreBackend::Swap => Box::new(SwapServerStore::with_shards(self.shards)),
        };
        Ok(store)
    }
}
