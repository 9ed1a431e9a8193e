pub mod memcached;
pub mod memory;

pub use memcached::MemcachedStore;
pub use memory::{Clock, ManualClock, MemoryStore, SystemClock};

use memstash::{CacheAdapter, CacheStore, StorageFactory};
use shared::Result;
use shared::config::{Backend, Config};
use std::sync::Arc;
use tracing::info;

/// Builds the backend named by [`Config::backend`]
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultStorageFactory;

impl StorageFactory for DefaultStorageFactory {
    fn create_from_config(&self, config: &Config) -> Result<Arc<dyn CacheStore>> {
        info!("Creating {} cache backend", config.backend.name());
        match config.backend {
            Backend::Memcached => Ok(Arc::new(MemcachedStore::connect(config)?)),
            Backend::Memory => Ok(Arc::new(MemoryStore::new())),
        }
    }
}

/// Build a ready-to-use cache from configuration
pub fn connect(config: &Config) -> Result<CacheAdapter> {
    CacheAdapter::from_config(config, &DefaultStorageFactory)
}
