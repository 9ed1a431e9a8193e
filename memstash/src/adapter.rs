use crate::cache::Cache;
use crate::domain::{StoreMode, validate_key};
use crate::ports::{CacheStore, StorageFactory};
use shared::config::Config;
use shared::{Error, Result, TtlSecs};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, warn};

/// [`Cache`] implementation over a shared [`CacheStore`] handle.
///
/// Built once and cloned freely; clones share the same backing client. Backend
/// failures are logged here and collapsed into `false`/`None`.
#[derive(Clone)]
pub struct CacheAdapter {
    store: Arc<dyn CacheStore>,
    key_prefix: Option<Arc<str>>,
}

impl CacheAdapter {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            key_prefix: None,
        }
    }

    /// Build the backing store described by `config` and wrap it
    pub fn from_config(config: &Config, factory: &dyn StorageFactory) -> Result<Self> {
        let adapter = Self::new(factory.create_from_config(config)?);
        Ok(match &config.key_prefix {
            Some(prefix) => adapter.with_key_prefix(prefix.as_str()),
            None => adapter,
        })
    }

    /// Prepend `prefix` to every key before it reaches the store
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix: String = prefix.into();
        self.key_prefix = if prefix.is_empty() {
            None
        } else {
            Some(Arc::from(prefix))
        };
        self
    }

    /// The fallible port underneath, for callers that need to tell a miss from a failure
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    fn qualify(&self, key: &str) -> Option<String> {
        let full = match &self.key_prefix {
            Some(prefix) => format!("{}{}", prefix, key),
            None => key.to_string(),
        };
        match validate_key(&full) {
            Ok(()) => Some(full),
            Err(e) => {
                warn!("Rejected cache key '{}': {}", key, e);
                None
            }
        }
    }

    fn write(&self, mode: StoreMode, key: &str, value: &str, ttl: TtlSecs) -> bool {
        let Some(key) = self.qualify(key) else {
            return false;
        };
        match self.store.store(mode, &key, value, ttl) {
            Ok(resp) => {
                debug!(
                    "{} '{}' ({} bytes, ttl {}s): stored={}",
                    mode.name(),
                    key,
                    value.len(),
                    ttl.0,
                    resp.stored
                );
                resp.stored
            }
            Err(e) => {
                warn!("Cache {} failed for key '{}': {}", mode.name(), key, e);
                false
            }
        }
    }
}

impl Cache for CacheAdapter {
    fn add(&self, key: &str, value: &str, ttl: TtlSecs) -> bool {
        self.write(StoreMode::Add, key, value, ttl)
    }

    fn set(&self, key: &str, value: &str, ttl: TtlSecs) -> bool {
        self.write(StoreMode::Set, key, value, ttl)
    }

    fn get(&self, key: &str) -> Option<String> {
        let key = self.qualify(key)?;
        match self.store.get(&key) {
            Ok(resp) if resp.found => {
                debug!("Cache hit for key '{}'", key);
                Some(resp.value)
            }
            Ok(_) | Err(Error::NotFound) => {
                debug!("Cache miss for key '{}'", key);
                None
            }
            Err(e) => {
                warn!("Cache get failed for key '{}': {}", key, e);
                None
            }
        }
    }

    fn contains(&self, key: &str) -> bool {
        let Some(key) = self.qualify(key) else {
            return false;
        };
        match self.store.exists(&key) {
            Ok(resp) => resp.exists,
            Err(Error::NotFound) => false,
            Err(e) => {
                warn!("Cache exists check failed for key '{}': {}", key, e);
                false
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        let Some(key) = self.qualify(key) else {
            return false;
        };
        match self.store.delete(&key) {
            Ok(resp) => resp.deleted,
            Err(e) => {
                warn!("Cache delete failed for key '{}': {}", key, e);
                false
            }
        }
    }
}

impl Debug for CacheAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheAdapter")
            .field("store", &"<dyn CacheStore>")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}
