#![deny(clippy::all)]

use crate::domain::StoreMode;
use crate::domain::response::{DeleteResponse, ExistsResponse, GetResponse, StoreResponse};
use shared::config::Config;
use shared::{Result, TtlSecs};
use std::sync::Arc;

// Ports are the pluggable extension points for the backing cache client

/// Port for creating the backing store from configuration
pub trait StorageFactory: Send + Sync + 'static {
    fn create_from_config(&self, config: &Config) -> Result<Arc<dyn CacheStore>>;
}

/// Port for a key-value store holding string payloads (e.g. a memcached client).
///
/// Unlike [`crate::Cache`], implementations report misses as [`shared::Error::NotFound`]
/// and transport problems as [`shared::Error::Backend`], so callers can tell them apart.
pub trait CacheStore: Send + Sync + 'static {
    /// A store refused by the backend (e.g. `Add` on a live key) is `stored: false`, not an error.
    fn store(&self, mode: StoreMode, key: &str, value: &str, ttl: TtlSecs) -> Result<StoreResponse>;
    fn get(&self, key: &str) -> Result<GetResponse<String>>;
    fn exists(&self, key: &str) -> Result<ExistsResponse>;
    fn delete(&self, key: &str) -> Result<DeleteResponse>;
}
