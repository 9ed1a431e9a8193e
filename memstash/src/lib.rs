// memstash/src/lib.rs
pub mod adapter;
pub mod cache;
pub mod domain;
pub mod ports;

pub use adapter::CacheAdapter;
pub use cache::{Cache, CacheExt};
pub use domain::StoreMode;
pub use ports::{CacheStore, StorageFactory};
pub use shared::{Error, Result, TtlSecs};
