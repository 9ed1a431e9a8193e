use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::{Result, TtlSecs};
use tracing::{debug, warn};

/// Key-value cache contract.
///
/// Every operation degrades to `false`/`None` when the backing store fails, so a
/// miss and an unavailable cache look the same to callers. A `ttl` of
/// [`TtlSecs::NEVER`] stores the entry without expiration.
pub trait Cache: Send + Sync {
    /// Store `value` only if `key` is absent. `false` if the key is live or the store failed.
    fn add(&self, key: &str, value: &str, ttl: TtlSecs) -> bool;

    /// Store `value`, overwriting any live entry.
    fn set(&self, key: &str, value: &str, ttl: TtlSecs) -> bool;

    fn get(&self, key: &str) -> Option<String>;

    fn contains(&self, key: &str) -> bool;

    /// `true` if an entry was removed.
    fn remove(&self, key: &str) -> bool;
}

/// Typed and read-through operations, available on every [`Cache`].
///
/// Typed values travel as JSON. A value that fails to serialize is not written
/// (`false`); a stored payload that fails to decode reads as `None`.
pub trait CacheExt: Cache {
    fn add_json<T>(&self, key: &str, value: &T, ttl: TtlSecs) -> bool
    where
        T: Serialize + ?Sized,
    {
        match encode(value) {
            Ok(json) => self.add(key, &json, ttl),
            Err(e) => {
                warn!("Failed to serialize value for key '{}': {}", key, e);
                false
            }
        }
    }

    fn set_json<T>(&self, key: &str, value: &T, ttl: TtlSecs) -> bool
    where
        T: Serialize + ?Sized,
    {
        match encode(value) {
            Ok(json) => self.set(key, &json, ttl),
            Err(e) => {
                warn!("Failed to serialize value for key '{}': {}", key, e);
                false
            }
        }
    }

    fn get_json<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let raw = self.get(key)?;
        match decode(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Failed to deserialize value for key '{}': {}", key, e);
                None
            }
        }
    }

    /// Read-through with add semantics. A missing or empty entry invokes `acquire`;
    /// a non-empty result is added under `key`. Whatever `acquire` produced is returned,
    /// even when the add loses a race to another writer.
    fn get_or_add<F>(&self, key: &str, acquire: F, ttl: TtlSecs) -> String
    where
        F: FnOnce() -> String,
    {
        read_through(self.get(key), acquire, |value| {
            self.add(key, value, ttl);
        })
    }

    /// Read-through with set semantics; see [`CacheExt::get_or_add`].
    fn get_or_set<F>(&self, key: &str, acquire: F, ttl: TtlSecs) -> String
    where
        F: FnOnce() -> String,
    {
        read_through(self.get(key), acquire, |value| {
            self.set(key, value, ttl);
        })
    }

    /// Typed read-through with add semantics. `acquire` returning `None` skips the write.
    fn get_or_add_json<T, F>(&self, key: &str, acquire: F, ttl: TtlSecs) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Option<T>,
    {
        if let Some(hit) = self.get_json(key) {
            return Some(hit);
        }
        let value = acquire()?;
        self.add_json(key, &value, ttl);
        Some(value)
    }

    /// Typed read-through with set semantics. `acquire` returning `None` skips the write.
    fn get_or_set_json<T, F>(&self, key: &str, acquire: F, ttl: TtlSecs) -> Option<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Option<T>,
    {
        if let Some(hit) = self.get_json(key) {
            return Some(hit);
        }
        let value = acquire()?;
        self.set_json(key, &value, ttl);
        Some(value)
    }
}

impl<C: Cache + ?Sized> CacheExt for C {}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

fn decode<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}

fn read_through<F, P>(cached: Option<String>, acquire: F, populate: P) -> String
where
    F: FnOnce() -> String,
    P: FnOnce(&str),
{
    if let Some(hit) = cached.filter(|v| !v.is_empty()) {
        return hit;
    }
    let value = acquire();
    if value.is_empty() {
        debug!("Supplier produced an empty value, skipping populate");
    } else {
        populate(&value);
    }
    value
}
