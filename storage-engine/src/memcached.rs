use memcache::{Client, MemcacheError};
use memstash::domain::StoreMode;
use memstash::domain::response::{DeleteResponse, ExistsResponse, GetResponse, StoreResponse};
use memstash::ports::CacheStore;
use shared::config::{Config, Protocol};
use shared::{Error, Result, TtlSecs};
use std::fmt::Debug;
use tracing::{debug, info};

/// Memcached reads expirations above 30 days as absolute Unix timestamps
pub const MAX_RELATIVE_EXPIRATION: u32 = 60 * 60 * 24 * 30;

/// [`CacheStore`] backed by the `memcache` client.
///
/// The client owns connection pooling and key distribution across servers;
/// this type only maps store modes, expirations and errors.
pub struct MemcachedStore {
    client: Client,
    servers: Vec<String>,
    // the ascii client answers Ok(()) to an add the server refused with NOT_STORED
    text_protocol: bool,
}

impl MemcachedStore {
    pub fn connect(config: &Config) -> Result<Self> {
        if config.servers.is_empty() {
            return Err(Error::Config("no memcached servers configured".to_string()));
        }

        let urls = server_urls(&config.servers, config.protocol);
        let text_protocol = urls.iter().any(|url| url.contains("protocol=ascii"));
        let client = Client::with_pool_size(urls, config.pool_size).map_err(backend_error)?;

        if let Some(timeout) = config.io_timeout {
            client
                .set_read_timeout(Some(timeout))
                .map_err(backend_error)?;
            client
                .set_write_timeout(Some(timeout))
                .map_err(backend_error)?;
        }

        info!(
            "Connected to memcached {:?} (protocol: {:?}, pool size: {})",
            config.servers, config.protocol, config.pool_size
        );

        Ok(Self {
            client,
            servers: config.servers.clone(),
            text_protocol,
        })
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    /// Add over the text protocol, where the client hides NOT_STORED. A live key
    /// refuses the add up front; otherwise the add counts as stored only if our
    /// value reads back. A concurrent writer storing the same value in between
    /// is indistinguishable from our own write.
    fn add_text(&self, key: &str, value: &str, exptime: u32) -> Result<StoreResponse> {
        if self.client.get::<String>(key).map_err(backend_error)?.is_some() {
            debug!("memcached add for '{}' skipped, key is live", key);
            return Ok(StoreResponse::new(false));
        }

        match self.client.add(key, value, exptime) {
            Ok(()) => {}
            Err(MemcacheError::CommandError(reason)) => {
                debug!("memcached refused add for '{}': {:?}", key, reason);
                return Ok(StoreResponse::new(false));
            }
            Err(e) => return Err(backend_error(e)),
        }

        let current = self.client.get::<String>(key).map_err(backend_error)?;
        let stored = current.as_deref() == Some(value);
        if !stored {
            debug!("memcached add for '{}' was not stored", key);
        }
        Ok(StoreResponse::new(stored))
    }
}

impl CacheStore for MemcachedStore {
    fn store(&self, mode: StoreMode, key: &str, value: &str, ttl: TtlSecs) -> Result<StoreResponse> {
        let exptime = expiration(ttl, chrono::Utc::now().timestamp());
        let result = match mode {
            StoreMode::Add if self.text_protocol => return self.add_text(key, value, exptime),
            StoreMode::Add => self.client.add(key, value, exptime),
            StoreMode::Set => self.client.set(key, value, exptime),
        };

        match result {
            Ok(()) => Ok(StoreResponse::new(true)),
            // the server answered and refused the write, e.g. NOT_STORED on add
            Err(MemcacheError::CommandError(reason)) => {
                debug!("memcached refused {} for '{}': {:?}", mode.name(), key, reason);
                Ok(StoreResponse::new(false))
            }
            Err(e) => Err(backend_error(e)),
        }
    }

    fn get(&self, key: &str) -> Result<GetResponse<String>> {
        match self.client.get::<String>(key).map_err(backend_error)? {
            Some(value) => Ok(GetResponse::new(true, value)),
            None => Err(Error::NotFound),
        }
    }

    fn exists(&self, key: &str) -> Result<ExistsResponse> {
        let found = self.client.get::<String>(key).map_err(backend_error)?;
        Ok(ExistsResponse::new(found.is_some()))
    }

    fn delete(&self, key: &str) -> Result<DeleteResponse> {
        let deleted = self.client.delete(key).map_err(backend_error)?;
        Ok(DeleteResponse::new(deleted))
    }
}

impl Debug for MemcachedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcachedStore")
            .field("servers", &self.servers)
            .field("client", &"<memcache::Client>")
            .finish()
    }
}

fn backend_error(err: MemcacheError) -> Error {
    Error::Backend(err.to_string())
}

/// Turn `host:port` entries into client URLs. Entries that already carry a
/// scheme keep their own settings; the text protocol is added only when they
/// name no protocol.
pub fn server_urls(servers: &[String], protocol: Protocol) -> Vec<String> {
    servers
        .iter()
        .map(|server| {
            if server.contains("://") {
                if !protocol.is_text() || server.contains("protocol=") {
                    debug!("Using memcached URL '{}' as given", server);
                    server.clone()
                } else if server.contains('?') {
                    format!("{}&protocol=ascii", server)
                } else {
                    format!("{}?protocol=ascii", server)
                }
            } else if protocol.is_text() {
                format!("memcache://{}?protocol=ascii", server)
            } else {
                format!("memcache://{}", server)
            }
        })
        .collect()
}

/// Expiration field for a store command, given the current Unix time in seconds
pub fn expiration(ttl: TtlSecs, now_unix: i64) -> u32 {
    if ttl.0 <= MAX_RELATIVE_EXPIRATION {
        return ttl.0;
    }
    let absolute = now_unix.saturating_add(i64::from(ttl.0));
    u32::try_from(absolute).unwrap_or(u32::MAX)
}
