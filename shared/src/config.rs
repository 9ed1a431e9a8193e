use std::time::Duration;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Memcached,
    Memory,
}

/// Memcached protocol spoken by the client
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Text,
    Binary,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub backend: Backend,
    pub servers: Vec<String>, // host:port
    pub protocol: Protocol,
    pub pool_size: u32,
    pub io_timeout: Option<Duration>,
    pub key_prefix: Option<String>,
}

impl Config {
    const DEFAULT_SERVER: &str = "127.0.0.1:11211";
    const DEFAULT_POOL_SIZE: u32 = 4;

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source; `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("MEMSTASH_BACKEND") {
            Some(raw) => Backend::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown MEMSTASH_BACKEND '{}', using memcached", raw);
                Backend::Memcached
            }),
            None => Backend::Memcached,
        };

        let servers = lookup("MEMSTASH_MEMCACHED")
            .map(|conn| parse_servers(&conn))
            .filter(|servers| !servers.is_empty())
            .unwrap_or_else(|| vec![Self::DEFAULT_SERVER.to_string()]);

        let protocol = match lookup("MEMSTASH_PROTOCOL") {
            Some(raw) => Protocol::parse(&raw).unwrap_or_else(|| {
                warn!("Unknown MEMSTASH_PROTOCOL '{}', using text", raw);
                Protocol::Text
            }),
            None => Protocol::Text,
        };

        let pool_size = match lookup("MEMSTASH_POOL_SIZE") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(size) if size > 0 => size,
                _ => {
                    warn!(
                        "Invalid MEMSTASH_POOL_SIZE '{}', using {}",
                        raw,
                        Self::DEFAULT_POOL_SIZE
                    );
                    Self::DEFAULT_POOL_SIZE
                }
            },
            None => Self::DEFAULT_POOL_SIZE,
        };

        let io_timeout = lookup("MEMSTASH_IO_TIMEOUT_MS").and_then(|raw| {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => Some(Duration::from_millis(ms)),
                _ => {
                    warn!("Invalid MEMSTASH_IO_TIMEOUT_MS '{}', using client default", raw);
                    None
                }
            }
        });

        let key_prefix = lookup("MEMSTASH_KEY_PREFIX").filter(|p| !p.is_empty());

        Self {
            backend,
            servers,
            protocol,
            pool_size,
            io_timeout,
            key_prefix,
        }
    }

    /// In-process backend, mostly for tests and local runs
    pub fn memory() -> Self {
        Self {
            backend: Backend::Memory,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Memcached,
            servers: vec![Self::DEFAULT_SERVER.to_string()],
            protocol: Protocol::Text,
            pool_size: Self::DEFAULT_POOL_SIZE,
            io_timeout: None,
            key_prefix: None,
        }
    }
}

impl Backend {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memcached" | "memcache" => Some(Backend::Memcached),
            "memory" | "mem" => Some(Backend::Memory),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Backend::Memcached => "memcached",
            Backend::Memory => "memory",
        }
    }
}

impl Protocol {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" | "ascii" => Some(Protocol::Text),
            "binary" => Some(Protocol::Binary),
            _ => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Protocol::Text)
    }
}

/// Split a connection string such as `"10.0.0.1:11211, 10.0.0.2:11211"` into server entries.
pub fn parse_servers(conn: &str) -> Vec<String> {
    conn.split([',', ';', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
