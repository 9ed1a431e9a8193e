use shared::{Error, Result};

pub mod response {

    #[derive(Clone, Debug)]
    pub struct StoreResponse {
        pub stored: bool,
    }

    impl StoreResponse {
        pub fn new(stored: bool) -> Self {
            Self { stored }
        }
    }

    #[derive(Clone, Debug)]
    pub struct GetResponse<V> {
        pub found: bool,
        pub value: V,
    }

    impl<V> GetResponse<V> {
        pub fn new(found: bool, value: V) -> Self {
            Self { found, value }
        }
    }

    #[derive(Clone, Debug)]
    pub struct ExistsResponse {
        pub exists: bool,
    }

    impl ExistsResponse {
        pub fn new(exists: bool) -> Self {
            Self { exists }
        }
    }

    #[derive(Clone, Debug)]
    pub struct DeleteResponse {
        pub deleted: bool,
    }

    impl DeleteResponse {
        pub fn new(deleted: bool) -> Self {
            Self { deleted }
        }
    }
}

/// How a write treats an existing entry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreMode {
    /// Store only when the key is absent
    Add,
    /// Store unconditionally, replacing any live entry
    Set,
}

impl StoreMode {
    pub fn name(&self) -> &str {
        match self {
            StoreMode::Add => "add",
            StoreMode::Set => "set",
        }
    }
}

/// Longest key the memcached text protocol accepts
pub const MAX_KEY_LEN: usize = 250;

/// Reject keys memcached cannot carry: empty, longer than 250 bytes,
/// or containing whitespace/control characters.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey("key is empty".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(Error::InvalidKey(format!(
            "key is {} bytes, limit is {}",
            key.len(),
            MAX_KEY_LEN
        )));
    }
    if let Some(c) = key.chars().find(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::InvalidKey(format!(
            "key contains forbidden character {:?}",
            c
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key_accepts_plain_keys() {
        assert!(validate_key("user:42").is_ok());
        assert!(validate_key("ключ").is_ok());
        assert!(validate_key(&"k".repeat(MAX_KEY_LEN)).is_ok());
    }

    #[test]
    fn test_validate_key_rejects_bad_keys() {
        assert!(matches!(validate_key(""), Err(Error::InvalidKey(_))));
        assert!(matches!(validate_key("has space"), Err(Error::InvalidKey(_))));
        assert!(matches!(validate_key("line\nbreak"), Err(Error::InvalidKey(_))));
        assert!(matches!(validate_key("nul\0"), Err(Error::InvalidKey(_))));
        assert!(matches!(
            validate_key(&"k".repeat(MAX_KEY_LEN + 1)),
            Err(Error::InvalidKey(_))
        ));
    }
}
