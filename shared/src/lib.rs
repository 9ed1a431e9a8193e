// shared/src/lib.rs
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound,
    #[error("invalid key: {0}")]
    InvalidKey(String),
    #[error("backend: {0}")]
    Backend(String),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Time-to-live in whole seconds. Zero means the entry never expires.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TtlSecs(pub u32);

impl TtlSecs {
    pub const NEVER: TtlSecs = TtlSecs(0);

    pub fn is_never(&self) -> bool {
        self.0 == 0
    }

    /// `None` for entries that never expire
    pub fn as_duration(&self) -> Option<Duration> {
        if self.is_never() {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.0)))
        }
    }
}

impl From<u32> for TtlSecs {
    fn from(secs: u32) -> Self {
        TtlSecs(secs)
    }
}

impl From<Duration> for TtlSecs {
    /// Sub-second durations round up so a short TTL never turns into "no expiration".
    fn from(d: Duration) -> Self {
        let mut secs = d.as_secs();
        if d.subsec_nanos() > 0 {
            secs += 1;
        }
        TtlSecs(u32::try_from(secs).unwrap_or(u32::MAX))
    }
}

pub mod config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_zero_never_expires() {
        assert!(TtlSecs::NEVER.is_never());
        assert_eq!(TtlSecs::default(), TtlSecs::NEVER);
        assert_eq!(TtlSecs::NEVER.as_duration(), None);
    }

    #[test]
    fn test_ttl_as_duration() {
        assert_eq!(TtlSecs(90).as_duration(), Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_ttl_from_duration_rounds_up() {
        assert_eq!(TtlSecs::from(Duration::from_millis(1)), TtlSecs(1));
        assert_eq!(TtlSecs::from(Duration::from_secs(5)), TtlSecs(5));
        assert_eq!(TtlSecs::from(Duration::ZERO), TtlSecs::NEVER);
        assert_eq!(
            TtlSecs::from(Duration::from_secs(u64::from(u32::MAX) + 10)),
            TtlSecs(u32::MAX)
        );
    }
}
