//! Session Configuration

use std::time::Duration;

/// Default session lifetime when the cookie declares no expiry
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub default_ttl: Duration,
    /// Cookie carrying the session id
    pub cookie_name: String,
    pub store_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_ttl: DEFAULT_SESSION_TTL,
            cookie_name: "connect.sid".to_string(),
            store_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// TTL as a chrono duration, saturating on overflow
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.default_ttl).unwrap_or(chrono::Duration::MAX)
    }
}
