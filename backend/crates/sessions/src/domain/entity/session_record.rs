//! Session Record Entity

use super::session_payload::SessionPayload;
use chrono::{DateTime, Utc};

/// Upper bound for session ids accepted by the store
pub const MAX_SESSION_ID_LEN: usize = 256;

/// Persisted state of one login session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// Opaque id issued by the session framework (primary key)
    pub session_id: String,

    /// Set once the session authenticates; immutable afterwards
    pub owner_user_id: Option<String>,

    /// Serialized session payload
    pub payload: String,

    /// Cookie expiry, or capture time plus the default TTL
    pub expires_at: DateTime<Utc>,

    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub last_seen_at: Option<DateTime<Utc>>,

    /// Time of the latest write
    pub captured_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn payload(&self) -> Result<SessionPayload, String> {
        SessionPayload::parse(&self.payload)
    }

    /// Timestamp used to order a user's sessions
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_seen_at.unwrap_or(self.captured_at)
    }
}

pub fn validate_session_id(session_id: &str) -> Result<(), String> {
    if session_id.is_empty() {
        return Err("session id is empty".to_string());
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(format!(
            "session id longer than {MAX_SESSION_ID_LEN} bytes"
        ));
    }
    if session_id.chars().any(char::is_control) {
        return Err("session id contains control characters".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_validate_session_id() {
        assert!(validate_session_id("abc123").is_ok());
        assert!(validate_session_id("").is_err());
        assert!(validate_session_id(&"x".repeat(MAX_SESSION_ID_LEN + 1)).is_err());
        assert!(validate_session_id("a\nb").is_err());
    }

    #[test]
    fn test_expiry_and_activity() {
        let now = Utc::now();
        let record = SessionRecord {
            session_id: "s1".to_string(),
            owner_user_id: None,
            payload: "{}".to_string(),
            expires_at: now,
            client_ip: None,
            user_agent: None,
            last_seen_at: None,
            captured_at: now - Duration::minutes(5),
        };
        assert!(record.is_expired(now));
        assert!(!record.is_expired(now - Duration::seconds(1)));
        assert_eq!(record.last_activity(), record.captured_at);
    }
}
