//! Data Transfer Objects

use crate::domain::entity::session_record::SessionRecord;
use chrono::{DateTime, Utc};
use kernel::actor::Actor;
use serde::Serialize;

/// One session as shown to its owner
///
/// The payload itself is never exposed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub last_visited: Option<DateTime<Utc>>,
    pub expires: DateTime<Utc>,
    /// The session making this request
    pub current: bool,
}

impl SessionView {
    pub fn from_record(record: SessionRecord, current_session: Option<&str>) -> Self {
        let current = current_session == Some(record.session_id.as_str());
        Self {
            session_id: record.session_id,
            ip: record.client_ip,
            user_agent: record.user_agent,
            last_visited: record.last_seen_at,
            expires: record.expires_at,
            current,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MySessionsResponse {
    pub success: bool,
    pub sessions: Vec<SessionView>,
}

#[derive(Debug, Serialize)]
pub struct RevokeSessionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: Actor,
}
