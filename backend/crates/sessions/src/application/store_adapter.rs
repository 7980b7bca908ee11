//! Session Persistence Adapter
//!
//! Framework-independent store interface: `write` and `read` by session id,
//! plus `destroy` for logout and `touch` for request metadata. Every store
//! failure propagates to the caller.

use crate::application::config::SessionConfig;
use crate::domain::entity::session_payload::SessionPayload;
use crate::domain::entity::session_record::{SessionRecord, validate_session_id};
use crate::domain::repository::SessionRecordRepository;
use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Bound a store call by `limit`
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> SessionResult<T>
where
    F: Future<Output = SessionResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| SessionError::StoreTimeout(limit))?
}

pub struct SessionStoreAdapter<R>
where
    R: SessionRecordRepository,
{
    repo: Arc<R>,
    config: Arc<SessionConfig>,
}

impl<R> SessionStoreAdapter<R>
where
    R: SessionRecordRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<SessionConfig>) -> Self {
        Self { repo, config }
    }

    /// Persist `payload` under `session_id`
    pub async fn write(
        &self,
        session_id: &str,
        payload: &SessionPayload,
    ) -> SessionResult<SessionRecord> {
        self.write_at(session_id, payload, Utc::now()).await
    }

    pub async fn write_at(
        &self,
        session_id: &str,
        payload: &SessionPayload,
        now: DateTime<Utc>,
    ) -> SessionResult<SessionRecord> {
        validate_session_id(session_id).map_err(SessionError::InvalidSessionId)?;

        let owner = payload
            .owner_user_id()
            .map_err(SessionError::SchemaViolation)?;
        let expires_at = payload
            .cookie_expires()
            .map_err(SessionError::SchemaViolation)?
            .unwrap_or_else(|| {
                now.checked_add_signed(self.config.ttl())
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            });
        let meta = payload.request_meta();

        let record = SessionRecord {
            session_id: session_id.to_string(),
            owner_user_id: owner.clone(),
            payload: payload
                .to_json_string()
                .map_err(SessionError::SchemaViolation)?,
            expires_at,
            client_ip: meta.ip,
            user_agent: meta.user_agent,
            last_seen_at: meta.last_visited,
            captured_at: now,
        };

        let stored = with_deadline(self.config.store_timeout, self.repo.upsert(&record)).await?;

        if let Some(requested) = owner.filter(|o| stored.owner_user_id.as_ref() != Some(o)) {
            tracing::warn!(
                session_id = %session_id,
                stored_owner = ?stored.owner_user_id,
                requested_owner = %requested,
                "Session owner is fixed, ignoring new owner"
            );
        }

        tracing::debug!(
            session_id = %session_id,
            owner = ?stored.owner_user_id,
            expires_at = %stored.expires_at,
            "Session written"
        );
        Ok(stored)
    }

    /// Payload of an unexpired session
    pub async fn read(&self, session_id: &str) -> SessionResult<Option<SessionPayload>> {
        validate_session_id(session_id).map_err(SessionError::InvalidSessionId)?;

        let record = with_deadline(
            self.config.store_timeout,
            self.repo.find(session_id, Utc::now()),
        )
        .await?;

        record
            .map(|r| r.payload().map_err(SessionError::SchemaViolation))
            .transpose()
    }

    pub async fn destroy(&self, session_id: &str) -> SessionResult<()> {
        validate_session_id(session_id).map_err(SessionError::InvalidSessionId)?;

        let removed =
            with_deadline(self.config.store_timeout, self.repo.delete(session_id)).await?;
        tracing::debug!(session_id = %session_id, removed, "Session destroyed");
        Ok(())
    }

    /// Record a request against an existing session
    ///
    /// Returns `None` when the session is unknown or expired; nothing is
    /// created in that case.
    pub async fn touch(
        &self,
        session_id: &str,
        ip: Option<String>,
        user_agent: Option<String>,
    ) -> SessionResult<Option<SessionRecord>> {
        let Some(mut payload) = self.read(session_id).await? else {
            return Ok(None);
        };
        let now = Utc::now();
        payload.record_request(ip, user_agent, now);
        self.write_at(session_id, &payload, now).await.map(Some)
    }
}
