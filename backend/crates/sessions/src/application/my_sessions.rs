//! Session Listing and Revocation Use Cases

use crate::application::config::SessionConfig;
use crate::application::store_adapter::with_deadline;
use crate::domain::entity::session_record::{SessionRecord, validate_session_id};
use crate::domain::repository::SessionRecordRepository;
use crate::error::{SessionError, SessionResult};
use chrono::Utc;
use kernel::actor::Actor;
use std::sync::Arc;

pub struct ListSessionsUseCase<R>
where
    R: SessionRecordRepository,
{
    repo: Arc<R>,
    config: Arc<SessionConfig>,
}

impl<R> ListSessionsUseCase<R>
where
    R: SessionRecordRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<SessionConfig>) -> Self {
        Self { repo, config }
    }

    /// Unexpired sessions of the actor, most recently seen first
    pub async fn execute(&self, actor: &Actor) -> SessionResult<Vec<SessionRecord>> {
        with_deadline(
            self.config.store_timeout,
            self.repo.find_by_owner(&actor.user_id, Utc::now()),
        )
        .await
    }
}

pub struct RevokeSessionUseCase<R>
where
    R: SessionRecordRepository,
{
    repo: Arc<R>,
    config: Arc<SessionConfig>,
}

impl<R> RevokeSessionUseCase<R>
where
    R: SessionRecordRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<SessionConfig>) -> Self {
        Self { repo, config }
    }

    /// Delete one of the actor's sessions
    ///
    /// Sessions of other users are reported as missing.
    pub async fn execute(&self, actor: &Actor, session_id: &str) -> SessionResult<()> {
        validate_session_id(session_id).map_err(|_| SessionError::SessionNotFound)?;

        let removed = with_deadline(
            self.config.store_timeout,
            self.repo.delete_owned(session_id, &actor.user_id),
        )
        .await?;

        if !removed {
            return Err(SessionError::SessionNotFound);
        }

        tracing::info!(
            user_id = %actor.user_id,
            session_id = %session_id,
            "Session revoked"
        );
        Ok(())
    }
}
