//! Session Record Repository Trait

use crate::domain::entity::session_record::SessionRecord;
use crate::error::SessionResult;
use chrono::{DateTime, Utc};

#[trait_variant::make(SessionRecordRepository: Send)]
pub trait LocalSessionRecordRepository {
    /// Insert or overwrite by session id
    ///
    /// An owner already stored for the id is kept; the stored record is
    /// returned.
    async fn upsert(&self, record: &SessionRecord) -> SessionResult<SessionRecord>;

    /// Unexpired record by id
    async fn find(&self, session_id: &str, now: DateTime<Utc>)
    -> SessionResult<Option<SessionRecord>>;

    /// Unexpired records of one user, most recently seen first
    async fn find_by_owner(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<Vec<SessionRecord>>;

    /// Returns whether a record was removed
    async fn delete(&self, session_id: &str) -> SessionResult<bool>;

    /// Delete only if owned by `user_id`
    async fn delete_owned(&self, session_id: &str, user_id: &str) -> SessionResult<bool>;

    /// Remove expired records, returning how many
    async fn cleanup_expired(&self, now: DateTime<Utc>) -> SessionResult<u64>;
}
