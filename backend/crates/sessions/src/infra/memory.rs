//! In-Memory Session Repository
//!
//! Used by tests and local runs without a database. `fail_writes` makes
//! every write fail, for exercising error propagation.

use crate::domain::entity::session_record::SessionRecord;
use crate::domain::repository::SessionRecordRepository;
use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Default)]
pub struct InMemorySessionRepository {
    records: Arc<Mutex<HashMap<String, SessionRecord>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> SessionResult<MutexGuard<'_, HashMap<String, SessionRecord>>> {
        self.records
            .lock()
            .map_err(|_| SessionError::Internal("session store lock poisoned".to_string()))
    }

    fn check_writable(&self) -> SessionResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SessionError::Internal("session store unavailable".to_string()));
        }
        Ok(())
    }

    /// Stored record regardless of expiry
    pub fn get(&self, session_id: &str) -> SessionResult<Option<SessionRecord>> {
        Ok(self.lock()?.get(session_id).cloned())
    }
}

impl SessionRecordRepository for InMemorySessionRepository {
    async fn upsert(&self, record: &SessionRecord) -> SessionResult<SessionRecord> {
        self.check_writable()?;

        let mut records = self.lock()?;
        let mut next = record.clone();
        if let Some(existing) = records.get(&record.session_id) {
            next.owner_user_id = existing
                .owner_user_id
                .clone()
                .or(next.owner_user_id);
        }
        records.insert(next.session_id.clone(), next.clone());
        Ok(next)
    }

    async fn find(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<SessionRecord>> {
        Ok(self
            .lock()?
            .get(session_id)
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    async fn find_by_owner(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<Vec<SessionRecord>> {
        let mut found: Vec<SessionRecord> = self
            .lock()?
            .values()
            .filter(|r| r.owner_user_id.as_deref() == Some(user_id) && !r.is_expired(now))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
        Ok(found)
    }

    async fn delete(&self, session_id: &str) -> SessionResult<bool> {
        self.check_writable()?;
        Ok(self.lock()?.remove(session_id).is_some())
    }

    async fn delete_owned(&self, session_id: &str, user_id: &str) -> SessionResult<bool> {
        self.check_writable()?;

        let mut records = self.lock()?;
        let owned = records
            .get(session_id)
            .is_some_and(|r| r.owner_user_id.as_deref() == Some(user_id));
        if owned {
            records.remove(session_id);
        }
        Ok(owned)
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> SessionResult<u64> {
        self.check_writable()?;

        let mut records = self.lock()?;
        let before = records.len();
        records.retain(|_, r| !r.is_expired(now));
        Ok((before - records.len()) as u64)
    }
}
