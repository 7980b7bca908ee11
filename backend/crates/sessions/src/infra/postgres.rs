//! PostgreSQL Session Repository

use crate::domain::entity::session_record::SessionRecord;
use crate::domain::repository::SessionRecordRepository;
use crate::error::SessionResult;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

const SESSION_COLUMNS: &str = r#"
    session_id,
    owner_user_id,
    payload,
    expires_at,
    client_ip,
    user_agent,
    last_seen_at,
    captured_at
"#;

/// PostgreSQL-backed session record repository
#[derive(Clone)]
pub struct PgSessionRecordRepository {
    pool: PgPool,
}

impl PgSessionRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl SessionRecordRepository for PgSessionRecordRepository {
    async fn upsert(&self, record: &SessionRecord) -> SessionResult<SessionRecord> {
        // The stored owner wins over whatever the new payload claims.
        let sql = format!(
            r#"
            INSERT INTO session_records (
                session_id,
                owner_user_id,
                payload,
                expires_at,
                client_ip,
                user_agent,
                last_seen_at,
                captured_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (session_id) DO UPDATE SET
                owner_user_id = COALESCE(session_records.owner_user_id, EXCLUDED.owner_user_id),
                payload = EXCLUDED.payload,
                expires_at = EXCLUDED.expires_at,
                client_ip = EXCLUDED.client_ip,
                user_agent = EXCLUDED.user_agent,
                last_seen_at = EXCLUDED.last_seen_at,
                captured_at = EXCLUDED.captured_at
            RETURNING {SESSION_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(&record.session_id)
            .bind(&record.owner_user_id)
            .bind(&record.payload)
            .bind(record.expires_at)
            .bind(&record.client_ip)
            .bind(&record.user_agent)
            .bind(record.last_seen_at)
            .bind(record.captured_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into_record())
    }

    async fn find(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<Option<SessionRecord>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM session_records WHERE session_id = $1 AND expires_at > $2"
        );
        let row = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(session_id)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(SessionRow::into_record))
    }

    async fn find_by_owner(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> SessionResult<Vec<SessionRecord>> {
        let sql = format!(
            r#"
            SELECT {SESSION_COLUMNS} FROM session_records
            WHERE owner_user_id = $1 AND expires_at > $2
            ORDER BY COALESCE(last_seen_at, captured_at) DESC
            "#
        );
        let rows = sqlx::query_as::<_, SessionRow>(&sql)
            .bind(user_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(SessionRow::into_record).collect())
    }

    async fn delete(&self, session_id: &str) -> SessionResult<bool> {
        let result = sqlx::query("DELETE FROM session_records WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_owned(&self, session_id: &str, user_id: &str) -> SessionResult<bool> {
        let result = sqlx::query(
            "DELETE FROM session_records WHERE session_id = $1 AND owner_user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn cleanup_expired(&self, now: DateTime<Utc>) -> SessionResult<u64> {
        let result = sqlx::query("DELETE FROM session_records WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    owner_user_id: Option<String>,
    payload: String,
    expires_at: DateTime<Utc>,
    client_ip: Option<String>,
    user_agent: Option<String>,
    last_seen_at: Option<DateTime<Utc>>,
    captured_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_record(self) -> SessionRecord {
        SessionRecord {
            session_id: self.session_id,
            owner_user_id: self.owner_user_id,
            payload: self.payload,
            expires_at: self.expires_at,
            client_ip: self.client_ip,
            user_agent: self.user_agent,
            last_seen_at: self.last_seen_at,
            captured_at: self.captured_at,
        }
    }
}
