//! Unit tests for sessions crate
//! Store adapter contract, session listing, HTTP surface

#[cfg(test)]
mod fixtures {
    use crate::application::config::SessionConfig;
    use crate::application::store_adapter::SessionStoreAdapter;
    use crate::domain::entity::session_payload::SessionPayload;
    use crate::domain::entity::session_record::SessionRecord;
    use crate::domain::repository::SessionRecordRepository;
    use crate::error::SessionResult;
    use crate::infra::memory::InMemorySessionRepository;
    use chrono::{DateTime, Utc};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;

    pub fn config() -> Arc<SessionConfig> {
        Arc::new(SessionConfig::default())
    }

    pub fn adapter(repo: &InMemorySessionRepository) -> SessionStoreAdapter<InMemorySessionRepository> {
        SessionStoreAdapter::new(Arc::new(repo.clone()), config())
    }

    pub fn payload(value: Value) -> SessionPayload {
        SessionPayload::try_from(value).unwrap()
    }

    /// Session as written right after login
    pub fn logged_in(user: &str) -> SessionPayload {
        payload(json!({
            "cookie": { "path": "/", "httpOnly": true },
            "passport": { "user": user },
            "identity": { "email": format!("{user}@example.com"), "username": user },
        }))
    }

    /// Repository whose calls never finish in time
    #[derive(Clone, Default)]
    pub struct StalledRepository;

    impl SessionRecordRepository for StalledRepository {
        async fn upsert(&self, record: &SessionRecord) -> SessionResult<SessionRecord> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(record.clone())
        }

        async fn find(
            &self,
            _session_id: &str,
            _now: DateTime<Utc>,
        ) -> SessionResult<Option<SessionRecord>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(None)
        }

        async fn find_by_owner(
            &self,
            _user_id: &str,
            _now: DateTime<Utc>,
        ) -> SessionResult<Vec<SessionRecord>> {
            Ok(vec![])
        }

        async fn delete(&self, _session_id: &str) -> SessionResult<bool> {
            Ok(false)
        }

        async fn delete_owned(&self, _session_id: &str, _user_id: &str) -> SessionResult<bool> {
            Ok(false)
        }

        async fn cleanup_expired(&self, _now: DateTime<Utc>) -> SessionResult<u64> {
            Ok(0)
        }
    }
}

#[cfg(test)]
mod adapter_tests {
    use super::fixtures::*;
    use crate::application::config::SessionConfig;
    use crate::application::store_adapter::SessionStoreAdapter;
    use crate::domain::entity::session_payload::SessionPayload;
    use crate::domain::repository::SessionRecordRepository;
    use crate::error::SessionError;
    use crate::infra::memory::InMemorySessionRepository;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_round_trip_owner_and_expiry() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        let expires = Utc.with_ymd_and_hms(2099, 6, 1, 12, 0, 0).unwrap();
        let written = payload(json!({
            "cookie": { "expires": "2099-06-01T12:00:00.000Z" },
            "passport": { "user": "u1" },
        }));

        let record = adapter.write("sid_1", &written).await.unwrap();

        assert_eq!(record.owner_user_id.as_deref(), Some("u1"));
        assert_eq!(record.expires_at, expires);
        assert_eq!(adapter.read("sid_1").await.unwrap(), Some(written));
    }

    #[tokio::test]
    async fn test_default_ttl_without_cookie_expiry() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);

        let before = Utc::now();
        let record = adapter.write("sid_1", &logged_in("u1")).await.unwrap();
        let after = Utc::now();

        let ttl = config().ttl();
        assert!(record.expires_at >= before + ttl);
        assert!(record.expires_at <= after + ttl);
    }

    #[tokio::test]
    async fn test_configured_ttl() {
        let repo = InMemorySessionRepository::new();
        let config = SessionConfig::default().with_default_ttl(std::time::Duration::from_secs(60));
        let adapter = SessionStoreAdapter::new(Arc::new(repo.clone()), Arc::new(config));
        let now = Utc::now();

        let record = adapter
            .write_at("sid_1", &SessionPayload::new(), now)
            .await
            .unwrap();
        assert_eq!(record.expires_at, now + Duration::seconds(60));
        assert_eq!(record.owner_user_id, None);
    }

    #[tokio::test]
    async fn test_owner_is_immutable() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);

        adapter.write("sid_1", &SessionPayload::new()).await.unwrap();
        adapter.write("sid_1", &logged_in("u1")).await.unwrap();
        let hijack = adapter.write("sid_1", &logged_in("u2")).await.unwrap();
        let anonymous = adapter.write("sid_1", &SessionPayload::new()).await.unwrap();

        assert_eq!(hijack.owner_user_id.as_deref(), Some("u1"));
        assert_eq!(anonymous.owner_user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_write_overwrites_payload() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);

        adapter.write("sid_1", &logged_in("u1")).await.unwrap();
        let mut next = logged_in("u1");
        next.insert("cart", json!(["sku_1"]));
        adapter.write("sid_1", &next).await.unwrap();

        let read = adapter.read("sid_1").await.unwrap().unwrap();
        assert_eq!(read.get("cart"), Some(&json!(["sku_1"])));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let repo = InMemorySessionRepository::new();
        repo.set_fail_writes(true);
        let adapter = adapter(&repo);

        let result = adapter.write("sid_1", &logged_in("u1")).await;
        assert!(matches!(result, Err(SessionError::Internal(_))));

        let result = adapter.destroy("sid_1").await;
        assert!(matches!(result, Err(SessionError::Internal(_))));
    }

    #[tokio::test]
    async fn test_store_timeout_propagates() {
        let config = SessionConfig {
            store_timeout: std::time::Duration::from_millis(20),
            ..SessionConfig::default()
        };
        let adapter = SessionStoreAdapter::new(Arc::new(StalledRepository), Arc::new(config));

        let result = adapter.write("sid_1", &logged_in("u1")).await;
        assert!(matches!(result, Err(SessionError::StoreTimeout(_))));

        let result = adapter.read("sid_1").await;
        assert!(matches!(result, Err(SessionError::StoreTimeout(_))));
    }

    #[tokio::test]
    async fn test_invalid_session_id_rejected() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);

        let result = adapter.write("", &logged_in("u1")).await;
        assert!(matches!(result, Err(SessionError::InvalidSessionId(_))));

        let long = "s".repeat(300);
        let result = adapter.read(&long).await;
        assert!(matches!(result, Err(SessionError::InvalidSessionId(_))));
    }

    #[tokio::test]
    async fn test_mismatched_shapes_rejected_before_persistence() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);

        let bad_owner = payload(json!({ "passport": { "user": ["u1"] } }));
        let result = adapter.write("sid_1", &bad_owner).await;
        assert!(matches!(result, Err(SessionError::SchemaViolation(_))));

        let bad_expiry = payload(json!({ "cookie": { "expires": true } }));
        let result = adapter.write("sid_2", &bad_expiry).await;
        assert!(matches!(result, Err(SessionError::SchemaViolation(_))));

        assert!(repo.get("sid_1").unwrap().is_none());
        assert!(repo.get("sid_2").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_session_reads_as_absent() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        let mut expired = logged_in("u1");
        expired.set_cookie_expires(Utc::now() - Duration::minutes(1));

        adapter.write("sid_1", &expired).await.unwrap();

        assert_eq!(adapter.read("sid_1").await.unwrap(), None);
        assert_eq!(adapter.touch("sid_1", None, None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_touch_records_request_metadata() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        adapter.write("sid_1", &logged_in("u1")).await.unwrap();

        let first = adapter
            .touch("sid_1", Some("10.0.0.1".into()), Some("Firefox".into()))
            .await
            .unwrap()
            .unwrap();
        let second = adapter
            .touch("sid_1", Some("10.0.0.2".into()), Some("Chrome".into()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(first.client_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(second.client_ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(second.user_agent.as_deref(), Some("Firefox"));
        assert!(second.last_seen_at >= first.last_seen_at);
        assert_eq!(second.owner_user_id.as_deref(), Some("u1"));
    }

    #[tokio::test]
    async fn test_touch_unknown_session_creates_nothing() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);

        let touched = adapter.touch("sid_x", Some("10.0.0.1".into()), None).await.unwrap();

        assert!(touched.is_none());
        assert!(repo.get("sid_x").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_legacy_metadata_lifted_into_columns() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        let legacy = payload(json!({
            "passport": { "user": "u1" },
            "ip": "192.168.0.9",
            "userAgent": "Safari",
            "lastVisited": "2030-01-01T00:00:00Z",
        }));

        let record = adapter.write("sid_1", &legacy).await.unwrap();

        assert_eq!(record.client_ip.as_deref(), Some("192.168.0.9"));
        assert_eq!(record.user_agent.as_deref(), Some("Safari"));
        assert_eq!(
            record.last_seen_at,
            Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_destroy_and_cleanup() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        let mut expired = SessionPayload::new();
        expired.set_cookie_expires(Utc::now() - Duration::hours(1));

        adapter.write("sid_1", &logged_in("u1")).await.unwrap();
        adapter.write("sid_2", &expired).await.unwrap();

        adapter.destroy("sid_1").await.unwrap();
        adapter.destroy("sid_1").await.unwrap();
        assert!(repo.get("sid_1").unwrap().is_none());

        assert_eq!(repo.cleanup_expired(Utc::now()).await.unwrap(), 1);
        assert!(repo.get("sid_2").unwrap().is_none());
    }
}

#[cfg(test)]
mod my_sessions_tests {
    use super::fixtures::*;
    use crate::application::my_sessions::{ListSessionsUseCase, RevokeSessionUseCase};
    use crate::domain::entity::session_payload::SessionPayload;
    use crate::error::SessionError;
    use crate::infra::memory::InMemorySessionRepository;
    use chrono::{Duration, Utc};
    use kernel::actor::Actor;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_list_own_unexpired_sessions_newest_first() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        let now = Utc::now();

        let mut older = logged_in("u1");
        older.record_request(None, None, now - Duration::hours(2));
        let mut newer = logged_in("u1");
        newer.record_request(None, None, now - Duration::minutes(1));
        let mut expired = logged_in("u1");
        expired.set_cookie_expires(now - Duration::seconds(1));

        adapter.write("sid_old", &older).await.unwrap();
        adapter.write("sid_new", &newer).await.unwrap();
        adapter.write("sid_expired", &expired).await.unwrap();
        adapter.write("sid_other", &logged_in("u2")).await.unwrap();
        adapter.write("sid_anon", &SessionPayload::new()).await.unwrap();

        let use_case = ListSessionsUseCase::new(Arc::new(repo.clone()), config());
        let sessions = use_case.execute(&Actor::new("u1")).await.unwrap();

        let ids: Vec<&str> = sessions.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["sid_new", "sid_old"]);
    }

    #[tokio::test]
    async fn test_revoke_only_own_session() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        adapter.write("sid_1", &logged_in("u1")).await.unwrap();

        let use_case = RevokeSessionUseCase::new(Arc::new(repo.clone()), config());

        let result = use_case.execute(&Actor::new("u2"), "sid_1").await;
        assert!(matches!(result, Err(SessionError::SessionNotFound)));
        assert!(repo.get("sid_1").unwrap().is_some());

        use_case.execute(&Actor::new("u1"), "sid_1").await.unwrap();
        assert!(repo.get("sid_1").unwrap().is_none());

        let result = use_case.execute(&Actor::new("u1"), "sid_1").await;
        assert!(matches!(result, Err(SessionError::SessionNotFound)));
    }
}

#[cfg(test)]
mod http_tests {
    use super::fixtures::*;
    use crate::domain::entity::session_payload::SessionPayload;
    use crate::infra::memory::InMemorySessionRepository;
    use crate::presentation::handlers::SessionAppState;
    use crate::presentation::middleware::{SessionMiddlewareState, resolve_actor};
    use crate::presentation::router::session_router;
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(repo: &InMemorySessionRepository) -> Router {
        let repo = Arc::new(repo.clone());
        let state = SessionAppState::new(repo.clone(), config());
        let middleware_state = SessionMiddlewareState::new(repo, config());

        Router::new()
            .nest("/api/user", session_router(state))
            .layer(axum::middleware::from_fn_with_state(
                middleware_state,
                resolve_actor::<InMemorySessionRepository>,
            ))
    }

    fn request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("user-agent", "TestAgent/1.0")
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_no_cookie_is_unauthorized() {
        let repo = InMemorySessionRepository::new();

        let response = app(&repo)
            .oneshot(request("GET", "/api/user/my-sessions", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_anonymous_session_is_unauthorized() {
        let repo = InMemorySessionRepository::new();
        adapter(&repo).write("sid_anon", &SessionPayload::new()).await.unwrap();

        let response = app(&repo)
            .oneshot(request("GET", "/api/user/my-sessions", Some("connect.sid=sid_anon")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_sessions_marks_current_and_captures_client() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        adapter.write("sid_1", &logged_in("u1")).await.unwrap();
        adapter.write("sid_2", &logged_in("u1")).await.unwrap();
        adapter.write("sid_3", &logged_in("u2")).await.unwrap();

        let response = app(&repo)
            .oneshot(request(
                "GET",
                "/api/user/my-sessions",
                Some("theme=dark; connect.sid=s%3Asid_1.c2lnbmF0dXJl"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);

        let sessions = body["sessions"].as_array().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0]["sessionId"], "sid_1");
        assert_eq!(sessions[0]["current"], true);
        assert_eq!(sessions[0]["ip"], "203.0.113.7");
        assert_eq!(sessions[0]["userAgent"], "TestAgent/1.0");
        assert_eq!(sessions[1]["current"], false);
        assert!(sessions.iter().all(|s| s.get("payload").is_none()));
    }

    #[tokio::test]
    async fn test_me_returns_identity() {
        let repo = InMemorySessionRepository::new();
        adapter(&repo).write("sid_1", &logged_in("u1")).await.unwrap();

        let response = app(&repo)
            .oneshot(request("GET", "/api/user/me", Some("connect.sid=sid_1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["user"]["userId"], "u1");
        assert_eq!(body["user"]["email"], "u1@example.com");
        assert_eq!(body["user"]["username"], "u1");
    }

    #[tokio::test]
    async fn test_me_ignores_identity_of_rewritten_owner() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        adapter.write("sid_1", &logged_in("u1")).await.unwrap();
        adapter.write("sid_1", &logged_in("u2")).await.unwrap();

        let response = app(&repo)
            .oneshot(request("GET", "/api/user/me", Some("connect.sid=sid_1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["user"]["userId"], "u1");
        assert!(body["user"]["email"].is_null());
        assert!(body["user"]["username"].is_null());
    }

    #[tokio::test]
    async fn test_delete_session_flow() {
        let repo = InMemorySessionRepository::new();
        let adapter = adapter(&repo);
        adapter.write("sid_1", &logged_in("u1")).await.unwrap();
        adapter.write("sid_2", &logged_in("u1")).await.unwrap();
        adapter.write("sid_3", &logged_in("u2")).await.unwrap();

        let response = app(&repo)
            .oneshot(request("DELETE", "/api/user/my-sessions/sid_3", Some("connect.sid=sid_1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(repo.get("sid_3").unwrap().is_some());

        let response = app(&repo)
            .oneshot(request("DELETE", "/api/user/my-sessions/sid_2", Some("connect.sid=sid_1")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Session deleted successfully");
        assert!(repo.get("sid_2").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_failure_fails_request() {
        let repo = InMemorySessionRepository::new();
        adapter(&repo).write("sid_1", &logged_in("u1")).await.unwrap();
        repo.set_fail_writes(true);

        let response = app(&repo)
            .oneshot(request("GET", "/api/user/my-sessions", Some("connect.sid=sid_1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
