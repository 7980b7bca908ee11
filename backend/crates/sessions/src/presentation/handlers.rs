//! HTTP Handlers

use crate::application::config::SessionConfig;
use crate::application::my_sessions::{ListSessionsUseCase, RevokeSessionUseCase};
use crate::domain::repository::SessionRecordRepository;
use crate::error::SessionResult;
use crate::presentation::dto::{MeResponse, MySessionsResponse, RevokeSessionResponse, SessionView};
use crate::presentation::middleware::CurrentSession;
use axum::Json;
use axum::extract::{Extension, Path, State};
use kernel::actor::Actor;
use std::sync::Arc;

/// Shared state for session handlers
#[derive(Clone)]
pub struct SessionAppState<R>
where
    R: SessionRecordRepository + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub config: Arc<SessionConfig>,
}

impl<R> SessionAppState<R>
where
    R: SessionRecordRepository + Clone + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, config: Arc<SessionConfig>) -> Self {
        Self { repo, config }
    }
}

/// GET /api/user/me
pub async fn me(actor: Actor) -> Json<MeResponse> {
    Json(MeResponse {
        success: true,
        user: actor,
    })
}

/// GET /api/user/my-sessions
pub async fn my_sessions<R>(
    State(state): State<SessionAppState<R>>,
    actor: Actor,
    current: Option<Extension<CurrentSession>>,
) -> SessionResult<Json<MySessionsResponse>>
where
    R: SessionRecordRepository + Clone + Send + Sync + 'static,
{
    let use_case = ListSessionsUseCase::new(state.repo.clone(), state.config.clone());
    let records = use_case.execute(&actor).await?;

    let current = current.map(|Extension(CurrentSession(id))| id);
    Ok(Json(MySessionsResponse {
        success: true,
        sessions: records
            .into_iter()
            .map(|r| SessionView::from_record(r, current.as_deref()))
            .collect(),
    }))
}

/// DELETE /api/user/my-sessions/{sessionId}
pub async fn delete_my_session<R>(
    State(state): State<SessionAppState<R>>,
    actor: Actor,
    Path(session_id): Path<String>,
) -> SessionResult<Json<RevokeSessionResponse>>
where
    R: SessionRecordRepository + Clone + Send + Sync + 'static,
{
    let use_case = RevokeSessionUseCase::new(state.repo.clone(), state.config.clone());
    use_case.execute(&actor, &session_id).await?;

    Ok(Json(RevokeSessionResponse {
        success: true,
        message: "Session deleted successfully".to_string(),
    }))
}
