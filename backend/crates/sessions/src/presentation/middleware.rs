//! Actor Resolution Middleware
//!
//! Resolves the session cookie into a session, records the request's client
//! metadata on it, and places the owning user's [`Actor`] into request
//! extensions. Requests without a usable session pass through anonymously;
//! handlers that need a user reject them when extracting `Actor`.

use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use kernel::actor::Actor;
use platform::client::ClientMeta;
use platform::cookie::{extract_cookie, session_id_from_cookie};
use std::sync::Arc;

use crate::application::config::SessionConfig;
use crate::application::store_adapter::SessionStoreAdapter;
use crate::domain::entity::session_record::{SessionRecord, validate_session_id};
use crate::domain::repository::SessionRecordRepository;
use crate::error::SessionResult;

/// Middleware state
#[derive(Clone)]
pub struct SessionMiddlewareState<R>
where
    R: SessionRecordRepository + Clone + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub config: Arc<SessionConfig>,
}

impl<R> SessionMiddlewareState<R>
where
    R: SessionRecordRepository + Clone + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, config: Arc<SessionConfig>) -> Self {
        Self { repo, config }
    }
}

/// Id of the session a request arrived with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentSession(pub String);

/// Resolve the session cookie into an [`Actor`]
///
/// Layered with `axum::middleware::from_fn_with_state`.
///
/// Store failures fail the request instead of silently dropping the user.
pub async fn resolve_actor<R>(
    State(state): State<SessionMiddlewareState<R>>,
    mut req: Request<Body>,
    next: Next,
) -> Response
where
    R: SessionRecordRepository + Clone + Send + Sync + 'static,
{
    let headers = req.headers();

    let direct_ip = req
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip());
    let client = ClientMeta::from_headers(headers, direct_ip);

    let session_id = extract_cookie(headers, &state.config.cookie_name)
        .map(|value| session_id_from_cookie(&value).to_string())
        .filter(|id| validate_session_id(id).is_ok());

    let Some(session_id) = session_id else {
        return next.run(req).await;
    };

    let record = match touch(&state, &session_id, client).await {
        Ok(record) => record,
        Err(e) => return e.into_response(),
    };

    if let Some(actor) = record.as_ref().and_then(actor_for) {
        tracing::debug!(user_id = %actor.user_id, session_id = %session_id, "Actor resolved");
        req.extensions_mut().insert(actor);
    }
    req.extensions_mut().insert(CurrentSession(session_id));

    next.run(req).await
}

async fn touch<R>(
    state: &SessionMiddlewareState<R>,
    session_id: &str,
    client: ClientMeta,
) -> SessionResult<Option<SessionRecord>>
where
    R: SessionRecordRepository + Clone + Send + Sync + 'static,
{
    let adapter = SessionStoreAdapter::new(state.repo.clone(), state.config.clone());
    adapter
        .touch(session_id, client.ip_string(), client.user_agent)
        .await
}

/// Actor of an authenticated session record
fn actor_for(record: &SessionRecord) -> Option<Actor> {
    let user_id = record.owner_user_id.clone()?;
    let mut actor = Actor::new(user_id);

    // Identity fields count only while the payload still names the stored owner.
    let payload = record.payload().ok().filter(|payload| {
        payload.owner_user_id().ok().flatten().as_deref() == Some(actor.user_id.as_str())
    });
    if let Some(payload) = payload {
        let identity = payload.identity();
        actor.email = identity.email;
        actor.username = identity.username;
    }
    Some(actor)
}
