//! Session Router
//!
//! Nested under `/api/user`. Expects [`resolve_actor`] to run in front of it.
//!
//! [`resolve_actor`]: crate::presentation::middleware::resolve_actor

use crate::domain::repository::SessionRecordRepository;
use crate::presentation::handlers::{self, SessionAppState};
use axum::{
    Router,
    routing::{delete, get},
};

pub fn session_router<R>(state: SessionAppState<R>) -> Router
where
    R: SessionRecordRepository + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/me", get(handlers::me))
        .route("/my-sessions", get(handlers::my_sessions::<R>))
        .route(
            "/my-sessions/{session_id}",
            delete(handlers::delete_my_session::<R>),
        )
        .with_state(state)
}
