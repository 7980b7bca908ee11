//! Authenticated actor
//!
//! The login collaborator (credentials, OAuth, TOTP) is outside this service's
//! core. All it hands over is who is acting: `{user_id, email, username}`.
//! Middleware places an [`Actor`] into request extensions once the session
//! resolves to a user; handlers extract it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Opaque user id issued by the login collaborator
    pub user_id: String,
    pub email: Option<String>,
    pub username: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email: None,
            username: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

#[cfg(feature = "axum")]
impl<S> axum::extract::FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = crate::error::app_error::AppError;

    async fn from_request_parts(
        parts: &mut http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Actor>().cloned().ok_or_else(|| {
            crate::error::app_error::AppError::unauthorized("Authentication required")
                .with_action("Sign in and retry")
        })
    }
}

#[cfg(all(test, feature = "axum"))]
mod tests {
    use super::*;
    use axum::extract::FromRequestParts;

    #[tokio::test]
    async fn test_actor_extracted_from_extensions() {
        let mut req = http::Request::builder().body(()).unwrap();
        req.extensions_mut()
            .insert(Actor::new("u1").with_email("u1@example.com"));
        let (mut parts, _) = req.into_parts();

        let actor = Actor::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(actor.user_id, "u1");
        assert_eq!(actor.email.as_deref(), Some("u1@example.com"));
    }

    #[tokio::test]
    async fn test_missing_actor_is_unauthorized() {
        let req = http::Request::builder().body(()).unwrap();
        let (mut parts, _) = req.into_parts();

        let err = Actor::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
