//! Sessions Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Session record and payload, repository trait
//! - `application/` - Store adapter, listing and revocation use cases
//! - `infra/` - PostgreSQL and in-memory repositories
//! - `presentation/` - Actor-resolving middleware, handlers, router
//!
//! ## Store Model
//! - One record per session id, overwritten on every write
//! - Owner comes from the payload's `userId` or `passport.user` and never
//!   changes once stored
//! - Expiry is the cookie's declared expiry, else write time plus the TTL
//! - Store failures propagate to the caller

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

pub use application::config::SessionConfig;
pub use application::store_adapter::SessionStoreAdapter;
pub use error::{SessionError, SessionResult};
pub use infra::memory::InMemorySessionRepository;
pub use infra::postgres::PgSessionRecordRepository;
pub use presentation::handlers::SessionAppState;
pub use presentation::middleware::{SessionMiddlewareState, resolve_actor};
pub use presentation::router::session_router;

pub mod models {
    pub use crate::domain::entity::session_payload::*;
    pub use crate::domain::entity::session_record::*;
    pub use crate::presentation::dto::*;
}

#[cfg(test)]
mod tests;
