//! Billing Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Payment ledger entity, reconciliation commands, repository/gateway traits
//! - `application/` - Event normalizer, reconciliation engine, checkout and account use cases
//! - `infra/` - PostgreSQL and in-memory ledgers, payment processor client
//! - `presentation/` - HTTP handlers, DTOs, routers
//!
//! ## Reconciliation Model
//! - Webhook deliveries are authenticated (HMAC-SHA256) before anything is parsed
//! - Deliveries may arrive out of order and more than once; every handler is an
//!   idempotent merge keyed by processor event id
//! - A Payment is created exactly once per checkout session id
//! - `canceled` is terminal; nothing moves a record out of it
//! - Concurrent updates of one record serialize through a compare-and-set on
//!   the row version, never through in-process locks

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

pub use application::config::BillingConfig;
pub use error::{BillingError, BillingResult};
pub use infra::memory::InMemoryPaymentLedger;
pub use infra::postgres::PgPaymentLedger;
pub use infra::stripe::StripeGateway;
pub use presentation::handlers::BillingAppState;
pub use presentation::router::{account_router, payment_router};

pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod models {
    pub use crate::domain::command::*;
    pub use crate::domain::entity::payment::*;
    pub use crate::domain::mutation::*;
    pub use crate::presentation::dto::*;
}
