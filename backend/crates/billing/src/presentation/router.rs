//! Billing Routers
//!
//! `payment_router` is nested under `/api/payment`, `account_router` under
//! `/api/user`. Both expect an actor-resolving layer in front of them for
//! the routes that need a signed-in user.

use crate::domain::gateway::PaymentGateway;
use crate::domain::repository::PaymentLedger;
use crate::presentation::handlers::{self, BillingAppState};
use axum::{
    Router,
    routing::{delete, get, post},
};

/// Webhook receiver and checkout creation
pub fn payment_router<L, G>(state: BillingAppState<L, G>) -> Router
where
    L: PaymentLedger + Clone + Send + Sync + 'static,
    G: PaymentGateway + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/stripe/webhook", post(handlers::stripe_webhook::<L, G>))
        .route(
            "/stripe/checkout/{plan}",
            post(handlers::create_checkout::<L, G>),
        )
        .with_state(state)
}

/// The signed-in user's own payments
pub fn account_router<L, G>(state: BillingAppState<L, G>) -> Router
where
    L: PaymentLedger + Clone + Send + Sync + 'static,
    G: PaymentGateway + Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/my-payments", get(handlers::my_payments::<L, G>))
        .route(
            "/my-payments/{subscription_id}",
            delete(handlers::cancel_subscription::<L, G>),
        )
        .with_state(state)
}
