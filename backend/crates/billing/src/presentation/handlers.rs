//! HTTP Handlers

use crate::application::checkout::CreateCheckoutUseCase;
use crate::application::config::BillingConfig;
use crate::application::my_payments::{CancelSubscriptionUseCase, ListPaymentsUseCase};
use crate::application::normalizer::EventNormalizer;
use crate::application::reconcile::ReconcileUseCase;
use crate::application::signature::{SIGNATURE_HEADER, SignatureVerifier};
use crate::domain::gateway::PaymentGateway;
use crate::domain::repository::PaymentLedger;
use crate::error::{BillingError, BillingResult};
use crate::presentation::dto::{
    CancelSubscriptionResponse, CheckoutResponse, MyPaymentsResponse, PaymentView, WebhookAck,
};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use kernel::actor::Actor;
use std::sync::Arc;

/// Shared state for billing handlers
#[derive(Clone)]
pub struct BillingAppState<L, G>
where
    L: PaymentLedger + Clone + Send + Sync + 'static,
    G: PaymentGateway + Clone + Send + Sync + 'static,
{
    pub ledger: Arc<L>,
    /// `None` when no processor API key is configured
    pub gateway: Option<Arc<G>>,
    pub normalizer: Arc<EventNormalizer>,
    pub config: Arc<BillingConfig>,
}

impl<L, G> BillingAppState<L, G>
where
    L: PaymentLedger + Clone + Send + Sync + 'static,
    G: PaymentGateway + Clone + Send + Sync + 'static,
{
    pub fn new(ledger: L, gateway: Option<G>, config: BillingConfig) -> Self {
        let verifier =
            SignatureVerifier::new(&config.webhook_secret, config.signature_tolerance);
        Self {
            ledger: Arc::new(ledger),
            gateway: gateway.map(Arc::new),
            normalizer: Arc::new(EventNormalizer::new(verifier)),
            config: Arc::new(config),
        }
    }

    fn gateway(&self) -> BillingResult<Arc<G>> {
        self.gateway
            .clone()
            .ok_or(BillingError::ProcessorUnavailable)
    }
}

/// POST /api/payment/stripe/webhook
///
/// Consumes the raw body: the signature covers the exact bytes sent.
pub async fn stripe_webhook<L, G>(
    State(state): State<BillingAppState<L, G>>,
    headers: HeaderMap,
    body: Bytes,
) -> BillingResult<Json<WebhookAck>>
where
    L: PaymentLedger + Clone + Send + Sync + 'static,
    G: PaymentGateway + Clone + Send + Sync + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| BillingError::InvalidSignature("missing signature header".to_string()))?;

    let classified = state.normalizer.normalize(&body, signature)?;

    let use_case = ReconcileUseCase::new(state.ledger.clone(), state.config.clone());
    let outcome = use_case.execute(classified).await?;

    tracing::debug!(?outcome, "Webhook acknowledged");

    Ok(Json(WebhookAck { received: true }))
}

/// POST /api/payment/stripe/checkout/{plan}
pub async fn create_checkout<L, G>(
    State(state): State<BillingAppState<L, G>>,
    actor: Actor,
    Path(plan): Path<String>,
) -> BillingResult<Json<CheckoutResponse>>
where
    L: PaymentLedger + Clone + Send + Sync + 'static,
    G: PaymentGateway + Clone + Send + Sync + 'static,
{
    let use_case = CreateCheckoutUseCase::new(state.gateway()?, state.config.clone());
    let session = use_case.execute(&actor, &plan).await?;

    Ok(Json(CheckoutResponse {
        id: session.id,
        url: session.url,
    }))
}

/// GET /api/user/my-payments
pub async fn my_payments<L, G>(
    State(state): State<BillingAppState<L, G>>,
    actor: Actor,
) -> BillingResult<Json<MyPaymentsResponse>>
where
    L: PaymentLedger + Clone + Send + Sync + 'static,
    G: PaymentGateway + Clone + Send + Sync + 'static,
{
    let use_case = ListPaymentsUseCase::new(state.ledger.clone(), state.config.clone());
    let payments = use_case.execute(&actor).await?;

    Ok(Json(MyPaymentsResponse {
        success: true,
        payments: payments.into_iter().map(PaymentView::from).collect(),
    }))
}

/// DELETE /api/user/my-payments/{subscriptionId}
pub async fn cancel_subscription<L, G>(
    State(state): State<BillingAppState<L, G>>,
    actor: Actor,
    Path(subscription_id): Path<String>,
) -> BillingResult<Json<CancelSubscriptionResponse>>
where
    L: PaymentLedger + Clone + Send + Sync + 'static,
    G: PaymentGateway + Clone + Send + Sync + 'static,
{
    let use_case = CancelSubscriptionUseCase::new(
        state.ledger.clone(),
        state.gateway()?,
        state.config.clone(),
    );
    use_case.execute(&actor, &subscription_id).await?;

    Ok(Json(CancelSubscriptionResponse {
        success: true,
        message: "Subscription cancellation requested".to_string(),
        subscription_id,
    }))
}
