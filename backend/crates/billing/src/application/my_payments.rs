//! Account Use Cases
//!
//! A signed-in user's view of their own ledger records.

use crate::application::config::BillingConfig;
use crate::application::reconcile::with_deadline;
use crate::domain::entity::payment::Payment;
use crate::domain::gateway::PaymentGateway;
use crate::domain::repository::PaymentLedger;
use crate::error::{BillingError, BillingResult};
use kernel::actor::Actor;
use std::sync::Arc;

pub struct ListPaymentsUseCase<L>
where
    L: PaymentLedger,
{
    ledger: Arc<L>,
    config: Arc<BillingConfig>,
}

impl<L> ListPaymentsUseCase<L>
where
    L: PaymentLedger,
{
    pub fn new(ledger: Arc<L>, config: Arc<BillingConfig>) -> Self {
        Self { ledger, config }
    }

    /// Newest first
    pub async fn execute(&self, actor: &Actor) -> BillingResult<Vec<Payment>> {
        with_deadline(
            self.config.store_timeout,
            self.ledger.find_by_user(&actor.user_id),
        )
        .await
    }
}

pub struct CancelSubscriptionUseCase<L, G>
where
    L: PaymentLedger,
    G: PaymentGateway,
{
    ledger: Arc<L>,
    gateway: Arc<G>,
    config: Arc<BillingConfig>,
}

impl<L, G> CancelSubscriptionUseCase<L, G>
where
    L: PaymentLedger,
    G: PaymentGateway,
{
    pub fn new(ledger: Arc<L>, gateway: Arc<G>, config: Arc<BillingConfig>) -> Self {
        Self {
            ledger,
            gateway,
            config,
        }
    }

    /// Ask the processor to cancel one of the actor's active subscriptions.
    ///
    /// The record stays `active` until the processor's deletion event is
    /// reconciled.
    pub async fn execute(&self, actor: &Actor, subscription_id: &str) -> BillingResult<()> {
        let payment = with_deadline(
            self.config.store_timeout,
            self.ledger
                .find_active_subscription(&actor.user_id, subscription_id),
        )
        .await?
        .ok_or(BillingError::SubscriptionNotFound)?;

        self.gateway.cancel_subscription(subscription_id).await?;

        tracing::info!(
            user_id = %actor.user_id,
            payment_id = %payment.payment_id,
            %subscription_id,
            "Subscription cancellation requested"
        );

        Ok(())
    }
}
