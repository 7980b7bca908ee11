//! Create Checkout Use Case

use crate::application::config::BillingConfig;
use crate::domain::gateway::{CheckoutMode, CheckoutRequest, CheckoutSession, PaymentGateway};
use crate::error::{BillingError, BillingResult};
use kernel::actor::Actor;
use std::sync::Arc;

pub struct CreateCheckoutUseCase<G>
where
    G: PaymentGateway,
{
    gateway: Arc<G>,
    config: Arc<BillingConfig>,
}

impl<G> CreateCheckoutUseCase<G>
where
    G: PaymentGateway,
{
    pub fn new(gateway: Arc<G>, config: Arc<BillingConfig>) -> Self {
        Self { gateway, config }
    }

    /// Open a hosted checkout for `plan` on behalf of `actor`
    pub async fn execute(&self, actor: &Actor, plan: &str) -> BillingResult<CheckoutSession> {
        let plan = self
            .config
            .plan(plan)
            .ok_or_else(|| BillingError::PlanNotFound(plan.to_string()))?;

        let customer_id = match &actor.email {
            Some(email) => Some(
                self.gateway
                    .create_customer(email, actor.username.as_deref())
                    .await?,
            ),
            None => None,
        };

        let (shipping_countries, shipping_options) = if plan.collect_shipping {
            (
                self.config.shipping_countries.clone(),
                self.config.shipping_options.clone(),
            )
        } else {
            (Vec::new(), Vec::new())
        };

        let request = CheckoutRequest {
            mode: plan.mode,
            price_id: plan.price_id.clone(),
            quantity: 1,
            success_url: self.config.success_url(),
            cancel_url: self.config.cancel_url(),
            client_reference_id: actor.user_id.clone(),
            customer_id,
            allow_promotion_codes: plan.allow_promotion_codes,
            automatic_tax: true,
            shipping_countries,
            shipping_options,
        };

        let session = self.gateway.create_checkout_session(&request).await?;

        tracing::info!(
            user_id = %actor.user_id,
            plan = %plan.name,
            subscription = plan.mode == CheckoutMode::Subscription,
            checkout_session_id = %session.id,
            "Checkout session created"
        );

        Ok(session)
    }
}
