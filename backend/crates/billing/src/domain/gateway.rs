//! Payment Processor Port
//!
//! Outbound calls to the payment processor's API.

use crate::error::BillingResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutMode {
    Payment,
    Subscription,
}

impl CheckoutMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutMode::Payment => "payment",
            CheckoutMode::Subscription => "subscription",
        }
    }
}

/// Flat-rate shipping choice offered at checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingOption {
    pub display_name: String,
    /// Minor units
    pub amount: i64,
    pub currency: String,
    pub min_business_days: u32,
    pub max_business_days: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub mode: CheckoutMode,
    pub price_id: String,
    pub quantity: u32,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    pub customer_id: Option<String>,
    pub allow_promotion_codes: bool,
    pub automatic_tax: bool,
    /// Empty when the plan ships nothing
    pub shipping_countries: Vec<String>,
    pub shipping_options: Vec<ShippingOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[trait_variant::make(PaymentGateway: Send)]
pub trait LocalPaymentGateway {
    /// Create a processor-side customer and return its id
    async fn create_customer(&self, email: &str, name: Option<&str>) -> BillingResult<String>;

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> BillingResult<CheckoutSession>;

    /// Ask the processor to cancel. The ledger changes only when the
    /// resulting webhook arrives.
    async fn cancel_subscription(&self, subscription_id: &str) -> BillingResult<()>;
}
