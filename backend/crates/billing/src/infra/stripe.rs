//! Payment Processor Client
//!
//! Form-encoded calls against the processor's REST API.

use crate::application::config::ProcessorConfig;
use crate::domain::gateway::{CheckoutRequest, CheckoutSession, PaymentGateway};
use crate::error::{BillingError, BillingResult};
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone)]
pub struct StripeGateway {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl StripeGateway {
    pub fn new(config: &ProcessorConfig, timeout: Duration) -> BillingResult<Self> {
        Ok(Self {
            client: platform::http_client::build_client(timeout)?,
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> BillingResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .map(|e| {
                format!(
                    "{}: {}",
                    e.error.kind.unwrap_or_else(|| "api_error".to_string()),
                    e.error.message.unwrap_or_default()
                )
            })
            .unwrap_or_else(|| format!("HTTP {status}"));
        Err(BillingError::Processor(message))
    }
}

/// Form fields for a checkout session request
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), request.mode.as_str().into()),
        ("payment_method_types[0]".into(), "card".into()),
        ("line_items[0][price]".into(), request.price_id.clone()),
        ("line_items[0][quantity]".into(), request.quantity.to_string()),
        ("success_url".into(), request.success_url.clone()),
        ("cancel_url".into(), request.cancel_url.clone()),
        ("client_reference_id".into(), request.client_reference_id.clone()),
        (
            "allow_promotion_codes".into(),
            request.allow_promotion_codes.to_string(),
        ),
        (
            "automatic_tax[enabled]".into(),
            request.automatic_tax.to_string(),
        ),
    ];

    if let Some(customer) = &request.customer_id {
        form.push(("customer".into(), customer.clone()));
        form.push(("customer_update[shipping]".into(), "auto".into()));
        form.push(("customer_update[address]".into(), "auto".into()));
    }

    for (i, country) in request.shipping_countries.iter().enumerate() {
        form.push((
            format!("shipping_address_collection[allowed_countries][{i}]"),
            country.clone(),
        ));
    }

    for (i, option) in request.shipping_options.iter().enumerate() {
        let prefix = format!("shipping_options[{i}][shipping_rate_data]");
        form.push((format!("{prefix}[type]"), "fixed_amount".into()));
        form.push((
            format!("{prefix}[fixed_amount][amount]"),
            option.amount.to_string(),
        ));
        form.push((
            format!("{prefix}[fixed_amount][currency]"),
            option.currency.clone(),
        ));
        form.push((format!("{prefix}[display_name]"), option.display_name.clone()));
        form.push((
            format!("{prefix}[delivery_estimate][minimum][unit]"),
            "business_day".into(),
        ));
        form.push((
            format!("{prefix}[delivery_estimate][minimum][value]"),
            option.min_business_days.to_string(),
        ));
        form.push((
            format!("{prefix}[delivery_estimate][maximum][unit]"),
            "business_day".into(),
        ));
        form.push((
            format!("{prefix}[delivery_estimate][maximum][value]"),
            option.max_business_days.to_string(),
        ));
    }

    form
}

impl PaymentGateway for StripeGateway {
    async fn create_customer(&self, email: &str, name: Option<&str>) -> BillingResult<String> {
        let mut form = vec![("email", email)];
        if let Some(name) = name {
            form.push(("name", name));
        }

        let response = self
            .client
            .post(self.url("/v1/customers"))
            .bearer_auth(&self.api_key)
            .form(&form)
            .send()
            .await?;
        let customer: IdResponse = Self::read(response).await?;
        Ok(customer.id)
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> BillingResult<CheckoutSession> {
        let response = self
            .client
            .post(self.url("/v1/checkout/sessions"))
            .bearer_auth(&self.api_key)
            .form(&checkout_form(request))
            .send()
            .await?;
        let session: CheckoutSessionResponse = Self::read(response).await?;
        Ok(CheckoutSession {
            id: session.id,
            url: session.url,
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> BillingResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/v1/subscriptions/{subscription_id}")))
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let _: IdResponse = Self::read(response).await?;
        Ok(())
    }
}
