//! Application Configuration
//!
//! Configuration for the billing application layer.

use crate::domain::gateway::{CheckoutMode, ShippingOption};
use std::time::Duration;

/// Payment processor API access. Absent means checkout and cancellation
/// answer 503 while webhooks keep working.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub api_key: String,
    pub api_base_url: String,
}

impl ProcessorConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base_url: "https://api.stripe.com".to_string(),
        }
    }
}

/// A purchasable plan, addressed by name in the checkout path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanConfig {
    pub name: String,
    pub price_id: String,
    pub mode: CheckoutMode,
    pub allow_promotion_codes: bool,
    pub collect_shipping: bool,
}

/// Billing application configuration
#[derive(Debug, Clone)]
pub struct BillingConfig {
    /// Shared secret for webhook signatures
    pub webhook_secret: String,
    /// Max age of a signed webhook timestamp
    pub signature_tolerance: Duration,
    /// Base for checkout success/cancel redirects
    pub frontend_base_url: String,
    pub processor: Option<ProcessorConfig>,
    pub plans: Vec<PlanConfig>,
    pub shipping_countries: Vec<String>,
    pub shipping_options: Vec<ShippingOption>,
    /// Deadline for every ledger call
    pub store_timeout: Duration,
    /// Compare-and-set attempts before a write conflict is surfaced
    pub cas_retry_budget: u32,
    /// Deadline for outbound processor calls
    pub request_timeout: Duration,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            webhook_secret: String::new(),
            signature_tolerance: Duration::from_secs(300),
            frontend_base_url: "http://localhost:5173".to_string(),
            processor: None,
            plans: Vec::new(),
            shipping_countries: vec!["US".to_string(), "CA".to_string(), "IN".to_string()],
            shipping_options: vec![
                ShippingOption {
                    display_name: "Free shipping".to_string(),
                    amount: 0,
                    currency: "usd".to_string(),
                    min_business_days: 5,
                    max_business_days: 7,
                },
                ShippingOption {
                    display_name: "Standard shipping".to_string(),
                    amount: 200,
                    currency: "usd".to_string(),
                    min_business_days: 3,
                    max_business_days: 5,
                },
            ],
            store_timeout: Duration::from_secs(5),
            cas_retry_budget: 5,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl BillingConfig {
    /// The three standard plans for the given processor price ids
    pub fn with_standard_plans(
        mut self,
        basic_price_id: impl Into<String>,
        annual_price_id: impl Into<String>,
        newsletter_price_id: impl Into<String>,
    ) -> Self {
        self.plans = vec![
            PlanConfig {
                name: "basic".to_string(),
                price_id: basic_price_id.into(),
                mode: CheckoutMode::Payment,
                allow_promotion_codes: false,
                collect_shipping: true,
            },
            PlanConfig {
                name: "annual".to_string(),
                price_id: annual_price_id.into(),
                mode: CheckoutMode::Payment,
                allow_promotion_codes: true,
                collect_shipping: true,
            },
            PlanConfig {
                name: "newsletter".to_string(),
                price_id: newsletter_price_id.into(),
                mode: CheckoutMode::Subscription,
                allow_promotion_codes: true,
                collect_shipping: false,
            },
        ];
        self
    }

    /// Create config for development (fixed webhook secret, no processor)
    pub fn development() -> Self {
        Self {
            webhook_secret: "whsec_development".to_string(),
            ..Self::default()
        }
        .with_standard_plans("price_basic", "price_annual", "price_newsletter")
    }

    pub fn plan(&self, name: &str) -> Option<&PlanConfig> {
        self.plans.iter().find(|p| p.name == name)
    }

    pub fn success_url(&self) -> String {
        format!("{}/success", self.frontend_base_url.trim_end_matches('/'))
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/cancel", self.frontend_base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_plans() {
        let config = BillingConfig::development();
        let basic = config.plan("basic").unwrap();
        assert_eq!(basic.mode, CheckoutMode::Payment);
        assert!(!basic.allow_promotion_codes);
        assert!(basic.collect_shipping);

        let newsletter = config.plan("newsletter").unwrap();
        assert_eq!(newsletter.mode, CheckoutMode::Subscription);
        assert!(!newsletter.collect_shipping);

        assert!(config.plan("platinum").is_none());
    }

    #[test]
    fn test_redirect_urls() {
        let config = BillingConfig {
            frontend_base_url: "https://shop.example/".to_string(),
            ..BillingConfig::default()
        };
        assert_eq!(
            config.success_url(),
            "https://shop.example/success"
        );
        assert_eq!(config.cancel_url(), "https://shop.example/cancel");
    }
}
