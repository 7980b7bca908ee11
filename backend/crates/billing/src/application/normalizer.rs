//! Event Normalizer
//!
//! Authenticates a raw webhook delivery and turns it into exactly one
//! `ReconciliationCommand`, or classifies it as unhandled. Nothing is parsed
//! before the signature checks out.

use crate::application::signature::SignatureVerifier;
use crate::domain::command::{CheckoutCompleted, Classified, EventEnvelope, ReconciliationCommand};
use crate::domain::entity::payment::{
    Amounts, ChargeDetails, CustomerSnapshot, InvoiceRecord, PaymentKind,
};
use crate::error::{BillingError, BillingResult};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const INVOICE_PAYMENT_SUCCEEDED: &str = "invoice.payment_succeeded";
pub const INVOICE_PAYMENT_FAILED: &str = "invoice.payment_failed";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";
pub const CHARGE_SUCCEEDED: &str = "charge.succeeded";
pub const CHARGE_UPDATED: &str = "charge.updated";

#[derive(Debug, Clone)]
pub struct EventNormalizer {
    verifier: SignatureVerifier,
}

impl EventNormalizer {
    pub fn new(verifier: SignatureVerifier) -> Self {
        Self { verifier }
    }

    /// Verify, parse and classify a delivery received now
    pub fn normalize(&self, payload: &[u8], signature: &str) -> BillingResult<Classified> {
        self.normalize_at(payload, signature, Utc::now().timestamp())
    }

    pub fn normalize_at(
        &self,
        payload: &[u8],
        signature: &str,
        now_unix: i64,
    ) -> BillingResult<Classified> {
        self.verifier.verify(payload, signature, now_unix)?;
        let envelope = parse_envelope(payload)?;
        classify(envelope)
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: Option<i64>,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: Value,
}

fn parse_envelope(payload: &[u8]) -> BillingResult<EventEnvelope> {
    let raw: RawEvent = serde_json::from_slice(payload)
        .map_err(|e| BillingError::MalformedEvent(format!("event envelope: {e}")))?;
    if raw.id.is_empty() {
        return Err(BillingError::MalformedEvent("event id is empty".to_string()));
    }
    Ok(EventEnvelope {
        event_id: raw.id,
        event_type: raw.event_type,
        created: raw.created.and_then(|s| DateTime::from_timestamp(s, 0)),
        object: raw.data.object,
    })
}

/// Map an authenticated envelope onto the closed command set
pub fn classify(envelope: EventEnvelope) -> BillingResult<Classified> {
    let command = match envelope.event_type.as_str() {
        CHECKOUT_SESSION_COMPLETED => checkout_completed(&envelope)?,
        INVOICE_PAYMENT_SUCCEEDED => invoice_payment_succeeded(&envelope)?,
        INVOICE_PAYMENT_FAILED => invoice_payment_failed(&envelope)?,
        SUBSCRIPTION_DELETED => subscription_canceled(&envelope)?,
        CHARGE_SUCCEEDED => charge(&envelope)?.map(|(payment_intent_id, charge)| {
            ReconciliationCommand::ChargeSucceeded {
                payment_intent_id,
                charge,
            }
        }),
        CHARGE_UPDATED => charge(&envelope)?.map(|(payment_intent_id, charge)| {
            // A charge update never carries a new charge id.
            let charge = ChargeDetails {
                charge_id: None,
                ..charge
            };
            ReconciliationCommand::ChargeUpdated {
                payment_intent_id,
                charge,
            }
        }),
        other => {
            let reason = format!("event type {other} is not reconciled");
            return Ok(Classified::Unhandled { envelope, reason });
        }
    };

    Ok(match command {
        Some(command) => Classified::Command { envelope, command },
        None => Classified::Unhandled {
            reason: format!("{} carries no ledger reference", envelope.event_type),
            envelope,
        },
    })
}

/// Either a bare id or an expanded object with an `id`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expandable {
    Id(String),
    Object { id: String },
}

fn expandable_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Expandable>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        Expandable::Id(id) | Expandable::Object { id } => id,
    }))
}

fn object_as<T: DeserializeOwned>(envelope: &EventEnvelope) -> BillingResult<T> {
    serde_json::from_value(envelope.object.clone()).map_err(|e| {
        BillingError::MalformedEvent(format!("{} object: {e}", envelope.event_type))
    })
}

fn required<T>(value: Option<T>, event_type: &str, field: &str) -> BillingResult<T> {
    value.ok_or_else(|| BillingError::MalformedEvent(format!("{event_type}: missing {field}")))
}

#[derive(Debug, Deserialize)]
struct RawCheckoutSession {
    id: Option<String>,
    mode: Option<String>,
    client_reference_id: Option<String>,
    #[serde(default, deserialize_with = "expandable_id")]
    payment_intent: Option<String>,
    #[serde(default, deserialize_with = "expandable_id")]
    subscription: Option<String>,
    amount_subtotal: Option<i64>,
    amount_total: Option<i64>,
    currency: Option<String>,
    total_details: Option<RawTotalDetails>,
    customer_details: Option<RawCustomerDetails>,
    shipping: Option<Value>,
    shipping_details: Option<Value>,
    discounts: Option<Vec<RawDiscount>>,
}

#[derive(Debug, Deserialize)]
struct RawTotalDetails {
    amount_discount: Option<i64>,
    amount_tax: Option<i64>,
    amount_shipping: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawCustomerDetails {
    email: Option<String>,
    name: Option<String>,
    address: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawDiscount {
    #[serde(default, deserialize_with = "expandable_id")]
    promotion_code: Option<String>,
}

fn checkout_completed(envelope: &EventEnvelope) -> BillingResult<Option<ReconciliationCommand>> {
    let t = CHECKOUT_SESSION_COMPLETED;
    let session: RawCheckoutSession = object_as(envelope)?;

    let kind = match session.mode.as_deref() {
        Some("payment") => PaymentKind::OneTime,
        Some("subscription") => PaymentKind::Subscription,
        // setup-mode sessions move no money
        _ => return Ok(None),
    };

    let checkout_session_id = required(session.id, t, "id")?;
    let user_id = required(session.client_reference_id, t, "client_reference_id")?;
    let total = required(session.amount_total, t, "amount_total")?;
    let currency = required(session.currency, t, "currency")?;
    let subscription_id = match kind {
        PaymentKind::Subscription => Some(required(session.subscription, t, "subscription")?),
        PaymentKind::OneTime => None,
    };

    let (discount, tax, shipping) = session
        .total_details
        .map(|d| {
            (
                d.amount_discount.unwrap_or(0),
                d.amount_tax.unwrap_or(0),
                d.amount_shipping.unwrap_or(0),
            )
        })
        .unwrap_or((0, 0, 0));
    // Subtotal is stored net of discounts, so it never exceeds the total.
    let subtotal = match session.amount_subtotal {
        Some(gross) => gross.saturating_sub(discount).max(0),
        None => total,
    };
    let customer = session.customer_details;

    Ok(Some(ReconciliationCommand::CheckoutCompleted(
        CheckoutCompleted {
            checkout_session_id,
            kind,
            user_id,
            payment_intent_id: session.payment_intent,
            subscription_id,
            amounts: Amounts {
                subtotal,
                tax,
                shipping,
                total,
                currency: currency.to_ascii_lowercase(),
            },
            customer: CustomerSnapshot {
                email: customer.as_ref().and_then(|c| c.email.clone()),
                name: customer.as_ref().and_then(|c| c.name.clone()),
                address: customer.and_then(|c| c.address),
                shipping: session.shipping.or(session.shipping_details),
            },
            promotion_code_id: session
                .discounts
                .and_then(|d| d.into_iter().next())
                .and_then(|d| d.promotion_code),
        },
    )))
}

#[derive(Debug, Deserialize)]
struct RawInvoice {
    id: Option<String>,
    #[serde(default, deserialize_with = "expandable_id")]
    subscription: Option<String>,
    parent: Option<RawInvoiceParent>,
    amount_paid: Option<i64>,
    currency: Option<String>,
    status_transitions: Option<RawStatusTransitions>,
    hosted_invoice_url: Option<String>,
    invoice_pdf: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawInvoiceParent {
    subscription_details: Option<RawSubscriptionDetails>,
}

#[derive(Debug, Deserialize)]
struct RawSubscriptionDetails {
    #[serde(default, deserialize_with = "expandable_id")]
    subscription: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawStatusTransitions {
    paid_at: Option<i64>,
}

impl RawInvoice {
    /// Newer API versions nest the subscription under `parent`
    fn subscription_id(&self) -> Option<String> {
        self.parent
            .as_ref()
            .and_then(|p| p.subscription_details.as_ref())
            .and_then(|d| d.subscription.clone())
            .or_else(|| self.subscription.clone())
    }
}

fn invoice_payment_succeeded(
    envelope: &EventEnvelope,
) -> BillingResult<Option<ReconciliationCommand>> {
    let t = INVOICE_PAYMENT_SUCCEEDED;
    let invoice: RawInvoice = object_as(envelope)?;
    // One-off invoices are not tied to a subscription record.
    let Some(subscription_id) = invoice.subscription_id() else {
        return Ok(None);
    };

    let record = InvoiceRecord {
        invoice_id: required(invoice.id, t, "id")?,
        amount_paid: required(invoice.amount_paid, t, "amount_paid")?,
        currency: required(invoice.currency, t, "currency")?.to_ascii_lowercase(),
        paid_at: invoice
            .status_transitions
            .and_then(|s| s.paid_at)
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        hosted_invoice_url: invoice.hosted_invoice_url,
        invoice_pdf: invoice.invoice_pdf,
    };

    Ok(Some(ReconciliationCommand::InvoicePaymentSucceeded {
        subscription_id,
        invoice: record,
    }))
}

fn invoice_payment_failed(
    envelope: &EventEnvelope,
) -> BillingResult<Option<ReconciliationCommand>> {
    let invoice: RawInvoice = object_as(envelope)?;
    let Some(subscription_id) = invoice.subscription_id() else {
        return Ok(None);
    };
    Ok(Some(ReconciliationCommand::InvoicePaymentFailed {
        subscription_id,
        invoice_id: invoice.id,
    }))
}

#[derive(Debug, Deserialize)]
struct RawSubscription {
    id: Option<String>,
}

fn subscription_canceled(
    envelope: &EventEnvelope,
) -> BillingResult<Option<ReconciliationCommand>> {
    let subscription: RawSubscription = object_as(envelope)?;
    let subscription_id = required(subscription.id, SUBSCRIPTION_DELETED, "id")?;
    Ok(Some(ReconciliationCommand::SubscriptionCanceled { subscription_id }))
}

#[derive(Debug, Deserialize)]
struct RawCharge {
    id: Option<String>,
    #[serde(default, deserialize_with = "expandable_id")]
    payment_intent: Option<String>,
    receipt_url: Option<String>,
    #[serde(default, deserialize_with = "expandable_id")]
    balance_transaction: Option<String>,
}

fn charge(envelope: &EventEnvelope) -> BillingResult<Option<(String, ChargeDetails)>> {
    let charge: RawCharge = object_as(envelope)?;
    // Charges created outside a payment intent cannot be correlated.
    let Some(payment_intent_id) = charge.payment_intent else {
        return Ok(None);
    };
    let charge_id = required(charge.id, &envelope.event_type, "id")?;
    Ok(Some((
        payment_intent_id,
        ChargeDetails {
            charge_id: Some(charge_id),
            receipt_url: charge.receipt_url,
            balance_transaction_id: charge.balance_transaction,
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    const SECRET: &str = "whsec_normalizer";
    const NOW: i64 = 1_700_000_000;

    fn envelope(event_type: &str, object: Value) -> EventEnvelope {
        EventEnvelope {
            event_id: "evt_1".to_string(),
            event_type: event_type.to_string(),
            created: None,
            object,
        }
    }

    fn checkout_object() -> Value {
        json!({
            "id": "cs_1",
            "mode": "payment",
            "client_reference_id": "u1",
            "payment_intent": "pi_1",
            "amount_subtotal": 1000,
            "amount_total": 1280,
            "currency": "USD",
            "total_details": { "amount_tax": 80, "amount_shipping": 200 },
            "customer_details": { "email": "a@example.com", "name": "A", "address": { "country": "US" } },
            "shipping": { "name": "A" },
            "discounts": [{ "promotion_code": "promo_1" }, { "promotion_code": "promo_2" }]
        })
    }

    fn command(classified: Classified) -> ReconciliationCommand {
        match classified {
            Classified::Command { command, .. } => command,
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[test]
    fn test_checkout_one_time() {
        let cmd = command(classify(envelope(CHECKOUT_SESSION_COMPLETED, checkout_object())).unwrap());
        let ReconciliationCommand::CheckoutCompleted(c) = cmd else {
            panic!("wrong command");
        };
        assert_eq!(c.kind, PaymentKind::OneTime);
        assert_eq!(c.user_id, "u1");
        assert_eq!(c.payment_intent_id.as_deref(), Some("pi_1"));
        assert_eq!(c.amounts.tax, 80);
        assert_eq!(c.amounts.shipping, 200);
        assert_eq!(c.amounts.currency, "usd");
        assert_eq!(c.customer.email.as_deref(), Some("a@example.com"));
        assert_eq!(c.promotion_code_id.as_deref(), Some("promo_1"));
    }

    #[test]
    fn test_checkout_subtotal_net_of_discount() {
        let mut obj = checkout_object();
        obj["amount_total"] = json!(800);
        obj["total_details"] = json!({ "amount_discount": 200, "amount_tax": 0, "amount_shipping": 0 });
        let ReconciliationCommand::CheckoutCompleted(c) =
            command(classify(envelope(CHECKOUT_SESSION_COMPLETED, obj)).unwrap())
        else {
            panic!("wrong command");
        };
        assert_eq!(c.amounts.subtotal, 800);
        assert_eq!(c.amounts.total, 800);
        assert_eq!(c.promotion_code_id.as_deref(), Some("promo_1"));
    }

    #[test]
    fn test_checkout_discount_larger_than_subtotal_floors_at_zero() {
        let mut obj = checkout_object();
        obj["amount_total"] = json!(0);
        obj["total_details"] = json!({ "amount_discount": 1500 });
        let ReconciliationCommand::CheckoutCompleted(c) =
            command(classify(envelope(CHECKOUT_SESSION_COMPLETED, obj)).unwrap())
        else {
            panic!("wrong command");
        };
        assert_eq!(c.amounts.subtotal, 0);
    }

    #[test]
    fn test_checkout_tax_defaults_to_zero() {
        let mut obj = checkout_object();
        obj["total_details"] = json!(null);
        let ReconciliationCommand::CheckoutCompleted(c) =
            command(classify(envelope(CHECKOUT_SESSION_COMPLETED, obj)).unwrap())
        else {
            panic!("wrong command");
        };
        assert_eq!(c.amounts.tax, 0);
        assert_eq!(c.amounts.shipping, 0);
    }

    #[test]
    fn test_checkout_subscription_requires_subscription_id() {
        let mut obj = checkout_object();
        obj["mode"] = json!("subscription");
        let err = classify(envelope(CHECKOUT_SESSION_COMPLETED, obj.clone())).unwrap_err();
        assert!(matches!(err, BillingError::MalformedEvent(_)));

        obj["subscription"] = json!({ "id": "sub_1", "object": "subscription" });
        let ReconciliationCommand::CheckoutCompleted(c) =
            command(classify(envelope(CHECKOUT_SESSION_COMPLETED, obj)).unwrap())
        else {
            panic!("wrong command");
        };
        assert_eq!(c.kind, PaymentKind::Subscription);
        assert_eq!(c.subscription_id.as_deref(), Some("sub_1"));
    }

    #[test]
    fn test_checkout_missing_user_is_malformed() {
        let mut obj = checkout_object();
        obj.as_object_mut().unwrap().remove("client_reference_id");
        let err = classify(envelope(CHECKOUT_SESSION_COMPLETED, obj)).unwrap_err();
        assert!(matches!(err, BillingError::MalformedEvent(m) if m.contains("client_reference_id")));
    }

    #[test]
    fn test_checkout_setup_mode_unhandled() {
        let mut obj = checkout_object();
        obj["mode"] = json!("setup");
        let classified = classify(envelope(CHECKOUT_SESSION_COMPLETED, obj)).unwrap();
        assert!(matches!(classified, Classified::Unhandled { .. }));
    }

    #[test]
    fn test_invoice_subscription_from_parent() {
        let obj = json!({
            "id": "in_1",
            "subscription": "sub_old",
            "parent": { "subscription_details": { "subscription": "sub_1" } },
            "amount_paid": 500,
            "currency": "usd",
            "status_transitions": { "paid_at": 1_700_000_000 },
            "hosted_invoice_url": "https://invoice",
            "invoice_pdf": "https://pdf"
        });
        let cmd = command(classify(envelope(INVOICE_PAYMENT_SUCCEEDED, obj)).unwrap());
        let ReconciliationCommand::InvoicePaymentSucceeded {
            subscription_id,
            invoice,
        } = cmd
        else {
            panic!("wrong command");
        };
        assert_eq!(subscription_id, "sub_1");
        assert_eq!(invoice.invoice_id, "in_1");
        assert_eq!(invoice.paid_at.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_invoice_failed_falls_back_to_top_level_subscription() {
        let obj = json!({ "id": "in_2", "subscription": "sub_1" });
        let cmd = command(classify(envelope(INVOICE_PAYMENT_FAILED, obj)).unwrap());
        assert_eq!(
            cmd,
            ReconciliationCommand::InvoicePaymentFailed {
                subscription_id: "sub_1".to_string(),
                invoice_id: Some("in_2".to_string())
            }
        );
    }

    #[test]
    fn test_invoice_without_subscription_unhandled() {
        let obj = json!({ "id": "in_3", "amount_paid": 100, "currency": "usd" });
        let classified = classify(envelope(INVOICE_PAYMENT_SUCCEEDED, obj)).unwrap();
        assert!(matches!(classified, Classified::Unhandled { .. }));
    }

    #[test]
    fn test_subscription_deleted_requires_id() {
        let err = classify(envelope(SUBSCRIPTION_DELETED, json!({}))).unwrap_err();
        assert!(matches!(err, BillingError::MalformedEvent(_)));
    }

    #[test]
    fn test_charge_updated_drops_charge_id() {
        let obj = json!({
            "id": "ch_1",
            "payment_intent": "pi_1",
            "receipt_url": "https://receipt",
            "balance_transaction": "txn_1"
        });
        let cmd = command(classify(envelope(CHARGE_UPDATED, obj)).unwrap());
        let ReconciliationCommand::ChargeUpdated {
            payment_intent_id,
            charge,
        } = cmd
        else {
            panic!("wrong command");
        };
        assert_eq!(payment_intent_id, "pi_1");
        assert_eq!(charge.charge_id, None);
        assert_eq!(charge.balance_transaction_id.as_deref(), Some("txn_1"));
    }

    #[test]
    fn test_unknown_type_unhandled() {
        let classified = classify(envelope("customer.created", json!({ "id": "cus_1" }))).unwrap();
        assert!(matches!(classified, Classified::Unhandled { .. }));
    }

    #[test]
    fn test_normalize_verifies_before_parsing() {
        let normalizer =
            EventNormalizer::new(SignatureVerifier::new(SECRET, Duration::from_secs(300)));
        let err = normalizer
            .normalize_at(b"not json", "t=1,v1=00", NOW)
            .unwrap_err();
        assert!(matches!(err, BillingError::InvalidSignature(_)));
    }

    #[test]
    fn test_normalize_authentic_garbage_is_malformed() {
        let verifier = SignatureVerifier::new(SECRET, Duration::from_secs(300));
        let header = verifier.header_for(NOW, b"not json");
        let err = EventNormalizer::new(verifier)
            .normalize_at(b"not json", &header, NOW)
            .unwrap_err();
        assert!(matches!(err, BillingError::MalformedEvent(_)));
    }

    #[test]
    fn test_normalize_full_event() {
        let verifier = SignatureVerifier::new(SECRET, Duration::from_secs(300));
        let body = serde_json::to_vec(&json!({
            "id": "evt_42",
            "type": SUBSCRIPTION_DELETED,
            "created": NOW,
            "data": { "object": { "id": "sub_1" } }
        }))
        .unwrap();
        let header = verifier.header_for(NOW, &body);
        let classified = EventNormalizer::new(verifier)
            .normalize_at(&body, &header, NOW)
            .unwrap();
        assert_eq!(classified.envelope().event_id, "evt_42");
        assert_eq!(
            command(classified),
            ReconciliationCommand::SubscriptionCanceled {
                subscription_id: "sub_1".to_string()
            }
        );
    }
}
