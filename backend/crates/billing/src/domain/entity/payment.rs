//! Payment Entity
//!
//! One Payment exists per checkout session. Every later webhook event is
//! merged into it and appended to its audit log.

use chrono::{DateTime, Utc};
use kernel::id::PaymentId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One-time purchase or recurring subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    OneTime,
    Subscription,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::OneTime => "one_time",
            PaymentKind::Subscription => "subscription",
        }
    }
}

impl fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "one_time" => Ok(PaymentKind::OneTime),
            "subscription" => Ok(PaymentKind::Subscription),
            other => Err(format!("unknown payment kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Active,
    PastDue,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Active => "active",
            PaymentStatus::PastDue => "past_due",
            PaymentStatus::Canceled => "canceled",
        }
    }

    /// Status a freshly completed checkout starts in
    pub fn initial(kind: PaymentKind) -> Self {
        match kind {
            PaymentKind::OneTime => PaymentStatus::Paid,
            PaymentKind::Subscription => PaymentStatus::Active,
        }
    }

    /// No event moves a record out of a terminal status.
    ///
    /// `canceled` is terminal for every kind; a settled one-time payment is
    /// terminal as well.
    pub fn is_terminal(&self, kind: PaymentKind) -> bool {
        match self {
            PaymentStatus::Canceled => true,
            PaymentStatus::Paid => kind == PaymentKind::OneTime,
            PaymentStatus::Active | PaymentStatus::PastDue => false,
        }
    }

    /// `paid` belongs to one-time payments, `active` and `past_due` to
    /// subscriptions. Either kind can be canceled.
    pub fn applies_to(&self, kind: PaymentKind) -> bool {
        match self {
            PaymentStatus::Paid => kind == PaymentKind::OneTime,
            PaymentStatus::Active | PaymentStatus::PastDue => kind == PaymentKind::Subscription,
            PaymentStatus::Canceled => true,
        }
    }

    pub fn can_transition_to(&self, kind: PaymentKind, next: PaymentStatus) -> bool {
        *self == next || !self.is_terminal(kind)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "active" => Ok(PaymentStatus::Active),
            "past_due" => Ok(PaymentStatus::PastDue),
            "canceled" => Ok(PaymentStatus::Canceled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// Amounts in the currency's minor unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amounts {
    pub subtotal: i64,
    pub tax: i64,
    pub shipping: i64,
    pub total: i64,
    pub currency: String,
}

/// Customer snapshot taken at checkout completion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    pub email: Option<String>,
    pub name: Option<String>,
    pub address: Option<Value>,
    pub shipping: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeDetails {
    pub charge_id: Option<String>,
    pub receipt_url: Option<String>,
    pub balance_transaction_id: Option<String>,
}

impl ChargeDetails {
    /// Overwrite fields that `patch` carries, keep the rest
    pub fn merge(&mut self, patch: &ChargeDetails) {
        if let Some(id) = &patch.charge_id {
            self.charge_id = Some(id.clone());
        }
        if let Some(url) = &patch.receipt_url {
            self.receipt_url = Some(url.clone());
        }
        if let Some(tx) = &patch.balance_transaction_id {
            self.balance_transaction_id = Some(tx.clone());
        }
    }
}

/// A settled subscription invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    pub invoice_id: String,
    pub amount_paid: i64,
    pub currency: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub hosted_invoice_url: Option<String>,
    pub invoice_pdf: Option<String>,
}

/// Which handler produced an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    CheckoutComplete,
    PaymentSucceeded,
    InvoiceFailed,
    SubscriptionDelete,
    ChargeSucceeded,
    // Older rows carry the misspelled tag.
    #[serde(alias = "charge_upadate")]
    ChargeUpdated,
}

/// One processed event, kept verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub event_id: String,
    pub category: AuditCategory,
    pub received_at: DateTime<Utc>,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub payment_id: PaymentId,
    pub user_id: String,
    pub kind: PaymentKind,
    pub checkout_session_id: String,
    pub payment_intent_id: Option<String>,
    pub subscription_id: Option<String>,
    pub charge: ChargeDetails,
    pub amounts: Amounts,
    pub status: PaymentStatus,
    pub customer: CustomerSnapshot,
    pub promotion_code_id: Option<String>,
    pub invoices: Vec<InvoiceRecord>,
    pub audit_log: Vec<AuditEntry>,
    /// Compare-and-set token, bumped by every persisted mutation
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Reject records the store must never hold
    pub fn validate(&self) -> Result<(), String> {
        if self.checkout_session_id.trim().is_empty() {
            return Err("checkout session id is empty".to_string());
        }
        if self.user_id.trim().is_empty() {
            return Err("user id is empty".to_string());
        }
        let currency = &self.amounts.currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("currency '{currency}' is not a 3-letter code"));
        }
        let Amounts {
            subtotal,
            tax,
            shipping,
            total,
            ..
        } = self.amounts;
        if subtotal < 0 || tax < 0 || shipping < 0 || total < 0 {
            return Err("amounts must not be negative".to_string());
        }
        if total < subtotal {
            return Err(format!(
                "amount total {total} is below subtotal {subtotal}"
            ));
        }
        if self.kind == PaymentKind::Subscription && self.subscription_id.is_none() {
            return Err("subscription payment without subscription id".to_string());
        }
        Ok(())
    }

    pub fn has_event(&self, event_id: &str) -> bool {
        self.audit_log.iter().any(|e| e.event_id == event_id)
    }

    pub fn has_invoice(&self, invoice_id: &str) -> bool {
        self.invoices.iter().any(|i| i.invoice_id == invoice_id)
    }

    pub fn is_active_subscription(&self) -> bool {
        self.kind == PaymentKind::Subscription && self.status == PaymentStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Payment {
        let now = Utc::now();
        Payment {
            payment_id: PaymentId::new(),
            user_id: "u1".to_string(),
            kind: PaymentKind::Subscription,
            checkout_session_id: "cs_1".to_string(),
            payment_intent_id: None,
            subscription_id: Some("sub_1".to_string()),
            charge: ChargeDetails::default(),
            amounts: Amounts {
                subtotal: 1000,
                tax: 80,
                shipping: 0,
                total: 1080,
                currency: "usd".to_string(),
            },
            status: PaymentStatus::Active,
            customer: CustomerSnapshot::default(),
            promotion_code_id: None,
            invoices: vec![],
            audit_log: vec![],
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_valid_payment() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_total_below_subtotal_rejected() {
        let mut p = sample();
        p.amounts.total = 999;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_bad_currency_rejected() {
        let mut p = sample();
        p.amounts.currency = "us".to_string();
        assert!(p.validate().is_err());
        p.amounts.currency = "u5d".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_empty_checkout_session_rejected() {
        let mut p = sample();
        p.checkout_session_id = " ".to_string();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_subscription_requires_subscription_id() {
        let mut p = sample();
        p.subscription_id = None;
        assert!(p.validate().is_err());
        p.kind = PaymentKind::OneTime;
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_canceled_is_terminal() {
        for kind in [PaymentKind::OneTime, PaymentKind::Subscription] {
            for next in [
                PaymentStatus::Paid,
                PaymentStatus::Active,
                PaymentStatus::PastDue,
            ] {
                assert!(!PaymentStatus::Canceled.can_transition_to(kind, next));
            }
            assert!(PaymentStatus::Canceled.can_transition_to(kind, PaymentStatus::Canceled));
        }
    }

    #[test]
    fn test_subscription_statuses_move_freely() {
        let k = PaymentKind::Subscription;
        assert!(PaymentStatus::Active.can_transition_to(k, PaymentStatus::PastDue));
        assert!(PaymentStatus::PastDue.can_transition_to(k, PaymentStatus::Active));
        assert!(PaymentStatus::Active.can_transition_to(k, PaymentStatus::Canceled));
    }

    #[test]
    fn test_one_time_paid_is_terminal() {
        assert!(!PaymentStatus::Paid.can_transition_to(PaymentKind::OneTime, PaymentStatus::Active));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentKind::OneTime, PaymentStatus::Paid));
    }

    #[test]
    fn test_status_applies_to_kind() {
        assert!(PaymentStatus::Paid.applies_to(PaymentKind::OneTime));
        assert!(!PaymentStatus::Paid.applies_to(PaymentKind::Subscription));
        assert!(!PaymentStatus::PastDue.applies_to(PaymentKind::OneTime));
        assert!(PaymentStatus::Canceled.applies_to(PaymentKind::OneTime));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for s in [
            PaymentStatus::Paid,
            PaymentStatus::Active,
            PaymentStatus::PastDue,
            PaymentStatus::Canceled,
        ] {
            assert_eq!(s.as_str().parse::<PaymentStatus>().unwrap(), s);
        }
        assert!("refunded".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn test_legacy_audit_tag_accepted() {
        let entry: AuditEntry = serde_json::from_value(json!({
            "eventId": "evt_1",
            "category": "charge_upadate",
            "receivedAt": "2024-01-01T00:00:00Z",
            "payload": {}
        }))
        .unwrap();
        assert_eq!(entry.category, AuditCategory::ChargeUpdated);
    }

    #[test]
    fn test_charge_merge_keeps_absent_fields() {
        let mut charge = ChargeDetails {
            charge_id: Some("ch_1".to_string()),
            receipt_url: Some("https://old".to_string()),
            balance_transaction_id: None,
        };
        charge.merge(&ChargeDetails {
            charge_id: None,
            receipt_url: Some("https://new".to_string()),
            balance_transaction_id: Some("txn_1".to_string()),
        });
        assert_eq!(charge.charge_id.as_deref(), Some("ch_1"));
        assert_eq!(charge.receipt_url.as_deref(), Some("https://new"));
        assert_eq!(charge.balance_transaction_id.as_deref(), Some("txn_1"));
    }
}
