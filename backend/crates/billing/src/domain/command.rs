//! Reconciliation Commands
//!
//! The closed set of ledger operations a webhook event can turn into.

use crate::domain::entity::payment::{
    Amounts, AuditCategory, AuditEntry, ChargeDetails, CustomerSnapshot, InvoiceRecord, Payment,
    PaymentKind, PaymentStatus,
};
use crate::domain::mutation::PaymentMutation;
use chrono::{DateTime, Utc};
use kernel::id::PaymentId;
use serde_json::Value;
use std::fmt;

/// Authenticated event, before classification
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub event_id: String,
    pub event_type: String,
    pub created: Option<DateTime<Utc>>,
    /// `data.object`, kept verbatim for the audit log
    pub object: Value,
}

impl EventEnvelope {
    pub fn audit_entry(&self, category: AuditCategory, received_at: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            event_id: self.event_id.clone(),
            category,
            received_at,
            payload: self.object.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutCompleted {
    pub checkout_session_id: String,
    pub kind: PaymentKind,
    pub user_id: String,
    pub payment_intent_id: Option<String>,
    pub subscription_id: Option<String>,
    pub amounts: Amounts,
    pub customer: CustomerSnapshot,
    pub promotion_code_id: Option<String>,
}

impl CheckoutCompleted {
    pub fn into_payment(self, envelope: &EventEnvelope, now: DateTime<Utc>) -> Payment {
        Payment {
            payment_id: PaymentId::new(),
            user_id: self.user_id,
            status: PaymentStatus::initial(self.kind),
            kind: self.kind,
            checkout_session_id: self.checkout_session_id,
            payment_intent_id: self.payment_intent_id,
            subscription_id: self.subscription_id,
            charge: ChargeDetails::default(),
            amounts: self.amounts,
            customer: self.customer,
            promotion_code_id: self.promotion_code_id,
            invoices: Vec::new(),
            audit_log: vec![envelope.audit_entry(AuditCategory::CheckoutComplete, now)],
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationCommand {
    CheckoutCompleted(CheckoutCompleted),
    InvoicePaymentSucceeded {
        subscription_id: String,
        invoice: InvoiceRecord,
    },
    InvoicePaymentFailed {
        subscription_id: String,
        invoice_id: Option<String>,
    },
    SubscriptionCanceled {
        subscription_id: String,
    },
    ChargeSucceeded {
        payment_intent_id: String,
        charge: ChargeDetails,
    },
    ChargeUpdated {
        payment_intent_id: String,
        charge: ChargeDetails,
    },
}

/// Field a non-creating command correlates its Payment by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupKey {
    SubscriptionId(String),
    PaymentIntentId(String),
}

impl LookupKey {
    pub fn value(&self) -> &str {
        match self {
            LookupKey::SubscriptionId(v) | LookupKey::PaymentIntentId(v) => v,
        }
    }

    pub fn matches(&self, payment: &Payment) -> bool {
        let field = match self {
            LookupKey::SubscriptionId(_) => payment.subscription_id.as_deref(),
            LookupKey::PaymentIntentId(_) => payment.payment_intent_id.as_deref(),
        };
        field == Some(self.value())
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupKey::SubscriptionId(v) => write!(f, "subscription_id={v}"),
            LookupKey::PaymentIntentId(v) => write!(f, "payment_intent_id={v}"),
        }
    }
}

impl ReconciliationCommand {
    pub fn category(&self) -> AuditCategory {
        match self {
            ReconciliationCommand::CheckoutCompleted(_) => AuditCategory::CheckoutComplete,
            ReconciliationCommand::InvoicePaymentSucceeded { .. } => {
                AuditCategory::PaymentSucceeded
            }
            ReconciliationCommand::InvoicePaymentFailed { .. } => AuditCategory::InvoiceFailed,
            ReconciliationCommand::SubscriptionCanceled { .. } => {
                AuditCategory::SubscriptionDelete
            }
            ReconciliationCommand::ChargeSucceeded { .. } => AuditCategory::ChargeSucceeded,
            ReconciliationCommand::ChargeUpdated { .. } => AuditCategory::ChargeUpdated,
        }
    }

    /// `None` for checkout completion, which creates instead of updating
    pub fn lookup_key(&self) -> Option<LookupKey> {
        match self {
            ReconciliationCommand::CheckoutCompleted(_) => None,
            ReconciliationCommand::InvoicePaymentSucceeded {
                subscription_id, ..
            }
            | ReconciliationCommand::InvoicePaymentFailed {
                subscription_id, ..
            }
            | ReconciliationCommand::SubscriptionCanceled { subscription_id } => {
                Some(LookupKey::SubscriptionId(subscription_id.clone()))
            }
            ReconciliationCommand::ChargeSucceeded {
                payment_intent_id, ..
            }
            | ReconciliationCommand::ChargeUpdated {
                payment_intent_id, ..
            } => Some(LookupKey::PaymentIntentId(payment_intent_id.clone())),
        }
    }

    /// Mutation for an update command; `None` for checkout completion
    pub fn mutation(
        &self,
        envelope: &EventEnvelope,
        received_at: DateTime<Utc>,
    ) -> Option<PaymentMutation> {
        let audit = envelope.audit_entry(self.category(), received_at);
        let mutation = match self {
            ReconciliationCommand::CheckoutCompleted(_) => return None,
            ReconciliationCommand::InvoicePaymentSucceeded { invoice, .. } => {
                PaymentMutation::new(audit)
                    .with_status(PaymentStatus::Active)
                    .with_invoice(invoice.clone())
            }
            ReconciliationCommand::InvoicePaymentFailed { .. } => {
                PaymentMutation::new(audit).with_status(PaymentStatus::PastDue)
            }
            ReconciliationCommand::SubscriptionCanceled { .. } => {
                PaymentMutation::new(audit).with_status(PaymentStatus::Canceled)
            }
            ReconciliationCommand::ChargeSucceeded { charge, .. } => PaymentMutation::new(audit)
                .with_status(PaymentStatus::Paid)
                .with_charge(charge.clone()),
            ReconciliationCommand::ChargeUpdated { charge, .. } => {
                PaymentMutation::new(audit).with_charge(charge.clone())
            }
        };
        Some(mutation)
    }
}

/// Result of classifying an authenticated event
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Command {
        envelope: EventEnvelope,
        command: ReconciliationCommand,
    },
    /// Acknowledged and otherwise ignored
    Unhandled {
        envelope: EventEnvelope,
        reason: String,
    },
}

impl Classified {
    pub fn envelope(&self) -> &EventEnvelope {
        match self {
            Classified::Command { envelope, .. } | Classified::Unhandled { envelope, .. } => {
                envelope
            }
        }
    }
}
