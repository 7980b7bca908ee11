//! API DTOs (Data Transfer Objects)

use crate::domain::entity::payment::{
    Amounts, InvoiceRecord, Payment, PaymentKind, PaymentStatus,
};
use chrono::{DateTime, Utc};
use kernel::id::PaymentId;
use serde::Serialize;

/// Response for POST /api/payment/stripe/webhook
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// Response for POST /api/payment/stripe/checkout/{plan}
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResponse {
    pub id: String,
    pub url: Option<String>,
}

/// One ledger record as its owner sees it. The raw audit log stays internal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment_id: PaymentId,
    pub kind: PaymentKind,
    pub status: PaymentStatus,
    pub checkout_session_id: String,
    pub subscription_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub amounts: Amounts,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub promotion_code_id: Option<String>,
    pub receipt_url: Option<String>,
    pub invoices: Vec<InvoiceRecord>,
    pub event_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Payment> for PaymentView {
    fn from(p: Payment) -> Self {
        Self {
            payment_id: p.payment_id,
            kind: p.kind,
            status: p.status,
            checkout_session_id: p.checkout_session_id,
            subscription_id: p.subscription_id,
            payment_intent_id: p.payment_intent_id,
            amounts: p.amounts,
            customer_email: p.customer.email,
            customer_name: p.customer.name,
            promotion_code_id: p.promotion_code_id,
            receipt_url: p.charge.receipt_url,
            invoices: p.invoices,
            event_count: p.audit_log.len(),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Response for GET /api/user/my-payments
#[derive(Debug, Clone, Serialize)]
pub struct MyPaymentsResponse {
    pub success: bool,
    pub payments: Vec<PaymentView>,
}

/// Response for DELETE /api/user/my-payments/{subscriptionId}
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSubscriptionResponse {
    pub success: bool,
    pub message: String,
    pub subscription_id: String,
}
