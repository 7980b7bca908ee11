//! PostgreSQL Ledger Implementation

use crate::domain::command::LookupKey;
use crate::domain::entity::payment::{
    Amounts, AuditEntry, ChargeDetails, CustomerSnapshot, InvoiceRecord, Payment,
};
use crate::domain::mutation::PaymentMutation;
use crate::domain::repository::{LedgerUpdate, PaymentLedger};
use crate::error::{BillingError, BillingResult};
use crate::infra::versioned::{VersionedRecords, update_with_retry};
use chrono::{DateTime, Utc};
use kernel::id::PaymentId;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

const DEFAULT_RETRY_BUDGET: u32 = 5;

const PAYMENT_COLUMNS: &str = r#"
    payment_id,
    user_id,
    kind,
    checkout_session_id,
    payment_intent_id,
    subscription_id,
    charge_id,
    receipt_url,
    balance_transaction_id,
    amount_subtotal,
    amount_tax,
    amount_shipping,
    amount_total,
    currency,
    status,
    customer_email,
    customer_name,
    customer_address,
    shipping,
    promotion_code_id,
    invoices,
    audit_log,
    version,
    created_at,
    updated_at
"#;

/// PostgreSQL-backed payment ledger
#[derive(Clone)]
pub struct PgPaymentLedger {
    pool: PgPool,
    retry_budget: u32,
}

impl PgPaymentLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget.max(1);
        self
    }

    async fn find_by_checkout_session(&self, checkout_session_id: &str) -> BillingResult<Payment> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE checkout_session_id = $1");
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(checkout_session_id)
            .fetch_one(&self.pool)
            .await?;
        row.into_payment()
    }

    async fn find_by_key(&self, key: &LookupKey) -> BillingResult<Option<Payment>> {
        let column = match key {
            LookupKey::SubscriptionId(_) => "subscription_id",
            LookupKey::PaymentIntentId(_) => "payment_intent_id",
        };
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE {column} = $1 ORDER BY created_at ASC LIMIT 1"
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(key.value())
            .fetch_optional(&self.pool)
            .await?;
        row.map(PaymentRow::into_payment).transpose()
    }

    /// Write `next` only if the row still carries `expected_version`
    async fn compare_and_set(
        &self,
        next: &Payment,
        expected_version: i64,
    ) -> BillingResult<Option<Payment>> {
        let sql = format!(
            r#"
            UPDATE payments SET
                status = $3,
                charge_id = $4,
                receipt_url = $5,
                balance_transaction_id = $6,
                invoices = $7,
                audit_log = $8,
                updated_at = $9,
                version = version + 1
            WHERE payment_id = $1 AND version = $2
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(next.payment_id.into_uuid())
            .bind(expected_version)
            .bind(next.status.as_str())
            .bind(&next.charge.charge_id)
            .bind(&next.charge.receipt_url)
            .bind(&next.charge.balance_transaction_id)
            .bind(Json(&next.invoices))
            .bind(Json(&next.audit_log))
            .bind(next.updated_at)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PaymentRow::into_payment).transpose()
    }
}

impl VersionedRecords for PgPaymentLedger {
    async fn load(&self, key: &LookupKey) -> BillingResult<Option<Payment>> {
        self.find_by_key(key).await
    }

    async fn write_if_version(
        &self,
        next: &Payment,
        expected_version: i64,
    ) -> BillingResult<Option<Payment>> {
        self.compare_and_set(next, expected_version).await
    }
}

impl PaymentLedger for PgPaymentLedger {
    async fn create_if_absent(&self, payment: &Payment) -> BillingResult<(Payment, bool)> {
        payment.validate().map_err(BillingError::SchemaViolation)?;

        let sql = format!(
            r#"
            INSERT INTO payments (
                payment_id,
                user_id,
                kind,
                checkout_session_id,
                payment_intent_id,
                subscription_id,
                charge_id,
                receipt_url,
                balance_transaction_id,
                amount_subtotal,
                amount_tax,
                amount_shipping,
                amount_total,
                currency,
                status,
                customer_email,
                customer_name,
                customer_address,
                shipping,
                promotion_code_id,
                invoices,
                audit_log,
                version,
                created_at,
                updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25
            )
            ON CONFLICT (checkout_session_id) DO NOTHING
            RETURNING {PAYMENT_COLUMNS}
            "#
        );
        let inserted = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(payment.payment_id.into_uuid())
            .bind(&payment.user_id)
            .bind(payment.kind.as_str())
            .bind(&payment.checkout_session_id)
            .bind(&payment.payment_intent_id)
            .bind(&payment.subscription_id)
            .bind(&payment.charge.charge_id)
            .bind(&payment.charge.receipt_url)
            .bind(&payment.charge.balance_transaction_id)
            .bind(payment.amounts.subtotal)
            .bind(payment.amounts.tax)
            .bind(payment.amounts.shipping)
            .bind(payment.amounts.total)
            .bind(&payment.amounts.currency)
            .bind(payment.status.as_str())
            .bind(&payment.customer.email)
            .bind(&payment.customer.name)
            .bind(payment.customer.address.as_ref().map(Json))
            .bind(payment.customer.shipping.as_ref().map(Json))
            .bind(&payment.promotion_code_id)
            .bind(Json(&payment.invoices))
            .bind(Json(&payment.audit_log))
            .bind(payment.version)
            .bind(payment.created_at)
            .bind(payment.updated_at)
            .fetch_optional(&self.pool)
            .await?;

        match inserted {
            Some(row) => {
                let stored = row.into_payment()?;
                tracing::debug!(payment_id = %stored.payment_id, "Payment row inserted");
                Ok((stored, true))
            }
            None => {
                let existing = self
                    .find_by_checkout_session(&payment.checkout_session_id)
                    .await?;
                Ok((existing, false))
            }
        }
    }

    async fn update_by_key(
        &self,
        key: &LookupKey,
        mutation: &PaymentMutation,
    ) -> BillingResult<Option<LedgerUpdate>> {
        update_with_retry(self, key, mutation, self.retry_budget, Utc::now()).await
    }

    async fn find_by_user(&self, user_id: &str) -> BillingResult<Vec<Payment>> {
        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(PaymentRow::into_payment).collect()
    }

    async fn find_active_subscription(
        &self,
        user_id: &str,
        subscription_id: &str,
    ) -> BillingResult<Option<Payment>> {
        let sql = format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE user_id = $1
              AND subscription_id = $2
              AND kind = 'subscription'
              AND status = 'active'
            LIMIT 1
            "#
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(user_id)
            .bind(subscription_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PaymentRow::into_payment).transpose()
    }
}

// Internal row type for sqlx mapping
#[derive(sqlx::FromRow)]
struct PaymentRow {
    payment_id: Uuid,
    user_id: String,
    kind: String,
    checkout_session_id: String,
    payment_intent_id: Option<String>,
    subscription_id: Option<String>,
    charge_id: Option<String>,
    receipt_url: Option<String>,
    balance_transaction_id: Option<String>,
    amount_subtotal: i64,
    amount_tax: i64,
    amount_shipping: i64,
    amount_total: i64,
    currency: String,
    status: String,
    customer_email: Option<String>,
    customer_name: Option<String>,
    customer_address: Option<Json<Value>>,
    shipping: Option<Json<Value>>,
    promotion_code_id: Option<String>,
    invoices: Json<Vec<InvoiceRecord>>,
    audit_log: Json<Vec<AuditEntry>>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> BillingResult<Payment> {
        Ok(Payment {
            payment_id: PaymentId::from_uuid(self.payment_id),
            user_id: self.user_id,
            kind: self.kind.parse().map_err(BillingError::Internal)?,
            checkout_session_id: self.checkout_session_id,
            payment_intent_id: self.payment_intent_id,
            subscription_id: self.subscription_id,
            charge: ChargeDetails {
                charge_id: self.charge_id,
                receipt_url: self.receipt_url,
                balance_transaction_id: self.balance_transaction_id,
            },
            amounts: Amounts {
                subtotal: self.amount_subtotal,
                tax: self.amount_tax,
                shipping: self.amount_shipping,
                total: self.amount_total,
                currency: self.currency,
            },
            status: self.status.parse().map_err(BillingError::Internal)?,
            customer: CustomerSnapshot {
                email: self.customer_email,
                name: self.customer_name,
                address: self.customer_address.map(|j| j.0),
                shipping: self.shipping.map(|j| j.0),
            },
            promotion_code_id: self.promotion_code_id,
            invoices: self.invoices.0,
            audit_log: self.audit_log.0,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
