//! In-Memory Ledger
//!
//! Same contract as the PostgreSQL ledger, one mutex around every record.
//! Used by tests and local runs without a database.

use crate::domain::command::LookupKey;
use crate::domain::entity::payment::Payment;
use crate::domain::mutation::PaymentMutation;
use crate::domain::repository::{LedgerUpdate, PaymentLedger};
use crate::error::{BillingError, BillingResult};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Clone, Default)]
pub struct InMemoryPaymentLedger {
    records: Arc<Mutex<Vec<Payment>>>,
}

impl InMemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> BillingResult<MutexGuard<'_, Vec<Payment>>> {
        self.records
            .lock()
            .map_err(|_| BillingError::Internal("payment ledger lock poisoned".to_string()))
    }

    /// Snapshot of every record
    pub fn all(&self) -> BillingResult<Vec<Payment>> {
        Ok(self.lock()?.clone())
    }
}

impl PaymentLedger for InMemoryPaymentLedger {
    async fn create_if_absent(&self, payment: &Payment) -> BillingResult<(Payment, bool)> {
        payment.validate().map_err(BillingError::SchemaViolation)?;

        let mut records = self.lock()?;
        if let Some(existing) = records
            .iter()
            .find(|p| p.checkout_session_id == payment.checkout_session_id)
        {
            return Ok((existing.clone(), false));
        }
        records.push(payment.clone());
        Ok((payment.clone(), true))
    }

    async fn update_by_key(
        &self,
        key: &LookupKey,
        mutation: &PaymentMutation,
    ) -> BillingResult<Option<LedgerUpdate>> {
        let mut records = self.lock()?;
        let Some(record) = records
            .iter_mut()
            .filter(|p| key.matches(p))
            .min_by_key(|p| p.created_at)
        else {
            return Ok(None);
        };

        let mut next = record.clone();
        let outcome = next.apply(mutation, Utc::now());
        if outcome.is_applied() {
            next.validate().map_err(BillingError::SchemaViolation)?;
            next.version += 1;
            *record = next.clone();
        }
        Ok(Some(LedgerUpdate {
            payment: next,
            outcome,
        }))
    }

    async fn find_by_user(&self, user_id: &str) -> BillingResult<Vec<Payment>> {
        let mut found: Vec<Payment> = self
            .lock()?
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn find_active_subscription(
        &self,
        user_id: &str,
        subscription_id: &str,
    ) -> BillingResult<Option<Payment>> {
        Ok(self
            .lock()?
            .iter()
            .find(|p| {
                p.user_id == user_id
                    && p.subscription_id.as_deref() == Some(subscription_id)
                    && p.is_active_subscription()
            })
            .cloned())
    }
}
