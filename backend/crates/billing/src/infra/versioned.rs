//! Optimistic Update Loop
//!
//! Read the record, apply the mutation, write it back only if the version
//! has not moved. A lost race re-reads and re-applies until the budget runs out.

use crate::domain::command::LookupKey;
use crate::domain::entity::payment::Payment;
use crate::domain::mutation::PaymentMutation;
use crate::domain::repository::LedgerUpdate;
use crate::error::{BillingError, BillingResult};
use chrono::{DateTime, Utc};

/// Store that can write a record conditionally on its version
#[trait_variant::make(VersionedRecords: Send)]
pub trait LocalVersionedRecords {
    /// Earliest record matching `key`
    async fn load(&self, key: &LookupKey) -> BillingResult<Option<Payment>>;

    /// Write `next` only if the stored version is still `expected_version`.
    /// `None` means another writer got there first.
    async fn write_if_version(
        &self,
        next: &Payment,
        expected_version: i64,
    ) -> BillingResult<Option<Payment>>;
}

pub async fn update_with_retry<S>(
    store: &S,
    key: &LookupKey,
    mutation: &PaymentMutation,
    retry_budget: u32,
    now: DateTime<Utc>,
) -> BillingResult<Option<LedgerUpdate>>
where
    S: VersionedRecords + Sync,
{
    let retry_budget = retry_budget.max(1);
    let mut last_payment_id = String::new();

    for attempt in 1..=retry_budget {
        let Some(current) = store.load(key).await? else {
            return Ok(None);
        };
        last_payment_id = current.payment_id.to_string();

        let mut next = current.clone();
        let outcome = next.apply(mutation, now);
        if !outcome.is_applied() {
            return Ok(Some(LedgerUpdate {
                payment: current,
                outcome,
            }));
        }
        next.validate().map_err(BillingError::SchemaViolation)?;

        if let Some(stored) = store.write_if_version(&next, current.version).await? {
            return Ok(Some(LedgerUpdate {
                payment: stored,
                outcome,
            }));
        }

        tracing::debug!(
            payment_id = %current.payment_id,
            attempt,
            "Payment version moved, retrying"
        );
    }

    Err(BillingError::WriteConflict {
        payment_id: last_payment_id,
        attempts: retry_budget,
    })
}
