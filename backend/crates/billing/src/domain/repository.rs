//! Repository Traits
//!
//! Interfaces for ledger persistence. Implementations are in the
//! infrastructure layer.

use crate::domain::command::LookupKey;
use crate::domain::entity::payment::Payment;
use crate::domain::mutation::{ApplyOutcome, PaymentMutation};
use crate::error::BillingResult;

/// Record after an update, and what the update did to it
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerUpdate {
    pub payment: Payment,
    pub outcome: ApplyOutcome,
}

/// Payment ledger
#[trait_variant::make(PaymentLedger: Send)]
pub trait LocalPaymentLedger {
    /// Insert unless a record with the same checkout session id exists.
    ///
    /// Returns the stored record and whether this call created it. Two
    /// concurrent calls for one checkout session leave exactly one record.
    async fn create_if_absent(&self, payment: &Payment) -> BillingResult<(Payment, bool)>;

    /// Apply `mutation` to the record matching `key` as one atomic
    /// read-modify-write. `None` when no record matches.
    async fn update_by_key(
        &self,
        key: &LookupKey,
        mutation: &PaymentMutation,
    ) -> BillingResult<Option<LedgerUpdate>>;

    /// All records of a user, newest first
    async fn find_by_user(&self, user_id: &str) -> BillingResult<Vec<Payment>>;

    /// Active subscription owned by `user_id`
    async fn find_active_subscription(
        &self,
        user_id: &str,
        subscription_id: &str,
    ) -> BillingResult<Option<Payment>>;
}
