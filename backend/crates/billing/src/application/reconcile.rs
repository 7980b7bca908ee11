//! Reconcile Event Use Case
//!
//! Applies one classified event to the ledger. Each command takes exactly
//! one branch; every outcome other than an error is acknowledged to the
//! processor.

use crate::application::config::BillingConfig;
use crate::domain::command::{Classified, EventEnvelope, ReconciliationCommand};
use crate::domain::entity::payment::PaymentStatus;
use crate::domain::mutation::ApplyOutcome;
use crate::domain::repository::PaymentLedger;
use crate::error::{BillingError, BillingResult};
use chrono::Utc;
use kernel::id::PaymentId;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Created { payment_id: PaymentId },
    /// Checkout session already had a record
    AlreadyRecorded { payment_id: PaymentId },
    Updated {
        payment_id: PaymentId,
        status: PaymentStatus,
    },
    /// Event or invoice was applied before
    Duplicate { payment_id: PaymentId },
    /// Record is in a terminal status; nothing was written
    TransitionRejected {
        payment_id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
    },
    /// No record matched the lookup key
    LookupMiss,
    Unhandled,
}

/// Bound a store call by `limit`
pub async fn with_deadline<T, F>(limit: Duration, fut: F) -> BillingResult<T>
where
    F: Future<Output = BillingResult<T>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| BillingError::StoreTimeout(limit))?
}

pub struct ReconcileUseCase<L>
where
    L: PaymentLedger,
{
    ledger: Arc<L>,
    config: Arc<BillingConfig>,
}

impl<L> ReconcileUseCase<L>
where
    L: PaymentLedger,
{
    pub fn new(ledger: Arc<L>, config: Arc<BillingConfig>) -> Self {
        Self { ledger, config }
    }

    pub async fn execute(&self, event: Classified) -> BillingResult<ReconcileOutcome> {
        match event {
            Classified::Unhandled { envelope, reason } => {
                tracing::info!(
                    event_id = %envelope.event_id,
                    event_type = %envelope.event_type,
                    %reason,
                    "Unhandled webhook event"
                );
                Ok(ReconcileOutcome::Unhandled)
            }
            Classified::Command { envelope, command } => self.apply(&envelope, command).await,
        }
    }

    async fn apply(
        &self,
        envelope: &EventEnvelope,
        command: ReconciliationCommand,
    ) -> BillingResult<ReconcileOutcome> {
        let now = Utc::now();
        let limit = self.config.store_timeout;

        let mutation = match command.mutation(envelope, now) {
            Some(mutation) => mutation,
            None => {
                let ReconciliationCommand::CheckoutCompleted(checkout) = command else {
                    return Err(BillingError::Internal(
                        "update command without mutation".to_string(),
                    ));
                };
                let payment = checkout.into_payment(envelope, now);
                payment.validate().map_err(BillingError::SchemaViolation)?;

                let (stored, created) =
                    with_deadline(limit, self.ledger.create_if_absent(&payment)).await?;

                return Ok(if created {
                    tracing::info!(
                        event_id = %envelope.event_id,
                        payment_id = %stored.payment_id,
                        checkout_session_id = %stored.checkout_session_id,
                        kind = %stored.kind,
                        "Payment recorded"
                    );
                    ReconcileOutcome::Created {
                        payment_id: stored.payment_id,
                    }
                } else {
                    tracing::info!(
                        event_id = %envelope.event_id,
                        checkout_session_id = %stored.checkout_session_id,
                        "Checkout session already recorded"
                    );
                    ReconcileOutcome::AlreadyRecorded {
                        payment_id: stored.payment_id,
                    }
                });
            }
        };

        let Some(key) = command.lookup_key() else {
            return Err(BillingError::Internal("update command without lookup key".to_string()));
        };

        let Some(update) = with_deadline(limit, self.ledger.update_by_key(&key, &mutation)).await?
        else {
            // The creating event may still be on its way; acknowledge anyway.
            tracing::warn!(
                event_id = %envelope.event_id,
                event_type = %envelope.event_type,
                %key,
                "No payment matches event"
            );
            return Ok(ReconcileOutcome::LookupMiss);
        };

        let payment_id = update.payment.payment_id;
        Ok(match update.outcome {
            ApplyOutcome::Applied => {
                tracing::info!(
                    event_id = %envelope.event_id,
                    %payment_id,
                    status = %update.payment.status,
                    category = ?mutation.audit.category,
                    "Payment updated"
                );
                ReconcileOutcome::Updated {
                    payment_id,
                    status: update.payment.status,
                }
            }
            ApplyOutcome::Duplicate => {
                tracing::info!(event_id = %envelope.event_id, %payment_id, "Duplicate event ignored");
                ReconcileOutcome::Duplicate { payment_id }
            }
            ApplyOutcome::TransitionRejected { from, to } => {
                tracing::warn!(
                    event_id = %envelope.event_id,
                    %payment_id,
                    %from,
                    %to,
                    "Status transition rejected"
                );
                ReconcileOutcome::TransitionRejected {
                    payment_id,
                    from,
                    to,
                }
            }
        })
    }
}
