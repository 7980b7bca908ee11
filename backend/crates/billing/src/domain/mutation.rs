//! Payment Mutations
//!
//! A mutation is plain data so that a store can re-apply it to a freshly
//! read record whenever its compare-and-set loses a race.

use crate::domain::entity::payment::{
    AuditEntry, ChargeDetails, InvoiceRecord, Payment, PaymentStatus,
};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentMutation {
    pub audit: AuditEntry,
    pub status: Option<PaymentStatus>,
    pub charge: Option<ChargeDetails>,
    pub invoice: Option<InvoiceRecord>,
}

impl PaymentMutation {
    pub fn new(audit: AuditEntry) -> Self {
        Self {
            audit,
            status: None,
            charge: None,
            invoice: None,
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_charge(mut self, charge: ChargeDetails) -> Self {
        self.charge = Some(charge);
        self
    }

    pub fn with_invoice(mut self, invoice: InvoiceRecord) -> Self {
        self.invoice = Some(invoice);
        self
    }

    pub fn event_id(&self) -> &str {
        &self.audit.event_id
    }
}

/// What `Payment::apply` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// Event or invoice already recorded
    Duplicate,
    /// Current status is terminal; nothing was written
    TransitionRejected {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

impl Payment {
    /// Merge `mutation` into this record.
    ///
    /// All or nothing: unless the outcome is `Applied`, `self` is untouched.
    /// The version is left to the store.
    pub fn apply(&mut self, mutation: &PaymentMutation, now: DateTime<Utc>) -> ApplyOutcome {
        if self.has_event(mutation.event_id()) {
            return ApplyOutcome::Duplicate;
        }
        if let Some(invoice) = &mutation.invoice {
            if self.has_invoice(&invoice.invoice_id) {
                return ApplyOutcome::Duplicate;
            }
        }

        let target = mutation.status.filter(|s| s.applies_to(self.kind));
        if let Some(next) = target {
            if !self.status.can_transition_to(self.kind, next) {
                return ApplyOutcome::TransitionRejected {
                    from: self.status,
                    to: next,
                };
            }
            self.status = next;
        }
        if let Some(charge) = &mutation.charge {
            self.charge.merge(charge);
        }
        if let Some(invoice) = &mutation.invoice {
            self.invoices.push(invoice.clone());
        }
        self.audit_log.push(mutation.audit.clone());
        self.updated_at = now;

        ApplyOutcome::Applied
    }
}
