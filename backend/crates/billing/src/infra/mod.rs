//! Infrastructure Layer
//!
//! Ledger implementations and the payment processor client.

pub mod memory;
pub mod postgres;
pub mod stripe;
pub mod versioned;

pub use memory::InMemoryPaymentLedger;
pub use postgres::PgPaymentLedger;
pub use stripe::StripeGateway;
