pub mod checkout;
pub mod config;
pub mod my_payments;
pub mod normalizer;
pub mod reconcile;
pub mod signature;
