//! Domain Layer
//!
//! Payment ledger entity, reconciliation commands and the ports the
//! application layer drives.

pub mod command;
pub mod entity;
pub mod gateway;
pub mod mutation;
pub mod repository;
