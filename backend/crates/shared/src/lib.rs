//! Shared Kernel
//!
//! Vocabulary shared by the billing and session crates:
//! - the unified [`error::app_error::AppError`] and its [`error::kind::ErrorKind`]
//! - typed entity ids
//! - the authenticated [`actor::Actor`] handed over by the login collaborator
//!
//! Only put things here that mean the same thing in every domain.

pub mod actor;
pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
