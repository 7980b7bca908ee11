//! Platform Crate - Technical Infrastructure
//!
//! Shared technical foundations for the domain crates:
//! - HMAC-SHA256 signing, constant-time comparison, hex codec
//! - Client IP / User-Agent extraction
//! - Cookie parsing
//! - Outbound HTTP client construction

pub mod client;
pub mod cookie;
pub mod crypto;
pub mod http_client;
