//! Webhook Signature Verification
//!
//! Header format: `t=<unix seconds>,v1=<hex>[,v1=<hex>...][,v0=<hex>]`.
//! The signed payload is `"{t}." + raw body`, HMAC-SHA256 with the webhook
//! secret. Any matching `v1` entry authenticates the delivery.

use crate::error::{BillingError, BillingResult};
use std::time::Duration;

/// Name of the header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Future timestamps within this skew are accepted
const MAX_CLOCK_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> BillingResult<Self> {
        let mut timestamp = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| invalid("header is not a list of key=value pairs"))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| invalid("bad timestamp"))?);
                }
                "v1" => {
                    // A malformed entry among several must not hide a valid one.
                    if let Ok(sig) = platform::crypto::from_hex(value) {
                        v1_signatures.push(sig);
                    }
                }
                // v0 and unknown schemes
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| invalid("missing timestamp"))?;
        if v1_signatures.is_empty() {
            return Err(invalid("no v1 signature"));
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifies deliveries against one secret
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>, tolerance: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            tolerance,
        }
    }

    /// Authenticate `payload` at wall-clock time `now_unix`
    pub fn verify(&self, payload: &[u8], header: &str, now_unix: i64) -> BillingResult<()> {
        if self.secret.is_empty() {
            return Err(invalid("webhook secret not configured"));
        }

        let header = SignatureHeader::parse(header)?;

        let Some(age) = now_unix.checked_sub(header.timestamp) else {
            return Err(invalid("timestamp outside tolerance"));
        };
        if age > self.tolerance.as_secs() as i64 {
            return Err(invalid("timestamp outside tolerance"));
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(invalid("timestamp in the future"));
        }

        let expected = self.sign(header.timestamp, payload);
        let matched = header
            .v1_signatures
            .iter()
            .any(|sig| platform::crypto::constant_time_eq(sig, &expected));

        if matched {
            Ok(())
        } else {
            Err(invalid("no signature matches"))
        }
    }

    /// HMAC-SHA256 over `"{timestamp}." + payload`
    pub fn sign(&self, timestamp: i64, payload: &[u8]) -> [u8; 32] {
        let mut signed = format!("{timestamp}.").into_bytes();
        signed.extend_from_slice(payload);
        platform::crypto::hmac_sha256(&self.secret, &signed)
    }

    /// Header value a sender would attach
    pub fn header_for(&self, timestamp: i64, payload: &[u8]) -> String {
        format!(
            "t={timestamp},v1={}",
            platform::crypto::to_hex(&self.sign(timestamp, payload))
        )
    }
}

fn invalid(reason: &str) -> BillingError {
    BillingError::InvalidSignature(reason.to_string())
}
