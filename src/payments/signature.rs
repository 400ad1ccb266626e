//! Keyed-hash helpers shared by the webhook endpoint and the processor client.
//!
//! Webhooks are authenticated with HMAC-SHA256 over the exact bytes received.
//! Transaction requests carry a separate integrity hash the processor defines
//! as SHA-256 over `reference ‖ amount_in_cents ‖ currency ‖ secret`.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Header the processor puts the webhook signature in.
pub const SIGNATURE_HEADER: &str = "x-integrity";

/// Hex encoded HMAC-SHA256 of `raw_body`.
pub fn sign_body(raw_body: &[u8], shared_secret: &str) -> String {
    // HMAC accepts keys of any length, so this cannot fail.
    let mut mac = HmacSha256::new_from_slice(shared_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check `provided_signature` against the HMAC of the raw request bytes.
///
/// Every failure (empty or non-hex header, wrong length, wrong secret,
/// altered body) yields `false`. The comparison runs in constant time.
pub fn verify(raw_body: &[u8], provided_signature: &str, shared_secret: &str) -> bool {
    let provided = match hex::decode(provided_signature.trim()) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => return false,
    };
    let mut mac = match HmacSha256::new_from_slice(shared_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(raw_body);
    mac.verify_slice(&provided).is_ok()
}

/// Integrity hash sent along with a transaction creation request.
pub fn integrity_signature(
    reference: &str,
    amount_in_cents: i64,
    currency: &str,
    integrity_secret: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reference.as_bytes());
    hasher.update(amount_in_cents.to_string().as_bytes());
    hasher.update(currency.as_bytes());
    hasher.update(integrity_secret.as_bytes());
    hex::encode(hasher.finalize())
}
