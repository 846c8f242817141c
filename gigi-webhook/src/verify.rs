//! HMAC signature verification (spec §4.6: "HMAC of the raw body with the
//! configured secret; rejection on mismatch"): `hmac` + `sha2` for the MAC,
//! `subtle` for constant-time compare.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verifies `header_value` (conventionally `sha256=<hex>`) against an HMAC
/// of `body` keyed by `secret`. Returns `false` on any malformed input
/// rather than panicking — a bad signature is just a rejection, not a bug.
pub fn verify_signature(secret: &[u8], body: &[u8], header_value: &str) -> bool {
    let hex_digest = header_value.strip_prefix("sha256=").unwrap_or(header_value);
    let Ok(expected) = hex::decode(hex_digest) else { return false };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else { return false };
    mac.update(body);
    let computed = mac.finalize().into_bytes();

    if computed.len() != expected.len() {
        return false;
    }
    computed.as_slice().ct_eq(&expected).into()
}
