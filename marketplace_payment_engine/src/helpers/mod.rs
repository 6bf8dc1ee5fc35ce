//! Small helpers shared across the engine.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Hex-encoded HMAC-SHA256 over `data` with the given secret. This is the signature scheme used
/// for both payment verification and webhook payloads.
pub fn hmac_sha256_hex(secret: &str, data: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// The canonical message a provider signs to attest a captured payment.
pub fn payment_signature_payload(gateway_order_id: &str, gateway_payment_id: &str) -> String {
    format!("{gateway_order_id}|{gateway_payment_id}")
}

/// Checks a webhook signature against the raw payload bytes.
pub fn verify_webhook_signature(secret: &str, payload: &[u8], signature: &str) -> bool {
    hmac_sha256_hex(secret, payload) == signature
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hmac_is_stable_and_hex() {
        let sig = hmac_sha256_hex("secret", b"order_1|pay_1");
        assert_eq!(sig.len(), 64);
        assert_eq!(sig, hmac_sha256_hex("secret", b"order_1|pay_1"));
        assert_ne!(sig, hmac_sha256_hex("other", b"order_1|pay_1"));
    }
}
