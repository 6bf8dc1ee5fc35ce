use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Hex-encoded HMAC-SHA256 of `data` under `secret`. Webhook callers sign the raw request body
/// with the shared webhook secret; the middleware recomputes this and compares.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hmac_matches_the_engine_scheme() {
        let ours = calculate_hmac("secret", b"payload");
        let engines = marketplace_payment_engine::helpers::hmac_sha256_hex("secret", b"payload");
        assert_eq!(ours, engines);
    }
}
