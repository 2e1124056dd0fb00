//! Paystack webhook signatures.
//!
//! Paystack signs every webhook with an HMAC-SHA512 of the raw request body, keyed with the account's secret key, and
//! sends the lowercase hex digest in the `x-paystack-signature` header. The check must run over the undecoded body,
//! before any JSON parsing happens.

use hmac::{Hmac, Mac};
use log::*;
use sha2::Sha512;

pub const SIGNATURE_HEADER: &str = "x-paystack-signature";

type HmacSha512 = Hmac<Sha512>;

/// Hex-encoded HMAC-SHA512 of `body`.
pub fn calculate_signature(secret: &str, body: &[u8]) -> String {
    // HMAC accepts keys of any length, so this cannot fail
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Checks `signature` against the body in constant time. An empty secret never validates anything.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    if secret.is_empty() {
        warn!("🔐️ No Paystack secret key is configured. Rejecting webhook signature.");
        return false;
    }
    let Ok(expected) = hex::decode(signature.trim()) else {
        trace!("🔐️ Webhook signature is not valid hex");
        return false;
    };
    let Ok(mut mac) = HmacSha512::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod test {
    use super::*;

    // RFC 4231, test case 2
    const RFC_KEY: &str = "Jefe";
    const RFC_DATA: &[u8] = b"what do ya want for nothing?";
    const RFC_SHA512: &str = "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737";

    #[test]
    fn known_vector() {
        assert_eq!(calculate_signature(RFC_KEY, RFC_DATA), RFC_SHA512);
        assert!(verify_signature(RFC_KEY, RFC_DATA, RFC_SHA512));
        assert!(verify_signature(RFC_KEY, RFC_DATA, &RFC_SHA512.to_uppercase()));
    }

    #[test]
    fn tampered_body_or_key() {
        let body = br#"{"event":"charge.success","data":{"reference":"abc"}}"#;
        let sig = calculate_signature("sk_test_secret", body);
        assert!(verify_signature("sk_test_secret", body, &sig));
        assert!(!verify_signature("sk_test_other", body, &sig));
        let tampered = br#"{"event":"charge.success","data":{"reference":"abd"}}"#;
        assert!(!verify_signature("sk_test_secret", tampered, &sig));
    }

    #[test]
    fn garbage_signatures() {
        let body = b"{}";
        assert!(!verify_signature("sk_test_secret", body, ""));
        assert!(!verify_signature("sk_test_secret", body, "not-hex"));
        assert!(!verify_signature("sk_test_secret", body, "abcd"));
        let sig = calculate_signature("", body);
        assert!(!verify_signature("", body, &sig));
    }
}
