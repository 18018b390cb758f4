//! # Payment signature verification
//!
//! Razorpay authenticates two kinds of inbound data:
//!
//! * **Checkout confirmations**: after a successful checkout, the client posts back `(order_id, payment_id,
//!   signature)`, where the signature is `HMAC-SHA256(key_secret, "{order_id}|{payment_id}")` in lowercase hex.
//! * **Webhook bodies**: the raw request body is signed with the webhook secret and the digest carried in the
//!   `X-Razorpay-Signature` header.
//!
//! Verification must be constant-time and must never panic on malformed input. A claimed signature that isn't valid
//! hex, or whose decoded length is not 32 bytes, is rejected up front; there is nothing secret about a length
//! mismatch.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Sign an arbitrary payload, returning the digest as lowercase hex.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a claimed hex signature over a payload. Malformed input yields `false`, never an error.
pub fn verify(payload: &[u8], secret: &str, claimed: &str) -> bool {
    let claimed = match hex::decode(claimed) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    if claimed.len() != 32 {
        return false;
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    // verify_slice is a constant-time comparison
    mac.verify_slice(&claimed).is_ok()
}

/// Build the canonical checkout-confirmation message for an (order, payment) pair.
pub fn payment_message(order_id: &str, payment_id: &str) -> String {
    format!("{order_id}|{payment_id}")
}

pub fn sign_payment(order_id: &str, payment_id: &str, secret: &str) -> String {
    sign(payment_message(order_id, payment_id).as_bytes(), secret)
}

pub fn verify_payment_signature(order_id: &str, payment_id: &str, secret: &str, claimed: &str) -> bool {
    verify(payment_message(order_id, payment_id).as_bytes(), secret, claimed)
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "test_webhook_secret_123";

    #[test]
    fn known_payment_signature() {
        let sig = sign_payment("order_PFIuqQnVXmZ7wx", "pay_PFIvACTRLGiJWK", SECRET);
        assert_eq!(sig, "5b665e16b734cca908fd16099b6694660b054805eb7ec2e8db7e08e4ced69b39");
        assert!(verify_payment_signature("order_PFIuqQnVXmZ7wx", "pay_PFIvACTRLGiJWK", SECRET, &sig));
    }

    #[test]
    fn known_webhook_body_signature() {
        let body = br#"{"entity":"event","event":"payment.captured"}"#;
        let sig = sign(body, SECRET);
        assert_eq!(sig, "8a762d19ffbce736e0b31946a93ec2949671711df5c261ed053dc61735fe739e");
        assert!(verify(body, SECRET, &sig));
    }

    #[test]
    fn round_trip_verifies() {
        let sig = sign_payment("order_abc", "pay_def", "s3cr3t");
        assert_eq!(sig, "5314514fed6aec306b74f4ef610aedbd56c840a37d13840f456745313bb964fb");
        assert!(verify_payment_signature("order_abc", "pay_def", "s3cr3t", &sig));
    }

    #[test]
    fn wrong_signature_is_rejected() {
        let sig = sign_payment("order_abc", "pay_def", "s3cr3t");
        assert!(!verify_payment_signature("order_abc", "pay_xyz", "s3cr3t", &sig));
        assert!(!verify_payment_signature("order_abc", "pay_def", "другой", &sig));
    }

    #[test]
    fn malformed_claims_never_panic() {
        assert!(!verify(b"payload", "s3cr3t", ""));
        assert!(!verify(b"payload", "s3cr3t", "not-hex-at-all"));
        // valid hex, wrong length
        assert!(!verify(b"payload", "s3cr3t", "deadbeef"));
        // 33 bytes of valid hex
        assert!(!verify(b"payload", "s3cr3t", &"ab".repeat(33)));
    }

    #[test]
    fn empty_payload_signs() {
        let sig = sign(b"", "s3cr3t");
        assert_eq!(sig, "3c81cc9496e1c25250f6ccb85f697c1bb623e3480d6538ad8cb6a6648142777d");
        assert!(verify(b"", "s3cr3t", &sig));
    }
}
