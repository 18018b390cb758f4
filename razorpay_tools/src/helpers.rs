use enc_common::Paise;
use rand::distributions::{Alphanumeric, DistString};

/// Generate a receipt reference for orders created without one.
pub fn generate_receipt() -> String {
    let suffix = Alphanumeric.sample_string(&mut rand::thread_rng(), 16);
    format!("rcpt_{suffix}")
}

/// Build the idempotency key for a payout. The nonce comes from a per-creator monotonically increasing counter, so
/// a client retry of the same logical payout reuses the key, while the next legitimate payout for the same creator
/// and amount gets a fresh one.
pub fn payout_idempotency_key(creator_id: i64, amount: Paise, nonce: i64) -> String {
    format!("payout:{creator_id}:{}:{nonce}", amount.value())
}

/// Payouts under ₹2 lakh can go over IMPS; anything larger must use NEFT.
pub fn payout_mode(amount: Paise) -> &'static str {
    if amount <= Paise::from_rupees(200_000) {
        "IMPS"
    } else {
        "NEFT"
    }
}
