use enc_common::Secret;
use log::*;

#[derive(Debug, Clone)]
pub struct RazorpayConfig {
    /// The public half of the API credential pair (`rzp_live_...` / `rzp_test_...`).
    pub key_id: String,
    pub key_secret: Secret<String>,
    /// The shared secret used to sign webhook bodies and checkout confirmations.
    pub webhook_secret: Secret<String>,
    /// The RazorpayX current account that payouts are drawn from.
    pub payout_account_number: String,
    pub api_base: String,
}

pub const DEFAULT_API_BASE: &str = "https://api.razorpay.com/v1";

impl Default for RazorpayConfig {
    fn default() -> Self {
        Self {
            key_id: String::default(),
            key_secret: Secret::default(),
            webhook_secret: Secret::default(),
            payout_account_number: String::default(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl RazorpayConfig {
    pub fn new_from_env_or_default() -> Self {
        let key_id = std::env::var("ENC_RAZORPAY_KEY_ID").unwrap_or_else(|_| {
            warn!("🪛️ ENC_RAZORPAY_KEY_ID not set, using (probably useless) default");
            "rzp_test_0000000000".to_string()
        });
        let key_secret = Secret::new(std::env::var("ENC_RAZORPAY_KEY_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ ENC_RAZORPAY_KEY_SECRET not set, using (probably useless) default");
            "00000000000000".to_string()
        }));
        let webhook_secret = Secret::new(std::env::var("ENC_RAZORPAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ ENC_RAZORPAY_WEBHOOK_SECRET not set. Webhook signatures will not validate.");
            String::default()
        }));
        let payout_account_number = std::env::var("ENC_RAZORPAY_PAYOUT_ACCOUNT").unwrap_or_else(|_| {
            warn!("🪛️ ENC_RAZORPAY_PAYOUT_ACCOUNT not set. Payout creation will fail until it is configured.");
            String::default()
        });
        let api_base = std::env::var("ENC_RAZORPAY_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Self { key_id, key_secret, webhook_secret, payout_account_number, api_base }
    }
}
