use std::fmt::Display;

use enc_common::Paise;
use serde::{Deserialize, Serialize};
use settlement_engine::db_types::{OrderStatusType, PayoutRecord, ProductType, TransactionRecord};

use crate::tracker::TrackedStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// A checkout basket. The gross order total is the sum of the line item amounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub items: Vec<CheckoutItem>,
    /// An optional receipt reference. One is generated when absent.
    #[serde(default)]
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutItem {
    pub creator_id: i64,
    pub product_type: ProductType,
    #[serde(default)]
    pub category: Option<String>,
    pub quantity: i64,
    /// The gross amount for this line (unit price × quantity), in paise.
    pub gross: Paise,
}

/// What the checkout client needs to open the gateway's payment UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub amount: Paise,
    pub currency: String,
    pub receipt: Option<String>,
    /// The public API key id the client-side SDK is initialized with.
    pub key_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCheckoutRequest {
    pub subscriber_id: String,
    /// The creator being subscribed to, or `None` for a platform tier upgrade.
    #[serde(default)]
    pub creator_id: Option<i64>,
    pub amount: Paise,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionCheckoutResponse {
    pub subscription_id: String,
    pub order_id: String,
    pub amount: Paise,
    pub currency: String,
    pub key_id: String,
}

/// The checkout callback body: what the client-side gateway SDK hands back after a payment attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    /// HMAC-SHA256 over "{order_id}|{payment_id}", hex encoded.
    pub signature: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyPaymentResponse {
    pub order_id: String,
    pub payment_id: String,
    pub status: TrackedStatus,
    /// Net amounts credited to creators by this settlement, one entry per line item.
    pub credited: Vec<TransactionRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub order_id: String,
    pub status: OrderStatusType,
    pub amount: Paise,
    /// The most recent verification attempt for this order, if one is in flight or recently finished.
    pub verification: Option<TrackedStatus>,
    /// How many times verification has been attempted for the tracked payment.
    pub verification_attempts: Option<u32>,
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub creator_id: i64,
    pub amount: Paise,
    /// Supplied on a retry of a payout that previously timed out. When a payout with this key already exists, the
    /// existing record is returned and no new transfer is submitted.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoutResponse {
    pub payout: PayoutRecord,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub creator_id: i64,
    pub available_balance: Paise,
    pub subscription_revenue: Paise,
    pub merch_revenue: Paise,
    pub event_revenue: Paise,
    pub ad_revenue: Paise,
    pub total_paid_out: Paise,
}
