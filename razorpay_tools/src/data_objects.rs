use std::fmt::Display;

use enc_common::Paise;
use serde::{Deserialize, Serialize};

//--------------------------------------      Orders       -----------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct NewOrderRequest {
    /// The gross amount in minor units (paise).
    pub amount: Paise,
    pub currency: String,
    pub receipt: String,
    /// `true` requests automatic capture of authorized payments.
    pub payment_capture: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayOrder {
    pub id: String,
    pub amount: Paise,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
}

//--------------------------------------      Payments     -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    Created,
    Authorized,
    Captured,
    Failed,
    Refunded,
}

impl PaymentState {
    /// Whether the gateway considers the money secured. Authorized payments on auto-capture orders are settled by
    /// the gateway without further client involvement, so both states count as success.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentState::Captured | PaymentState::Authorized)
    }
}

impl Display for PaymentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentState::Created => write!(f, "created"),
            PaymentState::Authorized => write!(f, "authorized"),
            PaymentState::Captured => write!(f, "captured"),
            PaymentState::Failed => write!(f, "failed"),
            PaymentState::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayPayment {
    pub id: String,
    pub order_id: String,
    pub status: PaymentState,
    pub amount: Paise,
    #[serde(default)]
    pub error_description: Option<String>,
}

//--------------------------------------      Payouts      -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutState {
    Pending,
    Queued,
    Processing,
    Processed,
    Reversed,
    Cancelled,
    Rejected,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewPayoutRequest {
    pub account_number: String,
    pub fund_account_id: String,
    pub amount: Paise,
    pub currency: String,
    /// Transfer rail: IMPS for small amounts, NEFT otherwise.
    pub mode: String,
    pub purpose: String,
    pub reference_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayPayout {
    pub id: String,
    pub status: PayoutState,
    pub amount: Paise,
    #[serde(default)]
    pub reference_id: Option<String>,
}

//--------------------------------------  Fund accounts    -----------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BankAccountDetails {
    pub name: String,
    pub ifsc: String,
    pub account_number: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewFundAccount {
    pub contact_id: String,
    pub account_type: String,
    pub bank_account: BankAccountDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FundAccount {
    pub id: String,
    #[serde(default)]
    pub active: bool,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_deserializes_from_gateway_json() {
        let json = r#"{
            "id": "pay_29QQoUBi66xm2f",
            "entity": "payment",
            "amount": 100000,
            "currency": "INR",
            "status": "captured",
            "order_id": "order_9A33XWu170gUtm",
            "method": "upi"
        }"#;
        let payment: RazorpayPayment = serde_json::from_str(json).unwrap();
        assert_eq!(payment.id, "pay_29QQoUBi66xm2f");
        assert_eq!(payment.status, PaymentState::Captured);
        assert!(payment.status.is_settled());
        assert_eq!(payment.amount, Paise::from(100_000));
        assert!(payment.error_description.is_none());
    }

    #[test]
    fn failed_payment_carries_description() {
        let json = r#"{
            "id": "pay_FAIL",
            "amount": 50000,
            "status": "failed",
            "order_id": "order_X",
            "error_description": "Card declined by issuing bank"
        }"#;
        let payment: RazorpayPayment = serde_json::from_str(json).unwrap();
        assert!(!payment.status.is_settled());
        assert_eq!(payment.error_description.as_deref(), Some("Card declined by issuing bank"));
    }

    #[test]
    fn authorized_counts_as_settled() {
        assert!(PaymentState::Authorized.is_settled());
        assert!(!PaymentState::Created.is_settled());
        assert!(!PaymentState::Refunded.is_settled());
    }
}
