use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use razorpay_tools::RazorpayApiError;
use settlement_engine::{LedgerError, SettlementError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("Could not read request path: {0}")]
    InvalidRequestPath(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("The payment signature does not match. The payment cannot be trusted.")]
    SignatureInvalid,
    #[error("Payment {0} was not successful: {1}")]
    PaymentNotSettled(String, String),
    #[error("The payment gateway did not respond in time. {0}")]
    GatewayTimeout(String),
    #[error("The server could not authenticate with the payment gateway.")]
    GatewayAuthFailure,
    #[error("Gateway error. {0}")]
    GatewayError(String),
    #[error("Insufficient balance. {0}")]
    InsufficientBalance(String),
    #[error("This payout has already been submitted. {0}")]
    DuplicatePayout(String),
    #[error("Creator {0} has no bank details on file, so no payout destination can be registered.")]
    MissingBankDetails(i64),
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidRequestPath(_) => StatusCode::BAD_REQUEST,
            Self::SignatureInvalid => StatusCode::BAD_REQUEST,
            Self::PaymentNotSettled(_, _) => StatusCode::BAD_REQUEST,
            Self::MissingBankDetails(_) => StatusCode::BAD_REQUEST,
            Self::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::GatewayAuthFailure => StatusCode::INTERNAL_SERVER_ERROR,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::InsufficientBalance(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::DuplicatePayout(_) => StatusCode::CONFLICT,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<SettlementError> for ServerError {
    fn from(e: SettlementError) -> Self {
        match e {
            SettlementError::OrderNotFound(oid) => Self::NoRecordFound(format!("Order {oid}")),
            SettlementError::NothingToSettle(oid) => Self::NoRecordFound(format!("Order {oid}")),
            SettlementError::SubscriptionNotFound(id) => Self::NoRecordFound(format!("Subscription {id}")),
            SettlementError::CreatorNotFound(id) => Self::NoRecordFound(format!("Creator {id}")),
            SettlementError::PayoutNotFound(id) => Self::NoRecordFound(format!("Payout for transfer {id}")),
            SettlementError::InsufficientBalance { .. } => Self::InsufficientBalance(e.to_string()),
            SettlementError::DuplicatePayout(key) => Self::DuplicatePayout(key),
            SettlementError::MissingFundAccount(id) => Self::MissingBankDetails(id),
            SettlementError::InvalidAmount(msg) => Self::InvalidRequestBody(msg),
            // Duplicate settlements and finalizations are handled at the webhook layer; reaching here is a bug.
            other => Self::BackendError(other.to_string()),
        }
    }
}

impl From<LedgerError> for ServerError {
    fn from(e: LedgerError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl From<RazorpayApiError> for ServerError {
    fn from(e: RazorpayApiError) -> Self {
        match e {
            RazorpayApiError::Timeout { .. } => Self::GatewayTimeout(e.to_string()),
            RazorpayApiError::AuthFailure(_) => Self::GatewayAuthFailure,
            RazorpayApiError::InvalidRequest(msg) => Self::InvalidRequestBody(msg),
            RazorpayApiError::InvalidCurrencyAmount(_) | RazorpayApiError::UnsupportedCurrency(_) => {
                Self::InvalidRequestBody(e.to_string())
            },
            other => Self::GatewayError(other.to_string()),
        }
    }
}
