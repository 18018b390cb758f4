use thiserror::Error;

#[derive(Debug, Error)]
pub enum RazorpayApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Gateway authentication failed. Check the API key configuration. {0}")]
    AuthFailure(String),
    #[error("Call '{name}' timed out after {seconds}s")]
    Timeout { name: String, seconds: u64 },
    #[error("Invalid currency amount: {0}")]
    InvalidCurrencyAmount(String),
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

impl RazorpayApiError {
    /// Whether the retry executor may try the call again. Authentication failures and requests the gateway rejected
    /// as malformed will fail identically on every attempt, so they are surfaced immediately.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::AuthFailure(_) | Self::InvalidRequest(_) | Self::Initialization(_) => false,
            Self::InvalidCurrencyAmount(_) | Self::UnsupportedCurrency(_) => false,
            Self::QueryError { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout { .. } | Self::RestResponseError(_) => true,
            Self::JsonError(_) => false,
        }
    }
}
