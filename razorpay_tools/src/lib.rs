//! # Razorpay tools
//!
//! A thin, typed client for the parts of the Razorpay API that the Encore settlement engine needs: order creation,
//! payment fetches, and payouts (RazorpayX contacts, fund accounts and transfers).
//!
//! The crate also owns the two failure-handling primitives that every outbound call goes through:
//! * [`signature`]: HMAC-SHA256 signing and constant-time verification of payment confirmations and webhook bodies.
//! * [`retry`]: a [`RetryPolicy`] value object and a generic executor that races each attempt against a hard
//!   deadline and backs off between retryable failures.
mod api;
mod config;
mod error;

mod data_objects;

pub mod helpers;
pub mod retry;
pub mod signature;

pub use api::RazorpayApi;
pub use config::RazorpayConfig;
pub use data_objects::{
    BankAccountDetails,
    Contact,
    FundAccount,
    NewFundAccount,
    NewOrderRequest,
    NewPayoutRequest,
    PaymentState,
    PayoutState,
    RazorpayOrder,
    RazorpayPayment,
    RazorpayPayout,
};
pub use error::RazorpayApiError;
pub use retry::RetryPolicy;
