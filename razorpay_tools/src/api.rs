use std::sync::Arc;

use enc_common::Paise;
use log::*;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::RazorpayConfig,
    data_objects::{
        Contact,
        FundAccount,
        NewFundAccount,
        NewOrderRequest,
        NewPayoutRequest,
        RazorpayOrder,
        RazorpayPayment,
        RazorpayPayout,
    },
    helpers::generate_receipt,
    retry::{deadlines, execute},
    RazorpayApiError,
    RetryPolicy,
};

/// Currencies the engine accepts for order creation. Everything downstream assumes minor units of 1/100.
pub const ALLOWED_CURRENCIES: [&str; 1] = ["INR"];

const IDEMPOTENCY_HEADER: &str = "X-Payout-Idempotency";

#[derive(Clone)]
pub struct RazorpayApi {
    config: RazorpayConfig,
    client: Arc<Client>,
    policy: RetryPolicy,
}

impl RazorpayApi {
    pub fn new(config: RazorpayConfig) -> Result<Self, RazorpayApiError> {
        let client = Client::builder().build().map_err(|e| RazorpayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client), policy: RetryPolicy::default() })
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_base)
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        idempotency_key: Option<&str>,
        body: Option<&B>,
    ) -> Result<T, RazorpayApiError> {
        let url = self.url(path);
        trace!("💳️ Sending REST query: {url}");
        let mut req = self
            .client
            .request(method, url)
            .basic_auth(&self.config.key_id, Some(self.config.key_secret.reveal()));
        if let Some(key) = idempotency_key {
            req = req.header(IDEMPOTENCY_HEADER, key);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
        let status = response.status();
        if status.is_success() {
            trace!("💳️ REST query successful. {status}");
            return response.json::<T>().await.map_err(|e| RazorpayApiError::JsonError(e.to_string()));
        }
        let message = response.text().await.map_err(|e| RazorpayApiError::RestResponseError(e.to_string()))?;
        match status.as_u16() {
            401 | 403 => Err(RazorpayApiError::AuthFailure(message)),
            400 => Err(RazorpayApiError::InvalidRequest(message)),
            status => Err(RazorpayApiError::QueryError { status, message }),
        }
    }

    /// Create a payment order at the gateway.
    ///
    /// Amount and currency are validated locally first; an invalid request never reaches the network. A receipt
    /// reference is generated when the caller does not supply one.
    pub async fn create_order(
        &self,
        amount: Paise,
        currency: &str,
        receipt: Option<String>,
    ) -> Result<RazorpayOrder, RazorpayApiError> {
        if !amount.is_positive() {
            return Err(RazorpayApiError::InvalidCurrencyAmount(format!("Order amount must be positive, got {amount}")));
        }
        if !ALLOWED_CURRENCIES.contains(&currency) {
            return Err(RazorpayApiError::UnsupportedCurrency(currency.to_string()));
        }
        let request = NewOrderRequest {
            amount,
            currency: currency.to_string(),
            receipt: receipt.unwrap_or_else(generate_receipt),
            payment_capture: true,
        };
        debug!("💳️ Creating gateway order for {amount} (receipt {})", request.receipt);
        let order: RazorpayOrder = execute(self.policy, "create_order", deadlines::ORDER_CREATE, || {
            self.rest_query(Method::POST, "/orders", None, Some(&request))
        })
        .await?;
        info!("💳️ Gateway order {} created for {amount}", order.id);
        Ok(order)
    }

    /// Fetch the authoritative payment object for a payment id.
    pub async fn fetch_payment(&self, payment_id: &str) -> Result<RazorpayPayment, RazorpayApiError> {
        let path = format!("/payments/{payment_id}");
        debug!("💳️ Fetching payment {payment_id}");
        execute(self.policy, "fetch_payment", deadlines::PAYMENT_FETCH, || {
            self.rest_query::<RazorpayPayment, ()>(Method::GET, &path, None, None)
        })
        .await
    }

    /// Register a payout contact for a creator.
    pub async fn create_contact(&self, name: &str, reference_id: &str) -> Result<Contact, RazorpayApiError> {
        let body = serde_json::json!({
            "name": name,
            "type": "vendor",
            "reference_id": reference_id,
        });
        debug!("💳️ Registering payout contact for {reference_id}");
        execute(self.policy, "create_contact", deadlines::PAYOUT_CREATE, || {
            self.rest_query(Method::POST, "/contacts", None, Some(&body))
        })
        .await
    }

    /// Register a bank account as a fund account under an existing contact.
    pub async fn create_fund_account(&self, account: &NewFundAccount) -> Result<FundAccount, RazorpayApiError> {
        debug!("💳️ Registering fund account for contact {}", account.contact_id);
        execute(self.policy, "create_fund_account", deadlines::PAYOUT_CREATE, || {
            self.rest_query(Method::POST, "/fund_accounts", None, Some(account))
        })
        .await
    }

    /// Submit a payout transfer. The idempotency key makes a client-side retry of the same logical payout resolve
    /// to the original transfer instead of creating a second one.
    pub async fn create_payout(
        &self,
        request: &NewPayoutRequest,
        idempotency_key: &str,
    ) -> Result<RazorpayPayout, RazorpayApiError> {
        debug!("💳️ Creating payout of {} (ref {})", request.amount, request.reference_id);
        let payout: RazorpayPayout = execute(self.policy, "create_payout", deadlines::PAYOUT_CREATE, || {
            self.rest_query(Method::POST, "/payouts", Some(idempotency_key), Some(request))
        })
        .await?;
        info!("💳️ Payout {} submitted for {}", payout.id, payout.amount);
        Ok(payout)
    }

    pub fn config(&self) -> &RazorpayConfig {
        &self.config
    }
}
