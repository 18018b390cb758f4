use chrono::Duration;
use enc_common::Paise;
use thiserror::Error;

use crate::{
    db_types::{
        NewCreator,
        NewOrder,
        NewSubscription,
        OrderId,
        OrderRecord,
        PayoutRecord,
        PayoutStatus,
        Subscription,
        TransactionRecord,
    },
    revenue::CostTable,
    traits::{LedgerError, LedgerManagement},
};

/// The highest level of behaviour for backends supporting the settlement engine.
///
/// This behaviour includes:
/// * Registering creators, orders and subscriptions as they enter the system.
/// * Applying confirmed gateway payments: status flip + revenue credit + audit row, atomically.
/// * The payout ledger: precondition-guarded debits, idempotent submission, terminal-state refunds.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase: Clone + LedgerManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Register a creator account. Bank details may be absent; payouts will then fail until they are supplied.
    async fn insert_creator(&self, creator: NewCreator) -> Result<i64, SettlementError>;

    /// Cache the gateway payout identifiers on the creator record after first registration.
    async fn register_fund_account(
        &self,
        creator_id: i64,
        contact_id: &str,
        fund_account_id: &str,
    ) -> Result<(), SettlementError>;

    /// Store a local order record (and its line items) for a gateway order, in a single atomic transaction.
    /// This call is idempotent: re-submitting an existing order id returns the stored record and `false`.
    async fn insert_order(&self, order: NewOrder) -> Result<(OrderRecord, bool), SettlementError>;

    /// Store a pending subscription awaiting payment. Idempotent on the subscription id.
    async fn insert_subscription(&self, sub: NewSubscription) -> Result<(Subscription, bool), SettlementError>;

    /// Apply a confirmed payment to a commerce order: in one transaction, flip the order from `New` to `Paid`,
    /// compute the revenue split of every line item against the cost table, credit each creator's balance and
    /// revenue bucket, and append an audit row per item.
    ///
    /// The `New → Paid` transition doubles as the per-entity concurrency guard: a second confirmation for the same
    /// order finds no `New` row to update and returns [`SettlementError::OrderAlreadySettled`], so two concurrent
    /// "payment captured" deliveries cannot double-credit.
    async fn settle_order(
        &self,
        order_id: &OrderId,
        payment_id: &str,
        cost_table: &CostTable,
    ) -> Result<(OrderRecord, Vec<TransactionRecord>), SettlementError>;

    /// Apply a confirmed payment to a pending subscription: flip it to `Active` and credit the creator's
    /// subscription revenue (full gross for creator tiers, nothing for platform tiers), atomically. The
    /// `Pending → Active` guard makes a duplicate delivery return [`SettlementError::SubscriptionAlreadyActive`].
    async fn activate_subscription(
        &self,
        gateway_order_id: &OrderId,
        payment_id: &str,
    ) -> Result<(Subscription, Option<TransactionRecord>), SettlementError>;

    /// Mark a subscription as cancelled. No balance movement; already-credited periods stay credited.
    async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, SettlementError>;

    /// Atomically increment and return the creator's payout nonce, used to derive idempotency keys.
    async fn next_payout_nonce(&self, creator_id: i64) -> Result<i64, SettlementError>;

    /// Record a submitted payout: in one transaction, debit the creator's available balance (guarded so the balance
    /// can never go negative), bump the total paid out, and insert the payout row carrying the gateway transfer id
    /// and idempotency key.
    async fn record_payout(
        &self,
        creator_id: i64,
        amount: Paise,
        idempotency_key: &str,
        transfer_id: &str,
        status: PayoutStatus,
    ) -> Result<PayoutRecord, SettlementError>;

    /// Transition a payout to a new state on gateway notification. `Failed` and `Cancelled` refund the debited
    /// amount to the creator's balance in the same transaction. Transitions out of a terminal state are rejected.
    async fn finalize_payout(&self, transfer_id: &str, status: PayoutStatus) -> Result<PayoutRecord, SettlementError>;

    /// Mark `New` orders that have not been updated within `unpaid_limit` as `Expired`. Returns the expired orders.
    async fn expire_old_orders(&self, unpaid_limit: Duration) -> Result<Vec<OrderRecord>, SettlementError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), SettlementError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum SettlementError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {0} has already been settled")]
    OrderAlreadySettled(OrderId),
    #[error("No pending subscription or order matches gateway order {0}")]
    NothingToSettle(OrderId),
    #[error("The requested subscription {0} does not exist")]
    SubscriptionNotFound(String),
    #[error("Subscription {0} is already active")]
    SubscriptionAlreadyActive(String),
    #[error("The requested creator {0} does not exist")]
    CreatorNotFound(i64),
    #[error("Creator {0} has no registered fund account")]
    MissingFundAccount(i64),
    #[error("Insufficient balance: requested {requested} but only {available} is available")]
    InsufficientBalance { requested: Paise, available: Paise },
    #[error("A payout with idempotency key {0} already exists")]
    DuplicatePayout(String),
    #[error("The requested payout for transfer {0} does not exist")]
    PayoutNotFound(String),
    #[error("Illegal payout status change: {0} is terminal")]
    PayoutAlreadyFinal(PayoutStatus),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("{0}")]
    LedgerError(#[from] LedgerError),
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self {
        SettlementError::DatabaseError(e.to_string())
    }
}
