use thiserror::Error;

use crate::db_types::{Creator, OrderId, OrderItem, OrderRecord, PayoutRecord, Subscription, TransactionRecord};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// Read-only queries over the settlement ledger. The [`SettlementDatabase`](super::SettlementDatabase) trait
/// handles the machinery of mutating balances; `LedgerManagement` answers questions about them.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    /// Fetches the creator with the given id. If no creator exists, `None` is returned.
    async fn fetch_creator(&self, creator_id: i64) -> Result<Option<Creator>, LedgerError>;

    /// Fetches the local order record for a gateway order id, if one exists.
    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<OrderRecord>, LedgerError>;

    /// Fetches the line items of an order by the order's row id.
    async fn fetch_order_items(&self, order_ref: i64) -> Result<Vec<OrderItem>, LedgerError>;

    /// Fetches the subscription paid for by the given gateway order, if any.
    async fn fetch_subscription_by_order(&self, order_id: &OrderId) -> Result<Option<Subscription>, LedgerError>;

    async fn fetch_payout_by_idempotency_key(&self, key: &str) -> Result<Option<PayoutRecord>, LedgerError>;

    async fn fetch_payouts_for_creator(&self, creator_id: i64) -> Result<Vec<PayoutRecord>, LedgerError>;

    /// The audit trail for a creator, most recent first.
    async fn fetch_transactions_for_creator(&self, creator_id: i64) -> Result<Vec<TransactionRecord>, LedgerError>;
}
