//! Unified read-only API for ledger queries.

use std::fmt::Debug;

use crate::{
    db_types::{Creator, OrderId, OrderItem, OrderRecord, PayoutRecord, Subscription, TransactionRecord},
    traits::{LedgerError, LedgerManagement},
};

/// The `LedgerApi` provides a unified API for querying the settlement ledger.
pub struct LedgerApi<B> {
    db: B,
}

impl<B: Debug> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.db)
    }
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches the creator with the given id. If no creator exists, `None` is returned.
    pub async fn creator_by_id(&self, creator_id: i64) -> Result<Option<Creator>, LedgerError> {
        self.db.fetch_creator(creator_id).await
    }

    pub async fn order_by_order_id(&self, order_id: &OrderId) -> Result<Option<OrderRecord>, LedgerError> {
        self.db.fetch_order_by_order_id(order_id).await
    }

    pub async fn order_items(&self, order_ref: i64) -> Result<Vec<OrderItem>, LedgerError> {
        self.db.fetch_order_items(order_ref).await
    }

    pub async fn subscription_by_order(&self, order_id: &OrderId) -> Result<Option<Subscription>, LedgerError> {
        self.db.fetch_subscription_by_order(order_id).await
    }

    pub async fn payouts_for_creator(&self, creator_id: i64) -> Result<Vec<PayoutRecord>, LedgerError> {
        self.db.fetch_payouts_for_creator(creator_id).await
    }

    /// The audit trail for a creator, most recent first.
    pub async fn history_for_creator(&self, creator_id: i64) -> Result<Vec<TransactionRecord>, LedgerError> {
        self.db.fetch_transactions_for_creator(creator_id).await
    }
}
