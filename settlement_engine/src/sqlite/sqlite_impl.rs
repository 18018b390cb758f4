//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::Duration;
use enc_common::Paise;
use log::*;
use sqlx::SqlitePool;

use super::db::{creators, new_pool, orders, payouts, subscriptions, transactions};
use crate::{
    db_types::{
        Creator,
        NewCreator,
        NewOrder,
        NewSubscription,
        OrderId,
        OrderItem,
        OrderRecord,
        OrderStatusType,
        PayoutRecord,
        PayoutStatus,
        ProductType,
        RevenueSource,
        Subscription,
        TransactionRecord,
    },
    revenue::{CostTable, RevenueSplit},
    traits::{LedgerError, LedgerManagement, SettlementDatabase, SettlementError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object with a connection pool of size `max_connections`.
    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SettlementError> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_creator(&self, creator: NewCreator) -> Result<i64, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        creators::insert_creator(creator, &mut conn).await
    }

    async fn register_fund_account(
        &self,
        creator_id: i64,
        contact_id: &str,
        fund_account_id: &str,
    ) -> Result<(), SettlementError> {
        let mut conn = self.pool.acquire().await?;
        creators::register_fund_account(creator_id, contact_id, fund_account_id, &mut conn).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<(OrderRecord, bool), SettlementError> {
        let mut tx = self.pool.begin().await?;
        let (record, inserted) = orders::idempotent_insert(order, &mut tx).await?;
        tx.commit().await?;
        if inserted {
            debug!("🗃️ Order [{}] has been saved in the DB with id {}", record.order_id, record.id);
        }
        Ok((record, inserted))
    }

    async fn insert_subscription(&self, sub: NewSubscription) -> Result<(Subscription, bool), SettlementError> {
        let mut tx = self.pool.begin().await?;
        let (sub, inserted) = subscriptions::idempotent_insert(sub, &mut tx).await?;
        tx.commit().await?;
        if inserted {
            debug!("🗃️ Subscription [{}] has been saved in the DB with id {}", sub.subscription_id, sub.id);
        }
        Ok((sub, inserted))
    }

    /// Takes a confirmed payment for a commerce order, and in a single atomic transaction,
    /// * flips the order to `Paid`, stamping the payment id. `New` and `Expired` orders both qualify: the order is
    ///   auto-captured, so a payment that limped in after the expiry sweep still charged the customer and must be
    ///   credited. If another confirmation got there first, the whole call fails with `OrderAlreadySettled` and
    ///   nothing is credited.
    /// * computes the revenue split of every line item against the cost table
    /// * credits each creator's available balance and revenue bucket
    /// * appends an audit row per line item
    async fn settle_order(
        &self,
        order_id: &OrderId,
        payment_id: &str,
        cost_table: &CostTable,
    ) -> Result<(OrderRecord, Vec<TransactionRecord>), SettlementError> {
        let mut tx = self.pool.begin().await?;
        let existing = orders::fetch_order_by_order_id(order_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::OrderNotFound(order_id.clone()))?;
        let order = match orders::mark_paid(order_id, payment_id, &mut tx).await? {
            Some(order) => order,
            None => {
                if existing.status == OrderStatusType::Cancelled {
                    warn!(
                        "💰️ Payment {payment_id} was captured for cancelled order [{order_id}]. The charge needs a \
                         manual refund."
                    );
                }
                return Err(SettlementError::OrderAlreadySettled(order_id.clone()));
            },
        };
        let items = orders::fetch_order_items(order.id, &mut tx).await?;
        let mut records = Vec::with_capacity(items.len());
        for item in &items {
            let cost = cost_table.cost_basis(item.product_type, item.category.as_deref(), item.quantity);
            let split = RevenueSplit::compute(item.gross, item.product_type, cost);
            if split.creator_net.is_positive() {
                creators::credit_revenue(item.creator_id, item.product_type.revenue_source(), split.creator_net, &mut tx)
                    .await?;
            }
            let record = transactions::insert_transaction(
                item.creator_id,
                Some(order.id),
                item.product_type.revenue_source(),
                &split,
                &mut tx,
            )
            .await?;
            records.push(record);
        }
        tx.commit().await?;
        info!("💰️ Order [{order_id}] settled by payment {payment_id}. {} line item(s) credited.", records.len());
        Ok((order, records))
    }

    async fn activate_subscription(
        &self,
        gateway_order_id: &OrderId,
        payment_id: &str,
    ) -> Result<(Subscription, Option<TransactionRecord>), SettlementError> {
        let mut tx = self.pool.begin().await?;
        let existing = subscriptions::fetch_by_order_id(gateway_order_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::NothingToSettle(gateway_order_id.clone()))?;
        let sub = subscriptions::activate(gateway_order_id, &mut tx)
            .await?
            .ok_or(SettlementError::SubscriptionAlreadyActive(existing.subscription_id))?;
        // Platform-tier subscriptions have no creator to credit. The gross is platform revenue by definition and
        // leaves no ledger trace beyond the subscription row itself.
        let record = match sub.creator_id {
            Some(creator_id) => {
                let split = RevenueSplit::compute(sub.amount, ProductType::CreatorSubscription, Paise::from(0));
                creators::credit_revenue(creator_id, RevenueSource::Subscriptions, split.creator_net, &mut tx).await?;
                let record =
                    transactions::insert_transaction(creator_id, None, RevenueSource::Subscriptions, &split, &mut tx)
                        .await?;
                Some(record)
            },
            None => None,
        };
        tx.commit().await?;
        info!("💰️ Subscription [{}] activated by payment {payment_id}", sub.subscription_id);
        Ok((sub, record))
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let sub = subscriptions::cancel(subscription_id, &mut tx).await?;
        tx.commit().await?;
        info!("💰️ Subscription [{subscription_id}] cancelled. Status is now {}", sub.status);
        Ok(sub)
    }

    async fn next_payout_nonce(&self, creator_id: i64) -> Result<i64, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let nonce = creators::next_payout_nonce(creator_id, &mut tx).await?;
        tx.commit().await?;
        Ok(nonce)
    }

    /// Records a submitted payout. In a single atomic transaction,
    /// * rejects a duplicate idempotency key
    /// * debits the creator's available balance, guarded so that the balance can never go negative
    /// * bumps `total_paid_out` and inserts the payout row
    async fn record_payout(
        &self,
        creator_id: i64,
        amount: Paise,
        idempotency_key: &str,
        transfer_id: &str,
        status: PayoutStatus,
    ) -> Result<PayoutRecord, SettlementError> {
        if !amount.is_positive() {
            return Err(SettlementError::InvalidAmount(format!("payout amount must be positive, got {amount}")));
        }
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = payouts::fetch_by_idempotency_key(idempotency_key, &mut tx).await? {
            debug!("🗃️ Payout with idempotency key {idempotency_key} already recorded as {}", existing.id);
            return Err(SettlementError::DuplicatePayout(idempotency_key.to_string()));
        }
        if !creators::debit_for_payout(creator_id, amount, &mut tx).await? {
            let available = creators::fetch_creator_by_id(creator_id, &mut tx)
                .await?
                .map(|c| c.available_balance)
                .ok_or(SettlementError::CreatorNotFound(creator_id))?;
            return Err(SettlementError::InsufficientBalance { requested: amount, available });
        }
        let payout = payouts::insert_payout(creator_id, amount, idempotency_key, transfer_id, status, &mut tx).await?;
        tx.commit().await?;
        info!("💰️ Payout of {amount} for creator {creator_id} recorded with transfer id {transfer_id}");
        Ok(payout)
    }

    async fn finalize_payout(&self, transfer_id: &str, status: PayoutStatus) -> Result<PayoutRecord, SettlementError> {
        let mut tx = self.pool.begin().await?;
        let payout = payouts::fetch_by_transfer_id(transfer_id, &mut tx)
            .await?
            .ok_or_else(|| SettlementError::PayoutNotFound(transfer_id.to_string()))?;
        if payout.status.is_terminal() {
            return Err(SettlementError::PayoutAlreadyFinal(payout.status));
        }
        let payout = payouts::set_status(payout.id, status, &mut tx).await?;
        if status.refunds_balance() {
            creators::refund_payout(payout.creator_id, payout.amount, &mut tx).await?;
        }
        tx.commit().await?;
        info!("💰️ Payout {} (transfer {transfer_id}) is now {status}", payout.id);
        Ok(payout)
    }

    async fn expire_old_orders(&self, unpaid_limit: Duration) -> Result<Vec<OrderRecord>, SettlementError> {
        let mut conn = self.pool.acquire().await?;
        let expired = orders::expire_orders(unpaid_limit, &mut conn).await?;
        if !expired.is_empty() {
            info!("🕰️ {} order(s) expired after going unpaid for more than {unpaid_limit}", expired.len());
        }
        Ok(expired)
    }

    async fn close(&mut self) -> Result<(), SettlementError> {
        self.pool.close().await;
        Ok(())
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn fetch_creator(&self, creator_id: i64) -> Result<Option<Creator>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        Ok(creators::fetch_creator_by_id(creator_id, &mut conn).await?)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<OrderRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        Ok(orders::fetch_order_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_order_items(&self, order_ref: i64) -> Result<Vec<OrderItem>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        Ok(orders::fetch_order_items(order_ref, &mut conn).await?)
    }

    async fn fetch_subscription_by_order(&self, order_id: &OrderId) -> Result<Option<Subscription>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        Ok(subscriptions::fetch_by_order_id(order_id, &mut conn).await?)
    }

    async fn fetch_payout_by_idempotency_key(&self, key: &str) -> Result<Option<PayoutRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        Ok(payouts::fetch_by_idempotency_key(key, &mut conn).await?)
    }

    async fn fetch_payouts_for_creator(&self, creator_id: i64) -> Result<Vec<PayoutRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        Ok(payouts::fetch_for_creator(creator_id, &mut conn).await?)
    }

    async fn fetch_transactions_for_creator(&self, creator_id: i64) -> Result<Vec<TransactionRecord>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        Ok(transactions::fetch_for_creator(creator_id, &mut conn).await?)
    }
}
