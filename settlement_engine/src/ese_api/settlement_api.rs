use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, NewSubscription, OrderId, OrderRecord, Subscription, TransactionRecord},
    events::{EventProducers, OrderSettledEvent},
    revenue::CostTable,
    traits::{SettlementDatabase, SettlementError},
};

/// `SettlementApi` is the primary API for applying payment outcomes to the ledger in response to gateway webhook
/// events: settling orders, activating subscriptions and expiring stale orders.
pub struct SettlementApi<B> {
    db: B,
    cost_table: CostTable,
    producers: EventProducers,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, cost_table: CostTable, producers: EventProducers) -> Self {
        Self { db, cost_table, producers }
    }
}

impl<B> SettlementApi<B>
where B: SettlementDatabase
{
    /// Register a brand-new order with the ledger before any payment arrives. Idempotent on the gateway order id,
    /// so replaying an order creation is harmless.
    pub async fn register_order(&self, order: NewOrder) -> Result<OrderRecord, SettlementError> {
        let (record, inserted) = self.db.insert_order(order).await?;
        if !inserted {
            debug!("🔄️📦️ Order [{}] was already registered. Nothing to do.", record.order_id);
        }
        Ok(record)
    }

    /// Register a pending subscription awaiting its first payment.
    pub async fn register_subscription(&self, sub: NewSubscription) -> Result<Subscription, SettlementError> {
        let (record, inserted) = self.db.insert_subscription(sub).await?;
        if !inserted {
            debug!("🔄️📦️ Subscription [{}] was already registered. Nothing to do.", record.subscription_id);
        }
        Ok(record)
    }

    /// Apply a confirmed payment to whatever the gateway order pays for. Commerce orders are settled line item by
    /// line item; subscription orders are activated. Exactly one of the two happens, atomically, and the order
    /// settled hook fires only after the transaction has committed.
    pub async fn confirm_payment(
        &self,
        order_id: &OrderId,
        payment_id: &str,
    ) -> Result<Vec<TransactionRecord>, SettlementError> {
        match self.db.settle_order(order_id, payment_id, &self.cost_table).await {
            Ok((order, transactions)) => {
                self.call_order_settled_hook(&order, &transactions).await;
                Ok(transactions)
            },
            // Not a commerce order. See if the payment belongs to a subscription instead.
            Err(SettlementError::OrderNotFound(_)) => {
                let (sub, transaction) = self.db.activate_subscription(order_id, payment_id).await?;
                debug!("🔄️💳️ Gateway order [{order_id}] activated subscription [{}]", sub.subscription_id);
                Ok(transaction.into_iter().collect())
            },
            Err(e) => Err(e),
        }
    }

    /// Record a failed payment attempt. The order stays `New`; the customer may retry with a fresh payment, so a
    /// failure is logged but changes nothing in the ledger.
    pub async fn payment_failed(&self, order_id: &OrderId, payment_id: &str, reason: Option<&str>) {
        info!(
            "🔄️💳️ Payment {payment_id} for order [{order_id}] failed{}. The order remains open for retry.",
            reason.map(|r| format!(": {r}")).unwrap_or_default()
        );
    }

    pub async fn cancel_subscription(&self, subscription_id: &str) -> Result<Subscription, SettlementError> {
        self.db.cancel_subscription(subscription_id).await
    }

    /// Expire orders that have gone unpaid beyond the given window. Called periodically by the sweep worker.
    pub async fn expire_old_orders(&self, unpaid_limit: chrono::Duration) -> Result<Vec<OrderRecord>, SettlementError> {
        self.db.expire_old_orders(unpaid_limit).await
    }

    async fn call_order_settled_hook(&self, order: &OrderRecord, transactions: &[TransactionRecord]) {
        for emitter in &self.producers.order_settled_producer {
            debug!("🔄️📦️ Notifying order settled hook subscribers");
            let event = OrderSettledEvent::new(order.clone(), transactions.to_vec());
            emitter.publish_event(event).await;
        }
    }
}
