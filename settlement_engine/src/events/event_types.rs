use serde::Serialize;

use crate::db_types::{OrderRecord, PayoutRecord, TransactionRecord};

/// Emitted after an order has been settled: the status flip, balance credits and audit rows have all committed.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSettledEvent {
    pub order: OrderRecord,
    /// One audit entry per line item, in the order the items were credited.
    pub transactions: Vec<TransactionRecord>,
}

impl OrderSettledEvent {
    pub fn new(order: OrderRecord, transactions: Vec<TransactionRecord>) -> Self {
        Self { order, transactions }
    }
}

/// Emitted when a payout reaches a terminal state (processed, failed or cancelled). For failed and cancelled
/// payouts the refund has already been applied when this fires.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutFinalizedEvent {
    pub payout: PayoutRecord,
}

impl PayoutFinalizedEvent {
    pub fn new(payout: PayoutRecord) -> Self {
        Self { payout }
    }
}
