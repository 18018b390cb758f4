use std::sync::Arc;

use log::*;
use settlement_engine::{db_types::OrderRecord, events::EventProducers, SettlementApi, SqliteDatabase};
use tokio::task::JoinHandle;

use crate::{config::ServerConfig, tracker::PaymentTracker};

/// Starts the sweep worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Each sweep expires orders that have gone unpaid beyond the configured window and purges stale entries from the
/// payment tracker.
pub fn start_sweep_worker(db: SqliteDatabase, tracker: Arc<PaymentTracker>, config: &ServerConfig) -> JoinHandle<()> {
    let interval = config.sweep_interval;
    let unpaid_limit = config.unpaid_order_timeout;
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = SettlementApi::new(db, Default::default(), EventProducers::default());
        info!("🕰️ Sweep worker started. Running every {}s", interval.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running unpaid order expiry job");
            match api.expire_old_orders(unpaid_limit).await {
                Ok(expired) if expired.is_empty() => debug!("🕰️ No orders to expire"),
                Ok(expired) => {
                    info!("🕰️ {} orders expired: {}", expired.len(), order_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running order expiry job: {e}");
                },
            }
            tracker.purge_stale();
        }
    })
}

fn order_list(orders: &[OrderRecord]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] order_id: {} cust_id: {}", o.id, o.order_id, o.customer_id))
        .collect::<Vec<String>>()
        .join(", ")
}
