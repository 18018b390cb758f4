use chrono::Duration;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, OrderId, OrderItem, OrderRecord},
    traits::SettlementError,
};

/// Inserts the order and its line items into the database, returning `false` in the second parameter if the order
/// already exists. This is not atomic on its own; run it inside a transaction and pass `&mut *tx` as the
/// connection argument.
pub async fn idempotent_insert(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<(OrderRecord, bool), SettlementError> {
    let inserted = match fetch_order_by_order_id(&order.order_id, conn).await? {
        Some(order) => (order, false),
        None => {
            let order = insert_order(order, conn).await?;
            debug!("🗃️ Order [{}] inserted with id {}", order.order_id, order.id);
            (order, true)
        },
    };
    Ok(inserted)
}

async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<OrderRecord, SettlementError> {
    let record: OrderRecord = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, customer_id, amount, currency, receipt)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order.order_id)
    .bind(order.customer_id)
    .bind(order.amount.value())
    .bind(order.currency)
    .bind(order.receipt)
    .fetch_one(&mut *conn)
    .await?;
    for item in order.items {
        sqlx::query(
            r#"
                INSERT INTO order_items (order_ref, creator_id, product_type, category, quantity, gross)
                VALUES ($1, $2, $3, $4, $5, $6);
            "#,
        )
        .bind(record.id)
        .bind(item.creator_id)
        .bind(item.product_type)
        .bind(item.category)
        .bind(item.quantity)
        .bind(item.gross.value())
        .execute(&mut *conn)
        .await?;
    }
    Ok(record)
}

/// Returns the entry in the orders table for the corresponding gateway `order_id`
pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderRecord>, sqlx::Error> {
    let order =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await?;
    Ok(order)
}

pub async fn fetch_order_items(order_ref: i64, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_ref = $1 ORDER BY id").bind(order_ref).fetch_all(conn).await
}

/// Flips the order to `Paid` and stamps the settling payment id. The status filter in the WHERE clause is the
/// concurrency guard: only one of any number of concurrent confirmations finds an unsettled row to update, so
/// the caller can treat `None` as "someone else settled this first".
///
/// `Expired` orders are eligible too. Orders are auto-captured, so by the time a capture event arrives the
/// customer has been charged, and a slow payment that crossed the expiry sweep still has to be credited.
pub async fn mark_paid(
    order_id: &OrderId,
    payment_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderRecord>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Paid', payment_id = $1, updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $2 AND status IN ('New', 'Expired')
            RETURNING *;
        "#,
    )
    .bind(payment_id)
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await
}

/// Marks `New` orders that have gone unpaid for longer than `unpaid_limit` as `Expired` and returns them.
/// The cutoff is computed inside SQLite so it is compared in the same format that `CURRENT_TIMESTAMP` writes.
pub async fn expire_orders(
    unpaid_limit: Duration,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderRecord>, sqlx::Error> {
    let window = format!("-{} seconds", unpaid_limit.num_seconds());
    sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Expired', updated_at = CURRENT_TIMESTAMP
            WHERE status = 'New' AND created_at <= datetime('now', $1)
            RETURNING *;
        "#,
    )
    .bind(window)
    .fetch_all(conn)
    .await
}
