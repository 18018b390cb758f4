use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewSubscription, OrderId, Subscription},
    traits::SettlementError,
};

/// Inserts a pending subscription, returning `false` in the second parameter if it already exists.
/// Run this inside a transaction and pass `&mut *tx` as the connection argument, so the write is committed before
/// the connection goes back to the pool.
pub async fn idempotent_insert(
    sub: NewSubscription,
    conn: &mut SqliteConnection,
) -> Result<(Subscription, bool), SettlementError> {
    if let Some(existing) = fetch_by_subscription_id(&sub.subscription_id, &mut *conn).await? {
        return Ok((existing, false));
    }
    let sub: Subscription = sqlx::query_as(
        r#"
            INSERT INTO subscriptions (subscription_id, gateway_order_id, creator_id, subscriber_id, amount)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(sub.subscription_id)
    .bind(sub.gateway_order_id)
    .bind(sub.creator_id)
    .bind(sub.subscriber_id)
    .bind(sub.amount.value())
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Subscription [{}] inserted with id {}", sub.subscription_id, sub.id);
    Ok((sub, true))
}

pub async fn fetch_by_subscription_id(
    subscription_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM subscriptions WHERE subscription_id = $1")
        .bind(subscription_id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM subscriptions WHERE gateway_order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(conn)
        .await
}

/// Flips the subscription from `Pending` to `Active`. As with orders, the status filter makes a duplicate
/// activation return `None` rather than crediting twice.
pub async fn activate(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Subscription>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE subscriptions SET status = 'Active', updated_at = CURRENT_TIMESTAMP
            WHERE gateway_order_id = $1 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .fetch_optional(conn)
    .await
}

pub async fn cancel(subscription_id: &str, conn: &mut SqliteConnection) -> Result<Subscription, SettlementError> {
    let sub: Option<Subscription> = sqlx::query_as(
        r#"
            UPDATE subscriptions SET status = 'Cancelled', updated_at = CURRENT_TIMESTAMP
            WHERE subscription_id = $1
            RETURNING *;
        "#,
    )
    .bind(subscription_id)
    .fetch_optional(conn)
    .await?;
    sub.ok_or_else(|| SettlementError::SubscriptionNotFound(subscription_id.to_string()))
}
