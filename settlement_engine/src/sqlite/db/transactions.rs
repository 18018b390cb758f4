use sqlx::SqliteConnection;

use crate::{
    db_types::{RevenueSource, TransactionRecord},
    revenue::RevenueSplit,
};

/// Appends an audit row for one revenue credit. Written in the same transaction as the balance update.
pub async fn insert_transaction(
    creator_id: i64,
    order_ref: Option<i64>,
    source: RevenueSource,
    split: &RevenueSplit,
    conn: &mut SqliteConnection,
) -> Result<TransactionRecord, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO transactions (creator_id, order_ref, source, gross, platform_fee, cost_recovery, creator_net)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(creator_id)
    .bind(order_ref)
    .bind(source)
    .bind(split.gross.value())
    .bind(split.platform_fee.value())
    .bind(split.cost_recovery.value())
    .bind(split.creator_net.value())
    .fetch_one(conn)
    .await
}

pub async fn fetch_for_creator(
    creator_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<TransactionRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM transactions WHERE creator_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(creator_id)
        .fetch_all(conn)
        .await
}
