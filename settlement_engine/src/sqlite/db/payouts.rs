use enc_common::Paise;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{PayoutRecord, PayoutStatus};

/// Inserts a payout row. The UNIQUE constraint on `idempotency_key` is the durable duplicate guard; callers map
/// the constraint violation to a domain error.
pub async fn insert_payout(
    creator_id: i64,
    amount: Paise,
    idempotency_key: &str,
    transfer_id: &str,
    status: PayoutStatus,
    conn: &mut SqliteConnection,
) -> Result<PayoutRecord, sqlx::Error> {
    let payout: PayoutRecord = sqlx::query_as(
        r#"
            INSERT INTO payouts (creator_id, amount, idempotency_key, transfer_id, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(creator_id)
    .bind(amount.value())
    .bind(idempotency_key)
    .bind(transfer_id)
    .bind(status)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Payout of {amount} for creator {creator_id} recorded as {}", payout.id);
    Ok(payout)
}

pub async fn fetch_by_idempotency_key(
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE idempotency_key = $1").bind(key).fetch_optional(conn).await
}

pub async fn fetch_by_transfer_id(
    transfer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE transfer_id = $1").bind(transfer_id).fetch_optional(conn).await
}

pub async fn fetch_for_creator(creator_id: i64, conn: &mut SqliteConnection) -> Result<Vec<PayoutRecord>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payouts WHERE creator_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(creator_id)
        .fetch_all(conn)
        .await
}

pub async fn set_status(
    payout_id: i64,
    status: PayoutStatus,
    conn: &mut SqliteConnection,
) -> Result<PayoutRecord, sqlx::Error> {
    sqlx::query_as(
        "UPDATE payouts SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *;",
    )
    .bind(status)
    .bind(payout_id)
    .fetch_one(conn)
    .await
}
