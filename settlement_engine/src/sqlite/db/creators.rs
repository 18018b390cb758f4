use enc_common::Paise;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Creator, NewCreator, RevenueSource},
    traits::SettlementError,
};

pub async fn insert_creator(creator: NewCreator, conn: &mut SqliteConnection) -> Result<i64, SettlementError> {
    let id = sqlx::query(
        r#"
            INSERT INTO creators (name, bank_account_name, bank_ifsc, bank_account_number)
            VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(creator.name)
    .bind(creator.bank_account_name)
    .bind(creator.bank_ifsc)
    .bind(creator.bank_account_number)
    .execute(conn)
    .await?
    .last_insert_rowid();
    debug!("🗃️ Creator registered with id {id}");
    Ok(id)
}

pub async fn fetch_creator_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Creator>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM creators WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Caches the gateway payout identifiers on the creator record.
pub async fn register_fund_account(
    id: i64,
    contact_id: &str,
    fund_account_id: &str,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    let res = sqlx::query(
        "UPDATE creators SET contact_id = $1, fund_account_id = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3",
    )
    .bind(contact_id)
    .bind(fund_account_id)
    .bind(id)
    .execute(conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(SettlementError::CreatorNotFound(id));
    }
    Ok(())
}

/// Credits a creator's available balance and the matching revenue bucket. Embed this inside the settlement
/// transaction so that the credit commits or rolls back together with the order status flip.
pub async fn credit_revenue(
    creator_id: i64,
    source: RevenueSource,
    net: Paise,
    conn: &mut SqliteConnection,
) -> Result<(), SettlementError> {
    let bucket = match source {
        RevenueSource::Subscriptions => "subscription_revenue",
        RevenueSource::Merchandise => "merch_revenue",
        RevenueSource::Events => "event_revenue",
        RevenueSource::Ads => "ad_revenue",
    };
    let q = format!(
        "UPDATE creators SET available_balance = available_balance + $1, {bucket} = {bucket} + $1, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $2"
    );
    let res = sqlx::query(&q).bind(net.value()).bind(creator_id).execute(conn).await?;
    if res.rows_affected() == 0 {
        return Err(SettlementError::CreatorNotFound(creator_id));
    }
    debug!("🗃️ Credited {net} of {source} revenue to creator {creator_id}");
    Ok(())
}

/// Debits the available balance for a payout, with the balance check folded into the UPDATE itself so that two
/// concurrent payout requests cannot both pass a read-then-write check. Returns `false` if the balance was
/// insufficient (or the creator does not exist); the caller's transaction should then roll back.
pub async fn debit_for_payout(
    creator_id: i64,
    amount: Paise,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let res = sqlx::query(
        r#"
            UPDATE creators
            SET available_balance = available_balance - $1,
                total_paid_out = total_paid_out + $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND available_balance >= $1
        "#,
    )
    .bind(amount.value())
    .bind(creator_id)
    .execute(conn)
    .await?;
    Ok(res.rows_affected() > 0)
}

/// Returns a previously debited payout amount to the creator. Used when the gateway reports the transfer as failed
/// or cancelled.
pub async fn refund_payout(creator_id: i64, amount: Paise, conn: &mut SqliteConnection) -> Result<(), SettlementError> {
    let res = sqlx::query(
        r#"
            UPDATE creators
            SET available_balance = available_balance + $1,
                total_paid_out = total_paid_out - $1,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $2
        "#,
    )
    .bind(amount.value())
    .bind(creator_id)
    .execute(conn)
    .await?;
    if res.rows_affected() == 0 {
        return Err(SettlementError::CreatorNotFound(creator_id));
    }
    debug!("🗃️ Refunded {amount} to creator {creator_id}");
    Ok(())
}

/// Increments and returns the creator's payout nonce. Each payout attempt gets a fresh nonce, which feeds the
/// idempotency key, so a retry of the same attempt reuses the key while a new attempt never collides with it.
/// Run this inside a transaction and pass `&mut *tx` as the connection argument.
pub async fn next_payout_nonce(creator_id: i64, conn: &mut SqliteConnection) -> Result<i64, SettlementError> {
    let nonce: Option<(i64,)> = sqlx::query_as(
        "UPDATE creators SET payout_nonce = payout_nonce + 1, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING \
         payout_nonce",
    )
    .bind(creator_id)
    .fetch_optional(conn)
    .await?;
    nonce.map(|(n,)| n).ok_or(SettlementError::CreatorNotFound(creator_id))
}
