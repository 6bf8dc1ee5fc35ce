use chrono::{DateTime, Utc};
use log::trace;
use mpg_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{Payout, PayoutStatus},
};

pub(crate) const PAYOUT_COLUMNS: &str = "id, payout_ref, seller_id, amount, currency, status, gateway_payout_id, \
     bank_account_id, failure_reason, scheduled_at, processed_at, created_at, updated_at";

pub async fn insert_payout(
    payout_ref: &str,
    seller_id: &str,
    amount: Money,
    currency: &str,
    bank_account_id: i64,
    scheduled_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO payouts (payout_ref, seller_id, amount, currency, status, bank_account_id, scheduled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id;
        "#,
    )
    .bind(payout_ref)
    .bind(seller_id)
    .bind(amount)
    .bind(currency)
    .bind(PayoutStatus::Pending)
    .bind(bank_account_id)
    .bind(scheduled_at)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn set_amount(payout_id: i64, amount: Money, conn: &mut SqliteConnection) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE payouts SET amount = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(amount)
        .bind(payout_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_payout(payout_id: i64, conn: &mut SqliteConnection) -> Result<Option<Payout>, SqliteDatabaseError> {
    let q = format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1");
    let payout = sqlx::query_as::<_, Payout>(&q).bind(payout_id).fetch_optional(conn).await?;
    Ok(payout)
}

pub async fn fetch_payout_by_ref(
    payout_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payout>, SqliteDatabaseError> {
    let q = format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE payout_ref = $1");
    let payout = sqlx::query_as::<_, Payout>(&q).bind(payout_ref).fetch_optional(conn).await?;
    Ok(payout)
}

pub async fn fetch_payouts_for_seller(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payout>, SqliteDatabaseError> {
    let q = format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE seller_id = $1 ORDER BY created_at DESC, id DESC");
    let payouts = sqlx::query_as::<_, Payout>(&q).bind(seller_id).fetch_all(conn).await?;
    Ok(payouts)
}

pub async fn fetch_due_payouts(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Payout>, SqliteDatabaseError> {
    let q = format!(
        "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE status = $1 AND scheduled_at <= $2 ORDER BY scheduled_at ASC"
    );
    let payouts = sqlx::query_as::<_, Payout>(&q).bind(PayoutStatus::Pending).bind(now).fetch_all(conn).await?;
    Ok(payouts)
}

/// Compare-and-set status transition; zero rows affected means the payout was no longer in `from`.
pub(crate) async fn update_status_cas(
    payout_id: i64,
    from: PayoutStatus,
    to: PayoutStatus,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let result =
        sqlx::query("UPDATE payouts SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status = $3")
            .bind(to)
            .bind(payout_id)
            .bind(from)
            .execute(conn)
            .await?;
    trace!("🗃️ Payout {payout_id} status {from} -> {to}: {} row(s)", result.rows_affected());
    Ok(result.rows_affected())
}

pub(crate) async fn record_processing(
    payout_id: i64,
    gateway_payout_id: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payouts SET status = $1, gateway_payout_id = $2, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $3 AND status = $4",
    )
    .bind(PayoutStatus::Processing)
    .bind(gateway_payout_id)
    .bind(payout_id)
    .bind(PayoutStatus::Pending)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn record_completion(
    payout_id: i64,
    gateway_payout_id: &str,
    processed_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payouts SET status = $1, gateway_payout_id = $2, processed_at = $3, \
         updated_at = CURRENT_TIMESTAMP WHERE id = $4 AND status IN ($5, $6)",
    )
    .bind(PayoutStatus::Completed)
    .bind(gateway_payout_id)
    .bind(processed_at)
    .bind(payout_id)
    .bind(PayoutStatus::Pending)
    .bind(PayoutStatus::Processing)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn record_failure(
    payout_id: i64,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payouts SET status = $1, failure_reason = $2, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $3 AND status IN ($4, $5)",
    )
    .bind(PayoutStatus::Failed)
    .bind(reason)
    .bind(payout_id)
    .bind(PayoutStatus::Pending)
    .bind(PayoutStatus::Processing)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Fails a payout the gateway had already marked processed. Only reachable from `Completed`.
pub(crate) async fn record_reversal(
    payout_id: i64,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payouts SET status = $1, failure_reason = $2, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $3 AND status = $4",
    )
    .bind(PayoutStatus::Failed)
    .bind(reason)
    .bind(payout_id)
    .bind(PayoutStatus::Completed)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
