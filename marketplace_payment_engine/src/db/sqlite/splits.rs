use chrono::{DateTime, Utc};
use log::trace;
use mpg_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{HoldStatus, PaymentSplit, SplitStatus},
    splits::SplitAmounts,
};

pub(crate) const SPLIT_COLUMNS: &str = "id, payment_id, order_item_id, seller_id, gross_amount, commission_rate_bp, \
     commission_amount, gst_rate_bp, gst_on_commission, tds_rate_bp, tds_deducted, net_seller_amount, status, \
     hold_status, hold_until, payout_id, created_at, updated_at";

#[allow(clippy::too_many_arguments)]
pub async fn insert_split(
    payment_id: i64,
    order_item_id: &str,
    seller_id: &str,
    amounts: &SplitAmounts,
    commission_rate_bp: i64,
    gst_rate_bp: i64,
    tds_rate_bp: i64,
    hold_until: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO payment_splits (
                payment_id, order_item_id, seller_id, gross_amount, commission_rate_bp, commission_amount,
                gst_rate_bp, gst_on_commission, tds_rate_bp, tds_deducted, net_seller_amount,
                status, hold_status, hold_until
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id;
        "#,
    )
    .bind(payment_id)
    .bind(order_item_id)
    .bind(seller_id)
    .bind(amounts.gross_amount)
    .bind(commission_rate_bp)
    .bind(amounts.commission)
    .bind(gst_rate_bp)
    .bind(amounts.gst_on_commission)
    .bind(tds_rate_bp)
    .bind(amounts.tds_deducted)
    .bind(amounts.net_seller_amount)
    .bind(SplitStatus::Pending)
    .bind(HoldStatus::Held)
    .bind(hold_until)
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn fetch_splits_for_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentSplit>, SqliteDatabaseError> {
    let q = format!("SELECT {SPLIT_COLUMNS} FROM payment_splits WHERE payment_id = $1 ORDER BY id ASC");
    let splits = sqlx::query_as::<_, PaymentSplit>(&q).bind(payment_id).fetch_all(conn).await?;
    Ok(splits)
}

pub async fn fetch_releasable(
    now: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentSplit>, SqliteDatabaseError> {
    let q = format!(
        "SELECT {SPLIT_COLUMNS} FROM payment_splits WHERE hold_status = $1 AND hold_until <= $2 \
         ORDER BY hold_until ASC LIMIT $3"
    );
    let splits = sqlx::query_as::<_, PaymentSplit>(&q)
        .bind(HoldStatus::Held)
        .bind(now)
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(splits)
}

/// Conditional release. Zero rows affected means another worker released the split first; that is
/// a no-op for the caller, not an error.
pub async fn release(split_id: i64, conn: &mut SqliteConnection) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payment_splits SET hold_status = $1, status = $2, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $3 AND hold_status = $4",
    )
    .bind(HoldStatus::Released)
    .bind(SplitStatus::Settled)
    .bind(split_id)
    .bind(HoldStatus::Held)
    .execute(conn)
    .await?;
    let released = result.rows_affected() > 0;
    trace!("🗃️ Split {split_id} release: {}", if released { "done" } else { "no-op" });
    Ok(released)
}

/// Sum of net amounts a seller could currently pay out: released and not yet consumed.
pub async fn available_balance(seller_id: &str, conn: &mut SqliteConnection) -> Result<Money, SqliteDatabaseError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(net_seller_amount), 0) FROM payment_splits \
         WHERE seller_id = $1 AND hold_status = $2 AND status = $3",
    )
    .bind(seller_id)
    .bind(HoldStatus::Released)
    .bind(SplitStatus::Settled)
    .fetch_one(conn)
    .await?;
    Ok(total.into())
}

/// Released, unreserved splits for a seller, oldest hold first — the candidate pool for a payout.
pub async fn fetch_available(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentSplit>, SqliteDatabaseError> {
    let q = format!(
        "SELECT {SPLIT_COLUMNS} FROM payment_splits WHERE seller_id = $1 AND hold_status = $2 AND status = $3 \
         ORDER BY hold_until ASC, id ASC"
    );
    let splits = sqlx::query_as::<_, PaymentSplit>(&q)
        .bind(seller_id)
        .bind(HoldStatus::Released)
        .bind(SplitStatus::Settled)
        .fetch_all(conn)
        .await?;
    Ok(splits)
}

/// Reserves one split for a payout, conditionally on it still being available. Exactly one of any
/// set of concurrent reservation attempts can win a given split.
pub async fn reserve_for_payout(
    split_id: i64,
    payout_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payment_splits SET status = $1, payout_id = $2, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $3 AND status = $4 AND hold_status = $5",
    )
    .bind(SplitStatus::PayoutPending)
    .bind(payout_id)
    .bind(split_id)
    .bind(SplitStatus::Settled)
    .bind(HoldStatus::Released)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

/// Returns reserved splits to the available pool after a failed or cancelled payout.
pub async fn release_reservations(payout_id: i64, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payment_splits SET status = $1, payout_id = NULL, updated_at = CURRENT_TIMESTAMP \
         WHERE payout_id = $2 AND status = $3",
    )
    .bind(SplitStatus::Settled)
    .bind(payout_id)
    .bind(SplitStatus::PayoutPending)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Terminal transition once the gateway confirms disbursal. Paid splits are immutable afterwards.
pub async fn mark_paid(payout_id: i64, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payment_splits SET status = $1, updated_at = CURRENT_TIMESTAMP \
         WHERE payout_id = $2 AND status = $3",
    )
    .bind(SplitStatus::Paid)
    .bind(payout_id)
    .bind(SplitStatus::PayoutPending)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

/// Undoes the terminal `Paid` state after a gateway reversal, returning the splits to the
/// available pool.
pub async fn unpay(payout_id: i64, conn: &mut SqliteConnection) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payment_splits SET status = $1, payout_id = NULL, updated_at = CURRENT_TIMESTAMP \
         WHERE payout_id = $2 AND status = $3",
    )
    .bind(SplitStatus::Settled)
    .bind(payout_id)
    .bind(SplitStatus::Paid)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

#[derive(sqlx::FromRow)]
struct SellerTotalsRow {
    total_earned: i64,
    on_hold: i64,
    available: i64,
    reserved: i64,
    paid_out: i64,
}

pub struct SellerSplitTotals {
    pub total_earned: Money,
    pub on_hold: Money,
    pub available: Money,
    pub reserved: Money,
    pub paid_out: Money,
}

pub async fn seller_totals(seller_id: &str, conn: &mut SqliteConnection) -> Result<SellerSplitTotals, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, SellerTotalsRow>(
        r#"
            SELECT
                COALESCE(SUM(net_seller_amount), 0) AS total_earned,
                COALESCE(SUM(CASE WHEN hold_status = 'Held' THEN net_seller_amount ELSE 0 END), 0) AS on_hold,
                COALESCE(SUM(CASE WHEN hold_status = 'Released' AND status = 'Settled' THEN net_seller_amount ELSE 0 END), 0)
                    AS available,
                COALESCE(SUM(CASE WHEN status = 'PayoutPending' THEN net_seller_amount ELSE 0 END), 0) AS reserved,
                COALESCE(SUM(CASE WHEN status = 'Paid' THEN net_seller_amount ELSE 0 END), 0) AS paid_out
            FROM payment_splits
            WHERE seller_id = $1;
        "#,
    )
    .bind(seller_id)
    .fetch_one(conn)
    .await?;
    Ok(SellerSplitTotals {
        total_earned: row.total_earned.into(),
        on_hold: row.on_hold.into(),
        available: row.available.into(),
        reserved: row.reserved.into(),
        paid_out: row.paid_out.into(),
    })
}
