use chrono::Utc;
use mpg_common::Money;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{OrderId, Refund, RefundStatus},
};

const REFUND_COLUMNS: &str =
    "id, payment_id, order_id, amount, status, gateway_refund_id, is_partial, reason, created_at, updated_at";

pub async fn insert_refund(
    payment_id: i64,
    order_id: &OrderId,
    amount: Money,
    is_partial: bool,
    reason: Option<&str>,
    gateway_refund_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Refund, SqliteDatabaseError> {
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO refunds (payment_id, order_id, amount, status, gateway_refund_id, is_partial, reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id;
        "#,
    )
    .bind(payment_id)
    .bind(order_id)
    .bind(amount)
    .bind(RefundStatus::Pending)
    .bind(gateway_refund_id)
    .bind(is_partial)
    .bind(reason)
    .bind(Utc::now())
    .fetch_one(&mut *conn)
    .await?;
    let q = format!("SELECT {REFUND_COLUMNS} FROM refunds WHERE id = $1");
    let refund = sqlx::query_as::<_, Refund>(&q).bind(id).fetch_one(conn).await?;
    Ok(refund)
}

pub async fn refunds_for_payment(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Refund>, SqliteDatabaseError> {
    let q = format!("SELECT {REFUND_COLUMNS} FROM refunds WHERE payment_id = $1 ORDER BY id ASC");
    let refunds = sqlx::query_as::<_, Refund>(&q).bind(payment_id).fetch_all(conn).await?;
    Ok(refunds)
}

/// Total refunded so far, excluding failed attempts. The cumulative cap in the refund flow is
/// checked against this.
pub async fn refunded_total(payment_id: i64, conn: &mut SqliteConnection) -> Result<Money, SqliteDatabaseError> {
    let total: i64 =
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM refunds WHERE payment_id = $1 AND status != 'Failed'")
            .bind(payment_id)
            .fetch_one(conn)
            .await?;
    Ok(total.into())
}
