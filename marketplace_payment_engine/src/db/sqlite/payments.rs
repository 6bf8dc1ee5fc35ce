use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db::sqlite::SqliteDatabaseError,
    db_types::{NewPayment, OrderId, OrderItem, Payment, PaymentStatus},
    traits::data_objects::PaymentAnalytics,
};

pub(crate) const PAYMENT_COLUMNS: &str = "id, order_id, customer_id, amount, currency, gateway, gateway_order_id, \
     gateway_payment_id, payment_method, status, failure_reason, idempotency_key, metadata, initiated_at, \
     completed_at, updated_at";

/// Inserts the payment row and its order items. Not atomic on its own; run it inside a
/// transaction and pass `&mut *tx` as the connection argument.
pub async fn insert_payment(
    payment: &NewPayment,
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<i64, SqliteDatabaseError> {
    let now = Utc::now();
    let id: i64 = sqlx::query_scalar(
        r#"
            INSERT INTO payments (
                order_id, customer_id, amount, currency, gateway, gateway_order_id, payment_method,
                status, idempotency_key, metadata, initiated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id;
        "#,
    )
    .bind(&payment.order_id)
    .bind(&payment.customer_id)
    .bind(payment.amount)
    .bind(&payment.currency)
    .bind(payment.gateway)
    .bind(gateway_order_id)
    .bind(&payment.payment_method)
    .bind(PaymentStatus::Pending)
    .bind(&payment.idempotency_key)
    .bind(&payment.metadata)
    .bind(now)
    .fetch_one(&mut *conn)
    .await?;
    for item in &payment.items {
        sqlx::query(
            "INSERT INTO order_items (payment_id, order_item_id, seller_id, gross_amount) VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(&item.order_item_id)
        .bind(&item.seller_id)
        .bind(item.gross_amount)
        .execute(&mut *conn)
        .await?;
    }
    debug!("🗃️ Payment for order {} saved with id {id} ({} items)", payment.order_id, payment.items.len());
    Ok(id)
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<Payment>, SqliteDatabaseError> {
    let q = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
    let payment = sqlx::query_as::<_, Payment>(&q).bind(id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let q = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY id DESC LIMIT 1");
    let payment = sqlx::query_as::<_, Payment>(&q).bind(order_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_idempotency_key(
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let q = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE idempotency_key = $1");
    let payment = sqlx::query_as::<_, Payment>(&q).bind(key).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_gateway_order_id(
    gateway_order_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, SqliteDatabaseError> {
    let q = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE gateway_order_id = $1");
    let payment = sqlx::query_as::<_, Payment>(&q).bind(gateway_order_id).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_order_items(
    payment_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, SqliteDatabaseError> {
    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, payment_id, order_item_id, seller_id, gross_amount FROM order_items WHERE payment_id = $1 \
         ORDER BY id ASC",
    )
    .bind(payment_id)
    .fetch_all(conn)
    .await?;
    Ok(items)
}

/// Compare-and-set on the payment status. Zero rows affected means the payment was no longer in
/// `from` when the update ran, and the caller must re-read instead of assuming success.
pub(crate) async fn record_capture(
    payment_id: i64,
    from: PaymentStatus,
    gateway_payment_id: &str,
    completed_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payments SET status = $1, gateway_payment_id = $2, completed_at = $3, \
         updated_at = CURRENT_TIMESTAMP WHERE id = $4 AND status = $5",
    )
    .bind(PaymentStatus::Captured)
    .bind(gateway_payment_id)
    .bind(completed_at)
    .bind(payment_id)
    .bind(from)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn record_failure(
    payment_id: i64,
    from: PaymentStatus,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<u64, SqliteDatabaseError> {
    let result = sqlx::query(
        "UPDATE payments SET status = $1, failure_reason = $2, updated_at = CURRENT_TIMESTAMP \
         WHERE id = $3 AND status = $4",
    )
    .bind(PaymentStatus::Failed)
    .bind(reason)
    .bind(payment_id)
    .bind(from)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub(crate) async fn set_refund_state(
    payment_id: i64,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<(), SqliteDatabaseError> {
    sqlx::query("UPDATE payments SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(status)
        .bind(payment_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(sqlx::FromRow)]
struct AnalyticsRow {
    total_count: i64,
    captured_count: i64,
    failed_count: i64,
    refunded_count: i64,
    captured_amount: i64,
}

pub async fn payment_analytics(
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<PaymentAnalytics, SqliteDatabaseError> {
    let row = sqlx::query_as::<_, AnalyticsRow>(
        r#"
            SELECT
                COUNT(*) AS total_count,
                COALESCE(SUM(CASE WHEN status IN ('Captured', 'Refunded', 'PartiallyRefunded') THEN 1 ELSE 0 END), 0)
                    AS captured_count,
                COALESCE(SUM(CASE WHEN status = 'Failed' THEN 1 ELSE 0 END), 0) AS failed_count,
                COALESCE(SUM(CASE WHEN status IN ('Refunded', 'PartiallyRefunded') THEN 1 ELSE 0 END), 0)
                    AS refunded_count,
                COALESCE(SUM(CASE WHEN status IN ('Captured', 'Refunded', 'PartiallyRefunded') THEN amount ELSE 0 END), 0)
                    AS captured_amount
            FROM payments
            WHERE initiated_at >= $1 AND initiated_at < $2;
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_one(&mut *conn)
    .await?;
    let refunded_amount: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM refunds WHERE status != 'Failed' AND created_at >= $1 AND created_at < $2",
    )
    .bind(from)
    .bind(to)
    .fetch_one(&mut *conn)
    .await?;
    Ok(PaymentAnalytics {
        from,
        to,
        total_count: row.total_count,
        captured_count: row.captured_count,
        failed_count: row.failed_count,
        refunded_count: row.refunded_count,
        captured_amount: row.captured_amount.into(),
        refunded_amount: refunded_amount.into(),
    })
}
