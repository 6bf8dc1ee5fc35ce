use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewPayment, OrderId, OrderItem, Payment, PaymentSplit, Refund},
    gateway::GatewayError,
    splits::{FeeRates, SplitError},
    traits::{
        data_objects::{CaptureOutcome, InsertPaymentResult, PaymentAnalytics},
        LedgerError,
    },
};

/// Payment-side persistence for backends supporting the settlement engine.
///
/// This behaviour includes:
/// * Idempotent payment creation keyed on the client's idempotency token
/// * The atomic capture transaction (status flip + splits + balanced ledger posting)
/// * Refund accounting with the cumulative-amount cap
/// * The escrow hold/release queries driven by the background worker
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new payment together with its order items, in a single atomic transaction.
    ///
    /// This call is idempotent on `idempotency_key`: if a payment already exists for the key, it
    /// is returned unchanged and nothing is written — retried client requests never create a
    /// duplicate row.
    async fn insert_payment(
        &self,
        payment: NewPayment,
        gateway_order_id: &str,
    ) -> Result<InsertPaymentResult, PaymentGatewayError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<Payment>, PaymentGatewayError>;

    async fn fetch_payment_by_order_id(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentGatewayError>;

    async fn fetch_payment_by_idempotency_key(&self, key: &str) -> Result<Option<Payment>, PaymentGatewayError>;

    async fn fetch_payment_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Payment>, PaymentGatewayError>;

    async fn fetch_order_items(&self, payment_id: i64) -> Result<Vec<OrderItem>, PaymentGatewayError>;

    /// The capture transaction. In one atomic unit:
    /// * the payment transitions to `Captured` (validated against the transition table),
    /// * one split per order item is computed with the given rate snapshot and stored with
    ///   `hold_until = now + hold_period` and `hold_status = Held`,
    /// * a balanced ledger posting for the whole payment is written (debit CUSTOMER gross, credit
    ///   SELLER net per item, credit PLATFORM commission, credit TAX GST + TDS).
    ///
    /// Calling this for an already-captured payment is a no-op that returns the existing state
    /// with `already_captured` set — webhook replays and double client calls are harmless.
    async fn capture_payment(
        &self,
        payment_id: i64,
        gateway_payment_id: &str,
        rates: FeeRates,
        hold_period: Duration,
    ) -> Result<CaptureOutcome, PaymentGatewayError>;

    /// Transitions a payment to `Failed` with a reason. A no-op if the payment is already in a
    /// terminal state (late failure events lose against an earlier capture).
    async fn mark_payment_failed(&self, payment_id: i64, reason: &str) -> Result<Payment, PaymentGatewayError>;

    async fn fetch_splits_for_payment(&self, payment_id: i64) -> Result<Vec<PaymentSplit>, PaymentGatewayError>;

    /// Records a refund in one atomic transaction: inserts the refund row, writes the reversing
    /// ledger posting, and moves the payment to `Refunded`/`PartiallyRefunded`. Fails with
    /// [`PaymentGatewayError::RefundExceedsCaptured`] if the cumulative refunded amount would
    /// exceed the captured amount.
    async fn insert_refund(
        &self,
        payment_id: i64,
        amount: mpg_common::Money,
        reason: Option<String>,
        gateway_refund_id: &str,
    ) -> Result<Refund, PaymentGatewayError>;

    async fn refunds_for_payment(&self, payment_id: i64) -> Result<Vec<Refund>, PaymentGatewayError>;

    /// Splits whose hold window has lapsed: `hold_status = Held` and `hold_until <= now`.
    async fn fetch_releasable_splits(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PaymentSplit>, PaymentGatewayError>;

    /// Releases one split into the seller's available balance via a conditional update
    /// (`... WHERE hold_status = 'Held'`). Returns `false` when another worker got there first —
    /// a no-op, not an error. Moves no ledger money.
    async fn release_split(&self, split_id: i64) -> Result<bool, PaymentGatewayError>;

    /// Aggregate counts and sums over `initiated_at` in `[from, to)`.
    async fn payment_analytics(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PaymentAnalytics, PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The requested payment does not exist: {0}")]
    PaymentNotFound(String),
    #[error("The requested order {0} has no payment")]
    OrderNotFound(OrderId),
    #[error("Illegal payment status change from {from} to {to}")]
    IllegalStatusChange { from: String, to: String },
    #[error("Payment signature verification failed")]
    InvalidSignature,
    #[error("Webhook signature verification failed")]
    InvalidWebhookSignature,
    #[error("Order items sum to {items_total} but the payment amount is {amount}")]
    AmountMismatch { items_total: mpg_common::Money, amount: mpg_common::Money },
    #[error("A payment must have at least one order item")]
    NoOrderItems,
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Refund of {requested} exceeds the refundable remainder {remaining}")]
    RefundExceedsCaptured { requested: mpg_common::Money, remaining: mpg_common::Money },
    #[error("{0} are not supported yet")]
    UnsupportedAction(String),
    #[error(transparent)]
    SplitError(#[from] SplitError),
    #[error(transparent)]
    LedgerError(#[from] LedgerError),
    #[error(transparent)]
    GatewayError(#[from] GatewayError),
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
