//! Result objects shared between the database traits and the public API layer.

use chrono::{DateTime, Utc};
use mpg_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Payment, PaymentSplit, Payout};

/// Outcome of an idempotent payment insert.
#[derive(Debug, Clone)]
pub enum InsertPaymentResult {
    Inserted(Payment),
    /// A payment with the same idempotency key already existed; it is returned unchanged.
    AlreadyExists(Payment),
}

impl InsertPaymentResult {
    pub fn into_payment(self) -> Payment {
        match self {
            InsertPaymentResult::Inserted(p) | InsertPaymentResult::AlreadyExists(p) => p,
        }
    }

    pub fn was_inserted(&self) -> bool {
        matches!(self, InsertPaymentResult::Inserted(_))
    }
}

/// Result of the capture transaction: the payment plus the splits that exist for it. When
/// `already_captured` is set, the call was a replay and nothing was written.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub payment: Payment,
    pub splits: Vec<PaymentSplit>,
    pub already_captured: bool,
}

/// A payout row together with the splits reserved to fund it.
#[derive(Debug, Clone)]
pub struct PayoutReservation {
    pub payout: Payout,
    pub splits: Vec<PaymentSplit>,
}

/// Split-view and ledger-view of a seller's money, side by side.
///
/// `ledger_balance` is total position per the double-entry ledger; `available` is the payout-
/// eligible subset (released, unreserved splits). The two are intentionally different queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarningsSummary {
    pub seller_id: String,
    pub total_earned: Money,
    pub on_hold: Money,
    pub available: Money,
    pub reserved: Money,
    pub paid_out: Money,
    pub ledger_balance: Money,
}

/// Aggregate payment counts and sums over a date range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAnalytics {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_count: i64,
    pub captured_count: i64,
    pub failed_count: i64,
    pub refunded_count: i64,
    pub captured_amount: Money,
    pub refunded_amount: Money,
}
