use serde::{Deserialize, Serialize};

use crate::db_types::{Payment, PaymentSplit, Payout};

/// Emitted after the capture transaction commits: the payment and its freshly created splits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCapturedEvent {
    pub payment: Payment,
    pub splits: Vec<PaymentSplit>,
}

impl PaymentCapturedEvent {
    pub fn new(payment: Payment, splits: Vec<PaymentSplit>) -> Self {
        Self { payment, splits }
    }
}

/// Emitted when a payout reaches its terminal `Completed` state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutCompletedEvent {
    pub payout: Payout,
}

impl PayoutCompletedEvent {
    pub fn new(payout: Payout) -> Self {
        Self { payout }
    }
}

/// Emitted when a payout fails or is reversed; the reserved amounts are available again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutFailedEvent {
    pub payout: Payout,
    pub reason: String,
}

impl PayoutFailedEvent {
    pub fn new(payout: Payout, reason: String) -> Self {
        Self { payout, reason }
    }
}
