use chrono::{DateTime, Utc};
use mpg_common::Money;
use thiserror::Error;

use crate::{
    db_types::{Payout, PayoutStatus},
    traits::{
        data_objects::{EarningsSummary, PayoutReservation},
        LedgerError,
    },
};

/// Payout-side persistence: balance queries, the reservation transaction that prevents double
/// spending, and the status transitions driven by the gateway and its webhooks.
#[allow(async_fn_in_trait)]
pub trait PayoutManagement: Clone {
    /// Sum of `net_seller_amount` over splits with `hold_status = Released` and
    /// `status = Settled` — the seller's payout-eligible money. Not a ledger query.
    async fn pending_payout_balance(&self, seller_id: &str) -> Result<Money, PayoutError>;

    /// The reservation transaction. In one atomic unit:
    /// * verifies the seller's KYC is `Verified` and an active, verified, primary bank account
    ///   exists,
    /// * verifies `amount <= pending_payout_balance` (else [`PayoutError::InsufficientBalance`],
    ///   with nothing written),
    /// * creates the payout row in `Pending`,
    /// * reserves whole splits oldest-first while their cumulative net fits within `amount`, via a
    ///   conditional update on `status = 'Settled'` — so two concurrent requests cannot consume
    ///   the same split; the payout amount becomes that cumulative sum.
    async fn reserve_payout(
        &self,
        seller_id: &str,
        amount: Money,
        payout_ref: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<PayoutReservation, PayoutError>;

    /// Records gateway acceptance: `Pending -> Processing` plus the gateway's transfer id.
    async fn mark_payout_processing(&self, payout_id: i64, gateway_payout_id: &str)
        -> Result<Payout, PayoutError>;

    /// Fails the payout and releases its reserved splits back to the available pool, so a failed
    /// attempt never locks a seller out of their own money. Safe to replay: failing an
    /// already-failed payout is a no-op.
    async fn fail_payout(&self, payout_id: i64, reason: &str) -> Result<Payout, PayoutError>;

    /// Cancels a payout that has not been submitted yet (`Pending` only); releases reservations.
    async fn cancel_payout(&self, payout_id: i64) -> Result<Payout, PayoutError>;

    /// Final settlement, normally driven by the `payout.processed` webhook. In one atomic unit:
    /// payout -> `Completed` with the gateway id and processed-at stamp, reserved splits ->
    /// terminal `Paid`, and the disbursal ledger posting (debit SELLER, credit PLATFORM clearing).
    /// Replays of the same event are no-ops.
    async fn complete_payout(
        &self,
        payout_id: i64,
        gateway_payout_id: &str,
        processed_at: DateTime<Utc>,
    ) -> Result<Payout, PayoutError>;

    /// Reverses a payout the gateway had already processed: payout -> `Failed`, splits returned
    /// to available, and an offsetting ledger posting undoing the disbursal.
    async fn reverse_payout(&self, payout_id: i64, reason: &str) -> Result<Payout, PayoutError>;

    async fn fetch_payout(&self, payout_id: i64) -> Result<Option<Payout>, PayoutError>;

    async fn fetch_payout_by_ref(&self, payout_ref: &str) -> Result<Option<Payout>, PayoutError>;

    async fn fetch_payouts_for_seller(&self, seller_id: &str) -> Result<Vec<Payout>, PayoutError>;

    /// Payouts ready for gateway submission: `status = Pending` and `scheduled_at <= now`.
    async fn fetch_due_payouts(&self, now: DateTime<Utc>) -> Result<Vec<Payout>, PayoutError>;

    /// Split-view totals (earned / held / available / reserved / paid) plus the ledger balance.
    async fn earnings_summary(&self, seller_id: &str) -> Result<EarningsSummary, PayoutError>;
}

#[derive(Debug, Clone, Error)]
pub enum PayoutError {
    #[error("Seller {0} has not completed KYC verification")]
    KycNotVerified(String),
    #[error("Seller {0} has no active, verified primary bank account")]
    NoVerifiedBankAccount(String),
    #[error("Requested {requested} but only {available} is available for payout")]
    InsufficientBalance { requested: Money, available: Money },
    #[error("No released splits could fund a payout of the requested amount")]
    NothingToPayOut,
    #[error("The requested payout does not exist: {0}")]
    PayoutNotFound(String),
    #[error("Illegal payout status change from {from} to {to}")]
    IllegalStatusChange { from: PayoutStatus, to: PayoutStatus },
    #[error(transparent)]
    LedgerError(#[from] LedgerError),
    #[error(transparent)]
    GatewayError(#[from] crate::gateway::GatewayError),
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
}

impl From<sqlx::Error> for PayoutError {
    fn from(e: sqlx::Error) -> Self {
        PayoutError::DatabaseError(e.to_string())
    }
}
