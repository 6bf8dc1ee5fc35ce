use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::PaymentSplit,
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

/// How many held splits one release pass will look at.
const RELEASE_BATCH_SIZE: i64 = 200;

/// `EscrowApi` turns held splits into payable balance once their hold window lapses.
///
/// Release changes availability only — the seller's ledger credit happened at capture. Multiple
/// workers may scan concurrently; the underlying release is a conditional update, so a split can
/// only ever be released once and duplicate scans are harmless.
pub struct EscrowApi<B> {
    db: B,
}

impl<B> Debug for EscrowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EscrowApi")
    }
}

impl<B> EscrowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> EscrowApi<B>
where B: PaymentGatewayDatabase
{
    /// Splits whose hold has lapsed at `now`. A split with `hold_until` in the future never
    /// appears here.
    pub async fn scan_releasable_splits(&self, now: DateTime<Utc>) -> Result<Vec<PaymentSplit>, PaymentGatewayError> {
        self.db.fetch_releasable_splits(now, RELEASE_BATCH_SIZE).await
    }

    /// Releases a single split. Returns `false` when the split was already released — a no-op,
    /// not an error.
    pub async fn release(&self, split_id: i64) -> Result<bool, PaymentGatewayError> {
        self.db.release_split(split_id).await
    }

    /// One scan-and-release pass; returns the number of splits this worker released. Drains in
    /// batches so a large backlog still completes in a single call.
    pub async fn release_due(&self, now: DateTime<Utc>) -> Result<usize, PaymentGatewayError> {
        let mut released = 0usize;
        loop {
            let batch = self.scan_releasable_splits(now).await?;
            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len();
            for split in batch {
                if self.release(split.id).await? {
                    released += 1;
                    trace!("⏳️ Split {} ({}) released for seller {}", split.id, split.net_seller_amount, split.seller_id);
                }
            }
            // A short batch means the backlog is drained.
            if (batch_len as i64) < RELEASE_BATCH_SIZE {
                break;
            }
        }
        if released > 0 {
            info!("⏳️ Escrow release pass freed {released} split(s)");
        }
        Ok(released)
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
