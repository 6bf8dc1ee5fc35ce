use std::{fmt::Debug, sync::Arc};

use chrono::Utc;
use log::*;
use mpg_common::Money;

use crate::{
    db_types::{Payout, PayoutStatus},
    events::{EventProducers, PayoutCompletedEvent, PayoutFailedEvent},
    gateway::{GatewayError, PaymentProvider, PayoutRequest},
    traits::{
        data_objects::EarningsSummary,
        PayoutError,
        PayoutManagement,
        SellerVerification,
    },
};

/// `PayoutApi` aggregates a seller's released splits into payouts and drives them through the
/// gateway. The reservation step is the concurrency control: once a split is reserved for one
/// payout, no concurrent request can consume it again.
pub struct PayoutApi<B> {
    db: B,
    provider: Arc<dyn PaymentProvider>,
    producers: EventProducers,
}

impl<B> Debug for PayoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PayoutApi")
    }
}

impl<B> PayoutApi<B> {
    pub fn new(db: B, provider: Arc<dyn PaymentProvider>, producers: EventProducers) -> Self {
        Self { db, provider, producers }
    }
}

impl<B> PayoutApi<B>
where B: PayoutManagement + SellerVerification
{
    /// The seller's payout-eligible balance: released, unreserved splits.
    pub async fn pending_balance(&self, seller_id: &str) -> Result<Money, PayoutError> {
        self.db.pending_payout_balance(seller_id).await
    }

    /// Creates a payout for the seller and submits it to the gateway.
    ///
    /// Fails with `KycNotVerified` / `NoVerifiedBankAccount` / `InsufficientBalance` before
    /// anything is written. On a definitive gateway decline the payout is failed and its splits
    /// return to the available pool; on a timeout it stays `Pending` for the scheduled retry
    /// pass, since the gateway may still have accepted it.
    pub async fn request_payout(&self, seller_id: &str, amount: Money) -> Result<Payout, PayoutError> {
        let payout_ref = new_payout_ref();
        let reservation = self.db.reserve_payout(seller_id, amount, &payout_ref, Utc::now()).await?;
        info!(
            "🏦️ Payout {payout_ref} reserved for seller {seller_id}: {} over {} split(s)",
            reservation.payout.amount,
            reservation.splits.len()
        );
        self.submit(reservation.payout).await
    }

    /// Submits one `Pending` payout to the gateway and applies the outcome.
    async fn submit(&self, payout: Payout) -> Result<Payout, PayoutError> {
        let linked = self
            .db
            .fetch_linked_account(&payout.seller_id)
            .await
            .map_err(|e| PayoutError::DatabaseError(e.to_string()))?;
        let request = PayoutRequest {
            payout_ref: payout.payout_ref.clone(),
            amount: payout.amount,
            currency: payout.currency.clone(),
            bank_account_ref: format!("ba_{}", payout.bank_account_id),
            linked_account_id: linked.map(|l| l.gateway_account_id),
        };
        match self.provider.create_payout(&request).await {
            Ok(accepted) => {
                let updated = self.db.mark_payout_processing(payout.id, &accepted.gateway_payout_id).await?;
                info!("🏦️ Payout {} accepted by gateway as {}", payout.payout_ref, accepted.gateway_payout_id);
                Ok(updated)
            },
            Err(e @ GatewayError::Declined { .. }) => {
                warn!("🏦️ Payout {} declined by gateway: {e}. Releasing reserved splits.", payout.payout_ref);
                let failed = self.db.fail_payout(payout.id, &e.to_string()).await?;
                self.call_payout_failed_hook(&failed, &e.to_string()).await;
                Err(e.into())
            },
            Err(e) => {
                // Timeouts and transport failures are indeterminate: the gateway may have the
                // payout. Leave it Pending so the scheduled pass retries or reconciles it.
                warn!("🏦️ Payout {} submission did not complete: {e}. Leaving it pending for retry.", payout.payout_ref);
                Err(e.into())
            },
        }
    }

    /// Scheduled pass over due `Pending` payouts. Returns how many were accepted by the gateway.
    pub async fn process_pending_payouts(&self) -> Result<usize, PayoutError> {
        let due = self.db.fetch_due_payouts(Utc::now()).await?;
        if due.is_empty() {
            return Ok(0);
        }
        debug!("🏦️ {} payout(s) due for submission", due.len());
        let mut submitted = 0usize;
        for payout in due {
            let payout_ref = payout.payout_ref.clone();
            match self.submit(payout).await {
                Ok(_) => submitted += 1,
                Err(e) => {
                    // Per-payout failures must not block the rest of the pass.
                    warn!("🏦️ Payout {payout_ref} was not submitted: {e}");
                },
            }
        }
        Ok(submitted)
    }

    /// Marks a payout settled. Driven by the `payout.processed` webhook; replays are no-ops.
    pub async fn complete_payout(
        &self,
        payout_id: i64,
        gateway_payout_id: &str,
        processed_at: chrono::DateTime<Utc>,
    ) -> Result<Payout, PayoutError> {
        let before = self.db.fetch_payout(payout_id).await?;
        let payout = self.db.complete_payout(payout_id, gateway_payout_id, processed_at).await?;
        let was_replay = matches!(before.map(|p| p.status), Some(PayoutStatus::Completed));
        if !was_replay {
            self.call_payout_completed_hook(&payout).await;
        }
        Ok(payout)
    }

    /// Fails a payout and returns its reserved splits to the available pool.
    pub async fn fail_payout(&self, payout_id: i64, reason: &str) -> Result<Payout, PayoutError> {
        let payout = self.db.fail_payout(payout_id, reason).await?;
        self.call_payout_failed_hook(&payout, reason).await;
        Ok(payout)
    }

    /// Reverses a processed payout: splits become available again and the disbursal ledger
    /// posting is offset.
    pub async fn reverse_payout(&self, payout_id: i64, reason: &str) -> Result<Payout, PayoutError> {
        let payout = self.db.reverse_payout(payout_id, reason).await?;
        self.call_payout_failed_hook(&payout, reason).await;
        Ok(payout)
    }

    pub async fn cancel_payout(&self, payout_id: i64) -> Result<Payout, PayoutError> {
        self.db.cancel_payout(payout_id).await
    }

    pub async fn payout_by_id(&self, payout_id: i64) -> Result<Option<Payout>, PayoutError> {
        self.db.fetch_payout(payout_id).await
    }

    pub async fn payout_by_ref(&self, payout_ref: &str) -> Result<Option<Payout>, PayoutError> {
        self.db.fetch_payout_by_ref(payout_ref).await
    }

    pub async fn payout_history(&self, seller_id: &str) -> Result<Vec<Payout>, PayoutError> {
        self.db.fetch_payouts_for_seller(seller_id).await
    }

    pub async fn earnings_summary(&self, seller_id: &str) -> Result<EarningsSummary, PayoutError> {
        self.db.earnings_summary(seller_id).await
    }

    async fn call_payout_completed_hook(&self, payout: &Payout) {
        for emitter in &self.producers.payout_completed_producer {
            trace!("🏦️ Notifying payout completed hook subscribers");
            emitter.publish_event(PayoutCompletedEvent::new(payout.clone())).await;
        }
    }

    async fn call_payout_failed_hook(&self, payout: &Payout, reason: &str) {
        for emitter in &self.producers.payout_failed_producer {
            trace!("🏦️ Notifying payout failed hook subscribers");
            emitter.publish_event(PayoutFailedEvent::new(payout.clone(), reason.to_string())).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

/// A fresh internal payout reference, carried on the gateway call and echoed back by webhooks.
fn new_payout_ref() -> String {
    format!("pout_{:016x}", rand::random::<u64>())
}
