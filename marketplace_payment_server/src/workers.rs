//! Background workers: the escrow release scan and the pending payout processor.
//!
//! Both are timer loops; a failing iteration is logged and the next tick proceeds, so transient
//! database or gateway trouble never kills a worker. Release and submission are idempotent and
//! state-guarded in the engine, so running several server instances is safe.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use log::*;
use marketplace_payment_engine::{
    events::EventProducers,
    gateway::PaymentProvider,
    EscrowApi,
    PayoutApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

/// Starts the escrow release worker. Do not await the returned JoinHandle, as it will run
/// indefinitely.
pub fn start_escrow_worker(db: SqliteDatabase, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let api = EscrowApi::new(db);
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Escrow release worker started (every {period:?})");
        loop {
            timer.tick().await;
            match api.release_due(Utc::now()).await {
                Ok(0) => trace!("🕰️ Escrow scan found nothing to release"),
                Ok(n) => info!("🕰️ Escrow scan released {n} split(s) into payable balance"),
                Err(e) => error!("🕰️ Error running escrow release scan: {e}"),
            }
        }
    })
}

/// Starts the payout submission worker. Picks up `Pending` payouts whose schedule has arrived —
/// fresh requests that timed out against the gateway included — and submits them.
pub fn start_payout_worker(
    db: SqliteDatabase,
    provider: Arc<dyn PaymentProvider>,
    producers: EventProducers,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let api = PayoutApi::new(db, provider, producers);
        let mut timer = tokio::time::interval(period);
        info!("🕰️ Payout processing worker started (every {period:?})");
        loop {
            timer.tick().await;
            match api.process_pending_payouts().await {
                Ok(0) => trace!("🕰️ No payouts due for submission"),
                Ok(n) => info!("🕰️ Submitted {n} due payout(s) to the gateway"),
                Err(e) => error!("🕰️ Error running payout processing: {e}"),
            }
        }
    })
}
