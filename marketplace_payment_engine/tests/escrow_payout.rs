//! Escrow hold/release timing and the payout lifecycle, including the double-spend guard.

mod support;

use std::sync::Arc;

use chrono::{Duration, Utc};
use marketplace_payment_engine::{
    db_types::{HoldStatus, PayoutStatus, SplitStatus},
    events::EventProducers,
    gateway::{MockBehavior, MockProvider},
    traits::{PaymentGatewayDatabase, PayoutError},
    PayoutApi,
};
use mpg_common::{Money, Secret};
use support::{harness, harness_released, harness_with};

#[tokio::test]
async fn splits_only_become_releasable_after_the_hold() {
    let h = harness().await; // 7 day hold
    let (_, splits) = h.captured_sale("ord-700", "seller-a", Money::from_major(1000)).await;
    let split = &splits[0];

    // Before the hold lapses, the scan must not return the split.
    let now = Utc::now();
    assert!(h.escrow.scan_releasable_splits(now).await.unwrap().is_empty());

    // Once `now` passes hold_until, it appears exactly once.
    let later = now + Duration::days(8);
    let due = h.escrow.scan_releasable_splits(later).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, split.id);

    // Release is idempotent: the first call wins, the second is a no-op.
    assert!(h.escrow.release(split.id).await.unwrap());
    assert!(!h.escrow.release(split.id).await.unwrap());
    assert!(h.escrow.scan_releasable_splits(later).await.unwrap().is_empty());

    let released = &h.db.fetch_splits_for_payment(split.payment_id).await.unwrap()[0];
    assert_eq!(released.hold_status, HoldStatus::Released);
    assert_eq!(released.status, SplitStatus::Settled);
}

#[tokio::test]
async fn release_changes_availability_not_the_ledger() {
    let h = harness_released().await;
    h.captured_sale("ord-710", "seller-a", Money::from_major(1000)).await;

    let before = h.payouts.earnings_summary("seller-a").await.unwrap();
    assert_eq!(before.ledger_balance, Money::from_major(931));
    assert_eq!(before.available, Money::zero());
    assert_eq!(before.on_hold, Money::from_major(931));

    assert_eq!(h.release_all_due().await, 1);

    let after = h.payouts.earnings_summary("seller-a").await.unwrap();
    // The ledger did not move; only the split view changed.
    assert_eq!(after.ledger_balance, Money::from_major(931));
    assert_eq!(after.available, Money::from_major(931));
    assert_eq!(after.on_hold, Money::zero());
}

#[tokio::test]
async fn payout_gates_are_enforced_in_order() {
    let h = harness_released().await;
    h.captured_sale("ord-720", "seller-a", Money::from_major(1000)).await;
    h.release_all_due().await;

    // No KYC record yet.
    match h.payouts.request_payout("seller-a", Money::from_major(100)).await {
        Err(PayoutError::KycNotVerified(seller)) => assert_eq!(seller, "seller-a"),
        other => panic!("expected KYC gate, got {other:?}"),
    }

    // KYC verified, but no bank account.
    h.sellers.submit_kyc("seller-a", "Seller A", "ABCDE1234F").await.unwrap();
    h.sellers.set_kyc_status("seller-a", marketplace_payment_engine::db_types::KycStatus::Verified).await.unwrap();
    match h.payouts.request_payout("seller-a", Money::from_major(100)).await {
        Err(PayoutError::NoVerifiedBankAccount(_)) => {},
        other => panic!("expected bank gate, got {other:?}"),
    }
    assert!(h.payouts.payout_history("seller-a").await.unwrap().is_empty());
}

#[tokio::test]
async fn overdrawn_request_is_rejected_with_no_side_effects() {
    let h = harness_released().await;
    // Available balance: 500.00 gross -> 465.50 net.
    h.captured_sale("ord-730", "seller-a", Money::from_major(500)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;
    let available = h.payouts.pending_balance("seller-a").await.unwrap();

    match h.payouts.request_payout("seller-a", available + Money::from_major(100)).await {
        Err(PayoutError::InsufficientBalance { requested, available: reported }) => {
            assert_eq!(requested, available + Money::from_major(100));
            assert_eq!(reported, available);
        },
        other => panic!("expected insufficient balance, got {other:?}"),
    }
    // No payout row was created and nothing was reserved.
    assert!(h.payouts.payout_history("seller-a").await.unwrap().is_empty());
    assert_eq!(h.payouts.pending_balance("seller-a").await.unwrap(), available);
}

#[tokio::test]
async fn successful_payout_reserves_whole_splits() {
    let h = harness_released().await;
    h.captured_sale("ord-740", "seller-a", Money::from_major(1000)).await;
    h.captured_sale("ord-741", "seller-a", Money::from_major(500)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;

    let available = h.payouts.pending_balance("seller-a").await.unwrap();
    let payout = h.payouts.request_payout("seller-a", available).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Processing);
    assert_eq!(payout.amount, available);
    assert!(payout.gateway_payout_id.is_some());
    assert_eq!(h.payouts.pending_balance("seller-a").await.unwrap(), Money::zero());

    let summary = h.payouts.earnings_summary("seller-a").await.unwrap();
    assert_eq!(summary.reserved, available);
}

#[tokio::test]
async fn partial_request_consumes_only_whole_splits() {
    let h = harness_released().await;
    // Two splits of 931.00 and 465.50 net.
    h.captured_sale("ord-750", "seller-a", Money::from_major(1000)).await;
    h.captured_sale("ord-751", "seller-a", Money::from_major(500)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;

    // Ask for more than the first split but less than both: only the first is consumed.
    let payout = h.payouts.request_payout("seller-a", Money::from_major(1000)).await.unwrap();
    assert_eq!(payout.amount, Money::from_major(931));
    assert_eq!(h.payouts.pending_balance("seller-a").await.unwrap(), Money::from(465_50));
}

#[tokio::test]
async fn concurrent_payout_requests_cannot_double_spend() {
    let h = harness_released().await;
    h.captured_sale("ord-760", "seller-a", Money::from_major(1000)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;
    let balance = h.payouts.pending_balance("seller-a").await.unwrap();

    let first = h.payouts.request_payout("seller-a", balance);
    let second = h.payouts.request_payout("seller-a", balance);
    let (a, b) = tokio::join!(first, second);

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one of two concurrent requests may win: {a:?} / {b:?}");
    let rejection = if a.is_err() { a } else { b };
    assert!(matches!(rejection, Err(PayoutError::InsufficientBalance { .. }) | Err(PayoutError::NothingToPayOut)));

    // The winner holds the only reservation; nothing is spendable twice.
    assert_eq!(h.payouts.pending_balance("seller-a").await.unwrap(), Money::zero());
    assert_eq!(h.payouts.payout_history("seller-a").await.unwrap().len(), 1);
}

#[tokio::test]
async fn declined_payout_releases_the_reservation() {
    let h = harness_with(Duration::zero(), MockBehavior::DeclinePayouts).await;
    h.captured_sale("ord-770", "seller-a", Money::from_major(1000)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;
    let balance = h.payouts.pending_balance("seller-a").await.unwrap();

    let result = h.payouts.request_payout("seller-a", balance).await;
    assert!(matches!(result, Err(PayoutError::GatewayError(_))));

    // The payout exists as Failed and the seller's money is available again.
    let history = h.payouts.payout_history("seller-a").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PayoutStatus::Failed);
    assert!(history[0].failure_reason.is_some());
    assert_eq!(h.payouts.pending_balance("seller-a").await.unwrap(), balance);
}

#[tokio::test]
async fn timed_out_payout_stays_pending_and_is_retried_by_the_scheduler() {
    let h = harness_released().await;
    h.captured_sale("ord-780", "seller-a", Money::from_major(1000)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;
    let balance = h.payouts.pending_balance("seller-a").await.unwrap();

    // Submit through a payout API whose gateway times out. The outcome is indeterminate, so the
    // payout must stay Pending with its reservation intact rather than flip to Failed.
    let timeout_provider =
        Arc::new(MockProvider::new(Secret::new(support::TEST_KEY_SECRET.to_string())).with_behavior(MockBehavior::TimeoutAll));
    let flaky_payouts = PayoutApi::new(h.db.clone(), timeout_provider, EventProducers::default());
    let result = flaky_payouts.request_payout("seller-a", balance).await;
    assert!(matches!(result, Err(PayoutError::GatewayError(_))));

    let history = h.payouts.payout_history("seller-a").await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, PayoutStatus::Pending);
    assert_eq!(h.payouts.pending_balance("seller-a").await.unwrap(), Money::zero());

    // The scheduled pass, now against a healthy gateway, picks the payout up and submits it.
    let submitted = h.payouts.process_pending_payouts().await.unwrap();
    assert_eq!(submitted, 1);
    let after = h.payouts.payout_history("seller-a").await.unwrap();
    assert_eq!(after[0].status, PayoutStatus::Processing);
    assert!(after[0].gateway_payout_id.is_some());
}

#[tokio::test]
async fn cancelling_a_pending_payout_releases_its_splits() {
    let h = harness_released().await;
    h.captured_sale("ord-790", "seller-a", Money::from_major(1000)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;
    let balance = h.payouts.pending_balance("seller-a").await.unwrap();

    let timeout_provider =
        Arc::new(MockProvider::new(Secret::new(support::TEST_KEY_SECRET.to_string())).with_behavior(MockBehavior::TimeoutAll));
    let flaky_payouts = PayoutApi::new(h.db.clone(), timeout_provider, EventProducers::default());
    let _ = flaky_payouts.request_payout("seller-a", balance).await;
    let pending = &h.payouts.payout_history("seller-a").await.unwrap()[0];
    assert_eq!(pending.status, PayoutStatus::Pending);

    let cancelled = h.payouts.cancel_payout(pending.id).await.unwrap();
    assert_eq!(cancelled.status, PayoutStatus::Cancelled);
    assert_eq!(h.payouts.pending_balance("seller-a").await.unwrap(), balance);

    // A processing payout cannot be cancelled.
    let payout = h.payouts.request_payout("seller-a", balance).await.unwrap();
    assert!(matches!(
        h.payouts.cancel_payout(payout.id).await,
        Err(PayoutError::IllegalStatusChange { .. })
    ));
}
