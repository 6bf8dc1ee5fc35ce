//! Webhook reconciliation: duplicate and out-of-order gateway events must never double-apply.

mod support;

use chrono::Utc;
use marketplace_payment_engine::{
    db_types::{PaymentStatus, PayoutStatus, SplitStatus},
    helpers::verify_webhook_signature,
    traits::{LedgerManagement, PaymentGatewayDatabase},
    EventPayload,
    GatewayEvent,
    WebhookOutcome,
};
use mpg_common::Money;
use support::{harness, harness_released};

fn captured_event(gateway_order_id: &str, gateway_payment_id: &str) -> GatewayEvent {
    GatewayEvent {
        event: "payment.captured".to_string(),
        payload: EventPayload {
            gateway_order_id: Some(gateway_order_id.to_string()),
            gateway_payment_id: Some(gateway_payment_id.to_string()),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn replayed_capture_event_applies_exactly_once() {
    let h = harness().await;
    let payment = h.create_payment("ord-900", &[("item-1", "seller-a", Money::from_major(1000))]).await;
    let gateway_order_id = payment.gateway_order_id.clone().unwrap();

    let event = captured_event(&gateway_order_id, "paymt_900");
    assert_eq!(h.webhooks.process_event(event.clone()).await.unwrap(), WebhookOutcome::Processed);
    assert_eq!(h.webhooks.process_event(event.clone()).await.unwrap(), WebhookOutcome::AlreadyProcessed);
    assert_eq!(h.webhooks.process_event(event).await.unwrap(), WebhookOutcome::AlreadyProcessed);

    let captured = h.payments.payment_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(captured.status, PaymentStatus::Captured);
    // Exactly one set of splits and one capture posting, no matter how many replays arrived.
    assert_eq!(h.db.fetch_splits_for_payment(payment.id).await.unwrap().len(), 1);
    assert_eq!(h.db.entries_for(&format!("pay_{}", payment.id)).await.unwrap().len(), 4);
}

#[tokio::test]
async fn failure_event_after_capture_loses() {
    let h = harness().await;
    let payment = h.create_payment("ord-910", &[("item-1", "seller-a", Money::from_major(100))]).await;
    let gateway_order_id = payment.gateway_order_id.clone().unwrap();

    h.webhooks.process_event(captured_event(&gateway_order_id, "paymt_910")).await.unwrap();
    let failure = GatewayEvent {
        event: "payment.failed".to_string(),
        payload: EventPayload {
            gateway_order_id: Some(gateway_order_id),
            failure_reason: Some("card declined".to_string()),
            ..Default::default()
        },
    };
    assert_eq!(h.webhooks.process_event(failure).await.unwrap(), WebhookOutcome::AlreadyProcessed);
    let unchanged = h.payments.payment_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, PaymentStatus::Captured);
}

#[tokio::test]
async fn failure_event_marks_a_pending_payment_failed() {
    let h = harness().await;
    let payment = h.create_payment("ord-920", &[("item-1", "seller-a", Money::from_major(100))]).await;
    let failure = GatewayEvent {
        event: "payment.failed".to_string(),
        payload: EventPayload {
            gateway_order_id: payment.gateway_order_id.clone(),
            failure_reason: Some("upi timeout".to_string()),
            ..Default::default()
        },
    };
    assert_eq!(h.webhooks.process_event(failure).await.unwrap(), WebhookOutcome::Processed);
    let failed = h.payments.payment_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);
    assert_eq!(failed.failure_reason.as_deref(), Some("upi timeout"));
}

#[tokio::test]
async fn payout_processed_event_settles_the_payout_once() {
    let h = harness_released().await;
    h.captured_sale("ord-930", "seller-a", Money::from_major(1000)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;
    let balance = h.payouts.pending_balance("seller-a").await.unwrap();
    let payout = h.payouts.request_payout("seller-a", balance).await.unwrap();
    assert_eq!(payout.status, PayoutStatus::Processing);

    let event = GatewayEvent {
        event: "payout.processed".to_string(),
        payload: EventPayload {
            payout_ref: Some(payout.payout_ref.clone()),
            gateway_payout_id: payout.gateway_payout_id.clone(),
            processed_at: Some(Utc::now()),
            ..Default::default()
        },
    };
    assert_eq!(h.webhooks.process_event(event.clone()).await.unwrap(), WebhookOutcome::Processed);
    assert_eq!(h.webhooks.process_event(event).await.unwrap(), WebhookOutcome::AlreadyProcessed);

    let settled = h.payouts.payout_by_id(payout.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PayoutStatus::Completed);
    assert!(settled.processed_at.is_some());

    // Splits are terminally paid and the disbursal posting exists exactly once.
    let summary = h.payouts.earnings_summary("seller-a").await.unwrap();
    assert_eq!(summary.paid_out, balance);
    assert_eq!(summary.available, Money::zero());
    assert_eq!(summary.ledger_balance, Money::zero());
    let disbursal = h.db.entries_for(&format!("payout_{}", payout.payout_ref)).await.unwrap();
    assert_eq!(disbursal.len(), 2);
}

#[tokio::test]
async fn payout_failed_event_restores_the_balance() {
    let h = harness_released().await;
    h.captured_sale("ord-940", "seller-a", Money::from_major(1000)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;
    let balance = h.payouts.pending_balance("seller-a").await.unwrap();
    let payout = h.payouts.request_payout("seller-a", balance).await.unwrap();

    let event = GatewayEvent {
        event: "payout.failed".to_string(),
        payload: EventPayload {
            payout_ref: Some(payout.payout_ref.clone()),
            failure_reason: Some("beneficiary bank rejected".to_string()),
            ..Default::default()
        },
    };
    assert_eq!(h.webhooks.process_event(event.clone()).await.unwrap(), WebhookOutcome::Processed);
    assert_eq!(h.webhooks.process_event(event).await.unwrap(), WebhookOutcome::AlreadyProcessed);

    let failed = h.payouts.payout_by_id(payout.id).await.unwrap().unwrap();
    assert_eq!(failed.status, PayoutStatus::Failed);
    assert_eq!(h.payouts.pending_balance("seller-a").await.unwrap(), balance);
}

#[tokio::test]
async fn payout_reversal_offsets_the_disbursal_posting() {
    let h = harness_released().await;
    h.captured_sale("ord-950", "seller-a", Money::from_major(1000)).await;
    h.release_all_due().await;
    h.verify_seller("seller-a").await;
    let balance = h.payouts.pending_balance("seller-a").await.unwrap();
    let payout = h.payouts.request_payout("seller-a", balance).await.unwrap();

    // Settle, then reverse.
    h.payouts.complete_payout(payout.id, "gw_payout_950", Utc::now()).await.unwrap();
    let reversal = GatewayEvent {
        event: "payout.reversed".to_string(),
        payload: EventPayload {
            payout_ref: Some(payout.payout_ref.clone()),
            failure_reason: Some("account closed".to_string()),
            ..Default::default()
        },
    };
    assert_eq!(h.webhooks.process_event(reversal).await.unwrap(), WebhookOutcome::Processed);

    let reversed = h.payouts.payout_by_id(payout.id).await.unwrap().unwrap();
    assert_eq!(reversed.status, PayoutStatus::Failed);

    // Money is back with the seller, both in the ledger and in availability.
    let summary = h.payouts.earnings_summary("seller-a").await.unwrap();
    assert_eq!(summary.ledger_balance, balance);
    assert_eq!(summary.available, balance);
    assert_eq!(summary.paid_out, Money::zero());
    let offsets = h.db.entries_for(&format!("payout_reversal_{}", payout.payout_ref)).await.unwrap();
    assert_eq!(offsets.len(), 2);

    let splits = h.db.fetch_splits_for_payment(
        h.payments.payment_by_order_id(&"ord-950".parse().unwrap()).await.unwrap().unwrap().id,
    )
    .await
    .unwrap();
    assert!(splits.iter().all(|s| s.status == SplitStatus::Settled));
}

#[tokio::test]
async fn unknown_events_are_ignored() {
    let h = harness().await;
    let event = GatewayEvent { event: "invoice.generated".to_string(), payload: EventPayload::default() };
    assert_eq!(
        h.webhooks.process_event(event).await.unwrap(),
        WebhookOutcome::Ignored("invoice.generated".to_string())
    );
}

#[test]
fn webhook_signatures_verify_against_the_raw_body() {
    let secret = "whsec_123";
    let body = br#"{"event":"payment.captured","payload":{}}"#;
    let signature = marketplace_payment_engine::helpers::hmac_sha256_hex(secret, body);
    assert!(verify_webhook_signature(secret, body, &signature));
    assert!(!verify_webhook_signature(secret, b"tampered", &signature));
    assert!(!verify_webhook_signature("wrong", body, &signature));
}
