//! End-to-end tests for payment creation, verified capture, the ledger invariant, and refunds.

mod support;

use chrono::{Duration, Utc};
use marketplace_payment_engine::{
    db_types::{AccountType, HoldStatus, NewLedgerEntry, NewPayment, OrderId, PaymentStatus, SplitStatus, TransactionType},
    traits::{LedgerError, LedgerManagement, PaymentGatewayDatabase, PaymentGatewayError},
    PLATFORM_ACCOUNT,
    TAX_ACCOUNT,
};
use mpg_common::Money;
use support::harness;

#[tokio::test]
async fn create_payment_is_idempotent() {
    let h = harness().await;
    let payment = h.create_payment("ord-100", &[("item-1", "seller-a", Money::from_major(250))]).await;

    // A retried request with the same idempotency key returns the same payment.
    let retry = NewPayment::new(
        OrderId::from("ord-100".to_string()),
        "customer_for_ord-100".to_string(),
        Money::from_major(250),
        "idem_ord-100".to_string(),
    )
    .with_item("item-1", "seller-a", Money::from_major(250));
    let replay = h.payments.create_payment(retry).await.unwrap();
    assert_eq!(replay.id, payment.id);
    assert_eq!(replay.gateway_order_id, payment.gateway_order_id);

    // A different key creates a distinct payment.
    let other = h.create_payment("ord-101", &[("item-1", "seller-a", Money::from_major(250))]).await;
    assert_ne!(other.id, payment.id);
}

#[tokio::test]
async fn create_payment_rejects_mismatched_items() {
    let h = harness().await;
    let bad = NewPayment::new(
        OrderId::from("ord-bad".to_string()),
        "customer-1".to_string(),
        Money::from_major(100),
        "idem_bad".to_string(),
    )
    .with_item("item-1", "seller-a", Money::from_major(60));
    match h.payments.create_payment(bad).await {
        Err(PaymentGatewayError::AmountMismatch { items_total, amount }) => {
            assert_eq!(items_total, Money::from_major(60));
            assert_eq!(amount, Money::from_major(100));
        },
        other => panic!("expected amount mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn verified_capture_creates_splits_and_balanced_ledger() {
    let h = harness().await;
    let payment = h
        .create_payment("ord-200", &[
            ("item-1", "seller-a", Money::from_major(1000)),
            ("item-2", "seller-b", Money::from_major(500)),
        ])
        .await;
    assert_eq!(payment.status, PaymentStatus::Pending);

    let splits = h.capture(&payment).await;
    let captured = h.payments.payment_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(captured.status, PaymentStatus::Captured);
    assert!(captured.completed_at.is_some());

    // The worked example: 1000.00 at 5% / 18% / 1%.
    assert_eq!(splits.len(), 2);
    let a = splits.iter().find(|s| s.seller_id == "seller-a").unwrap();
    assert_eq!(a.commission_amount, Money::from_major(50));
    assert_eq!(a.gst_on_commission, Money::from_major(9));
    assert_eq!(a.tds_deducted, Money::from_major(10));
    assert_eq!(a.net_seller_amount, Money::from_major(931));
    assert_eq!(a.hold_status, HoldStatus::Held);
    assert_eq!(a.status, SplitStatus::Pending);
    for s in &splits {
        assert_eq!(
            s.commission_amount + s.gst_on_commission + s.tds_deducted + s.net_seller_amount,
            s.gross_amount
        );
    }

    // Ledger invariant: the capture posting balances, and account balances line up.
    let entries = h.db.entries_for(&format!("pay_{}", payment.id)).await.unwrap();
    let debits: Money = entries.iter().map(|e| e.debit_amount).sum();
    let credits: Money = entries.iter().map(|e| e.credit_amount).sum();
    assert_eq!(debits, credits);
    assert_eq!(debits, Money::from_major(1500));

    let seller_a_balance = h.db.balance_for(AccountType::Seller, "seller-a").await.unwrap();
    assert_eq!(seller_a_balance, Money::from_major(931));
    let customer_balance = h.db.balance_for(AccountType::Customer, &payment.customer_id).await.unwrap();
    assert_eq!(customer_balance, -Money::from_major(1500));
    let platform = h.db.balance_for(AccountType::Platform, PLATFORM_ACCOUNT).await.unwrap();
    assert_eq!(platform, Money::from_major(50) + Money::from_major(25));
    let tax = h.db.balance_for(AccountType::Tax, TAX_ACCOUNT).await.unwrap();
    // GST 9.00 + 4.50, TDS 10.00 + 5.00
    assert_eq!(tax, Money::from(28_50));
}

#[tokio::test]
async fn invalid_signature_leaves_payment_unchanged() {
    let h = harness().await;
    let payment = h.create_payment("ord-300", &[("item-1", "seller-a", Money::from_major(100))]).await;
    let gateway_order_id = payment.gateway_order_id.clone().unwrap();

    let result = h.payments.verify_and_capture(&gateway_order_id, "paymt_x", "not-a-real-signature").await;
    assert!(matches!(result, Err(PaymentGatewayError::InvalidSignature)));

    let unchanged = h.payments.payment_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, PaymentStatus::Pending);
    assert!(h.db.fetch_splits_for_payment(payment.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn capture_replay_is_a_noop() {
    let h = harness().await;
    let payment = h.create_payment("ord-400", &[("item-1", "seller-a", Money::from_major(1000))]).await;
    let gateway_order_id = payment.gateway_order_id.clone().unwrap();
    let signature = h.provider.sign(&gateway_order_id, "paymt_400");

    let first = h.payments.verify_and_capture(&gateway_order_id, "paymt_400", &signature).await.unwrap();
    assert!(!first.already_captured);
    let second = h.payments.verify_and_capture(&gateway_order_id, "paymt_400", &signature).await.unwrap();
    assert!(second.already_captured);

    // Exactly one set of splits and ledger entries exists.
    assert_eq!(h.db.fetch_splits_for_payment(payment.id).await.unwrap().len(), 1);
    let entries = h.db.entries_for(&format!("pay_{}", payment.id)).await.unwrap();
    assert_eq!(entries.len(), first.splits.len() + 3);
}

#[tokio::test]
async fn unbalanced_ledger_transaction_persists_nothing() {
    let h = harness().await;
    let entries = [
        NewLedgerEntry::debit(AccountType::Customer, "cust-1", Money::from_major(10), "charge"),
        NewLedgerEntry::credit(AccountType::Seller, "seller-a", Money::from_major(9), "short"),
    ];
    let result = h.db.record_transaction("tx-unbalanced", TransactionType::Payment, &entries).await;
    assert!(matches!(result, Err(LedgerError::Imbalanced { .. })));
    assert!(h.db.entries_for("tx-unbalanced").await.unwrap().is_empty());
    assert_eq!(h.db.balance_for(AccountType::Seller, "seller-a").await.unwrap(), Money::zero());
}

#[tokio::test]
async fn refunds_are_capped_at_the_captured_amount() {
    let h = harness().await;
    let (payment, _) = h.captured_sale("ord-500", "seller-a", Money::from_major(1000)).await;
    let order_id = OrderId::from("ord-500".to_string());

    let refund = h.payments.initiate_refund(&order_id, Money::from_major(400), Some("damaged".into())).await.unwrap();
    assert!(refund.is_partial);
    let partially = h.payments.payment_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(partially.status, PaymentStatus::PartiallyRefunded);

    // Refunding more than the remainder is rejected.
    match h.payments.initiate_refund(&order_id, Money::from_major(700), None).await {
        Err(PaymentGatewayError::RefundExceedsCaptured { requested, remaining }) => {
            assert_eq!(requested, Money::from_major(700));
            assert_eq!(remaining, Money::from_major(600));
        },
        other => panic!("expected refund cap, got {other:?}"),
    }

    // Refunding the exact remainder closes the payment out.
    let last = h.payments.initiate_refund(&order_id, Money::from_major(600), None).await.unwrap();
    assert!(!last.is_partial);
    let refunded = h.payments.payment_by_id(payment.id).await.unwrap().unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(h.payments.refunds_for_order(&order_id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn analytics_aggregates_over_the_range() {
    let h = harness().await;
    h.captured_sale("ord-600", "seller-a", Money::from_major(100)).await;
    h.captured_sale("ord-601", "seller-a", Money::from_major(200)).await;
    h.create_payment("ord-602", &[("item-1", "seller-a", Money::from_major(50))]).await;

    let now = Utc::now();
    let report = h.payments.analytics(now - Duration::hours(1), now + Duration::hours(1)).await.unwrap();
    assert_eq!(report.total_count, 3);
    assert_eq!(report.captured_count, 2);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.captured_amount, Money::from_major(300));
}
