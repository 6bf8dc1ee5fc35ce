//! Shared scaffolding for the engine integration tests: a throwaway SQLite database per test and
//! API objects wired to the deterministic mock provider.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::Duration;
use marketplace_payment_engine::{
    db_types::{BankVerificationStatus, KycStatus, NewBankAccount, NewPayment, OrderId, Payment, PaymentSplit},
    events::EventProducers,
    gateway::{MockBehavior, MockProvider},
    splits::FeeRates,
    EscrowApi,
    PaymentFlowApi,
    PayoutApi,
    SellerApi,
    SettlementConfig,
    SqliteDatabase,
    WebhookApi,
};
use mpg_common::{bp_from_percent, Money, Secret};

pub const TEST_KEY_SECRET: &str = "test_key_secret";

pub fn random_db_url() -> String {
    format!("sqlite://{}/mpe_test_{}.db", std::env::temp_dir().display(), rand::random::<u64>())
}

pub fn standard_rates() -> FeeRates {
    FeeRates::new(bp_from_percent(5), bp_from_percent(18), bp_from_percent(1))
}

pub struct TestHarness {
    pub db: SqliteDatabase,
    pub provider: Arc<MockProvider>,
    pub payments: PaymentFlowApi<SqliteDatabase>,
    pub escrow: EscrowApi<SqliteDatabase>,
    pub payouts: PayoutApi<SqliteDatabase>,
    pub sellers: SellerApi<SqliteDatabase>,
    pub webhooks: WebhookApi<SqliteDatabase>,
}

/// A harness whose captures stay in escrow for a week — the default settlement config.
pub async fn harness() -> TestHarness {
    harness_with(Duration::days(7), MockBehavior::Succeed).await
}

/// A harness whose captures become releasable immediately.
pub async fn harness_released() -> TestHarness {
    harness_with(Duration::zero(), MockBehavior::Succeed).await
}

pub async fn harness_with(hold_period: Duration, behavior: MockBehavior) -> TestHarness {
    let _ = env_logger::try_init();
    let db = SqliteDatabase::new_with_url(&random_db_url(), 1).await.expect("Error creating test database");
    let provider = Arc::new(MockProvider::new(Secret::new(TEST_KEY_SECRET.to_string())).with_behavior(behavior));
    let config = SettlementConfig { rates: standard_rates(), hold_period };
    let producers = EventProducers::default();
    let payments = PaymentFlowApi::new(db.clone(), provider.clone(), producers.clone(), config);
    let escrow = EscrowApi::new(db.clone());
    let payouts = PayoutApi::new(db.clone(), provider.clone(), producers.clone());
    let sellers = SellerApi::new(db.clone());
    let webhooks = WebhookApi::new(db.clone(), provider.clone(), producers, config);
    TestHarness { db, provider, payments, escrow, payouts, sellers, webhooks }
}

impl TestHarness {
    /// Creates a payment for one order with the given `(item id, seller, gross)` triples.
    pub async fn create_payment(&self, order_id: &str, items: &[(&str, &str, Money)]) -> Payment {
        let total: Money = items.iter().map(|(_, _, amount)| *amount).sum();
        let mut new_payment = NewPayment::new(
            OrderId::from(order_id.to_string()),
            format!("customer_for_{order_id}"),
            total,
            format!("idem_{order_id}"),
        );
        for (item_id, seller_id, amount) in items {
            new_payment = new_payment.with_item(item_id, seller_id, *amount);
        }
        self.payments.create_payment(new_payment).await.expect("Error creating payment")
    }

    /// Runs the full verified capture for a previously created payment.
    pub async fn capture(&self, payment: &Payment) -> Vec<PaymentSplit> {
        let gateway_order_id = payment.gateway_order_id.clone().expect("payment has no gateway order");
        let gateway_payment_id = format!("paymt_for_{}", payment.id);
        let signature = self.provider.sign(&gateway_order_id, &gateway_payment_id);
        let outcome = self
            .payments
            .verify_and_capture(&gateway_order_id, &gateway_payment_id, &signature)
            .await
            .expect("Error capturing payment");
        outcome.splits
    }

    /// Shortcut: create + capture one single-item order for `seller_id`.
    pub async fn captured_sale(&self, order_id: &str, seller_id: &str, gross: Money) -> (Payment, Vec<PaymentSplit>) {
        let payment = self.create_payment(order_id, &[("item-1", seller_id, gross)]).await;
        let splits = self.capture(&payment).await;
        (payment, splits)
    }

    /// Gives the seller a verified KYC record and a verified primary bank account.
    pub async fn verify_seller(&self, seller_id: &str) -> i64 {
        self.sellers.submit_kyc(seller_id, "Test Seller Pvt Ltd", "ABCDE1234F").await.expect("Error submitting KYC");
        self.sellers.set_kyc_status(seller_id, KycStatus::Verified).await.expect("Error verifying KYC");
        let account = self
            .sellers
            .add_bank_account(NewBankAccount {
                seller_id: seller_id.to_string(),
                account_number_masked: "XXXX1234".to_string(),
                ifsc_code: "HDFC0000001".to_string(),
                holder_name: "Test Seller".to_string(),
                is_primary: true,
            })
            .await
            .expect("Error adding bank account");
        self.sellers
            .record_bank_verification(account.id, BankVerificationStatus::Verified)
            .await
            .expect("Error verifying bank account");
        account.id
    }

    /// Release every split whose hold has lapsed, returning the count released.
    pub async fn release_all_due(&self) -> usize {
        self.escrow.release_due(chrono::Utc::now()).await.expect("Error releasing splits")
    }
}
