//! Deterministic in-memory provider for tests and local development.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use mpg_common::Secret;

use crate::{
    db_types::GatewayKind,
    gateway::{
        GatewayError,
        GatewayOpStatus,
        GatewayOrder,
        GatewayOrderRequest,
        GatewayPayout,
        GatewayRefund,
        PaymentProvider,
        PayoutRequest,
        RefundRequest,
    },
    helpers::{hmac_sha256_hex, payment_signature_payload},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockBehavior {
    #[default]
    Succeed,
    /// Payment-side calls succeed, payout submission is declined.
    DeclinePayouts,
    /// Every call reports a timeout.
    TimeoutAll,
}

pub struct MockProvider {
    key_secret: Secret<String>,
    behavior: MockBehavior,
    counter: AtomicU64,
}

impl MockProvider {
    pub fn new(key_secret: Secret<String>) -> Self {
        Self { key_secret, behavior: MockBehavior::Succeed, counter: AtomicU64::new(0) }
    }

    pub fn with_behavior(mut self, behavior: MockBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{prefix}_mock_{n:06}")
    }

    fn timeout(&self) -> Result<(), GatewayError> {
        if self.behavior == MockBehavior::TimeoutAll {
            Err(GatewayError::Timeout(Duration::from_secs(10)))
        } else {
            Ok(())
        }
    }

    /// Produces the signature a real gateway would attach to a captured payment. Lets tests and
    /// demo flows drive the verification path with valid input.
    pub fn sign(&self, gateway_order_id: &str, gateway_payment_id: &str) -> String {
        let payload = payment_signature_payload(gateway_order_id, gateway_payment_id);
        hmac_sha256_hex(self.key_secret.reveal(), payload.as_bytes())
    }
}

#[async_trait]
impl PaymentProvider for MockProvider {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Mock
    }

    async fn create_order(&self, _request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        self.timeout()?;
        Ok(GatewayOrder { gateway_order_id: self.next_id("order") })
    }

    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        self.sign(gateway_order_id, gateway_payment_id) == signature
    }

    async fn initiate_refund(&self, _request: &RefundRequest) -> Result<GatewayRefund, GatewayError> {
        self.timeout()?;
        Ok(GatewayRefund { gateway_refund_id: self.next_id("rfnd"), status: GatewayOpStatus::Accepted })
    }

    async fn refund_status(&self, _gateway_refund_id: &str) -> Result<GatewayOpStatus, GatewayError> {
        self.timeout()?;
        Ok(GatewayOpStatus::Processed)
    }

    async fn create_payout(&self, _request: &PayoutRequest) -> Result<GatewayPayout, GatewayError> {
        self.timeout()?;
        if self.behavior == MockBehavior::DeclinePayouts {
            return Err(GatewayError::Declined {
                code: "MOCK_DECLINED".to_string(),
                message: "mock payout decline".to_string(),
            });
        }
        Ok(GatewayPayout { gateway_payout_id: self.next_id("pout"), status: GatewayOpStatus::Accepted })
    }

    async fn payout_status(&self, _gateway_payout_id: &str) -> Result<GatewayOpStatus, GatewayError> {
        self.timeout()?;
        Ok(GatewayOpStatus::Processed)
    }
}

#[cfg(test)]
mod test {
    use mpg_common::Money;

    use super::*;

    fn provider() -> MockProvider {
        MockProvider::new(Secret::new("test_key_secret".to_string()))
    }

    #[tokio::test]
    async fn signature_round_trip() {
        let p = provider();
        let order = p
            .create_order(&GatewayOrderRequest {
                amount: Money::from_major(100),
                currency: "INR".to_string(),
                receipt: "ord-1".to_string(),
            })
            .await
            .unwrap();
        let sig = p.sign(&order.gateway_order_id, "pay_1");
        assert!(p.verify_signature(&order.gateway_order_id, "pay_1", &sig));
        assert!(!p.verify_signature(&order.gateway_order_id, "pay_2", &sig));
        assert!(!p.verify_signature(&order.gateway_order_id, "pay_1", "deadbeef"));
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let p = provider();
        let a = p.next_id("order");
        let b = p.next_id("order");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn decline_behavior_only_hits_payouts() {
        let p = provider().with_behavior(MockBehavior::DeclinePayouts);
        let req = PayoutRequest {
            payout_ref: "pref_1".to_string(),
            amount: Money::from_major(10),
            currency: "INR".to_string(),
            bank_account_ref: "ba_1".to_string(),
            linked_account_id: None,
        };
        assert!(matches!(p.create_payout(&req).await, Err(GatewayError::Declined { .. })));
        assert!(p
            .create_order(&GatewayOrderRequest {
                amount: Money::from_major(1),
                currency: "INR".to_string(),
                receipt: "r".to_string(),
            })
            .await
            .is_ok());
    }
}
