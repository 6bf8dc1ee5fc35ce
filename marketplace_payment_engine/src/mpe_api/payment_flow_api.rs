use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use mpg_common::Money;

use crate::{
    db_types::{NewPayment, OrderId, Payment, Refund},
    events::{EventProducers, PaymentCapturedEvent},
    gateway::{GatewayOrderRequest, PaymentProvider, RefundRequest},
    mpe_api::SettlementConfig,
    traits::{
        data_objects::{CaptureOutcome, PaymentAnalytics},
        PaymentGatewayDatabase,
        PaymentGatewayError,
    },
};

/// `PaymentFlowApi` drives the payment lifecycle: idempotent creation against the gateway, the
/// verify-and-capture transition that derives splits and ledger entries, and refunds.
pub struct PaymentFlowApi<B> {
    db: B,
    provider: Arc<dyn PaymentProvider>,
    producers: EventProducers,
    config: SettlementConfig,
}

impl<B> Debug for PaymentFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentFlowApi")
    }
}

impl<B> PaymentFlowApi<B> {
    pub fn new(db: B, provider: Arc<dyn PaymentProvider>, producers: EventProducers, config: SettlementConfig) -> Self {
        Self { db, provider, producers, config }
    }
}

impl<B> PaymentFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Creates a payment for an order, opening a gateway order first.
    ///
    /// Idempotent on the client's idempotency key: a retried call returns the payment created by
    /// the first call and does not touch the gateway again.
    pub async fn create_payment(&self, payment: NewPayment) -> Result<Payment, PaymentGatewayError> {
        if let Some(existing) = self.db.fetch_payment_by_idempotency_key(&payment.idempotency_key).await? {
            debug!(
                "💸️ Replay of create for idempotency key {}. Returning payment {} unchanged.",
                payment.idempotency_key, existing.id
            );
            return Ok(existing);
        }
        let request = GatewayOrderRequest {
            amount: payment.amount,
            currency: payment.currency.clone(),
            receipt: payment.order_id.as_str().to_string(),
        };
        let gateway_order = self.provider.create_order(&request).await?;
        trace!("💸️ Gateway order {} opened for order {}", gateway_order.gateway_order_id, payment.order_id);
        let result = self.db.insert_payment(payment, &gateway_order.gateway_order_id).await?;
        let payment = result.into_payment();
        info!("💸️ Payment {} created for order {} ({})", payment.id, payment.order_id, payment.amount);
        Ok(payment)
    }

    /// Verifies the gateway's capture attestation and runs the capture transaction.
    ///
    /// On signature mismatch the payment is left untouched and
    /// [`PaymentGatewayError::InvalidSignature`] is returned; this is not retried automatically.
    /// Replays for an already-captured payment are no-ops.
    pub async fn verify_and_capture(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<CaptureOutcome, PaymentGatewayError> {
        let payment = self
            .db
            .fetch_payment_by_gateway_order_id(gateway_order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::PaymentNotFound(gateway_order_id.to_string()))?;
        if !self.provider.verify_signature(gateway_order_id, gateway_payment_id, signature) {
            warn!("💸️ Signature verification failed for gateway order {gateway_order_id}. Payment left unchanged.");
            return Err(PaymentGatewayError::InvalidSignature);
        }
        let outcome =
            self.db.capture_payment(payment.id, gateway_payment_id, self.config.rates, self.config.hold_period).await?;
        if !outcome.already_captured {
            self.call_payment_captured_hook(&outcome).await;
        }
        Ok(outcome)
    }

    /// Capture driven by a trusted asynchronous source (the webhook reconciler), which has already
    /// authenticated the event. Identical semantics to [`Self::verify_and_capture`] minus the
    /// signature step.
    pub(crate) async fn capture_unverified(
        &self,
        payment_id: i64,
        gateway_payment_id: &str,
    ) -> Result<CaptureOutcome, PaymentGatewayError> {
        let outcome =
            self.db.capture_payment(payment_id, gateway_payment_id, self.config.rates, self.config.hold_period).await?;
        if !outcome.already_captured {
            self.call_payment_captured_hook(&outcome).await;
        }
        Ok(outcome)
    }

    async fn call_payment_captured_hook(&self, outcome: &CaptureOutcome) {
        for emitter in &self.producers.payment_captured_producer {
            trace!("💸️ Notifying payment captured hook subscribers");
            let event = PaymentCapturedEvent::new(outcome.payment.clone(), outcome.splits.clone());
            emitter.publish_event(event).await;
        }
    }

    /// Initiates a refund through the gateway and records it. The cumulative refunded amount can
    /// never exceed the captured amount.
    pub async fn initiate_refund(
        &self,
        order_id: &OrderId,
        amount: Money,
        reason: Option<String>,
    ) -> Result<Refund, PaymentGatewayError> {
        if !amount.is_positive() {
            return Err(PaymentGatewayError::InvalidAmount(format!("refund amount {amount} must be positive")));
        }
        let payment = self
            .db
            .fetch_payment_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        let gateway_payment_id = payment
            .gateway_payment_id
            .clone()
            .ok_or_else(|| PaymentGatewayError::PaymentNotFound(format!("{order_id} has no captured gateway payment")))?;
        let request = RefundRequest { gateway_payment_id, amount, reason: reason.clone() };
        let gateway_refund = self.provider.initiate_refund(&request).await?;
        let refund = self.db.insert_refund(payment.id, amount, reason, &gateway_refund.gateway_refund_id).await?;
        info!("💸️ Refund {} of {amount} initiated for order {order_id}", refund.id);
        Ok(refund)
    }

    pub async fn payment_by_id(&self, payment_id: i64) -> Result<Option<Payment>, PaymentGatewayError> {
        self.db.fetch_payment(payment_id).await
    }

    pub async fn payment_by_order_id(&self, order_id: &OrderId) -> Result<Option<Payment>, PaymentGatewayError> {
        self.db.fetch_payment_by_order_id(order_id).await
    }

    pub async fn refunds_for_order(&self, order_id: &OrderId) -> Result<Vec<Refund>, PaymentGatewayError> {
        let payment = self
            .db
            .fetch_payment_by_order_id(order_id)
            .await?
            .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
        self.db.refunds_for_payment(payment.id).await
    }

    pub async fn analytics(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<PaymentAnalytics, PaymentGatewayError> {
        self.db.payment_analytics(from, to).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
