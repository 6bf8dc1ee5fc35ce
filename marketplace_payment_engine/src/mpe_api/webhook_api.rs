use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    events::EventProducers,
    gateway::PaymentProvider,
    mpe_api::{payment_flow_api::PaymentFlowApi, payout_api::PayoutApi, SettlementConfig},
    traits::{PaymentGatewayDatabase, PaymentGatewayError, PayoutError, PayoutManagement, SellerVerification},
};

/// An asynchronous notification from the gateway, already authenticated by the transport layer
/// (HMAC over the raw body). Delivery is at-least-once and unordered; every handler below is
/// idempotent or guarded by the current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub event: String,
    #[serde(default)]
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub gateway_order_id: Option<String>,
    #[serde(default)]
    pub gateway_payment_id: Option<String>,
    #[serde(default)]
    pub payout_ref: Option<String>,
    #[serde(default)]
    pub gateway_payout_id: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub processed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    /// The event had been applied before; nothing changed on the replay.
    AlreadyProcessed,
    /// Unknown event type — logged and skipped for forward compatibility.
    Ignored(String),
}

#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    #[error("Event is missing the required field '{0}'")]
    MissingField(&'static str),
    #[error("No payment matches gateway order id {0}")]
    UnknownPayment(String),
    #[error("No payout matches reference {0}")]
    UnknownPayout(String),
    #[error(transparent)]
    Payment(#[from] PaymentGatewayError),
    #[error(transparent)]
    Payout(#[from] PayoutError),
}

/// `WebhookApi` reconciles local payment and payout state against the gateway's event stream.
pub struct WebhookApi<B> {
    db: B,
    payments: PaymentFlowApi<B>,
    payouts: PayoutApi<B>,
}

impl<B> Debug for WebhookApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WebhookApi")
    }
}

impl<B> WebhookApi<B>
where B: PaymentGatewayDatabase + PayoutManagement + SellerVerification
{
    pub fn new(db: B, provider: Arc<dyn PaymentProvider>, producers: EventProducers, config: SettlementConfig) -> Self {
        let payments = PaymentFlowApi::new(db.clone(), provider.clone(), producers.clone(), config);
        let payouts = PayoutApi::new(db.clone(), provider, producers);
        Self { db, payments, payouts }
    }

    /// Applies one event. Failures are contained per event: a malformed or unmatched event
    /// returns an error without touching state, and never blocks later events.
    pub async fn process_event(&self, event: GatewayEvent) -> Result<WebhookOutcome, WebhookError> {
        debug!("🪝️ Processing gateway event '{}'", event.event);
        match event.event.as_str() {
            "payment.captured" => self.on_payment_captured(event.payload).await,
            "payment.failed" => self.on_payment_failed(event.payload).await,
            "payout.processed" => self.on_payout_processed(event.payload).await,
            "payout.failed" => self.on_payout_failed(event.payload).await,
            "payout.reversed" => self.on_payout_reversed(event.payload).await,
            other => {
                info!("🪝️ Ignoring unknown gateway event type '{other}'");
                Ok(WebhookOutcome::Ignored(other.to_string()))
            },
        }
    }

    async fn on_payment_captured(&self, payload: EventPayload) -> Result<WebhookOutcome, WebhookError> {
        let gateway_order_id =
            payload.gateway_order_id.as_deref().ok_or(WebhookError::MissingField("gateway_order_id"))?;
        let gateway_payment_id =
            payload.gateway_payment_id.as_deref().ok_or(WebhookError::MissingField("gateway_payment_id"))?;
        let payment = self
            .db
            .fetch_payment_by_gateway_order_id(gateway_order_id)
            .await
            .map_err(WebhookError::Payment)?
            .ok_or_else(|| WebhookError::UnknownPayment(gateway_order_id.to_string()))?;
        let outcome = self.payments.capture_unverified(payment.id, gateway_payment_id).await?;
        if outcome.already_captured {
            debug!("🪝️ payment.captured replay for payment {}; no changes applied", payment.id);
            Ok(WebhookOutcome::AlreadyProcessed)
        } else {
            info!("🪝️ Payment {} captured via webhook", payment.id);
            Ok(WebhookOutcome::Processed)
        }
    }

    async fn on_payment_failed(&self, payload: EventPayload) -> Result<WebhookOutcome, WebhookError> {
        let gateway_order_id =
            payload.gateway_order_id.as_deref().ok_or(WebhookError::MissingField("gateway_order_id"))?;
        let payment = self
            .db
            .fetch_payment_by_gateway_order_id(gateway_order_id)
            .await
            .map_err(WebhookError::Payment)?
            .ok_or_else(|| WebhookError::UnknownPayment(gateway_order_id.to_string()))?;
        let reason = payload.failure_reason.as_deref().unwrap_or("Gateway reported failure");
        let before = payment.status;
        let updated = self.db.mark_payment_failed(payment.id, reason).await?;
        if updated.status == before {
            Ok(WebhookOutcome::AlreadyProcessed)
        } else {
            Ok(WebhookOutcome::Processed)
        }
    }

    async fn on_payout_processed(&self, payload: EventPayload) -> Result<WebhookOutcome, WebhookError> {
        let payout_ref = payload.payout_ref.as_deref().ok_or(WebhookError::MissingField("payout_ref"))?;
        let gateway_payout_id =
            payload.gateway_payout_id.as_deref().ok_or(WebhookError::MissingField("gateway_payout_id"))?;
        let payout = self
            .db
            .fetch_payout_by_ref(payout_ref)
            .await
            .map_err(WebhookError::Payout)?
            .ok_or_else(|| WebhookError::UnknownPayout(payout_ref.to_string()))?;
        let processed_at = payload.processed_at.unwrap_or_else(Utc::now);
        let before = payout.status;
        self.payouts.complete_payout(payout.id, gateway_payout_id, processed_at).await?;
        if before == crate::db_types::PayoutStatus::Completed {
            Ok(WebhookOutcome::AlreadyProcessed)
        } else {
            Ok(WebhookOutcome::Processed)
        }
    }

    async fn on_payout_failed(&self, payload: EventPayload) -> Result<WebhookOutcome, WebhookError> {
        let payout_ref = payload.payout_ref.as_deref().ok_or(WebhookError::MissingField("payout_ref"))?;
        let payout = self
            .db
            .fetch_payout_by_ref(payout_ref)
            .await
            .map_err(WebhookError::Payout)?
            .ok_or_else(|| WebhookError::UnknownPayout(payout_ref.to_string()))?;
        if payout.status == crate::db_types::PayoutStatus::Failed {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }
        let reason = payload.failure_reason.as_deref().unwrap_or("Gateway reported payout failure");
        self.payouts.fail_payout(payout.id, reason).await?;
        Ok(WebhookOutcome::Processed)
    }

    async fn on_payout_reversed(&self, payload: EventPayload) -> Result<WebhookOutcome, WebhookError> {
        let payout_ref = payload.payout_ref.as_deref().ok_or(WebhookError::MissingField("payout_ref"))?;
        let payout = self
            .db
            .fetch_payout_by_ref(payout_ref)
            .await
            .map_err(WebhookError::Payout)?
            .ok_or_else(|| WebhookError::UnknownPayout(payout_ref.to_string()))?;
        if payout.status == crate::db_types::PayoutStatus::Failed {
            return Ok(WebhookOutcome::AlreadyProcessed);
        }
        let reason = payload.failure_reason.as_deref().unwrap_or("Gateway reversed the payout");
        self.payouts.reverse_payout(payout.id, reason).await?;
        Ok(WebhookOutcome::Processed)
    }
}
