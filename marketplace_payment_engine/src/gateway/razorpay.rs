//! Razorpay-style HTTP adapter.
//!
//! Every outbound call carries an explicit timeout; timeouts and non-2xx responses are mapped into
//! [`GatewayError`] so orchestrators never see a raw transport error.

use std::time::Duration;

use log::{debug, warn};
use mpg_common::Secret;
use serde_json::{json, Value};

use async_trait::async_trait;

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

pub struct RazorpayProvider {
    base_url: String,
    key_id: String,
    key_secret: Secret<String>,
    timeout: Duration,
    client: reqwest::Client,
}

impl RazorpayProvider {
    pub fn new(base_url: &str, key_id: &str, key_secret: Secret<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: key_id.to_string(),
            key_secret,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, GatewayError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.reveal()))
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await;
        self.handle(response).await
    }

    async fn get(&self, path: &str) -> Result<Value, GatewayError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.key_id, Some(self.key_secret.reveal()))
            .timeout(self.timeout)
            .send()
            .await;
        self.handle(response).await
    }

    async fn handle(&self, response: Result<reqwest::Response, reqwest::Error>) -> Result<Value, GatewayError> {
        match response {
            Ok(r) if r.status().is_success() => {
                r.json::<Value>().await.map_err(|e| GatewayError::InvalidResponse(e.to_string()))
            },
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                warn!("🌐️ Gateway returned HTTP {status}: {}", body.chars().take(200).collect::<String>());
                Err(GatewayError::Declined {
                    code: format!("HTTP_{}", status.as_u16()),
                    message: body.chars().take(200).collect(),
                })
            },
            Err(e) if e.is_timeout() => Err(GatewayError::Timeout(self.timeout)),
            Err(e) => Err(GatewayError::Network(e.to_string())),
        }
    }

    fn string_field(value: &Value, field: &str) -> Result<String, GatewayError> {
        value
            .get(field)
            .and_then(|v| v.as_str())
            .map(ToString::to_string)
            .ok_or_else(|| GatewayError::InvalidResponse(format!("missing field '{field}'")))
    }

    fn op_status(value: &Value) -> GatewayOpStatus {
        match value.get("status").and_then(|v| v.as_str()) {
            Some("processed") => GatewayOpStatus::Processed,
            Some("failed") | Some("reversed") | Some("rejected") => GatewayOpStatus::Failed,
            _ => GatewayOpStatus::Accepted,
        }
    }
}

#[async_trait]
impl PaymentProvider for RazorpayProvider {
    fn kind(&self) -> GatewayKind {
        GatewayKind::Razorpay
    }

    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError> {
        debug!("🌐️ Creating gateway order for receipt {}", request.receipt);
        let body = json!({
            "amount": request.amount.value(),
            "currency": request.currency,
            "receipt": request.receipt,
            "payment_capture": 1,
        });
        let v = self.post("/v1/orders", body).await?;
        Ok(GatewayOrder { gateway_order_id: Self::string_field(&v, "id")? })
    }

    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        let payload = payment_signature_payload(gateway_order_id, gateway_payment_id);
        hmac_sha256_hex(self.key_secret.reveal(), payload.as_bytes()) == signature
    }

    async fn initiate_refund(&self, request: &RefundRequest) -> Result<GatewayRefund, GatewayError> {
        let path = format!("/v1/payments/{}/refund", request.gateway_payment_id);
        let body = json!({
            "amount": request.amount.value(),
            "notes": { "reason": request.reason.clone().unwrap_or_default() },
        });
        let v = self.post(&path, body).await?;
        Ok(GatewayRefund { gateway_refund_id: Self::string_field(&v, "id")?, status: Self::op_status(&v) })
    }

    async fn refund_status(&self, gateway_refund_id: &str) -> Result<GatewayOpStatus, GatewayError> {
        let v = self.get(&format!("/v1/refunds/{gateway_refund_id}")).await?;
        Ok(Self::op_status(&v))
    }

    async fn create_payout(&self, request: &PayoutRequest) -> Result<GatewayPayout, GatewayError> {
        debug!("🌐️ Submitting payout {} for {}", request.payout_ref, request.amount);
        let mut body = json!({
            "fund_account_id": request.bank_account_ref,
            "amount": request.amount.value(),
            "currency": request.currency,
            "mode": "IMPS",
            "purpose": "payout",
            "reference_id": request.payout_ref,
        });
        if let Some(linked) = &request.linked_account_id {
            body["account_number"] = json!(linked);
        }
        let v = self.post("/v1/payouts", body).await?;
        Ok(GatewayPayout { gateway_payout_id: Self::string_field(&v, "id")?, status: Self::op_status(&v) })
    }

    async fn payout_status(&self, gateway_payout_id: &str) -> Result<GatewayOpStatus, GatewayError> {
        let v = self.get(&format!("/v1/payouts/{gateway_payout_id}")).await?;
        Ok(Self::op_status(&v))
    }
}
