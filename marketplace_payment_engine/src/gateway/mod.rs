//! The payment-provider abstraction.
//!
//! The real gateway is a third-party network service. The engine only ever talks to it through
//! [`PaymentProvider`], so orchestrators can be driven by the deterministic [`MockProvider`] in
//! tests and local runs, and by the HTTP-backed [`RazorpayProvider`] in production. Transport
//! errors never leak past this module; everything is mapped into [`GatewayError`].

use std::time::Duration;

use async_trait::async_trait;
use mpg_common::Money;
use thiserror::Error;

use crate::db_types::GatewayKind;

pub mod mock;
pub mod razorpay;

pub use mock::{MockBehavior, MockProvider};
pub use razorpay::RazorpayProvider;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Gateway call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Gateway declined the request. {code}: {message}")]
    Declined { code: String, message: String },
    #[error("Could not reach the gateway. {0}")]
    Network(String),
    #[error("Gateway response could not be interpreted. {0}")]
    InvalidResponse(String),
}

/// Request to open an order on the gateway ahead of customer checkout.
#[derive(Debug, Clone)]
pub struct GatewayOrderRequest {
    pub amount: Money,
    pub currency: String,
    /// Our order id, echoed back by the gateway as the receipt.
    pub receipt: String,
}

#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub gateway_payment_id: String,
    pub amount: Money,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayRefund {
    pub gateway_refund_id: String,
    pub status: GatewayOpStatus,
}

/// Request to transfer a seller's balance to their bank account.
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    /// Our internal payout reference; the gateway echoes it back in webhook events.
    pub payout_ref: String,
    pub amount: Money,
    pub currency: String,
    /// Opaque destination reference (fund-account / beneficiary id registered with the gateway).
    pub bank_account_ref: String,
    /// The seller's sub-merchant account on the gateway, when one exists.
    pub linked_account_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GatewayPayout {
    pub gateway_payout_id: String,
    pub status: GatewayOpStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOpStatus {
    Accepted,
    Processed,
    Failed,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> GatewayKind;

    /// Opens an order on the gateway. Called before the customer is redirected to pay.
    async fn create_order(&self, request: &GatewayOrderRequest) -> Result<GatewayOrder, GatewayError>;

    /// Checks the capture attestation the client relays back to us. Pure; no network call.
    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool;

    async fn initiate_refund(&self, request: &RefundRequest) -> Result<GatewayRefund, GatewayError>;

    async fn refund_status(&self, gateway_refund_id: &str) -> Result<GatewayOpStatus, GatewayError>;

    /// Submits a payout. Acceptance here only means the gateway has queued the transfer; final
    /// settlement arrives asynchronously via webhook.
    async fn create_payout(&self, request: &PayoutRequest) -> Result<GatewayPayout, GatewayError>;

    async fn payout_status(&self, gateway_payout_id: &str) -> Result<GatewayOpStatus, GatewayError>;
}
