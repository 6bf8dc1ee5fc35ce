use std::fmt::Display;

use chrono::{DateTime, Utc};
use marketplace_payment_engine::db_types::{NewPayment, OrderId, Payment, PaymentSplit};
use mpg_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemRequest {
    pub order_item_id: String,
    pub seller_id: String,
    /// Gross amount in minor units.
    pub gross_amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub customer_id: String,
    /// Order total in minor units. Must equal the sum of the item gross amounts.
    pub amount: i64,
    pub idempotency_key: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    pub items: Vec<OrderItemRequest>,
}

impl CreatePaymentRequest {
    pub fn into_new_payment(self, gateway: marketplace_payment_engine::db_types::GatewayKind) -> NewPayment {
        let mut payment = NewPayment::new(
            OrderId::from(self.order_id),
            self.customer_id,
            Money::from(self.amount),
            self.idempotency_key,
        )
        .with_gateway(gateway);
        payment.payment_method = self.payment_method;
        payment.metadata = self.metadata.map(|v| v.to_string());
        for item in self.items {
            payment = payment.with_item(&item.order_item_id, &item.seller_id, Money::from(item.gross_amount));
        }
        payment
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub gateway_order_id: String,
    pub gateway_payment_id: String,
    pub signature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub payment: Payment,
    pub splits: Vec<PaymentSplit>,
    pub already_captured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequestBody {
    /// Refund amount in minor units.
    pub amount: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutRequestBody {
    /// Requested payout amount in minor units.
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub seller_id: String,
    /// Released, unreserved balance in minor units.
    pub available: Money,
}
