//! Database-facing domain types for the settlement engine.
//!
//! Every status enum carries an explicit allowed-transition method. Persistence code must check
//! transitions through these methods rather than writing arbitrary status values.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use mpg_common::{Money, CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {0}: {1}")]
pub struct ConversionError(pub &'static str, pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------     GatewayKind       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum GatewayKind {
    Mock,
    Razorpay,
}

impl Display for GatewayKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GatewayKind::Mock => write!(f, "Mock"),
            GatewayKind::Razorpay => write!(f, "Razorpay"),
        }
    }
}

impl FromStr for GatewayKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "razorpay" => Ok(Self::Razorpay),
            other => Err(ConversionError("GatewayKind", other.to_string())),
        }
    }
}

//--------------------------------------    PaymentStatus      -------------------------------------------------------
/// Lifecycle of a payment attempt.
///
/// ```text
/// Initiated ──> Pending ──> Authorized ──> Captured ──> Refunded
///     │            │             │             └──────> PartiallyRefunded ──> Refunded
///     └────────────┴─────────────┴──> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Initiated,
    Pending,
    Authorized,
    Captured,
    Failed,
    Refunded,
    PartiallyRefunded,
}

impl PaymentStatus {
    pub fn can_transition_to(self, new: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, new),
            (Initiated, Pending | Authorized | Captured | Failed) |
                (Pending, Authorized | Captured | Failed) |
                (Authorized, Captured | Failed) |
                (Captured, Refunded | PartiallyRefunded) |
                (PartiallyRefunded, Refunded | PartiallyRefunded)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Initiated => "Initiated",
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Authorized => "Authorized",
            PaymentStatus::Captured => "Captured",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
            PaymentStatus::PartiallyRefunded => "PartiallyRefunded",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initiated" => Ok(Self::Initiated),
            "Pending" => Ok(Self::Pending),
            "Authorized" => Ok(Self::Authorized),
            "Captured" => Ok(Self::Captured),
            "Failed" => Ok(Self::Failed),
            "Refunded" => Ok(Self::Refunded),
            "PartiallyRefunded" => Ok(Self::PartiallyRefunded),
            other => Err(ConversionError("PaymentStatus", other.to_string())),
        }
    }
}

//--------------------------------------     SplitStatus       -------------------------------------------------------
/// Lifecycle of a per-item seller split.
///
/// `Pending` — captured, inside the hold window. `Settled` — released, counts towards the seller's
/// available balance. `PayoutPending` — reserved by a payout request. `Paid` — disbursed; terminal
/// and immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SplitStatus {
    Pending,
    Settled,
    PayoutPending,
    Paid,
}

impl SplitStatus {
    pub fn can_transition_to(self, new: SplitStatus) -> bool {
        use SplitStatus::*;
        matches!((self, new), (Pending, Settled) | (Settled, PayoutPending) | (PayoutPending, Paid | Settled))
    }
}

impl Display for SplitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SplitStatus::Pending => "Pending",
            SplitStatus::Settled => "Settled",
            SplitStatus::PayoutPending => "PayoutPending",
            SplitStatus::Paid => "Paid",
        };
        write!(f, "{s}")
    }
}

impl FromStr for SplitStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Settled" => Ok(Self::Settled),
            "PayoutPending" => Ok(Self::PayoutPending),
            "Paid" => Ok(Self::Paid),
            other => Err(ConversionError("SplitStatus", other.to_string())),
        }
    }
}

//--------------------------------------      HoldStatus       -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum HoldStatus {
    None,
    Held,
    Released,
}

impl Display for HoldStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HoldStatus::None => "None",
            HoldStatus::Held => "Held",
            HoldStatus::Released => "Released",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------     PayoutStatus      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PayoutStatus {
    pub fn can_transition_to(self, new: PayoutStatus) -> bool {
        use PayoutStatus::*;
        matches!(
            (self, new),
            (Pending, Processing | Completed | Failed | Cancelled) |
                (Processing, Completed | Failed) |
                // a processed payout can still be reversed by the gateway
                (Completed, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PayoutStatus::Completed | PayoutStatus::Failed | PayoutStatus::Cancelled)
    }
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PayoutStatus::Pending => "Pending",
            PayoutStatus::Processing => "Processing",
            PayoutStatus::Completed => "Completed",
            PayoutStatus::Failed => "Failed",
            PayoutStatus::Cancelled => "Cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for PayoutStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Processing" => Ok(Self::Processing),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            other => Err(ConversionError("PayoutStatus", other.to_string())),
        }
    }
}

//--------------------------------------     RefundStatus      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RefundStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RefundStatus::Pending => "Pending",
            RefundStatus::Completed => "Completed",
            RefundStatus::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------     Ledger enums      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum AccountType {
    Customer,
    Seller,
    Platform,
    Tax,
}

impl Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountType::Customer => "Customer",
            AccountType::Seller => "Seller",
            AccountType::Platform => "Platform",
            AccountType::Tax => "Tax",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum TransactionType {
    Payment,
    Refund,
    Payout,
    PayoutReversal,
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransactionType::Payment => "Payment",
            TransactionType::Refund => "Refund",
            TransactionType::Payout => "Payout",
            TransactionType::PayoutReversal => "PayoutReversal",
        };
        write!(f, "{s}")
    }
}

//--------------------------------------       Payment         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub amount: Money,
    pub currency: String,
    pub gateway: GatewayKind,
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub payment_method: Option<String>,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub idempotency_key: String,
    /// Opaque JSON blob supplied by the caller, stored verbatim.
    pub metadata: Option<String>,
    pub initiated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      NewPayment       -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// The order this payment attempt pays for.
    pub order_id: OrderId,
    /// The customer id as asserted by the authentication layer.
    pub customer_id: String,
    /// The order total. Must equal the sum of the item gross amounts.
    pub amount: Money,
    pub currency: String,
    pub gateway: GatewayKind,
    /// Client-supplied token making retried create calls idempotent.
    pub idempotency_key: String,
    pub payment_method: Option<String>,
    pub metadata: Option<String>,
    /// One entry per order item; these become the per-seller splits at capture.
    pub items: Vec<NewOrderItem>,
}

impl NewPayment {
    pub fn new(order_id: OrderId, customer_id: String, amount: Money, idempotency_key: String) -> Self {
        Self {
            order_id,
            customer_id,
            amount,
            currency: CURRENCY_CODE.to_string(),
            gateway: GatewayKind::Mock,
            idempotency_key,
            payment_method: None,
            metadata: None,
            items: Vec::new(),
        }
    }

    pub fn with_item(mut self, order_item_id: &str, seller_id: &str, gross: Money) -> Self {
        self.items.push(NewOrderItem {
            order_item_id: order_item_id.to_string(),
            seller_id: seller_id.to_string(),
            gross_amount: gross,
        });
        self
    }

    pub fn with_gateway(mut self, gateway: GatewayKind) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.payment_method = Some(method.to_string());
        self
    }
}

//--------------------------------------      OrderItem        -------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub order_item_id: String,
    pub seller_id: String,
    pub gross_amount: Money,
}

#[derive(Debug, Clone, FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub payment_id: i64,
    pub order_item_id: String,
    pub seller_id: String,
    pub gross_amount: Money,
}

//--------------------------------------     PaymentSplit      -------------------------------------------------------
/// The decomposition of one order item's gross amount into commission, taxes and the seller's net
/// amount. The identity `gross = commission + gst_on_commission + tds_deducted + net_seller_amount`
/// holds exactly for every row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PaymentSplit {
    pub id: i64,
    pub payment_id: i64,
    pub order_item_id: String,
    pub seller_id: String,
    pub gross_amount: Money,
    pub commission_rate_bp: i64,
    pub commission_amount: Money,
    pub gst_rate_bp: i64,
    pub gst_on_commission: Money,
    pub tds_rate_bp: i64,
    pub tds_deducted: Money,
    pub net_seller_amount: Money,
    pub status: SplitStatus,
    pub hold_status: HoldStatus,
    pub hold_until: DateTime<Utc>,
    pub payout_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     LedgerEntry       -------------------------------------------------------
/// One side of a double-entry posting. Append-only; corrections are new offsetting entries.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    pub account_type: AccountType,
    pub account_id: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
    /// The account balance after this entry was applied, as a point-in-time snapshot.
    pub balance_after: Money,
    pub currency: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub account_type: AccountType,
    pub account_id: String,
    pub debit_amount: Money,
    pub credit_amount: Money,
    pub description: String,
}

impl NewLedgerEntry {
    pub fn debit(account_type: AccountType, account_id: &str, amount: Money, description: &str) -> Self {
        Self {
            account_type,
            account_id: account_id.to_string(),
            debit_amount: amount,
            credit_amount: Money::zero(),
            description: description.to_string(),
        }
    }

    pub fn credit(account_type: AccountType, account_id: &str, amount: Money, description: &str) -> Self {
        Self {
            account_type,
            account_id: account_id.to_string(),
            debit_amount: Money::zero(),
            credit_amount: amount,
            description: description.to_string(),
        }
    }
}

//--------------------------------------        Payout         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Payout {
    pub id: i64,
    /// Internal reference carried on the gateway call and echoed back in webhook events.
    pub payout_ref: String,
    pub seller_id: String,
    pub amount: Money,
    pub currency: String,
    pub status: PayoutStatus,
    pub gateway_payout_id: Option<String>,
    pub bank_account_id: i64,
    pub failure_reason: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Refund         -------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Refund {
    pub id: i64,
    pub payment_id: i64,
    pub order_id: OrderId,
    pub amount: Money,
    pub status: RefundStatus,
    pub gateway_refund_id: Option<String>,
    pub is_partial: bool,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------      SellerKyc        -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum KycStatus {
    Pending,
    Verified,
    Rejected,
}

impl Display for KycStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            KycStatus::Pending => "Pending",
            KycStatus::Verified => "Verified",
            KycStatus::Rejected => "Rejected",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SellerKyc {
    pub id: i64,
    pub seller_id: String,
    pub legal_name: String,
    pub pan_number: String,
    pub status: KycStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   SellerBankAccount   -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum BankVerificationStatus {
    Pending,
    Verified,
    Failed,
}

impl Display for BankVerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BankVerificationStatus::Pending => "Pending",
            BankVerificationStatus::Verified => "Verified",
            BankVerificationStatus::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SellerBankAccount {
    pub id: i64,
    pub seller_id: String,
    /// Only the masked form is ever stored.
    pub account_number_masked: String,
    pub ifsc_code: String,
    pub holder_name: String,
    pub verification_status: BankVerificationStatus,
    pub is_active: bool,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBankAccount {
    pub seller_id: String,
    pub account_number_masked: String,
    pub ifsc_code: String,
    pub holder_name: String,
    pub is_primary: bool,
}

//-------------------------------------- SellerLinkedAccount   -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LinkedAccountStatus {
    Created,
    Active,
    NeedsReview,
    Suspended,
    Failed,
}

impl LinkedAccountStatus {
    pub fn can_transition_to(self, new: LinkedAccountStatus) -> bool {
        use LinkedAccountStatus::*;
        matches!(
            (self, new),
            (Created, Active | NeedsReview | Failed) |
                (Active, NeedsReview | Suspended) |
                (NeedsReview, Active | Suspended | Failed) |
                (Suspended, Active)
        )
    }
}

impl Display for LinkedAccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LinkedAccountStatus::Created => "Created",
            LinkedAccountStatus::Active => "Active",
            LinkedAccountStatus::NeedsReview => "NeedsReview",
            LinkedAccountStatus::Suspended => "Suspended",
            LinkedAccountStatus::Failed => "Failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SellerLinkedAccount {
    pub id: i64,
    pub seller_id: String,
    pub gateway_account_id: String,
    pub status: LinkedAccountStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn payment_transitions() {
        use PaymentStatus::*;
        assert!(Initiated.can_transition_to(Pending));
        assert!(Pending.can_transition_to(Captured));
        assert!(Captured.can_transition_to(PartiallyRefunded));
        assert!(PartiallyRefunded.can_transition_to(Refunded));
        assert!(!Captured.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
        assert!(!Refunded.can_transition_to(Captured));
    }

    #[test]
    fn split_transitions() {
        use SplitStatus::*;
        assert!(Pending.can_transition_to(Settled));
        assert!(Settled.can_transition_to(PayoutPending));
        assert!(PayoutPending.can_transition_to(Paid));
        // a failed payout returns the reservation to the available pool
        assert!(PayoutPending.can_transition_to(Settled));
        assert!(!Paid.can_transition_to(Settled));
        assert!(!Pending.can_transition_to(Paid));
    }

    #[test]
    fn payout_transitions() {
        use PayoutStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Cancelled));
        // reversal of an already-processed payout
        assert!(Completed.can_transition_to(Failed));
        assert!(!Cancelled.can_transition_to(Processing));
        assert!(!Failed.can_transition_to(Completed));
    }
}
