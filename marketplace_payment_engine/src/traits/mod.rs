//! Behaviour contracts for storage backends.
//!
//! Backends (currently SQLite) implement these traits; the public API objects in
//! [`crate::mpe_api`] are generic over them. Method doc comments are the contracts — in
//! particular which operations must be atomic and which must be idempotent.

pub mod data_objects;
mod ledger_management;
mod payment_gateway_database;
mod payout_management;
mod seller_verification;

pub use data_objects::{CaptureOutcome, EarningsSummary, InsertPaymentResult, PaymentAnalytics, PayoutReservation};
pub use ledger_management::{check_balanced, LedgerError, LedgerManagement};
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
pub use payout_management::{PayoutError, PayoutManagement};
pub use seller_verification::{SellerVerification, VerificationError};
