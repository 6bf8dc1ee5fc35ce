//! Marketplace Payment Engine
//!
//! The settlement core for an artwork marketplace: it takes a captured customer payment, splits
//! each order item into platform commission, taxes and the seller's net amount, escrows the
//! seller's money for a hold period, and eventually transfers it to a verified bank account —
//! all against an append-only double-entry ledger.
//!
//! The library is divided into three main sections:
//! 1. Database management and control ([`mod@db`], [`mod@traits`]). SQLite is the supported
//!    backend. You should never need to access the database directly; use the public API objects
//!    instead. The data types stored in the database live in [`mod@db_types`] and are public.
//! 2. The engine's public API ([`PaymentFlowApi`], [`EscrowApi`], [`PayoutApi`], [`WebhookApi`],
//!    [`SellerApi`]). These are generic over the backend traits and orchestrate gateway calls,
//!    persistence and event hooks.
//! 3. The gateway abstraction ([`mod@gateway`]): the trait the orchestrators drive, a
//!    deterministic mock, and a Razorpay-style HTTP adapter.
//!
//! The engine also emits events (payment captured, payout completed/failed) through a small
//! actor-style hook system in [`mod@events`], so embedding applications can react without
//! coupling into the settlement flows.
mod db;

pub mod db_types;
pub mod events;
pub mod gateway;
pub mod helpers;
mod mpe_api;
pub mod splits;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError, PLATFORM_ACCOUNT, TAX_ACCOUNT};
pub use mpe_api::{
    escrow_api::EscrowApi,
    payment_flow_api::PaymentFlowApi,
    payout_api::PayoutApi,
    seller_api::SellerApi,
    webhook_api::{EventPayload, GatewayEvent, WebhookApi, WebhookError, WebhookOutcome},
    SettlementConfig,
};
