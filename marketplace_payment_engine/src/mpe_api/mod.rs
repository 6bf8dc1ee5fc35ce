//! The public API of the settlement engine.
//!
//! Each API object is generic over the storage traits in [`crate::traits`] and owns a handle to
//! the payment provider where gateway calls are part of the flow. Event hooks fire after the
//! corresponding database transaction has committed.

pub mod escrow_api;
pub mod payment_flow_api;
pub mod payout_api;
pub mod seller_api;
pub mod webhook_api;

use chrono::Duration;

use crate::splits::FeeRates;

/// Settlement parameters snapshotted onto every split at capture time. Rates are configuration-
/// time constants; there is no versioned rate schedule.
#[derive(Debug, Clone, Copy)]
pub struct SettlementConfig {
    pub rates: FeeRates,
    /// How long a captured split stays in escrow before it becomes payable.
    pub hold_period: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            rates: FeeRates::new(
                mpg_common::bp_from_percent(5),
                mpg_common::bp_from_percent(18),
                mpg_common::bp_from_percent(1),
            ),
            hold_period: Duration::days(7),
        }
    }
}
