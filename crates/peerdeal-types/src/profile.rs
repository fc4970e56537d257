//! Trader reputation profiles.
//!
//! Profiles feed two places: offer requirement gating (reputation / KYC)
//! and reputation-based fee discounts. An unknown user gets the
//! conservative default: zero reputation, no discounts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Reputation and fee-discount data for a marketplace user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderProfile {
    pub user_id: UserId,
    pub reputation: u32,
    pub kyc_verified: bool,
    /// Percentage points shaved off the base maker fee.
    pub maker_discount_pct: Decimal,
    /// Percentage points shaved off the base taker fee.
    pub taker_discount_pct: Decimal,
    pub completed_trades: u64,
}

impl TraderProfile {
    /// Conservative default for a user we have no record of.
    #[must_use]
    pub fn unknown(user_id: UserId) -> Self {
        Self {
            user_id,
            reputation: 0,
            kyc_verified: false,
            maker_discount_pct: Decimal::ZERO,
            taker_discount_pct: Decimal::ZERO,
            completed_trades: 0,
        }
    }
}
