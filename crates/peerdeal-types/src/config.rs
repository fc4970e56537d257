//! Configuration for the PeerDeal escrow core.
//!
//! Every policy knob the spec leaves open is a parameter here rather than a
//! hard-coded value: the split-ruling bond penalty, the bond rate, the
//! insurance payout fraction, and the dispute deadlines.

use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Fee schedule: base percentages and the hard floor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Base maker fee in percent.
    pub base_maker_pct: Decimal,
    /// Base taker fee in percent.
    pub base_taker_pct: Decimal,
    /// Hard floor in percent; discounts can never push a fee below this.
    pub floor_pct: Decimal,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            base_maker_pct: Decimal::new(10, 1), // 1.0%
            base_taker_pct: Decimal::new(15, 1), // 1.5%
            floor_pct: Decimal::new(1, 1),       // 0.1%
        }
    }
}

/// Bond economy parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondConfig {
    /// Per-party bond as a percent of trade value.
    pub bond_rate_pct: Decimal,
    /// Share of each bond forfeited to the treasury under a split ruling.
    pub split_penalty_pct: Decimal,
}

impl BondConfig {
    /// Per-party bond for a trade of the given token amount.
    #[must_use]
    pub fn bond_amount(&self, trade_amount: Decimal) -> Decimal {
        trade_amount * self.bond_rate_pct / Decimal::ONE_HUNDRED
    }
}

impl Default for BondConfig {
    fn default() -> Self {
        Self {
            bond_rate_pct: Decimal::new(10, 0),     // 10%
            split_penalty_pct: Decimal::new(25, 0), // 25%
        }
    }
}

/// Dispute escalation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisputeConfig {
    /// Confidence (0-100) at or above which an automated ruling applies
    /// without a human step.
    pub auto_resolve_confidence: u8,
}

impl Default for DisputeConfig {
    fn default() -> Self {
        Self {
            auto_resolve_confidence: constants::AUTO_RESOLVE_CONFIDENCE,
        }
    }
}

/// Insurance payout parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceConfig {
    /// Fraction of coverage paid out on an approved claim, in percent.
    pub payout_fraction_pct: Decimal,
}

impl InsuranceConfig {
    /// Payout for a given coverage amount.
    #[must_use]
    pub fn payout(&self, coverage: Decimal) -> Decimal {
        coverage * self.payout_fraction_pct / Decimal::ONE_HUNDRED
    }
}

impl Default for InsuranceConfig {
    fn default() -> Self {
        Self {
            payout_fraction_pct: Decimal::new(50, 0), // 50%
        }
    }
}

/// Top-level marketplace configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketplaceConfig {
    pub fees: FeeConfig,
    pub bonds: BondConfig,
    pub disputes: DisputeConfig,
    pub insurance: InsuranceConfig,
}

impl MarketplaceConfig {
    /// Default trade expiry window.
    #[must_use]
    pub fn trade_expiry(&self) -> Duration {
        Duration::hours(constants::DEFAULT_TRADE_EXPIRY_HOURS)
    }
}
