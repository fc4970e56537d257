//! Pure fee computation.
//!
//! The fee engine is the one place maker/taker percentages, escrow totals,
//! and fiat totals are derived. No side effects — invalid inputs fail fast
//! before any arithmetic.

use rust_decimal::Decimal;

use peerdeal_types::{FeeConfig, PeerdealError, Result};

/// Everything derived from one fee quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeBreakdown {
    /// Maker fee after discount, floored.
    pub maker_fee_pct: Decimal,
    /// Taker fee after discount, floored.
    pub taker_fee_pct: Decimal,
    /// Token amount the seller locks: trade amount plus both fees.
    pub escrow_amount: Decimal,
    /// Fiat notional: amount × price.
    pub buyer_fiat: Decimal,
    /// Taker fee expressed in fiat.
    pub buyer_fee_fiat: Decimal,
    /// Fiat the buyer owes in total.
    pub total_fiat: Decimal,
}

/// Pure function computing the full fee breakdown for a prospective trade.
pub struct FeeEngine;

impl FeeEngine {
    /// Quote fees for a trade of `amount` tokens at `price` fiat per unit.
    ///
    /// `maker_discount` / `taker_discount` are percentage points earned by
    /// reputation; each fee is floored at `config.floor_pct` so discounts
    /// can never eliminate fees entirely.
    ///
    /// # Errors
    /// `InvalidInput` for negative amount, price, or discounts — rejected
    /// before any computation.
    pub fn quote(
        config: &FeeConfig,
        amount: Decimal,
        price: Decimal,
        maker_discount: Decimal,
        taker_discount: Decimal,
    ) -> Result<FeeBreakdown> {
        if amount <= Decimal::ZERO {
            return Err(PeerdealError::InvalidInput {
                reason: format!("trade amount must be positive, got {amount}"),
            });
        }
        if price <= Decimal::ZERO {
            return Err(PeerdealError::InvalidInput {
                reason: format!("price must be positive, got {price}"),
            });
        }
        if maker_discount < Decimal::ZERO || taker_discount < Decimal::ZERO {
            return Err(PeerdealError::InvalidInput {
                reason: format!(
                    "discounts must be non-negative, got maker {maker_discount} / taker {taker_discount}"
                ),
            });
        }

        let maker_fee_pct = (config.base_maker_pct - maker_discount).max(config.floor_pct);
        let taker_fee_pct = (config.base_taker_pct - taker_discount).max(config.floor_pct);

        let combined = (maker_fee_pct + taker_fee_pct) / Decimal::ONE_HUNDRED;
        let escrow_amount = amount * (Decimal::ONE + combined);

        let buyer_fiat = amount * price;
        let buyer_fee_fiat = buyer_fiat * taker_fee_pct / Decimal::ONE_HUNDRED;
        let total_fiat = buyer_fiat + buyer_fee_fiat;

        Ok(FeeBreakdown {
            maker_fee_pct,
            taker_fee_pct,
            escrow_amount,
            buyer_fiat,
            buyer_fee_fiat,
            total_fiat,
        })
    }
}
