//! Bond records: refundable collateral locked per trade party.
//!
//! Conservation invariant: once both dispositions are settled, the value
//! accounted across refunds and forfeitures equals the sum of the two
//! locked bonds exactly. No value is created or destroyed.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::TradeId;

/// Where a party's bond ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BondDisposition {
    /// Still held by the ledger.
    Locked,
    /// Returned to the party in full or in part.
    Refunded { amount: Decimal },
    /// Sent to the treasury.
    Forfeited { amount: Decimal },
    /// Split ruling: part refunded, penalty to treasury.
    Split {
        refunded: Decimal,
        forfeited: Decimal,
    },
}

impl BondDisposition {
    #[must_use]
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::Locked)
    }

    /// Total value this disposition accounts for.
    #[must_use]
    pub fn accounted(self) -> Decimal {
        match self {
            Self::Locked => Decimal::ZERO,
            Self::Refunded { amount } | Self::Forfeited { amount } => amount,
            Self::Split {
                refunded,
                forfeited,
            } => refunded + forfeited,
        }
    }

    /// Value that went to the treasury.
    #[must_use]
    pub fn treasury_share(self) -> Decimal {
        match self {
            Self::Locked | Self::Refunded { .. } => Decimal::ZERO,
            Self::Forfeited { amount } => amount,
            Self::Split { forfeited, .. } => forfeited,
        }
    }
}

impl std::fmt::Display for BondDisposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Locked => write!(f, "LOCKED"),
            Self::Refunded { amount } => write!(f, "REFUNDED({amount})"),
            Self::Forfeited { amount } => write!(f, "FORFEITED({amount})"),
            Self::Split {
                refunded,
                forfeited,
            } => write!(f, "SPLIT(refund {refunded} / forfeit {forfeited})"),
        }
    }
}

/// Per-trade bond accounting, symmetric across both parties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BondRecord {
    pub trade_id: TradeId,
    /// Per-party bond size (same for seller and buyer).
    pub bond_amount: Decimal,
    pub seller_locked: bool,
    pub buyer_locked: bool,
    pub seller_disposition: BondDisposition,
    pub buyer_disposition: BondDisposition,
}

impl BondRecord {
    #[must_use]
    pub fn new(trade_id: TradeId, bond_amount: Decimal) -> Self {
        Self {
            trade_id,
            bond_amount,
            seller_locked: false,
            buyer_locked: false,
            seller_disposition: BondDisposition::Locked,
            buyer_disposition: BondDisposition::Locked,
        }
    }

    /// Total value the ledger is currently holding for this trade.
    #[must_use]
    pub fn locked_total(&self) -> Decimal {
        let mut total = Decimal::ZERO;
        if self.seller_locked {
            total += self.bond_amount;
        }
        if self.buyer_locked {
            total += self.bond_amount;
        }
        total
    }

    /// Whether both locked bonds have reached a settled disposition.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        (!self.seller_locked || self.seller_disposition.is_settled())
            && (!self.buyer_locked || self.buyer_disposition.is_settled())
    }

    /// Total value accounted by the settled dispositions.
    #[must_use]
    pub fn accounted_value(&self) -> Decimal {
        self.seller_disposition.accounted() + self.buyer_disposition.accounted()
    }
}
