//! Offer types for the PeerDeal order book.
//!
//! An offer is a standing buy/sell advertisement. Its `filled_amount` only
//! ever increases; status derives from fill progress plus explicit
//! cancellation or expiry.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Market, OfferId, PeerdealError, Result, UserId};

/// Which side of the book this offer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OfferSide {
    Buy,
    Sell,
}

impl OfferSide {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl std::fmt::Display for OfferSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// Lifecycle status of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OfferStatus {
    Open,
    PartiallyFilled,
    Matched,
    Cancelled,
    Expired,
}

impl OfferStatus {
    /// Whether the offer can still accept fills.
    #[must_use]
    pub fn is_fillable(self) -> bool {
        matches!(self, Self::Open | Self::PartiallyFilled)
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::PartiallyFilled => write!(f, "PARTIALLY_FILLED"),
            Self::Matched => write!(f, "MATCHED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Gate the maker imposes on anyone accepting the offer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferRequirements {
    /// Minimum taker reputation score.
    pub min_reputation: u32,
    /// Whether the taker must have passed KYC.
    pub kyc_required: bool,
}

/// A standing buy/sell advertisement in the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub creator_id: UserId,
    pub side: OfferSide,
    pub market: Market,
    /// Total token amount offered.
    pub amount: Decimal,
    /// Monotonically increasing; never exceeds `amount`.
    pub filled_amount: Decimal,
    /// Fiat price per token unit.
    pub price_per_unit: Decimal,
    pub fiat_currency: String,
    /// Smallest acceptable single trade.
    pub min_trade: Decimal,
    /// Largest acceptable single trade.
    pub max_trade: Decimal,
    pub expires_at: DateTime<Utc>,
    pub status: OfferStatus,
    pub requirements: OfferRequirements,
    pub payment_methods: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Offer {
    /// Amount still available for matching.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.amount - self.filled_amount
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == OfferStatus::Open
    }

    /// Validate the offer's numeric shape before placement.
    ///
    /// # Errors
    /// `InvalidOffer` naming the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(PeerdealError::InvalidOffer {
                reason: format!("amount must be positive, got {}", self.amount),
            });
        }
        if self.price_per_unit <= Decimal::ZERO {
            return Err(PeerdealError::InvalidOffer {
                reason: format!("price must be positive, got {}", self.price_per_unit),
            });
        }
        if self.min_trade <= Decimal::ZERO {
            return Err(PeerdealError::InvalidOffer {
                reason: format!("min_trade must be positive, got {}", self.min_trade),
            });
        }
        if self.min_trade > self.max_trade {
            return Err(PeerdealError::InvalidOffer {
                reason: format!(
                    "min_trade {} exceeds max_trade {}",
                    self.min_trade, self.max_trade
                ),
            });
        }
        if self.max_trade > self.amount {
            return Err(PeerdealError::InvalidOffer {
                reason: format!(
                    "max_trade {} exceeds offer amount {}",
                    self.max_trade, self.amount
                ),
            });
        }
        if self.filled_amount != Decimal::ZERO {
            return Err(PeerdealError::InvalidOffer {
                reason: "new offer must start unfilled".into(),
            });
        }
        Ok(())
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Offer {
    pub fn dummy(side: OfferSide, price: Decimal, amount: Decimal) -> Self {
        Self::dummy_for_user(UserId::new(), side, price, amount)
    }

    pub fn dummy_for_user(
        creator_id: UserId,
        side: OfferSide,
        price: Decimal,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OfferId::new(),
            creator_id,
            side,
            market: Market::new("USDT", "ethereum"),
            amount,
            filled_amount: Decimal::ZERO,
            price_per_unit: price,
            fiat_currency: "USD".to_string(),
            min_trade: Decimal::ONE,
            max_trade: amount,
            expires_at: now + chrono::Duration::hours(24),
            status: OfferStatus::Open,
            requirements: OfferRequirements::default(),
            payment_methods: vec!["bank_transfer".to_string()],
            created_at: now,
        }
    }
}
