//! Trade types and the escrow transition table.
//!
//! A [`Trade`] is the committed bilateral exchange created from matched
//! offers. The full transition table lives here as an exhaustive match on
//! `(TradeStatus, TradeAction)` so an invalid edge is statically visible;
//! the escrow state machine layers actor permissions and side effects on
//! top of it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Market, TradeId, UserId};

/// Lifecycle status of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum TradeStatus {
    Pending,
    Funded,
    InProgress,
    Disputed,
    Completed,
    Cancelled,
    Expired,
}

impl TradeStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Expired)
    }

    /// Whether a participant may open a dispute from this state.
    #[must_use]
    pub fn is_disputable(self) -> bool {
        matches!(self, Self::Pending | Self::Funded | Self::InProgress)
    }

    /// The transition table. Returns the next status if `action` is a valid
    /// edge from `self`, `None` otherwise.
    ///
    /// Dispute resolution never routes to `Cancelled`; expiry is only a
    /// pre-settlement fail-safe (`Pending` / `Funded`).
    #[must_use]
    pub fn next(self, action: TradeAction) -> Option<Self> {
        match (self, action) {
            (Self::Pending, TradeAction::Fund) => Some(Self::Funded),
            (Self::Funded, TradeAction::ConfirmPayment) => Some(Self::InProgress),
            (Self::InProgress, TradeAction::Release) => Some(Self::Completed),
            (Self::Pending | Self::Funded | Self::InProgress, TradeAction::OpenDispute) => {
                Some(Self::Disputed)
            }
            (Self::Disputed, TradeAction::ResolveDispute) => Some(Self::Completed),
            (Self::Pending, TradeAction::Cancel) => Some(Self::Cancelled),
            (Self::Pending | Self::Funded, TradeAction::Expire) => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Funded => write!(f, "FUNDED"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Disputed => write!(f, "DISPUTED"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Cancelled => write!(f, "CANCELLED"),
            Self::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// The closed input alphabet of the escrow state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeAction {
    /// Seller funds the escrow.
    Fund,
    /// Buyer confirms the fiat payment was sent.
    ConfirmPayment,
    /// Seller verifies receipt and releases the escrow.
    Release,
    /// A participant opens a dispute.
    OpenDispute,
    /// A dispute ruling is applied.
    ResolveDispute,
    /// The trade creator cancels pre-funding.
    Cancel,
    /// The expiry sweep fires.
    Expire,
}

impl std::fmt::Display for TradeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fund => write!(f, "FUND"),
            Self::ConfirmPayment => write!(f, "CONFIRM_PAYMENT"),
            Self::Release => write!(f, "RELEASE"),
            Self::OpenDispute => write!(f, "OPEN_DISPUTE"),
            Self::ResolveDispute => write!(f, "RESOLVE_DISPUTE"),
            Self::Cancel => write!(f, "CANCEL"),
            Self::Expire => write!(f, "EXPIRE"),
        }
    }
}

/// Everything the matching engine hands to the escrow plane when a match
/// commits. The escrow state machine turns this into a [`Trade`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTerms {
    pub trade_id: TradeId,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    /// The taker who committed the match.
    pub created_by: UserId,
    pub market: Market,
    pub amount: Decimal,
    /// Execution price: the resting (maker) offer's price.
    pub price_per_unit: Decimal,
    pub fiat_currency: String,
    pub maker_fee_pct: Decimal,
    pub taker_fee_pct: Decimal,
    pub escrow_amount: Decimal,
    pub total_fiat_amount: Decimal,
}

/// A committed bilateral exchange tracked through settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub seller_id: UserId,
    pub buyer_id: UserId,
    /// The taker who committed the match; only they may cancel pre-funding.
    pub created_by: UserId,
    pub market: Market,
    /// Token amount exchanged.
    pub amount: Decimal,
    /// Execution price: the resting (maker) offer's price.
    pub price_per_unit: Decimal,
    pub fiat_currency: String,
    pub maker_fee_pct: Decimal,
    pub taker_fee_pct: Decimal,
    /// Token amount the seller must lock: trade amount plus both fees.
    pub escrow_amount: Decimal,
    /// Fiat the buyer owes: notional plus taker fee.
    pub total_fiat_amount: Decimal,
    pub status: TradeStatus,
    pub expires_at: DateTime<Utc>,
    pub seller_signed: bool,
    pub buyer_signed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trade {
    /// Whether `user` is a party to this trade.
    #[must_use]
    pub fn is_participant(&self, user: UserId) -> bool {
        self.seller_id == user || self.buyer_id == user
    }

    /// Fiat notional: amount × price.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.amount * self.price_per_unit
    }
}

impl std::fmt::Display for Trade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Trade[{}] {} {} @ {} {} ({})",
            self.id, self.market, self.amount, self.price_per_unit, self.fiat_currency, self.status,
        )
    }
}

/// Test helpers.
#[cfg(any(test, feature = "test-helpers"))]
impl Trade {
    pub fn dummy(seller_id: UserId, buyer_id: UserId, amount: Decimal, price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: TradeId::new(),
            seller_id,
            buyer_id,
            created_by: buyer_id,
            market: Market::new("USDT", "ethereum"),
            amount,
            price_per_unit: price,
            fiat_currency: "USD".to_string(),
            maker_fee_pct: Decimal::new(10, 1),
            taker_fee_pct: Decimal::new(15, 1),
            escrow_amount: amount,
            total_fiat_amount: amount * price,
            status: TradeStatus::Pending,
            expires_at: now + chrono::Duration::hours(24),
            seller_signed: false,
            buyer_signed: false,
            created_at: now,
            updated_at: now,
        }
    }
}
