//! Error types for the PeerDeal escrow core.
//!
//! All errors use the `PD_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Offer / book errors
//! - 2xx: Trade / state machine errors
//! - 3xx: Bond ledger errors
//! - 4xx: Dispute errors
//! - 5xx: Matching errors
//! - 6xx: External dependency errors
//! - 7xx: Insurance errors
//! - 9xx: General / internal errors
//!
//! Fatal invariant violations (bond conservation, fill overflow) poison the
//! affected aggregate: further mutation is refused until manual
//! reconciliation.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{DisputeId, EscalationTier, OfferId, OfferStatus, TradeAction, TradeId, TradeStatus};

/// Central error enum for all PeerDeal operations.
#[derive(Debug, Error)]
pub enum PeerdealError {
    // =================================================================
    // Offer / Book Errors (1xx)
    // =================================================================
    /// The requested offer was not found in the book.
    #[error("PD_ERR_100: Offer not found: {0}")]
    OfferNotFound(OfferId),

    /// The offer failed validation before placement.
    #[error("PD_ERR_101: Invalid offer: {reason}")]
    InvalidOffer { reason: String },

    /// An offer with this ID already exists.
    #[error("PD_ERR_102: Offer already exists: {0}")]
    DuplicateOffer(OfferId),

    /// A fill was requested for more than the offer has remaining.
    #[error("PD_ERR_103: Insufficient remaining on offer: requested {requested}, remaining {remaining}")]
    InsufficientRemaining {
        requested: Decimal,
        remaining: Decimal,
    },

    /// The offer cannot be cancelled in its current status.
    #[error("PD_ERR_104: Offer not cancellable: status is {0}")]
    OfferNotCancellable(OfferStatus),

    /// A fill pushed `filled_amount` past `amount` — fatal, aggregate poisoned.
    #[error("PD_ERR_105: Fill overflow on offer {offer_id}: filled {filled} > amount {amount}")]
    FillOverflow {
        offer_id: OfferId,
        filled: Decimal,
        amount: Decimal,
    },

    // =================================================================
    // Trade / State Machine Errors (2xx)
    // =================================================================
    /// The requested trade was not found.
    #[error("PD_ERR_200: Trade not found: {0}")]
    TradeNotFound(TradeId),

    /// A transition was attempted from a state that does not permit it.
    #[error("PD_ERR_201: Invalid transition: {action} from {from}")]
    InvalidTransition {
        from: TradeStatus,
        action: TradeAction,
    },

    /// The caller is not permitted to perform this transition.
    #[error("PD_ERR_202: Not authorized: {action} requires {required_role}")]
    NotAuthorized {
        action: TradeAction,
        required_role: &'static str,
    },

    /// A trade already exists for this offer pair / fill sequence.
    #[error("PD_ERR_203: Trade already exists: {0}")]
    DuplicateTrade(TradeId),

    // =================================================================
    // Bond Ledger Errors (3xx)
    // =================================================================
    /// No bond record exists for the trade.
    #[error("PD_ERR_300: Bond record not found for trade {0}")]
    BondNotFound(TradeId),

    /// A bond was already locked / settled for this party.
    #[error("PD_ERR_301: Bond already settled for trade {0}")]
    BondAlreadySettled(TradeId),

    /// Bond conservation broke — fatal, record poisoned.
    #[error("PD_ERR_302: Bond conservation violation: {reason}")]
    BondConservationViolation { reason: String },

    // =================================================================
    // Dispute Errors (4xx)
    // =================================================================
    /// The requested dispute was not found.
    #[error("PD_ERR_400: Dispute not found: {0}")]
    DisputeNotFound(DisputeId),

    /// A dispute is already open for this trade.
    #[error("PD_ERR_401: Dispute already open for trade {0}")]
    DuplicateDispute(TradeId),

    /// The dispute is already resolved (terminal).
    #[error("PD_ERR_402: Dispute already resolved: {0}")]
    DisputeAlreadyResolved(DisputeId),

    /// Escalation was requested beyond the final tier.
    #[error("PD_ERR_403: Cannot escalate past {0}")]
    EscalationCeiling(EscalationTier),

    /// The operation is not valid for the dispute's current tier.
    #[error("PD_ERR_404: Wrong dispute tier: expected {expected}, got {actual}")]
    WrongDisputeTier {
        expected: EscalationTier,
        actual: EscalationTier,
    },

    /// A ruling was accepted before any verdict was recorded for the tier.
    #[error("PD_ERR_405: No pending verdict on dispute {0}")]
    NoPendingVerdict(DisputeId),

    /// Only the dispute's initiator may accept or contest a verdict.
    #[error("PD_ERR_406: Caller is not the initiator of dispute {0}")]
    NotDisputeInitiator(DisputeId),

    // =================================================================
    // Matching Errors (5xx)
    // =================================================================
    /// No compatible counter-offer was found.
    #[error("PD_ERR_500: No match found for offer {0}")]
    NoMatchFound(OfferId),

    /// Maker and taker are the same user (wash trading prevention).
    #[error("PD_ERR_501: Self-trade prevented: maker and taker are the same user")]
    SelfTradeBlocked,

    /// The committed amount violates one offer's min/max trade bounds.
    #[error("PD_ERR_502: Trade size {amount} outside bounds [{min}, {max}]")]
    TradeSizeOutOfBounds {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },

    /// The taker does not meet the maker's requirements (reputation / KYC).
    #[error("PD_ERR_503: Requirements not met: {reason}")]
    RequirementsNotMet { reason: String },

    // =================================================================
    // External Dependency Errors (6xx)
    // =================================================================
    /// A chain adapter call failed; off-chain state was not advanced.
    #[error("PD_ERR_600: Chain call failed during {operation}: {reason}")]
    ChainCallFailed {
        operation: &'static str,
        reason: String,
    },

    /// The ruling oracle failed or timed out; caller falls back to escalation.
    #[error("PD_ERR_601: Ruling oracle unavailable: {reason}")]
    OracleUnavailable { reason: String },

    // =================================================================
    // Insurance Errors (7xx)
    // =================================================================
    /// No active policy covers the losing party for this trade.
    #[error("PD_ERR_700: No active policy for trade {0}")]
    NoActivePolicy(TradeId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Invalid input to a pure computation (negative amount, price, discount).
    #[error("PD_ERR_900: Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Unrecoverable internal error.
    #[error("PD_ERR_901: Internal error: {0}")]
    Internal(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, PeerdealError>;

impl PeerdealError {
    /// Whether this error is a fatal invariant violation that must poison
    /// the affected aggregate.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::FillOverflow { .. } | Self::BondConservationViolation { .. }
        )
    }
}
