//! Dispute types: the three-tier escalation model.
//!
//! Tier 1 (automated review, 2h) → Tier 2 (arbitration, 24h) →
//! Tier 3 (DAO vote, 72h). The tier only ever increases, by exactly one per
//! escalation; `Resolved` is terminal.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{
    ARBITRATION_DEADLINE_HOURS, AUTOMATED_REVIEW_DEADLINE_HOURS, DAO_VOTE_DEADLINE_HOURS,
};
use crate::{DisputeId, TradeId, UserId};

/// The three dispute-resolution stages, in escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum EscalationTier {
    Automated = 1,
    Arbitration = 2,
    DaoVote = 3,
}

impl EscalationTier {
    /// The next tier up, or `None` at the ceiling.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Automated => Some(Self::Arbitration),
            Self::Arbitration => Some(Self::DaoVote),
            Self::DaoVote => None,
        }
    }

    /// Maximum dwell time, measured from entry into the tier.
    #[must_use]
    pub fn deadline(self) -> Duration {
        match self {
            Self::Automated => Duration::hours(AUTOMATED_REVIEW_DEADLINE_HOURS),
            Self::Arbitration => Duration::hours(ARBITRATION_DEADLINE_HOURS),
            Self::DaoVote => Duration::hours(DAO_VOTE_DEADLINE_HOURS),
        }
    }

    #[must_use]
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for EscalationTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Automated => write!(f, "AUTOMATED"),
            Self::Arbitration => write!(f, "ARBITRATION"),
            Self::DaoVote => write!(f, "DAO_VOTE"),
        }
    }
}

/// Dispute lifecycle status. Mirrors the active tier until resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeStatus {
    AutomatedReview,
    Arbitration,
    DaoVote,
    Resolved,
}

impl DisputeStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// The status matching a given active tier.
    #[must_use]
    pub fn for_tier(tier: EscalationTier) -> Self {
        match tier {
            EscalationTier::Automated => Self::AutomatedReview,
            EscalationTier::Arbitration => Self::Arbitration,
            EscalationTier::DaoVote => Self::DaoVote,
        }
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AutomatedReview => write!(f, "AUTOMATED_REVIEW"),
            Self::Arbitration => write!(f, "ARBITRATION"),
            Self::DaoVote => write!(f, "DAO_VOTE"),
            Self::Resolved => write!(f, "RESOLVED"),
        }
    }
}

/// Which way a dispute was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ruling {
    FavorSeller,
    FavorBuyer,
    Split,
}

impl Ruling {
    /// The party whose bond is forfeited under this ruling, if any.
    #[must_use]
    pub fn losing_party(self, seller: UserId, buyer: UserId) -> Option<UserId> {
        match self {
            Self::FavorSeller => Some(buyer),
            Self::FavorBuyer => Some(seller),
            Self::Split => None,
        }
    }
}

impl std::fmt::Display for Ruling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FavorSeller => write!(f, "FAVOR_SELLER"),
            Self::FavorBuyer => write!(f, "FAVOR_BUYER"),
            Self::Split => write!(f, "SPLIT"),
        }
    }
}

/// One message from the parties' trade chat, part of the oracle's context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender_id: UserId,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Party-submitted context the ruling oracle weighs alongside the trade:
/// the chat transcript plus evidence references (receipts, tx hashes).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// Transcript between the parties, oldest first.
    pub chat_log: Vec<ChatMessage>,
    /// References to submitted evidence.
    pub attachments: Vec<String>,
}

impl EvidenceBundle {
    /// Merge another bundle in, preserving submission order.
    pub fn extend(&mut self, other: EvidenceBundle) {
        self.chat_log.extend(other.chat_log);
        self.attachments.extend(other.attachments);
    }
}

/// A dispute over a trade, tracked through tiered escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub trade_id: TradeId,
    pub initiator_id: UserId,
    pub reason: String,
    /// Chat transcript and submitted evidence, handed to the oracle.
    pub evidence: EvidenceBundle,
    pub tier: EscalationTier,
    pub status: DisputeStatus,
    /// The applied ruling once resolved; a recorded-but-unaccepted verdict
    /// lives in `pending_verdict` instead.
    pub ruling: Option<Ruling>,
    /// Confidence (0-100) of the verdict produced at the current tier,
    /// awaiting the initiator's accept or contest.
    pub pending_verdict: Option<(Ruling, u8)>,
    pub ruling_confidence: Option<u8>,
    pub created_at: DateTime<Utc>,
    /// When the dispute entered its current tier; deadlines run from here.
    pub tier_entered_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Dispute {
    #[must_use]
    pub fn new(trade_id: TradeId, initiator_id: UserId, reason: String, now: DateTime<Utc>) -> Self {
        Self {
            id: DisputeId::new(),
            trade_id,
            initiator_id,
            reason,
            evidence: EvidenceBundle::default(),
            tier: EscalationTier::Automated,
            status: DisputeStatus::AutomatedReview,
            ruling: None,
            pending_verdict: None,
            ruling_confidence: None,
            created_at: now,
            tier_entered_at: now,
            resolved_at: None,
        }
    }

    /// Whether the current tier's deadline has passed without resolution.
    #[must_use]
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && now > self.tier_entered_at + self.tier.deadline()
    }
}
