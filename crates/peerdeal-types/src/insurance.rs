//! Insurance policy and claim records.
//!
//! A claim is only ever created reactively from a dispute ruling, never by
//! a user during the dispute flow.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{ClaimId, DisputeId, PolicyId, TradeId, UserId};

/// Lifecycle status of a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyStatus {
    Active,
    Claimed,
    Lapsed,
}

impl std::fmt::Display for PolicyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Claimed => write!(f, "CLAIMED"),
            Self::Lapsed => write!(f, "LAPSED"),
        }
    }
}

/// Coverage a party holds against losing a dispute on a specific trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsurancePolicy {
    pub id: PolicyId,
    pub trade_id: TradeId,
    pub insured_id: UserId,
    pub coverage_amount: Decimal,
    pub status: PolicyStatus,
    pub created_at: DateTime<Utc>,
}

impl InsurancePolicy {
    #[must_use]
    pub fn new(trade_id: TradeId, insured_id: UserId, coverage_amount: Decimal) -> Self {
        Self {
            id: PolicyId::new(),
            trade_id,
            insured_id,
            coverage_amount,
            status: PolicyStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == PolicyStatus::Active
    }
}

/// Outcome of an auto-filed claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimStatus {
    Approved,
    Denied,
}

/// A claim filed against a policy in reaction to a dispute ruling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsuranceClaim {
    pub id: ClaimId,
    pub policy_id: PolicyId,
    pub dispute_id: DisputeId,
    pub claimant_id: UserId,
    pub payout_amount: Decimal,
    pub status: ClaimStatus,
    pub filed_at: DateTime<Utc>,
}
