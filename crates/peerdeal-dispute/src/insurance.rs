//! Insurance claim processing.
//!
//! A claim is a pure reaction to a dispute ruling: when the losing party
//! holds an active policy on the disputed trade, a claim is auto-filed and
//! approved, and the policy flips to claimed. No user-initiated step exists.
//! Re-processing the same dispute returns the original claim id.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use peerdeal_types::{
    ClaimId, ClaimStatus, Dispute, DisputeId, InsuranceClaim, InsuranceConfig, InsurancePolicy,
    PolicyId, PolicyStatus, Result, Trade,
};
use rust_decimal::Decimal;

/// One-claim-per-dispute guard.
///
/// Bounded map of dispute id to the claim it produced, with LRU eviction so
/// memory stays flat in long-running nodes.
struct ClaimGuard {
    processed: HashMap<DisputeId, Option<ClaimId>>,
    /// Insertion order for eviction (front = oldest).
    order: VecDeque<DisputeId>,
    max_size: usize,
}

impl ClaimGuard {
    /// # Panics
    /// Panics if `max_size` is zero.
    fn new(max_size: usize) -> Self {
        assert!(max_size > 0, "ClaimGuard max_size must be > 0");
        Self {
            processed: HashMap::with_capacity(max_size),
            order: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// The outcome recorded for a dispute, if it was already processed.
    fn lookup(&self, dispute_id: DisputeId) -> Option<Option<ClaimId>> {
        self.processed.get(&dispute_id).copied()
    }

    fn remember(&mut self, dispute_id: DisputeId, outcome: Option<ClaimId>) {
        if self.processed.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                self.processed.remove(&oldest);
            }
        }
        self.processed.insert(dispute_id, outcome);
        self.order.push_back(dispute_id);
    }
}

struct Inner {
    policies: HashMap<PolicyId, InsurancePolicy>,
    claims: HashMap<ClaimId, InsuranceClaim>,
    guard: ClaimGuard,
}

/// Files and approves claims in reaction to dispute rulings.
pub struct InsuranceClaimProcessor {
    inner: Mutex<Inner>,
    config: InsuranceConfig,
}

impl InsuranceClaimProcessor {
    #[must_use]
    pub fn new(config: InsuranceConfig) -> Self {
        Self::with_guard_size(config, peerdeal_types::constants::CLAIM_GUARD_CACHE_SIZE)
    }

    /// # Panics
    /// Panics if `guard_size` is zero.
    #[must_use]
    pub fn with_guard_size(config: InsuranceConfig, guard_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                policies: HashMap::new(),
                claims: HashMap::new(),
                guard: ClaimGuard::new(guard_size),
            }),
            config,
        }
    }

    /// Register coverage a party bought for a trade.
    pub fn register_policy(&self, policy: InsurancePolicy) {
        let mut inner = self.inner.lock().expect("insurance state poisoned");
        inner.policies.insert(policy.id, policy);
    }

    /// React to a resolved dispute and file a claim if the losing party is
    /// covered. Returns the claim id, or `None` when no claim applies (split
    /// ruling, or no policy for the loser).
    ///
    /// Idempotent: the same dispute processed twice yields the original
    /// outcome without side effects.
    pub fn process_ruling(&self, dispute: &Dispute, trade: &Trade) -> Result<Option<ClaimId>> {
        let mut inner = self.inner.lock().expect("insurance state poisoned");
        if let Some(outcome) = inner.guard.lookup(dispute.id) {
            return Ok(outcome);
        }

        let Some(ruling) = dispute.ruling else {
            return Ok(None);
        };
        let Some(loser) = ruling.losing_party(trade.seller_id, trade.buyer_id) else {
            // Split ruling: no losing party, nothing to claim against.
            inner.guard.remember(dispute.id, None);
            return Ok(None);
        };

        let Some(policy) = inner
            .policies
            .values_mut()
            .find(|p| p.trade_id == trade.id && p.insured_id == loser)
        else {
            inner.guard.remember(dispute.id, None);
            return Ok(None);
        };

        let policy_id = policy.id;
        let (status, payout) = if policy.is_active() {
            policy.status = PolicyStatus::Claimed;
            (
                ClaimStatus::Approved,
                self.config.payout(policy.coverage_amount),
            )
        } else {
            // Coverage exists but already consumed or lapsed.
            (ClaimStatus::Denied, Decimal::ZERO)
        };

        let claim = InsuranceClaim {
            id: ClaimId::new(),
            policy_id,
            dispute_id: dispute.id,
            claimant_id: loser,
            payout_amount: payout,
            status,
            filed_at: chrono::Utc::now(),
        };
        let claim_id = claim.id;
        tracing::info!(
            dispute_id = %dispute.id,
            claim_id = %claim_id,
            claimant = %loser,
            payout = %payout,
            ?status,
            "insurance claim filed"
        );
        inner.claims.insert(claim_id, claim);
        inner.guard.remember(dispute.id, Some(claim_id));
        Ok(Some(claim_id))
    }

    /// Snapshot of a filed claim.
    #[must_use]
    pub fn claim(&self, claim_id: ClaimId) -> Option<InsuranceClaim> {
        self.inner
            .lock()
            .expect("insurance state poisoned")
            .claims
            .get(&claim_id)
            .cloned()
    }

    /// Snapshot of a registered policy.
    #[must_use]
    pub fn policy(&self, policy_id: PolicyId) -> Option<InsurancePolicy> {
        self.inner
            .lock()
            .expect("insurance state poisoned")
            .policies
            .get(&policy_id)
            .cloned()
    }
}
