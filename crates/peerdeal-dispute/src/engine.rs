//! Tiered dispute resolution.
//!
//! Disputes walk three tiers: automated review (2h), human arbitration
//! (24h), DAO vote (72h). The tier only ever moves up, by exactly one per
//! escalation. Applying a ruling at any tier resolves the dispute: the trade
//! completes through the escrow state machine (chain call first), bonds
//! settle per the ruling, and the insurance processor reacts. A missed
//! deadline is reported to operators, never converted into a ruling —
//! absence of action is never a verdict.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde_json::json;

use peerdeal_escrow::{BondLedger, EscrowStateMachine};
use peerdeal_types::{
    BondConfig, Dispute, DisputeConfig, DisputeId, DisputeStatus, EscalationTier, EvidenceBundle,
    NotificationSink, OracleVerdict, PeerdealError, Result, Ruling, RulingOracle, Trade, TradeId,
    UserId,
};

use crate::insurance::InsuranceClaimProcessor;

/// A dispute that outstayed its tier's deadline; surfaced to operators by
/// [`DisputeEngine::sweep_overdue`].
#[derive(Debug, Clone)]
pub struct OverdueDispute {
    pub dispute_id: DisputeId,
    pub trade_id: TradeId,
    pub tier: EscalationTier,
    /// When the current tier's deadline passed.
    pub deadline: DateTime<Utc>,
}

/// Coordinates dispute state, the ruling oracle, bond settlement, and
/// insurance reaction.
pub struct DisputeEngine {
    disputes: RwLock<HashMap<DisputeId, Arc<Mutex<Dispute>>>>,
    /// One dispute per trade, enforced at open.
    by_trade: Mutex<HashMap<TradeId, DisputeId>>,
    escrow: Arc<EscrowStateMachine>,
    bonds: Arc<BondLedger>,
    oracle: Arc<dyn RulingOracle>,
    notifier: Arc<dyn NotificationSink>,
    insurance: InsuranceClaimProcessor,
    config: DisputeConfig,
    bond_config: BondConfig,
}

impl DisputeEngine {
    #[must_use]
    pub fn new(
        escrow: Arc<EscrowStateMachine>,
        oracle: Arc<dyn RulingOracle>,
        notifier: Arc<dyn NotificationSink>,
        insurance: InsuranceClaimProcessor,
        config: DisputeConfig,
        bond_config: BondConfig,
    ) -> Self {
        let bonds = Arc::clone(escrow.bonds());
        Self {
            disputes: RwLock::new(HashMap::new()),
            by_trade: Mutex::new(HashMap::new()),
            escrow,
            bonds,
            oracle,
            notifier,
            insurance,
            config,
            bond_config,
        }
    }

    /// Open a dispute over a trade. The initiator must be a participant and
    /// the trade must be in a disputable state; both are enforced by the
    /// escrow transition. Starts at tier 1 (automated review).
    pub fn open(&self, trade_id: TradeId, initiator: UserId, reason: String) -> Result<DisputeId> {
        let mut by_trade = self.by_trade.lock().expect("dispute index poisoned");
        if by_trade.contains_key(&trade_id) {
            return Err(PeerdealError::DuplicateDispute(trade_id));
        }
        self.escrow.open_dispute(trade_id, initiator)?;

        let dispute = Dispute::new(trade_id, initiator, reason, Utc::now());
        let dispute_id = dispute.id;
        tracing::info!(
            dispute_id = %dispute_id,
            trade_id = %trade_id,
            initiator = %initiator,
            "dispute opened at automated review"
        );
        by_trade.insert(trade_id, dispute_id);
        self.disputes
            .write()
            .expect("dispute arena poisoned")
            .insert(dispute_id, Arc::new(Mutex::new(dispute)));
        Ok(dispute_id)
    }

    /// Add chat transcript or evidence references to an open dispute, for
    /// the oracle (and later tiers) to weigh.
    pub fn attach_evidence(&self, dispute_id: DisputeId, evidence: EvidenceBundle) -> Result<()> {
        let handle = self.handle(dispute_id)?;
        let mut dispute = handle.lock().expect("dispute poisoned");
        Self::require_open(&dispute)?;
        dispute.evidence.extend(evidence);
        Ok(())
    }

    /// Run tier-1 automated review against the oracle.
    ///
    /// A verdict at or above the auto-resolve confidence (and not a split)
    /// applies immediately. A weaker verdict is recorded as pending, for the
    /// initiator to accept or contest. An oracle failure escalates to
    /// arbitration rather than blocking.
    pub fn run_automated_review(&self, dispute_id: DisputeId) -> Result<()> {
        let handle = self.handle(dispute_id)?;
        let mut dispute = handle.lock().expect("dispute poisoned");
        Self::require_open(&dispute)?;
        Self::require_tier(&dispute, EscalationTier::Automated)?;

        let trade = self.escrow.trade(dispute.trade_id)?;
        match self.oracle.analyze(&trade, &dispute) {
            Ok(verdict) => self.apply_review_verdict(&mut dispute, &trade, verdict),
            Err(e) => {
                tracing::warn!(
                    dispute_id = %dispute_id,
                    error = %e,
                    "oracle unavailable, escalating to arbitration"
                );
                Self::escalate_locked(&mut dispute)?;
                self.notify_parties(&trade, "dispute_escalated", &dispute);
                Ok(())
            }
        }
    }

    fn apply_review_verdict(
        &self,
        dispute: &mut Dispute,
        trade: &Trade,
        verdict: OracleVerdict,
    ) -> Result<()> {
        tracing::info!(
            dispute_id = %dispute.id,
            ruling = %verdict.ruling,
            confidence = verdict.confidence,
            "automated review verdict"
        );
        if verdict.confidence >= self.config.auto_resolve_confidence
            && verdict.ruling != Ruling::Split
        {
            return self.resolve_locked(dispute, trade, verdict.ruling, verdict.confidence);
        }
        // Not decisive enough to self-apply; the initiator accepts or
        // contests (contest = escalate).
        dispute.pending_verdict = Some((verdict.ruling, verdict.confidence));
        self.notifier.notify(
            dispute.initiator_id,
            "dispute_verdict_pending",
            json!({
                "dispute_id": dispute.id.to_string(),
                "ruling": verdict.ruling.to_string(),
                "confidence": verdict.confidence,
            }),
        );
        Ok(())
    }

    /// Record an arbitrator's verdict at tier 2. Applied via
    /// [`Self::accept_ruling`].
    pub fn submit_arbitration(&self, dispute_id: DisputeId, verdict: OracleVerdict) -> Result<()> {
        self.submit_verdict(dispute_id, EscalationTier::Arbitration, verdict)
    }

    /// Record the DAO vote outcome at tier 3. Applied via
    /// [`Self::accept_ruling`].
    pub fn submit_dao_vote(&self, dispute_id: DisputeId, verdict: OracleVerdict) -> Result<()> {
        self.submit_verdict(dispute_id, EscalationTier::DaoVote, verdict)
    }

    fn submit_verdict(
        &self,
        dispute_id: DisputeId,
        tier: EscalationTier,
        verdict: OracleVerdict,
    ) -> Result<()> {
        let handle = self.handle(dispute_id)?;
        let mut dispute = handle.lock().expect("dispute poisoned");
        Self::require_open(&dispute)?;
        Self::require_tier(&dispute, tier)?;
        dispute.pending_verdict = Some((verdict.ruling, verdict.confidence));
        tracing::info!(
            dispute_id = %dispute_id,
            %tier,
            ruling = %verdict.ruling,
            "verdict recorded"
        );
        self.notifier.notify(
            dispute.initiator_id,
            "dispute_verdict_pending",
            json!({
                "dispute_id": dispute_id.to_string(),
                "tier": tier.to_string(),
                "ruling": verdict.ruling.to_string(),
            }),
        );
        Ok(())
    }

    /// Accept the tier's recorded verdict, resolving the dispute.
    ///
    /// Only the initiator may accept, and only a verdict actually produced
    /// at the current tier (by the oracle, the arbitrator, or the DAO vote)
    /// can be applied; there is no way to resolve with an invented ruling.
    ///
    /// Ordering: the on-chain settlement gates everything; then the trade
    /// completes, bonds settle, insurance reacts, parties are notified. A
    /// chain failure leaves the dispute unresolved for a retry.
    pub fn accept_ruling(&self, dispute_id: DisputeId, caller: UserId) -> Result<()> {
        let handle = self.handle(dispute_id)?;
        let mut dispute = handle.lock().expect("dispute poisoned");
        Self::require_open(&dispute)?;
        Self::require_initiator(&dispute, caller)?;
        let (ruling, confidence) = dispute
            .pending_verdict
            .ok_or(PeerdealError::NoPendingVerdict(dispute_id))?;
        let trade = self.escrow.trade(dispute.trade_id)?;
        self.resolve_locked(&mut dispute, &trade, ruling, confidence)
    }

    fn resolve_locked(
        &self,
        dispute: &mut Dispute,
        trade: &Trade,
        ruling: Ruling,
        confidence: u8,
    ) -> Result<()> {
        // Chain call first; on failure nothing below runs and the dispute
        // stays open for a retry.
        self.escrow.resolve_dispute(dispute.trade_id, ruling)?;
        self.bonds
            .settle_ruling(dispute.trade_id, ruling, self.bond_config.split_penalty_pct)?;

        dispute.status = DisputeStatus::Resolved;
        dispute.ruling = Some(ruling);
        dispute.ruling_confidence = Some(confidence);
        dispute.pending_verdict = None;
        dispute.resolved_at = Some(Utc::now());

        let claim = self.insurance.process_ruling(dispute, trade)?;
        tracing::info!(
            dispute_id = %dispute.id,
            trade_id = %dispute.trade_id,
            %ruling,
            confidence,
            claim = ?claim,
            "dispute resolved"
        );
        self.notify_parties(trade, "dispute_resolved", dispute);
        Ok(())
    }

    /// Escalate one tier up (the initiator contesting a verdict), resetting
    /// the tier clock and discarding any pending verdict.
    ///
    /// # Errors
    /// `NotDisputeInitiator` for anyone else; `EscalationCeiling` past the
    /// DAO vote; `DisputeAlreadyResolved` once terminal.
    pub fn escalate(&self, dispute_id: DisputeId, caller: UserId) -> Result<EscalationTier> {
        let handle = self.handle(dispute_id)?;
        let mut dispute = handle.lock().expect("dispute poisoned");
        Self::require_open(&dispute)?;
        Self::require_initiator(&dispute, caller)?;
        Self::escalate_locked(&mut dispute)?;
        Ok(dispute.tier)
    }

    fn escalate_locked(dispute: &mut Dispute) -> Result<()> {
        let next = dispute
            .tier
            .next()
            .ok_or(PeerdealError::EscalationCeiling(dispute.tier))?;
        dispute.tier = next;
        dispute.status = DisputeStatus::for_tier(next);
        dispute.tier_entered_at = Utc::now();
        dispute.pending_verdict = None;
        tracing::info!(dispute_id = %dispute.id, tier = %next, "dispute escalated");
        Ok(())
    }

    /// Report disputes that have outstayed their tier's deadline.
    ///
    /// Purely observational and idempotent: a deadline never auto-resolves
    /// or auto-escalates anything, it only surfaces the dispute to
    /// operators.
    pub fn sweep_overdue(&self, now: DateTime<Utc>) -> Vec<OverdueDispute> {
        let handles: Vec<Arc<Mutex<Dispute>>> = self
            .disputes
            .read()
            .expect("dispute arena poisoned")
            .values()
            .map(Arc::clone)
            .collect();

        let mut overdue = Vec::new();
        for handle in handles {
            let dispute = handle.lock().expect("dispute poisoned");
            if dispute.is_overdue(now) {
                overdue.push(OverdueDispute {
                    dispute_id: dispute.id,
                    trade_id: dispute.trade_id,
                    tier: dispute.tier,
                    deadline: dispute.tier_entered_at + dispute.tier.deadline(),
                });
            }
        }
        if !overdue.is_empty() {
            tracing::warn!(count = overdue.len(), "overdue disputes awaiting action");
        }
        overdue
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Snapshot of a dispute.
    pub fn dispute(&self, dispute_id: DisputeId) -> Result<Dispute> {
        let handle = self.handle(dispute_id)?;
        let dispute = handle.lock().expect("dispute poisoned");
        Ok(dispute.clone())
    }

    /// The dispute open (or resolved) for a trade, if any.
    #[must_use]
    pub fn for_trade(&self, trade_id: TradeId) -> Option<DisputeId> {
        self.by_trade
            .lock()
            .expect("dispute index poisoned")
            .get(&trade_id)
            .copied()
    }

    #[must_use]
    pub fn insurance(&self) -> &InsuranceClaimProcessor {
        &self.insurance
    }

    // =================================================================
    // Helpers
    // =================================================================

    fn handle(&self, dispute_id: DisputeId) -> Result<Arc<Mutex<Dispute>>> {
        self.disputes
            .read()
            .expect("dispute arena poisoned")
            .get(&dispute_id)
            .map(Arc::clone)
            .ok_or(PeerdealError::DisputeNotFound(dispute_id))
    }

    fn require_open(dispute: &Dispute) -> Result<()> {
        if dispute.status.is_terminal() {
            return Err(PeerdealError::DisputeAlreadyResolved(dispute.id));
        }
        Ok(())
    }

    fn require_initiator(dispute: &Dispute, caller: UserId) -> Result<()> {
        if caller != dispute.initiator_id {
            return Err(PeerdealError::NotDisputeInitiator(dispute.id));
        }
        Ok(())
    }

    fn require_tier(dispute: &Dispute, expected: EscalationTier) -> Result<()> {
        if dispute.tier != expected {
            return Err(PeerdealError::WrongDisputeTier {
                expected,
                actual: dispute.tier,
            });
        }
        Ok(())
    }

    fn notify_parties(&self, trade: &Trade, event: &str, dispute: &Dispute) {
        let payload = json!({
            "dispute_id": dispute.id.to_string(),
            "trade_id": dispute.trade_id.to_string(),
            "tier": dispute.tier.to_string(),
            "status": dispute.status.to_string(),
        });
        self.notifier.notify(trade.seller_id, event, payload.clone());
        self.notifier.notify(trade.buyer_id, event, payload);
    }
}

#[cfg(test)]
mod tests {
    use peerdeal_types::ports::doubles::{RecordingChain, RecordingNotifier, ScriptedOracle};
    use peerdeal_types::{
        ChainAdapter, InsuranceConfig, MarketplaceConfig, TradeSink, TradeStatus, TradeTerms,
    };
    use peerdeal_types::{InsurancePolicy, Market};
    use rust_decimal::Decimal;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    struct Harness {
        chain: Arc<RecordingChain>,
        escrow: Arc<EscrowStateMachine>,
        seller: UserId,
        buyer: UserId,
    }

    impl Harness {
        fn new() -> Self {
            let chain = Arc::new(RecordingChain::new());
            let escrow = Arc::new(EscrowStateMachine::new(
                Arc::new(BondLedger::new()),
                Arc::clone(&chain) as Arc<dyn ChainAdapter>,
                Arc::new(RecordingNotifier::new()) as Arc<dyn NotificationSink>,
                MarketplaceConfig::default(),
            ));
            Self {
                chain,
                escrow,
                seller: UserId::new(),
                buyer: UserId::new(),
            }
        }

        fn engine(&self, oracle: ScriptedOracle) -> DisputeEngine {
            DisputeEngine::new(
                Arc::clone(&self.escrow),
                Arc::new(oracle) as Arc<dyn RulingOracle>,
                Arc::new(RecordingNotifier::new()) as Arc<dyn NotificationSink>,
                InsuranceClaimProcessor::new(InsuranceConfig::default()),
                DisputeConfig::default(),
                BondConfig::default(),
            )
        }

        /// A funded trade ready to be disputed.
        fn funded_trade(&self, amount: Decimal) -> TradeId {
            let trade_id = self
                .escrow
                .create_trade(TradeTerms {
                    trade_id: TradeId::new(),
                    seller_id: self.seller,
                    buyer_id: self.buyer,
                    created_by: self.buyer,
                    market: Market::new("USDT", "ethereum"),
                    amount,
                    price_per_unit: Decimal::ONE,
                    fiat_currency: "USD".to_string(),
                    maker_fee_pct: Decimal::new(10, 1),
                    taker_fee_pct: Decimal::new(15, 1),
                    escrow_amount: amount * Decimal::new(1025, 3),
                    total_fiat_amount: amount * Decimal::new(1015, 3),
                })
                .unwrap();
            self.escrow.fund(trade_id, self.seller).unwrap();
            trade_id
        }
    }

    #[test]
    fn open_moves_trade_to_disputed() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::failing());
        let trade_id = h.funded_trade(dec(100));

        let dispute_id = engine.open(trade_id, h.buyer, "never received".into()).unwrap();
        assert_eq!(h.escrow.trade(trade_id).unwrap().status, TradeStatus::Disputed);

        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.tier, EscalationTier::Automated);
        assert_eq!(dispute.status, DisputeStatus::AutomatedReview);
        assert_eq!(engine.for_trade(trade_id), Some(dispute_id));
    }

    #[test]
    fn second_dispute_on_same_trade_rejected() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::failing());
        let trade_id = h.funded_trade(dec(100));

        engine.open(trade_id, h.buyer, "a".into()).unwrap();
        let err = engine.open(trade_id, h.seller, "b".into()).unwrap_err();
        assert!(matches!(err, PeerdealError::DuplicateDispute(_)));
    }

    #[test]
    fn confident_verdict_auto_resolves() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::FavorBuyer, 95));
        let trade_id = h.funded_trade(dec(1000));
        let dispute_id = engine.open(trade_id, h.buyer, "no delivery".into()).unwrap();

        engine.run_automated_review(dispute_id).unwrap();

        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.status, DisputeStatus::Resolved);
        assert_eq!(dispute.ruling, Some(Ruling::FavorBuyer));
        assert_eq!(dispute.ruling_confidence, Some(95));
        assert_eq!(h.escrow.trade(trade_id).unwrap().status, TradeStatus::Completed);

        // Seller lost: bond forfeited, buyer's refunded, value conserved.
        let record = h.escrow.bonds().record(trade_id).unwrap();
        assert!(record.is_settled());
        assert_eq!(h.escrow.bonds().treasury(), dec(100));
    }

    #[test]
    fn weak_verdict_stays_pending() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::FavorSeller, 60));
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "late".into()).unwrap();

        engine.run_automated_review(dispute_id).unwrap();

        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.status, DisputeStatus::AutomatedReview);
        assert_eq!(dispute.pending_verdict, Some((Ruling::FavorSeller, 60)));
        assert_eq!(h.escrow.trade(trade_id).unwrap().status, TradeStatus::Disputed);
    }

    #[test]
    fn confident_split_never_auto_resolves() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::Split, 99));
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "both at fault".into()).unwrap();

        engine.run_automated_review(dispute_id).unwrap();
        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.status, DisputeStatus::AutomatedReview);
        assert_eq!(dispute.pending_verdict, Some((Ruling::Split, 99)));
    }

    #[test]
    fn oracle_failure_escalates_to_arbitration() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::failing());
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();

        engine.run_automated_review(dispute_id).unwrap();

        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.tier, EscalationTier::Arbitration);
        assert_eq!(dispute.status, DisputeStatus::Arbitration);
        assert_eq!(dispute.ruling, None);
        assert_eq!(dispute.pending_verdict, None);
    }

    #[test]
    fn escalation_is_plus_one_and_capped() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::failing());
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();

        assert_eq!(
            engine.escalate(dispute_id, h.buyer).unwrap(),
            EscalationTier::Arbitration
        );
        assert_eq!(
            engine.escalate(dispute_id, h.buyer).unwrap(),
            EscalationTier::DaoVote
        );
        let err = engine.escalate(dispute_id, h.buyer).unwrap_err();
        assert!(matches!(err, PeerdealError::EscalationCeiling(EscalationTier::DaoVote)));
    }

    #[test]
    fn review_only_valid_at_tier_one() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::FavorBuyer, 99));
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();
        engine.escalate(dispute_id, h.buyer).unwrap();

        let err = engine.run_automated_review(dispute_id).unwrap_err();
        assert!(matches!(err, PeerdealError::WrongDisputeTier { .. }));
    }

    #[test]
    fn evidence_accumulates_until_resolution() {
        use peerdeal_types::ChatMessage;

        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::FavorBuyer, 95));
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "no tokens".into()).unwrap();

        engine
            .attach_evidence(
                dispute_id,
                EvidenceBundle {
                    chat_log: vec![ChatMessage {
                        sender_id: h.buyer,
                        body: "payment sent an hour ago".into(),
                        sent_at: Utc::now(),
                    }],
                    attachments: vec!["receipt-7781".into()],
                },
            )
            .unwrap();
        engine
            .attach_evidence(
                dispute_id,
                EvidenceBundle {
                    chat_log: Vec::new(),
                    attachments: vec!["bank-statement".into()],
                },
            )
            .unwrap();

        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.evidence.chat_log.len(), 1);
        assert_eq!(dispute.evidence.attachments, vec!["receipt-7781", "bank-statement"]);

        // Closed disputes take no further evidence.
        engine.run_automated_review(dispute_id).unwrap();
        let err = engine
            .attach_evidence(dispute_id, EvidenceBundle::default())
            .unwrap_err();
        assert!(matches!(err, PeerdealError::DisputeAlreadyResolved(_)));
    }

    #[test]
    fn initiator_accepts_weak_verdict() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::FavorSeller, 60));
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "late".into()).unwrap();
        engine.run_automated_review(dispute_id).unwrap();

        engine.accept_ruling(dispute_id, h.buyer).unwrap();

        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.status, DisputeStatus::Resolved);
        assert_eq!(dispute.ruling, Some(Ruling::FavorSeller));
        assert_eq!(dispute.ruling_confidence, Some(60));
    }

    #[test]
    fn accept_requires_a_recorded_verdict() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::failing());
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();

        // No review has run and no verdict exists; there is nothing to
        // accept, so no bond may be forfeited.
        let err = engine.accept_ruling(dispute_id, h.buyer).unwrap_err();
        assert!(matches!(err, PeerdealError::NoPendingVerdict(_)));
        assert_eq!(engine.dispute(dispute_id).unwrap().status, DisputeStatus::AutomatedReview);
        assert_eq!(h.escrow.trade(trade_id).unwrap().status, TradeStatus::Disputed);
        assert_eq!(h.escrow.bonds().treasury(), Decimal::ZERO);
    }

    #[test]
    fn only_initiator_may_accept_or_escalate() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::FavorSeller, 60));
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();
        engine.run_automated_review(dispute_id).unwrap();

        let outsider = UserId::new();
        assert!(matches!(
            engine.accept_ruling(dispute_id, h.seller).unwrap_err(),
            PeerdealError::NotDisputeInitiator(_)
        ));
        assert!(matches!(
            engine.escalate(dispute_id, outsider).unwrap_err(),
            PeerdealError::NotDisputeInitiator(_)
        ));
        // Verdict survives the rejected attempts.
        assert_eq!(
            engine.dispute(dispute_id).unwrap().pending_verdict,
            Some((Ruling::FavorSeller, 60))
        );
    }

    #[test]
    fn arbitration_verdict_applies_via_accept() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::failing());
        let trade_id = h.funded_trade(dec(1000));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();
        engine.run_automated_review(dispute_id).unwrap(); // escalates

        engine
            .submit_arbitration(
                dispute_id,
                OracleVerdict {
                    ruling: Ruling::Split,
                    confidence: 100,
                    reasoning: "both parties partially at fault".into(),
                },
            )
            .unwrap();
        engine.accept_ruling(dispute_id, h.buyer).unwrap();

        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.status, DisputeStatus::Resolved);
        assert_eq!(dispute.ruling, Some(Ruling::Split));

        // Split: 25% of each 100 bond to the treasury.
        assert_eq!(h.escrow.bonds().treasury(), dec(50));
    }

    #[test]
    fn dao_vote_submission_requires_tier_three() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::failing());
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();

        let verdict = OracleVerdict {
            ruling: Ruling::FavorBuyer,
            confidence: 100,
            reasoning: "vote".into(),
        };
        assert!(engine.submit_dao_vote(dispute_id, verdict).is_err());
    }

    #[test]
    fn chain_failure_leaves_dispute_open_for_retry() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::FavorSeller, 80));
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();
        engine.run_automated_review(dispute_id).unwrap(); // 80 < 90, pending
        h.chain.set_fail_resolve(true);

        let err = engine.accept_ruling(dispute_id, h.buyer).unwrap_err();
        assert!(matches!(err, PeerdealError::ChainCallFailed { .. }));
        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.status, DisputeStatus::AutomatedReview);
        assert_eq!(dispute.pending_verdict, Some((Ruling::FavorSeller, 80)));
        assert!(!h.escrow.bonds().record(trade_id).unwrap().is_settled());

        h.chain.set_fail_resolve(false);
        engine.accept_ruling(dispute_id, h.buyer).unwrap();
        assert_eq!(engine.dispute(dispute_id).unwrap().status, DisputeStatus::Resolved);
    }

    #[test]
    fn resolved_dispute_rejects_further_action() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::FavorBuyer, 75));
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();
        engine.run_automated_review(dispute_id).unwrap();
        engine.accept_ruling(dispute_id, h.buyer).unwrap();

        assert!(matches!(
            engine.escalate(dispute_id, h.buyer).unwrap_err(),
            PeerdealError::DisputeAlreadyResolved(_)
        ));
        assert!(matches!(
            engine.accept_ruling(dispute_id, h.buyer).unwrap_err(),
            PeerdealError::DisputeAlreadyResolved(_)
        ));
    }

    #[test]
    fn resolution_files_insurance_claim_for_loser() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::returning(Ruling::FavorBuyer, 85));
        let trade_id = h.funded_trade(dec(1000));
        engine
            .insurance()
            .register_policy(InsurancePolicy::new(trade_id, h.seller, dec(600)));

        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();
        engine.run_automated_review(dispute_id).unwrap();
        engine.accept_ruling(dispute_id, h.buyer).unwrap();

        // Seller lost and held coverage of 600 -> payout 300.
        let trade = h.escrow.trade(trade_id).unwrap();
        let dispute = engine.dispute(dispute_id).unwrap();
        let claim_id = engine
            .insurance()
            .process_ruling(&dispute, &trade)
            .unwrap()
            .expect("claim was filed at resolution");
        let claim = engine.insurance().claim(claim_id).unwrap();
        assert_eq!(claim.payout_amount, dec(300));
    }

    #[test]
    fn overdue_sweep_reports_without_resolving() {
        let h = Harness::new();
        let engine = h.engine(ScriptedOracle::failing());
        let trade_id = h.funded_trade(dec(100));
        let dispute_id = engine.open(trade_id, h.buyer, "x".into()).unwrap();

        // Tier 1 deadline is 2h; well past it.
        let later = Utc::now() + chrono::Duration::hours(5);
        let overdue = engine.sweep_overdue(later);
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].dispute_id, dispute_id);
        assert_eq!(overdue[0].tier, EscalationTier::Automated);

        // Nothing changed: still open, same tier, report repeats.
        let dispute = engine.dispute(dispute_id).unwrap();
        assert_eq!(dispute.status, DisputeStatus::AutomatedReview);
        assert_eq!(engine.sweep_overdue(later).len(), 1);
    }
}
