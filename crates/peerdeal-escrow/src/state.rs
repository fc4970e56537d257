//! The escrow state machine.
//!
//! Each transition is one atomic operation under the trade's lock:
//! validate the actor, consult the transition table, perform the chain
//! call, and only then mutate. A failed chain call leaves the trade in its
//! prior state — off-chain state never outruns on-chain settlement.
//!
//! ```text
//! pending --fund(seller)--> funded --confirm(buyer)--> in_progress
//!         --release(seller)--> completed
//! pending|funded|in_progress --dispute--> disputed --ruling--> completed
//! pending --cancel(creator)--> cancelled
//! pending|funded --expiry sweep--> expired
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use peerdeal_types::{
    ChainAdapter, MarketplaceConfig, NotificationSink, PeerdealError, Result, Ruling, Trade,
    TradeAction, TradeId, TradeSink, TradeStatus, TradeTerms, UserId,
};

use crate::bonds::BondLedger;
use crate::vault::TradeVault;

/// Drives trades through their lifecycle and keeps the bond ledger and
/// chain adapter in step.
pub struct EscrowStateMachine {
    vault: TradeVault,
    bonds: Arc<BondLedger>,
    chain: Arc<dyn ChainAdapter>,
    notifier: Arc<dyn NotificationSink>,
    config: MarketplaceConfig,
}

impl EscrowStateMachine {
    #[must_use]
    pub fn new(
        bonds: Arc<BondLedger>,
        chain: Arc<dyn ChainAdapter>,
        notifier: Arc<dyn NotificationSink>,
        config: MarketplaceConfig,
    ) -> Self {
        Self {
            vault: TradeVault::new(),
            bonds,
            chain,
            notifier,
            config,
        }
    }

    /// Snapshot of a trade.
    pub fn trade(&self, trade_id: TradeId) -> Result<Trade> {
        self.vault.get(trade_id)
    }

    #[must_use]
    pub fn bonds(&self) -> &Arc<BondLedger> {
        &self.bonds
    }

    // =================================================================
    // Transitions
    // =================================================================

    /// Seller funds the escrow: `pending -> funded`.
    ///
    /// The chain call happens first; its failure blocks the transition.
    /// On success the seller's bond is locked.
    pub fn fund(&self, trade_id: TradeId, caller: UserId) -> Result<()> {
        let bond_rate = self.config.bonds.clone();
        let chain = Arc::clone(&self.chain);
        let bonds = Arc::clone(&self.bonds);
        self.vault.with_trade(trade_id, |trade| {
            Self::require_actor(caller, trade.seller_id, TradeAction::Fund, "seller")?;
            Self::require_edge(trade, TradeAction::Fund)?;
            chain.fund(trade_id, trade.escrow_amount)?;
            bonds.lock_seller(trade_id, bond_rate.bond_amount(trade.amount))?;
            trade.status = TradeStatus::Funded;
            trade.seller_signed = true;
            trade.updated_at = Utc::now();
            Ok(())
        })?;
        self.announce(trade_id, "trade_funded");
        Ok(())
    }

    /// Buyer confirms the fiat payment was sent: `funded -> in_progress`.
    pub fn confirm_payment(&self, trade_id: TradeId, caller: UserId) -> Result<()> {
        self.vault.with_trade(trade_id, |trade| {
            Self::require_actor(caller, trade.buyer_id, TradeAction::ConfirmPayment, "buyer")?;
            Self::require_edge(trade, TradeAction::ConfirmPayment)?;
            trade.status = TradeStatus::InProgress;
            trade.buyer_signed = true;
            trade.updated_at = Utc::now();
            Ok(())
        })?;
        self.announce(trade_id, "payment_confirmed");
        Ok(())
    }

    /// Seller verifies payment receipt and releases the escrow:
    /// `in_progress -> completed`. Both bonds refund in full.
    pub fn release(&self, trade_id: TradeId, caller: UserId) -> Result<()> {
        let chain = Arc::clone(&self.chain);
        let bonds = Arc::clone(&self.bonds);
        self.vault.with_trade(trade_id, |trade| {
            Self::require_actor(caller, trade.seller_id, TradeAction::Release, "seller")?;
            Self::require_edge(trade, TradeAction::Release)?;
            chain.release(trade_id)?;
            // Refund before the status flips so a ledger failure leaves
            // the trade in its prior state.
            bonds.refund_all(trade_id)?;
            trade.status = TradeStatus::Completed;
            trade.updated_at = Utc::now();
            Ok(())
        })?;
        self.announce(trade_id, "trade_completed");
        Ok(())
    }

    /// A participant opens a dispute: `pending|funded|in_progress -> disputed`.
    pub fn open_dispute(&self, trade_id: TradeId, caller: UserId) -> Result<()> {
        self.vault.with_trade(trade_id, |trade| {
            if !trade.is_participant(caller) {
                return Err(PeerdealError::NotAuthorized {
                    action: TradeAction::OpenDispute,
                    required_role: "trade participant",
                });
            }
            Self::require_edge(trade, TradeAction::OpenDispute)?;
            trade.status = TradeStatus::Disputed;
            trade.updated_at = Utc::now();
            Ok(())
        })?;
        self.announce(trade_id, "dispute_opened");
        Ok(())
    }

    /// Apply a dispute ruling: `disputed -> completed`. Dispute resolution
    /// never routes to `cancelled`; a failed on-chain settlement blocks
    /// resolution entirely (the caller retries).
    pub fn resolve_dispute(&self, trade_id: TradeId, ruling: Ruling) -> Result<()> {
        let chain = Arc::clone(&self.chain);
        self.vault.with_trade(trade_id, |trade| {
            Self::require_edge(trade, TradeAction::ResolveDispute)?;
            chain.resolve_dispute(trade_id, ruling)?;
            trade.status = TradeStatus::Completed;
            trade.updated_at = Utc::now();
            Ok(())
        })?;
        self.announce(trade_id, "dispute_resolved");
        Ok(())
    }

    /// The trade creator cancels pre-funding: `pending -> cancelled`.
    /// The buyer's bond (the only one locked so far) refunds.
    pub fn cancel(&self, trade_id: TradeId, caller: UserId) -> Result<()> {
        let bonds = Arc::clone(&self.bonds);
        self.vault.with_trade(trade_id, |trade| {
            Self::require_actor(caller, trade.created_by, TradeAction::Cancel, "trade creator")?;
            Self::require_edge(trade, TradeAction::Cancel)?;
            bonds.refund_all(trade_id)?;
            trade.status = TradeStatus::Cancelled;
            trade.updated_at = Utc::now();
            Ok(())
        })?;
        self.announce(trade_id, "trade_cancelled");
        Ok(())
    }

    // =================================================================
    // Expiry sweep
    // =================================================================

    /// Expire unresolved trades past their deadline (the fail-safe refund
    /// path). Idempotent: an already-expired trade is a no-op; a failed
    /// chain refund leaves the trade for the next sweep pass. Returns the
    /// ids expired this pass.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<TradeId> {
        let mut expired = Vec::new();
        for trade_id in self.vault.ids() {
            let chain = Arc::clone(&self.chain);
            let bonds = Arc::clone(&self.bonds);
            let result = self.vault.with_trade(trade_id, |trade| {
                if trade.status.next(TradeAction::Expire).is_none() || trade.expires_at > now {
                    return Ok(false);
                }
                // Funded trades hold on-chain escrow that must come back
                // to the seller before we mark the trade expired.
                if trade.status == TradeStatus::Funded {
                    chain.refund(trade_id)?;
                }
                bonds.refund_all(trade_id)?;
                trade.status = TradeStatus::Expired;
                trade.updated_at = now;
                Ok(true)
            });
            match result {
                Ok(true) => {
                    expired.push(trade_id);
                    self.announce(trade_id, "trade_expired");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(trade_id = %trade_id, error = %e, "expiry sweep pass failed, will retry");
                }
            }
        }
        expired
    }

    // =================================================================
    // Helpers
    // =================================================================

    fn require_actor(
        caller: UserId,
        required: UserId,
        action: TradeAction,
        role: &'static str,
    ) -> Result<()> {
        if caller != required {
            return Err(PeerdealError::NotAuthorized {
                action,
                required_role: role,
            });
        }
        Ok(())
    }

    fn require_edge(trade: &Trade, action: TradeAction) -> Result<()> {
        if trade.status.next(action).is_none() {
            return Err(PeerdealError::InvalidTransition {
                from: trade.status,
                action,
            });
        }
        Ok(())
    }

    /// Best-effort notification to both parties; never blocks a transition.
    fn announce(&self, trade_id: TradeId, event: &str) {
        if let Ok(trade) = self.vault.get(trade_id) {
            let payload = json!({
                "trade_id": trade.id.to_string(),
                "status": trade.status.to_string(),
            });
            self.notifier.notify(trade.seller_id, event, payload.clone());
            self.notifier.notify(trade.buyer_id, event, payload);
            tracing::info!(trade_id = %trade_id, %event, status = %trade.status, "trade transition");
        }
    }
}

impl TradeSink for EscrowStateMachine {
    /// Create a trade from committed match terms. Initial status is
    /// `pending`; the buyer's bond locks immediately (the taker has
    /// committed to the trade by accepting).
    fn create_trade(&self, terms: TradeTerms) -> Result<TradeId> {
        let now = Utc::now();
        let trade = Trade {
            id: terms.trade_id,
            seller_id: terms.seller_id,
            buyer_id: terms.buyer_id,
            created_by: terms.created_by,
            market: terms.market,
            amount: terms.amount,
            price_per_unit: terms.price_per_unit,
            fiat_currency: terms.fiat_currency,
            maker_fee_pct: terms.maker_fee_pct,
            taker_fee_pct: terms.taker_fee_pct,
            escrow_amount: terms.escrow_amount,
            total_fiat_amount: terms.total_fiat_amount,
            status: TradeStatus::Pending,
            expires_at: now + self.config.trade_expiry(),
            seller_signed: false,
            buyer_signed: false,
            created_at: now,
            updated_at: now,
        };
        let trade_id = trade.id;
        let amount = trade.amount;
        self.vault.insert(trade)?;
        self.bonds
            .lock_buyer(trade_id, self.config.bonds.bond_amount(amount))?;
        self.announce(trade_id, "trade_created");
        Ok(trade_id)
    }
}

#[cfg(test)]
mod tests {
    use peerdeal_types::ports::doubles::{RecordingChain, RecordingNotifier};
    use peerdeal_types::{BondDisposition, Market};
    use rust_decimal::Decimal;

    use super::*;

    fn dec(n: i64) -> Decimal {
        Decimal::new(n, 0)
    }

    struct Harness {
        chain: Arc<RecordingChain>,
        notifier: Arc<RecordingNotifier>,
        escrow: EscrowStateMachine,
        seller: UserId,
        buyer: UserId,
    }

    fn harness() -> Harness {
        let chain = Arc::new(RecordingChain::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let escrow = EscrowStateMachine::new(
            Arc::new(BondLedger::new()),
            Arc::clone(&chain) as Arc<dyn ChainAdapter>,
            Arc::clone(&notifier) as Arc<dyn NotificationSink>,
            MarketplaceConfig::default(),
        );
        Harness {
            chain,
            notifier,
            escrow,
            seller: UserId::new(),
            buyer: UserId::new(),
        }
    }

    fn terms(h: &Harness, amount: Decimal) -> TradeTerms {
        TradeTerms {
            trade_id: TradeId::new(),
            seller_id: h.seller,
            buyer_id: h.buyer,
            created_by: h.buyer,
            market: Market::new("USDT", "ethereum"),
            amount,
            price_per_unit: Decimal::ONE,
            fiat_currency: "USD".to_string(),
            maker_fee_pct: Decimal::new(10, 1),
            taker_fee_pct: Decimal::new(15, 1),
            escrow_amount: amount * Decimal::new(1025, 3),
            total_fiat_amount: amount * Decimal::new(1015, 3),
        }
    }

    #[test]
    fn create_locks_buyer_bond() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(1000))).unwrap();
        let trade = h.escrow.trade(id).unwrap();
        assert_eq!(trade.status, TradeStatus::Pending);

        let record = h.escrow.bonds().record(id).unwrap();
        assert!(record.buyer_locked);
        assert!(!record.seller_locked);
        assert_eq!(record.bond_amount, dec(100)); // 10% of 1000
    }

    #[test]
    fn happy_path_to_completed() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(1000))).unwrap();

        h.escrow.fund(id, h.seller).unwrap();
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Funded);
        assert!(h.escrow.trade(id).unwrap().seller_signed);

        h.escrow.confirm_payment(id, h.buyer).unwrap();
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::InProgress);

        h.escrow.release(id, h.seller).unwrap();
        let trade = h.escrow.trade(id).unwrap();
        assert_eq!(trade.status, TradeStatus::Completed);

        // Both bonds refunded in full on the normal path.
        let record = h.escrow.bonds().record(id).unwrap();
        assert!(matches!(
            record.seller_disposition,
            BondDisposition::Refunded { .. }
        ));
        assert!(matches!(
            record.buyer_disposition,
            BondDisposition::Refunded { .. }
        ));
        assert_eq!(h.escrow.bonds().treasury(), Decimal::ZERO);

        let log = h.chain.call_log();
        assert!(log[0].starts_with("fund:"));
        assert!(log[1].starts_with("release:"));
    }

    #[test]
    fn only_seller_may_fund() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        let err = h.escrow.fund(id, h.buyer).unwrap_err();
        assert!(matches!(err, PeerdealError::NotAuthorized { .. }));
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Pending);
    }

    #[test]
    fn only_buyer_may_confirm() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.fund(id, h.seller).unwrap();
        assert!(h.escrow.confirm_payment(id, h.seller).is_err());
    }

    #[test]
    fn invalid_transition_does_not_mutate() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        // Release straight from pending is not an edge.
        let err = h.escrow.release(id, h.seller).unwrap_err();
        assert!(matches!(err, PeerdealError::InvalidTransition { .. }));
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Pending);
        assert!(h.chain.call_log().is_empty());
    }

    #[test]
    fn chain_failure_blocks_funding() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.chain.set_fail_fund(true);

        let err = h.escrow.fund(id, h.seller).unwrap_err();
        assert!(matches!(err, PeerdealError::ChainCallFailed { .. }));
        // Off-chain state did not advance, and no seller bond locked.
        let trade = h.escrow.trade(id).unwrap();
        assert_eq!(trade.status, TradeStatus::Pending);
        assert!(!trade.seller_signed);
        assert!(!h.escrow.bonds().record(id).unwrap().seller_locked);

        // Retry after the chain recovers.
        h.chain.set_fail_fund(false);
        h.escrow.fund(id, h.seller).unwrap();
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Funded);
    }

    #[test]
    fn dispute_from_any_live_state() {
        for advance in 0..3 {
            let h = harness();
            let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
            if advance >= 1 {
                h.escrow.fund(id, h.seller).unwrap();
            }
            if advance >= 2 {
                h.escrow.confirm_payment(id, h.buyer).unwrap();
            }
            h.escrow.open_dispute(id, h.buyer).unwrap();
            assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Disputed);
        }
    }

    #[test]
    fn non_participant_cannot_dispute() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        assert!(h.escrow.open_dispute(id, UserId::new()).is_err());
    }

    #[test]
    fn resolve_dispute_goes_to_completed() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.fund(id, h.seller).unwrap();
        h.escrow.open_dispute(id, h.buyer).unwrap();

        h.escrow.resolve_dispute(id, Ruling::FavorSeller).unwrap();
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Completed);
        assert!(
            h.chain
                .call_log()
                .iter()
                .any(|c| c.starts_with("resolve_dispute:"))
        );
    }

    #[test]
    fn chain_failure_blocks_dispute_resolution() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.open_dispute(id, h.buyer).unwrap();
        h.chain.set_fail_resolve(true);

        assert!(h.escrow.resolve_dispute(id, Ruling::Split).is_err());
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Disputed);

        h.chain.set_fail_resolve(false);
        h.escrow.resolve_dispute(id, Ruling::Split).unwrap();
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Completed);
    }

    #[test]
    fn cancel_only_by_creator_and_only_pending() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();

        // created_by is the buyer in these terms.
        assert!(h.escrow.cancel(id, h.seller).is_err());
        h.escrow.cancel(id, h.buyer).unwrap();
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Cancelled);

        // Buyer bond refunded.
        let record = h.escrow.bonds().record(id).unwrap();
        assert!(matches!(
            record.buyer_disposition,
            BondDisposition::Refunded { .. }
        ));

        // Cancel after funding is not an edge.
        let id2 = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.fund(id2, h.seller).unwrap();
        assert!(h.escrow.cancel(id2, h.buyer).is_err());
    }

    #[test]
    fn sweep_expires_pending_and_funded_only() {
        let h = harness();
        let pending = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        let funded = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.fund(funded, h.seller).unwrap();
        let in_progress = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.fund(in_progress, h.seller).unwrap();
        h.escrow.confirm_payment(in_progress, h.buyer).unwrap();

        let later = Utc::now() + chrono::Duration::hours(48);
        let mut expired = h.escrow.sweep_expired(later);
        expired.sort();
        let mut want = vec![pending, funded];
        want.sort();
        assert_eq!(expired, want);

        assert_eq!(h.escrow.trade(pending).unwrap().status, TradeStatus::Expired);
        assert_eq!(h.escrow.trade(funded).unwrap().status, TradeStatus::Expired);
        assert_eq!(
            h.escrow.trade(in_progress).unwrap().status,
            TradeStatus::InProgress
        );

        // Funded escrow was refunded on chain.
        assert!(h.chain.call_log().iter().any(|c| c.starts_with("refund:")));

        // Idempotent: second pass is a no-op.
        assert!(h.escrow.sweep_expired(later).is_empty());
    }

    #[test]
    fn sweep_retries_after_chain_failure() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.fund(id, h.seller).unwrap();
        *h.chain.fail_refund.lock().unwrap() = true;

        let later = Utc::now() + chrono::Duration::hours(48);
        assert!(h.escrow.sweep_expired(later).is_empty());
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Funded);

        *h.chain.fail_refund.lock().unwrap() = false;
        assert_eq!(h.escrow.sweep_expired(later), vec![id]);
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Expired);
    }

    #[test]
    fn poisoned_ledger_blocks_release_without_mutating() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.fund(id, h.seller).unwrap();
        h.escrow.confirm_payment(id, h.buyer).unwrap();
        h.escrow.bonds().poison_for_reconciliation(id);

        let err = h.escrow.release(id, h.seller).unwrap_err();
        assert!(matches!(err, PeerdealError::BondConservationViolation { .. }));
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::InProgress);
    }

    #[test]
    fn poisoned_ledger_leaves_trade_for_next_sweep() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.fund(id, h.seller).unwrap();
        h.escrow.bonds().poison_for_reconciliation(id);

        let later = Utc::now() + chrono::Duration::hours(48);
        assert!(h.escrow.sweep_expired(later).is_empty());
        // Not stranded in Expired with bonds still locked.
        assert_eq!(h.escrow.trade(id).unwrap().status, TradeStatus::Funded);
    }

    #[test]
    fn transitions_notify_both_parties() {
        let h = harness();
        let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
        h.escrow.fund(id, h.seller).unwrap();

        let seller_events = h.notifier.events_for(h.seller);
        let buyer_events = h.notifier.events_for(h.buyer);
        assert!(seller_events.contains(&"trade_created".to_string()));
        assert!(seller_events.contains(&"trade_funded".to_string()));
        assert_eq!(seller_events, buyer_events);
    }

    #[test]
    fn random_action_sequences_respect_the_table() {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        for _ in 0..50 {
            let h = harness();
            let id = h.escrow.create_trade(terms(&h, dec(100))).unwrap();
            for _ in 0..12 {
                let before = h.escrow.trade(id).unwrap().status;
                let action = rng.gen_range(0..6);
                let result = match action {
                    0 => h.escrow.fund(id, h.seller),
                    1 => h.escrow.confirm_payment(id, h.buyer),
                    2 => h.escrow.release(id, h.seller),
                    3 => h.escrow.open_dispute(id, h.buyer),
                    4 => h.escrow.resolve_dispute(id, Ruling::FavorSeller),
                    _ => h.escrow.cancel(id, h.buyer),
                };
                let after = h.escrow.trade(id).unwrap().status;
                if result.is_err() {
                    assert_eq!(before, after, "failed call must not mutate state");
                } else {
                    let action_kind = match action {
                        0 => TradeAction::Fund,
                        1 => TradeAction::ConfirmPayment,
                        2 => TradeAction::Release,
                        3 => TradeAction::OpenDispute,
                        4 => TradeAction::ResolveDispute,
                        _ => TradeAction::Cancel,
                    };
                    assert_eq!(
                        before.next(action_kind),
                        Some(after),
                        "reached {after} from {before} via an unlisted edge"
                    );
                }
            }
        }
    }
}
