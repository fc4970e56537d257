//! The bond ledger: lock, refund, and forfeiture accounting per trade.
//!
//! Conservation is verified after every settlement: the value accounted
//! across refunds and forfeitures must equal the sum of the locked bonds
//! exactly. A violation is fatal for that record — it is poisoned against
//! further mutation and surfaced for manual reconciliation.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use rust_decimal::Decimal;

use peerdeal_types::{BondDisposition, BondRecord, PeerdealError, Result, Ruling, TradeId};

struct Inner {
    records: HashMap<TradeId, BondRecord>,
    /// Trades whose records failed conservation; mutation refused.
    poisoned: HashSet<TradeId>,
    /// Cumulative forfeitures.
    treasury: Decimal,
}

/// Tracks bond collateral per trade plus the forfeiture treasury.
pub struct BondLedger {
    inner: Mutex<Inner>,
}

impl BondLedger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                records: HashMap::new(),
                poisoned: HashSet::new(),
                treasury: Decimal::ZERO,
            }),
        }
    }

    // =================================================================
    // Locking
    // =================================================================

    /// Lock the buyer's bond (at trade creation, when the buyer takes an
    /// offer). Creates the record if needed.
    pub fn lock_buyer(&self, trade_id: TradeId, bond_amount: Decimal) -> Result<()> {
        self.lock_party(trade_id, bond_amount, true)
    }

    /// Lock the seller's bond (when the seller funds the escrow).
    pub fn lock_seller(&self, trade_id: TradeId, bond_amount: Decimal) -> Result<()> {
        self.lock_party(trade_id, bond_amount, false)
    }

    fn lock_party(&self, trade_id: TradeId, bond_amount: Decimal, buyer: bool) -> Result<()> {
        if bond_amount <= Decimal::ZERO {
            return Err(PeerdealError::InvalidInput {
                reason: format!("bond amount must be positive, got {bond_amount}"),
            });
        }
        let mut inner = self.inner.lock().expect("bond ledger poisoned");
        Self::check_not_poisoned(&inner, trade_id)?;
        let record = inner
            .records
            .entry(trade_id)
            .or_insert_with(|| BondRecord::new(trade_id, bond_amount));
        let locked = if buyer {
            &mut record.buyer_locked
        } else {
            &mut record.seller_locked
        };
        if *locked {
            return Err(PeerdealError::BondAlreadySettled(trade_id));
        }
        *locked = true;
        tracing::debug!(
            trade_id = %trade_id,
            party = if buyer { "buyer" } else { "seller" },
            amount = %bond_amount,
            "bond locked"
        );
        Ok(())
    }

    // =================================================================
    // Settlement
    // =================================================================

    /// Refund every locked, still-unsettled bond in full. Used for the
    /// normal completion path, expiry, and pre-funding cancellation.
    /// A record that is already fully settled (or absent) is a no-op, so
    /// sweep retries stay idempotent.
    pub fn refund_all(&self, trade_id: TradeId) -> Result<()> {
        let mut inner = self.inner.lock().expect("bond ledger poisoned");
        Self::check_not_poisoned(&inner, trade_id)?;
        let Some(record) = inner.records.get_mut(&trade_id) else {
            return Ok(());
        };
        if record.is_settled() {
            return Ok(());
        }
        let amount = record.bond_amount;
        if record.seller_locked && !record.seller_disposition.is_settled() {
            record.seller_disposition = BondDisposition::Refunded { amount };
        }
        if record.buyer_locked && !record.buyer_disposition.is_settled() {
            record.buyer_disposition = BondDisposition::Refunded { amount };
        }
        Self::verify_conservation(&mut inner, trade_id)
    }

    /// Settle both bonds per a dispute ruling.
    ///
    /// `FavorSeller`: seller refunded, buyer forfeited. `FavorBuyer`: the
    /// inverse. `Split`: both refunded minus `split_penalty_pct`, penalties
    /// to the treasury.
    ///
    /// # Errors
    /// `BondNotFound` if no record exists, `BondAlreadySettled` on a second
    /// settlement attempt, `BondConservationViolation` (fatal) if the
    /// dispositions fail to account for the locked value.
    pub fn settle_ruling(
        &self,
        trade_id: TradeId,
        ruling: Ruling,
        split_penalty_pct: Decimal,
    ) -> Result<()> {
        let mut inner = self.inner.lock().expect("bond ledger poisoned");
        Self::check_not_poisoned(&inner, trade_id)?;
        let record = inner
            .records
            .get_mut(&trade_id)
            .ok_or(PeerdealError::BondNotFound(trade_id))?;
        if record.is_settled() {
            return Err(PeerdealError::BondAlreadySettled(trade_id));
        }

        let amount = record.bond_amount;
        let refunded = BondDisposition::Refunded { amount };
        let forfeited = BondDisposition::Forfeited { amount };
        let (seller_d, buyer_d) = match ruling {
            Ruling::FavorSeller => (refunded, forfeited),
            Ruling::FavorBuyer => (forfeited, refunded),
            Ruling::Split => {
                let penalty = amount * split_penalty_pct / Decimal::ONE_HUNDRED;
                let split = BondDisposition::Split {
                    refunded: amount - penalty,
                    forfeited: penalty,
                };
                (split, split)
            }
        };
        let mut to_treasury = Decimal::ZERO;
        if record.seller_locked {
            record.seller_disposition = seller_d;
            to_treasury += seller_d.treasury_share();
        }
        if record.buyer_locked {
            record.buyer_disposition = buyer_d;
            to_treasury += buyer_d.treasury_share();
        }
        tracing::info!(
            trade_id = %trade_id,
            %ruling,
            seller = %record.seller_disposition,
            buyer = %record.buyer_disposition,
            "bonds settled"
        );
        Self::verify_conservation(&mut inner, trade_id)?;
        // Banked only here, on the call that applied the forfeitures;
        // later refund_all retries must not count them again.
        inner.treasury += to_treasury;
        Ok(())
    }

    // =================================================================
    // Queries
    // =================================================================

    /// Snapshot of a trade's bond record.
    #[must_use]
    pub fn record(&self, trade_id: TradeId) -> Option<BondRecord> {
        self.inner
            .lock()
            .expect("bond ledger poisoned")
            .records
            .get(&trade_id)
            .cloned()
    }

    /// Cumulative value forfeited to the treasury.
    #[must_use]
    pub fn treasury(&self) -> Decimal {
        self.inner.lock().expect("bond ledger poisoned").treasury
    }

    /// Whether a record has been poisoned by a conservation failure.
    #[must_use]
    pub fn is_poisoned(&self, trade_id: TradeId) -> bool {
        self.inner
            .lock()
            .expect("bond ledger poisoned")
            .poisoned
            .contains(&trade_id)
    }

    #[cfg(test)]
    pub(crate) fn poison_for_reconciliation(&self, trade_id: TradeId) {
        self.inner
            .lock()
            .expect("bond ledger poisoned")
            .poisoned
            .insert(trade_id);
    }

    fn check_not_poisoned(inner: &Inner, trade_id: TradeId) -> Result<()> {
        if inner.poisoned.contains(&trade_id) {
            return Err(PeerdealError::BondConservationViolation {
                reason: format!("record for trade {trade_id} is poisoned, awaiting reconciliation"),
            });
        }
        Ok(())
    }

    /// Verify conservation for a just-settled record.
    fn verify_conservation(inner: &mut Inner, trade_id: TradeId) -> Result<()> {
        let record = &inner.records[&trade_id];
        if !record.is_settled() {
            return Ok(());
        }
        let accounted = record.accounted_value();
        let locked = record.locked_total();
        if accounted != locked {
            inner.poisoned.insert(trade_id);
            return Err(PeerdealError::BondConservationViolation {
                reason: format!(
                    "trade {trade_id}: accounted {accounted} != locked {locked} \
                     (seller {}, buyer {})",
                    record.seller_disposition, record.buyer_disposition,
                ),
            });
        }
        Ok(())
    }
}

impl Default for BondLedger {
    fn default() -> Self {
        Self::new()
    }
}
