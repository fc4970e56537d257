//! The matching engine: finds compatible counter-offers and commits fills.
//!
//! Price-time priority: candidates rank best price first (lowest sell /
//! highest buy), ties broken by offer age, oldest first. The execution
//! price is always the resting (maker) offer's price. A commit is
//! all-or-nothing across both offers; a candidate whose viable amount
//! violates either offer's min/max bounds is skipped, not retried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use rust_decimal::Decimal;

use peerdeal_types::{
    Offer, OfferId, OfferSide, PeerdealError, Result, TradeId, TradeSink, TradeTerms,
    TraderProfile, UserId,
};

use crate::book::OfferBook;
use crate::fees::FeeEngine;

/// Matches offers against the book and commits trades to the escrow plane.
pub struct MatchingEngine {
    book: Arc<OfferBook>,
    profiles: RwLock<HashMap<UserId, TraderProfile>>,
    fees: peerdeal_types::FeeConfig,
    sink: Arc<dyn TradeSink>,
    /// Monotonic fill sequence, feeds deterministic trade ids.
    fill_seq: AtomicU64,
}

impl MatchingEngine {
    #[must_use]
    pub fn new(
        book: Arc<OfferBook>,
        fees: peerdeal_types::FeeConfig,
        sink: Arc<dyn TradeSink>,
    ) -> Self {
        Self {
            book,
            profiles: RwLock::new(HashMap::new()),
            fees,
            sink,
            fill_seq: AtomicU64::new(0),
        }
    }

    /// Register or update a trader profile.
    pub fn upsert_profile(&self, profile: TraderProfile) {
        self.profiles
            .write()
            .expect("profile map poisoned")
            .insert(profile.user_id, profile);
    }

    /// Profile lookup with the conservative unknown default.
    #[must_use]
    pub fn profile(&self, user_id: UserId) -> TraderProfile {
        self.profiles
            .read()
            .expect("profile map poisoned")
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| TraderProfile::unknown(user_id))
    }

    // =================================================================
    // Candidate discovery
    // =================================================================

    /// Counter-offers compatible with `intent`, ranked by price-time
    /// priority. Best price first (lowest sell / highest buy), ties broken
    /// oldest first.
    #[must_use]
    pub fn find_candidates(&self, intent: &Offer) -> Vec<Offer> {
        let now = Utc::now();
        let my_profile = self.profile(intent.creator_id);

        let mut candidates: Vec<Offer> = self
            .book
            .snapshot()
            .into_iter()
            .filter(|c| {
                c.id != intent.id
                    && c.creator_id != intent.creator_id
                    && c.side == intent.side.opposite()
                    && c.market == intent.market
                    && c.fiat_currency == intent.fiat_currency
                    && c.status.is_fillable()
                    && c.expires_at > now
                    && Self::prices_cross(intent, c)
                    && Self::meets(&my_profile, c)
                    && Self::meets(&self.profile(c.creator_id), intent)
            })
            .collect();

        match intent.side {
            // Buying: cheapest sell offers first.
            OfferSide::Buy => candidates.sort_by(|a, b| {
                a.price_per_unit
                    .cmp(&b.price_per_unit)
                    .then(a.created_at.cmp(&b.created_at))
            }),
            // Selling: highest buy offers first.
            OfferSide::Sell => candidates.sort_by(|a, b| {
                b.price_per_unit
                    .cmp(&a.price_per_unit)
                    .then(a.created_at.cmp(&b.created_at))
            }),
        }
        candidates
    }

    /// Price crossing: a buy matches sells at or below its price, a sell
    /// matches buys at or above its price.
    fn prices_cross(intent: &Offer, counter: &Offer) -> bool {
        match intent.side {
            OfferSide::Buy => counter.price_per_unit <= intent.price_per_unit,
            OfferSide::Sell => counter.price_per_unit >= intent.price_per_unit,
        }
    }

    /// Does `profile` satisfy the counter-offer's requirements?
    fn meets(profile: &TraderProfile, counter: &Offer) -> bool {
        profile.reputation >= counter.requirements.min_reputation
            && (!counter.requirements.kyc_required || profile.kyc_verified)
    }

    // =================================================================
    // Direct accept
    // =================================================================

    /// Taker accepts a specific maker offer for `amount` tokens.
    ///
    /// # Errors
    /// `SelfTradeBlocked`, `RequirementsNotMet`, `TradeSizeOutOfBounds`,
    /// `InsufficientRemaining` — all before any mutation.
    pub fn accept(&self, taker: UserId, offer_id: OfferId, amount: Decimal) -> Result<TradeId> {
        let maker_offer = self.book.get(offer_id)?;
        if maker_offer.creator_id == taker {
            return Err(PeerdealError::SelfTradeBlocked);
        }
        let taker_profile = self.profile(taker);
        if !Self::meets(&taker_profile, &maker_offer) {
            return Err(PeerdealError::RequirementsNotMet {
                reason: format!(
                    "taker does not meet offer requirements (min_reputation {}, kyc {})",
                    maker_offer.requirements.min_reputation, maker_offer.requirements.kyc_required
                ),
            });
        }
        if amount < maker_offer.min_trade || amount > maker_offer.max_trade {
            return Err(PeerdealError::TradeSizeOutOfBounds {
                amount,
                min: maker_offer.min_trade,
                max: maker_offer.max_trade,
            });
        }

        // Atomic single-side fill; the taker has no resting offer.
        self.book.fill(offer_id, amount)?;
        self.commit(&maker_offer, taker, None, amount)
    }

    // =================================================================
    // Automatic matching
    // =================================================================

    /// Seek counter-offers for a resting offer and commit the first viable
    /// match. Candidates whose viable amount violates either offer's
    /// min/max bounds are skipped.
    ///
    /// # Errors
    /// `NoMatchFound` if no candidate survives filtering and bounds checks.
    pub fn auto_match(&self, offer_id: OfferId) -> Result<TradeId> {
        let my_offer = self.book.get(offer_id)?;

        for counter in self.find_candidates(&my_offer) {
            let amount = my_offer.remaining().min(counter.remaining());
            let min_bound = my_offer.min_trade.max(counter.min_trade);
            let max_bound = my_offer.max_trade.min(counter.max_trade);
            if amount < min_bound || amount > max_bound {
                tracing::debug!(
                    counter = %counter.id,
                    %amount,
                    "candidate skipped: amount outside trade bounds"
                );
                continue;
            }

            // All-or-nothing across both offers. A lost race surfaces as
            // InsufficientRemaining; that candidate is skipped.
            match self.book.fill_pair(my_offer.id, counter.id, amount) {
                Ok(()) => {}
                Err(PeerdealError::InsufficientRemaining { .. }) => continue,
                Err(e) => return Err(e),
            }

            // The counter offer is the resting side: its creator is the
            // maker and its price is the execution price.
            return self.commit(&counter, my_offer.creator_id, Some(&my_offer), amount);
        }

        Err(PeerdealError::NoMatchFound(offer_id))
    }

    // =================================================================
    // Commit
    // =================================================================

    /// Compute fees and hand the committed terms to the escrow plane.
    fn commit(
        &self,
        maker_offer: &Offer,
        taker: UserId,
        taker_offer: Option<&Offer>,
        amount: Decimal,
    ) -> Result<TradeId> {
        let maker_profile = self.profile(maker_offer.creator_id);
        let taker_profile = self.profile(taker);

        // Execution price is the resting (maker) offer's price.
        let price = maker_offer.price_per_unit;
        let breakdown = FeeEngine::quote(
            &self.fees,
            amount,
            price,
            maker_profile.maker_discount_pct,
            taker_profile.taker_discount_pct,
        )?;

        let (seller_id, buyer_id) = match maker_offer.side {
            OfferSide::Sell => (maker_offer.creator_id, taker),
            OfferSide::Buy => (taker, maker_offer.creator_id),
        };

        let trade_id = match taker_offer {
            Some(t) => TradeId::deterministic(
                maker_offer.id,
                t.id,
                self.fill_seq.fetch_add(1, Ordering::Relaxed),
            ),
            None => TradeId::new(),
        };

        let terms = TradeTerms {
            trade_id,
            seller_id,
            buyer_id,
            created_by: taker,
            market: maker_offer.market.clone(),
            amount,
            price_per_unit: price,
            fiat_currency: maker_offer.fiat_currency.clone(),
            maker_fee_pct: breakdown.maker_fee_pct,
            taker_fee_pct: breakdown.taker_fee_pct,
            escrow_amount: breakdown.escrow_amount,
            total_fiat_amount: breakdown.total_fiat,
        };

        tracing::info!(
            trade_id = %trade_id,
            maker = %maker_offer.id,
            %amount,
            %price,
            "match committed"
        );
        self.sink.create_trade(terms)
    }
}
